//! Provider demo: listens for one inbound connection, negotiates a
//! protocol, answers a capability-assessment tool call during negotiation,
//! and serves one request against a mock education-history dataset.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use negproto::channel::tcp::TcpTransport;
use negproto::channel::{handshake_over, SecureChannel};
use negproto::config::Config;
use negproto::identity::DidStore;
use negproto::llm::openai::OpenAiClient;
use negproto::llm::{LlmClient, ToolSpec};
use negproto::Orchestrator;
use serde_json::json;

#[derive(Parser)]
#[command(name = "negproto-bob")]
#[command(about = "Provider-side negotiation demo")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:5001")]
    listen: String,

    /// Path to a TOML config file; falls back to environment + defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to this agent's persisted DID identity.
    #[arg(long, default_value = "bob.did")]
    identity: PathBuf,

    /// Remote peer's DID (not independently resolved yet; recorded as-is).
    #[arg(long, default_value = "did:key:unresolved-alice")]
    peer_did: String,
}

fn capability_tool() -> ToolSpec {
    ToolSpec {
        name: "get_capability_info".to_string(),
        description: "Reports what this provider can and cannot do for the proposed requirement".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "requirement": {"type": "string"},
                "input_description": {"type": "string"},
                "output_description": {"type": "string"},
            },
            "required": ["requirement"],
        }),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let identity = DidStore::load_or_generate(&cli.identity)?;
    tracing::info!(did = identity.did(), "bob identity ready");

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(&config.llm)?);
    let orchestrator = Orchestrator::new(config, llm);

    tracing::info!("listening on {}", cli.listen);
    let mut transport = TcpTransport::accept_one(&cli.listen).await?;
    let mut channel = SecureChannel::new(format!("{}|{}", cli.peer_did, identity.did()), Duration::from_secs(300));
    handshake_over(&mut channel, &mut transport).await?;
    tracing::info!("encrypted channel established");

    let capability_handler = Arc::new(|_name: &str, _args: serde_json::Value| {
        Box::pin(async move {
            Ok("Can fully meet the specified requirement: all input fields accepted, all output \
                fields produced, no known limitations."
                .to_string())
        }) as negproto::llm::ToolFuture
    });

    let session = orchestrator
        .accept_with_negotiation(channel, Box::new(transport), cli.peer_did, Some((capability_tool(), capability_handler)))
        .await?;

    println!("negotiated protocol {}", session.protocol_hash());
    println!("interface: {:?}", session.descriptor());

    session.set_protocol_callback(Arc::new(|request: serde_json::Value| {
        Box::pin(async move {
            tracing::info!(%request, "serving request");
            json!({
                "code": 200,
                "education_history": [{
                    "institution": "State University",
                    "major": "Computer Science",
                    "degree": "Bachelor",
                    "achievements": "Dean's List",
                    "start_date": "2016-09-01",
                    "end_date": "2020-06-01",
                }],
            })
        })
    }));

    println!("serving requests, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    Ok(())
}
