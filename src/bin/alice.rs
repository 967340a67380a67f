//! Requester demo: dials a provider over TCP, negotiates a protocol for
//! retrieving a user's education history, and sends one request through
//! whatever dispatch plan the negotiation produced.
//!
//! Mirrors the shape of the education-history demo this crate's meta-
//! protocol design was distilled from: a fixed requirement/input/output
//! description, a single request/response round after negotiation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use negproto::channel::tcp::TcpTransport;
use negproto::channel::{handshake_over, SecureChannel};
use negproto::config::Config;
use negproto::identity::DidStore;
use negproto::llm::openai::OpenAiClient;
use negproto::llm::LlmClient;
use negproto::Orchestrator;
use serde_json::json;

const REQUIREMENT: &str = "\
Design an API for retrieving a user's education history.
- Supports retrieving education history for a single user
- Each entry includes: institution, major, degree, achievements, start date, end date
- Must support error handling and parameter validation";

const INPUT_DESCRIPTION: &str = "user_id: string; include_details: boolean, optional";
const OUTPUT_DESCRIPTION: &str = "\
A list of education history entries (institution, major, degree, achievements,
start_date, end_date as YYYY-MM-DD), plus an HTTP-style status code.";

#[derive(Parser)]
#[command(name = "negproto-alice")]
#[command(about = "Requester-side negotiation demo")]
struct Cli {
    /// Address of the provider to dial.
    #[arg(long, default_value = "127.0.0.1:5001")]
    connect: String,

    /// Path to a TOML config file; falls back to environment + defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to this agent's persisted DID identity.
    #[arg(long, default_value = "alice.did")]
    identity: PathBuf,

    /// Remote peer's DID (not independently resolved yet; recorded as-is).
    #[arg(long, default_value = "did:key:unresolved-bob")]
    peer_did: String,

    /// user_id to request education history for.
    #[arg(long, default_value = "u-1001")]
    user_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let identity = DidStore::load_or_generate(&cli.identity)?;
    tracing::info!(did = identity.did(), "alice identity ready");

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(&config.llm)?);
    let orchestrator = Orchestrator::new(config, llm);

    let mut transport = TcpTransport::connect(&cli.connect).await?;
    let mut channel = SecureChannel::new(format!("{}|{}", identity.did(), cli.peer_did), Duration::from_secs(300));
    handshake_over(&mut channel, &mut transport).await?;
    tracing::info!("encrypted channel established with {}", cli.connect);

    let session = orchestrator
        .connect_with_negotiation(
            channel,
            Box::new(transport),
            cli.peer_did,
            REQUIREMENT,
            INPUT_DESCRIPTION,
            OUTPUT_DESCRIPTION,
        )
        .await?;

    println!("negotiated protocol {}", session.protocol_hash());
    println!("interface: {:?}", session.descriptor());

    let response = session.send_request(json!({"user_id": cli.user_id, "include_details": true})).await?;
    println!("-------------------------------------------------");
    println!("response: {response}");
    println!("-------------------------------------------------");

    Ok(())
}
