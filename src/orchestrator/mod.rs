//! Ties identity, channel, negotiation, code generation, and the
//! interpreter together into the two end-to-end flows a caller actually
//! drives: connecting out as a requester, and accepting in as a provider
//! (spec §5 Sequencing).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock};
use uuid::Uuid;

use crate::artifact::{Bundle, Registry};
use crate::channel::tcp::TcpListenerHandle;
use crate::channel::{handshake_over, SecureChannel, Transport};
use crate::codegen::{self, InterfaceDescriptor, Program};
use crate::config::Config;
use crate::error::{NegError, Result};
use crate::interpreter;
use crate::llm::{LlmClient, ToolHandler, ToolSpec};
use crate::negotiation::{
    CodeGenerationBody, CodeGenerationStatus, HeartbeatBody, HeartbeatKind, MetaFrame, NegotiationBody,
    NegotiationStatus, Negotiator, NegotiatorRole, ProtocolDocument,
};
use crate::session::{self, CodeGenBarrier, DemuxHandle};

/// A user-supplied handler for incoming requests, registered by a provider
/// once its side of the protocol is generated.
pub type ProtocolCallback = Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Value> + Send>> + Send + Sync>;

/// Owns the process-wide artifact registry and the collaborators (LLM
/// client, config) every negotiated session needs.
pub struct Orchestrator {
    config: Config,
    llm: Arc<dyn LlmClient>,
    registry: Arc<RwLock<Registry>>,
}

impl Orchestrator {
    /// Build an orchestrator, scanning `config.protocol_code_path` for
    /// already-generated bundles from prior sessions.
    pub fn new(config: Config, llm: Arc<dyn LlmClient>) -> Self {
        let registry = Registry::scan(&[config.protocol_code_path.clone()]);
        Self { config, llm, registry: Arc::new(RwLock::new(registry)) }
    }

    /// The shared artifact registry, for callers that want to inspect
    /// previously-negotiated protocols directly.
    pub fn registry(&self) -> Arc<RwLock<Registry>> {
        self.registry.clone()
    }

    /// Dial out: negotiate a protocol as the requester, generate this
    /// side's artifact, and wait for the peer's code-generation barrier
    /// before returning a session ready to send requests.
    pub async fn connect_with_negotiation(
        &self,
        channel: SecureChannel,
        transport: Box<dyn Transport>,
        remote_did: String,
        requirement: &str,
        input_desc: &str,
        output_desc: &str,
    ) -> Result<RequesterSession> {
        let (handle, _join) = session::spawn(channel, transport);
        let mut meta_rx = handle
            .take_meta_receiver()
            .ok_or_else(|| NegError::Protocol("meta receiver already taken".to_string()))?;

        let round_timeout = Duration::from_secs(self.config.negotiation.inbound_timeout_secs);
        let mut negotiator = Negotiator::new(NegotiatorRole::Requester, self.llm.clone(), self.config.negotiation.max_rounds);

        let initial = negotiator.propose_initial(requirement, input_desc, output_desc).await?;
        handle.send_meta(MetaFrame::ProtocolNegotiation(initial))?;

        let document = negotiation_loop(&mut negotiator, &handle, &mut meta_rx, round_timeout, None).await?;

        let side = self
            .generate_persist_and_announce(&handle, &document, "requester")
            .await?;

        let barrier = spawn_codegen_watcher(meta_rx);
        barrier
            .await_peer_ready(Duration::from_secs(self.config.negotiation.code_generation_timeout_secs))
            .await?;

        let (response_tx, response_rx) = mpsc::unbounded_channel();
        handle.set_application_handler(Arc::new(move |value| {
            let response_tx = response_tx.clone();
            Box::pin(async move {
                let _ = response_tx.send(value);
            })
        }));

        spawn_heartbeat_ping(handle.clone(), Duration::from_secs(self.config.heartbeat.interval_secs));

        Ok(RequesterSession {
            handle,
            remote_did,
            protocol_hash: document.hash(),
            descriptor: side.descriptor,
            program: side.program,
            response_rx: Arc::new(AsyncMutex::new(response_rx)),
            request_timeout: Duration::from_secs(self.config.negotiation.default_request_timeout_secs),
        })
    }

    /// Accept an inbound session: negotiate as the provider, generate this
    /// side's artifact, and wait for the peer's code-generation barrier
    /// before returning a session ready to take a protocol callback.
    pub async fn accept_with_negotiation(
        &self,
        channel: SecureChannel,
        transport: Box<dyn Transport>,
        remote_did: String,
        capability_tool: Option<(ToolSpec, ToolHandler)>,
    ) -> Result<ProviderSession> {
        let (handle, _join) = session::spawn(channel, transport);
        let mut meta_rx = handle
            .take_meta_receiver()
            .ok_or_else(|| NegError::Protocol("meta receiver already taken".to_string()))?;

        let round_timeout = Duration::from_secs(self.config.negotiation.inbound_timeout_secs);
        let mut negotiator = Negotiator::new(NegotiatorRole::Provider, self.llm.clone(), self.config.negotiation.max_rounds);
        if let Some((tool, tool_handler)) = capability_tool {
            negotiator = negotiator.with_capability_tool(tool, tool_handler);
        }

        let first = recv_negotiation_frame(&mut meta_rx, round_timeout).await?;
        negotiator.receive_initial(first.sequence_id, first.candidate_protocols.clone())?;

        let document = negotiation_loop(&mut negotiator, &handle, &mut meta_rx, round_timeout, Some(first)).await?;

        let side = self
            .generate_persist_and_announce(&handle, &document, "provider")
            .await?;

        let barrier = spawn_codegen_watcher(meta_rx);
        barrier
            .await_peer_ready(Duration::from_secs(self.config.negotiation.code_generation_timeout_secs))
            .await?;

        Ok(ProviderSession {
            handle,
            remote_did,
            protocol_hash: document.hash(),
            descriptor: side.descriptor,
            program: side.program,
        })
    }

    /// Serve inbound connections on `listener` indefinitely, running each
    /// through its own handshake and negotiation and invoking
    /// `new_provider_session_callback` once it's ready (spec §4.G:
    /// `accept_with_negotiation` installed as a new-session callback on the
    /// listener, rather than accepting exactly one connection and
    /// stopping). Each connection gets a fresh random session id, so two
    /// dialers negotiating concurrently derive independent session keys and
    /// never observe each other's frames (spec §8 scenario 6).
    ///
    /// A connection that fails its handshake or negotiation is logged and
    /// dropped; it does not stop the listener from serving the next one.
    /// Returns only if accepting from `listener` itself fails.
    pub async fn serve_provider(
        self: Arc<Self>,
        listener: TcpListenerHandle,
        peer_did: String,
        handshake_timeout: Duration,
        capability_tool: Option<(ToolSpec, ToolHandler)>,
        new_provider_session_callback: Arc<dyn Fn(ProviderSession) + Send + Sync>,
    ) -> Result<()> {
        loop {
            let transport = listener.accept().await?;
            let orchestrator = self.clone();
            let peer_did = peer_did.clone();
            let capability_tool = capability_tool.clone();
            let callback = new_provider_session_callback.clone();

            tokio::spawn(async move {
                let mut transport = transport;
                let mut channel = SecureChannel::new(Uuid::new_v4().to_string(), handshake_timeout);
                if let Err(err) = handshake_over(&mut channel, &mut transport).await {
                    tracing::warn!(%err, "inbound handshake failed, dropping connection");
                    return;
                }
                match orchestrator
                    .accept_with_negotiation(channel, Box::new(transport), peer_did, capability_tool)
                    .await
                {
                    Ok(session) => callback(session),
                    Err(err) => tracing::warn!(%err, "inbound negotiation failed, dropping connection"),
                }
            });
        }
    }

    /// Generate this side's artifact, persist it, and announce the outcome
    /// over the `codeGeneration` handshake (spec §4.E/§7: any failure along
    /// this path — the LLM producing an unusable plan, the bundle write, or
    /// the registry index — is surfaced to the peer as `status:"error"`
    /// before the error propagates to this side's caller).
    async fn generate_persist_and_announce(
        &self,
        handle: &DemuxHandle,
        document: &ProtocolDocument,
        role: &str,
    ) -> Result<codegen::GeneratedSide> {
        match self.try_generate_and_persist(document, role).await {
            Ok(side) => {
                handle.send_meta(MetaFrame::CodeGeneration(CodeGenerationBody {
                    status: CodeGenerationStatus::Generated,
                }))?;
                Ok(side)
            }
            Err(err) => {
                let _ = handle.send_meta(MetaFrame::CodeGeneration(CodeGenerationBody {
                    status: CodeGenerationStatus::Error,
                }));
                Err(err)
            }
        }
    }

    async fn try_generate_and_persist(&self, document: &ProtocolDocument, role: &str) -> Result<codegen::GeneratedSide> {
        let side = match role {
            "requester" => codegen::generate_requester(document, &self.llm).await?,
            _ => codegen::generate_provider(document, &self.llm).await?,
        };

        let mut bundle = Bundle::create(&self.config.protocol_code_path, &side.module_name, document.clone())?;
        match role {
            "requester" => bundle.write_requester(side.clone())?,
            _ => bundle.write_provider(side.clone())?,
        }
        self.registry.write().await.index(bundle);

        Ok(side)
    }
}

/// Drain `meta_rx` in the background, signaling a [`CodeGenBarrier`] the
/// moment the peer reports `ready`. Other meta frames (stray negotiation
/// retransmits, heartbeats) are ignored at this point in the session.
fn spawn_codegen_watcher(mut meta_rx: mpsc::UnboundedReceiver<MetaFrame>) -> CodeGenBarrier {
    let barrier = CodeGenBarrier::new();
    let watcher = barrier.clone();
    tokio::spawn(async move {
        while let Some(frame) = meta_rx.recv().await {
            if let MetaFrame::CodeGeneration(body) = frame {
                if body.status == CodeGenerationStatus::Generated {
                    watcher.signal_peer_ready();
                }
            }
        }
    });
    barrier
}

/// Drives the dialer side of the heartbeat sub-protocol (spec §5/§9: only
/// the connecting peer pings; the listener just answers via the demux's own
/// auto-pong). Runs until `handle`'s demux task is gone.
fn spawn_heartbeat_ping(handle: DemuxHandle, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        let mut sequence = 0u64;
        loop {
            ticker.tick().await;
            sequence += 1;
            let ping = MetaFrame::Heartbeat(HeartbeatBody { kind: HeartbeatKind::Ping, sequence });
            if handle.send_meta(ping).is_err() {
                break;
            }
        }
    });
}

async fn recv_negotiation_frame(
    meta_rx: &mut mpsc::UnboundedReceiver<MetaFrame>,
    timeout: Duration,
) -> Result<NegotiationBody> {
    loop {
        let next = tokio::time::timeout(timeout, meta_rx.recv())
            .await
            .map_err(|_| NegError::Timeout("negotiation round".to_string()))?
            .ok_or_else(|| NegError::Channel("peer closed meta channel".to_string()))?;
        if let MetaFrame::ProtocolNegotiation(body) = next {
            return Ok(body);
        }
    }
}

/// Drives `negotiator` to `Accepted`/`Rejected`, optionally starting from
/// an already-received frame (the provider's round-1 intake) instead of
/// waiting for a new one.
async fn negotiation_loop(
    negotiator: &mut Negotiator,
    handle: &DemuxHandle,
    meta_rx: &mut mpsc::UnboundedReceiver<MetaFrame>,
    round_timeout: Duration,
    mut pending: Option<NegotiationBody>,
) -> Result<ProtocolDocument> {
    loop {
        let frame = match pending.take() {
            Some(frame) => frame,
            None => recv_negotiation_frame(meta_rx, round_timeout).await?,
        };

        let outcome = negotiator.evaluate(frame.sequence_id, frame.candidate_protocols.clone()).await?;
        match outcome.status {
            NegotiationStatus::Accepted => {
                negotiator.reconcile_accepted(&outcome.candidate_protocol);
                return Ok(ProtocolDocument::new(negotiator.into_document()?));
            }
            NegotiationStatus::Rejected => {
                let reason = outcome.modification_summary.unwrap_or_else(|| "no reason given".to_string());
                let _ = handle.send_meta(MetaFrame::ProtocolNegotiation(NegotiationBody {
                    message_id: Uuid::new_v4().to_string(),
                    sequence_id: negotiator.round(),
                    status: outcome.status,
                    candidate_protocols: outcome.candidate_protocol,
                    modification_summary: Some(reason.clone()),
                }));
                return Err(NegError::NegotiationRejected(reason));
            }
            NegotiationStatus::Negotiating => {
                handle.send_meta(MetaFrame::ProtocolNegotiation(NegotiationBody {
                    message_id: Uuid::new_v4().to_string(),
                    sequence_id: negotiator.round(),
                    status: outcome.status,
                    candidate_protocols: outcome.candidate_protocol,
                    modification_summary: outcome.modification_summary,
                }))?;
            }
        }
    }
}

/// A connected, negotiated session on the requester side.
pub struct RequesterSession {
    handle: DemuxHandle,
    remote_did: String,
    protocol_hash: String,
    descriptor: InterfaceDescriptor,
    program: Program,
    response_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Value>>>,
    request_timeout: Duration,
}

impl RequesterSession {
    /// The negotiated protocol's content hash.
    pub fn protocol_hash(&self) -> &str {
        &self.protocol_hash
    }

    /// The peer's DID.
    pub fn remote_did(&self) -> &str {
        &self.remote_did
    }

    /// This side's interface description.
    pub fn descriptor(&self) -> &InterfaceDescriptor {
        &self.descriptor
    }

    /// Build the request payload from `input` via this side's dispatch
    /// plan, send it, and wait for the matching response.
    pub async fn send_request(&self, input: Value) -> Result<Value> {
        let request = interpreter::run_requester(&self.program, &input)?;
        self.handle.send_application(request)?;

        let mut rx = self.response_rx.lock().await;
        tokio::time::timeout(self.request_timeout, rx.recv())
            .await
            .map_err(|_| NegError::Timeout("send_request".to_string()))?
            .ok_or_else(|| NegError::Channel("peer closed application channel".to_string()))
    }
}

/// A connected, negotiated session on the provider side.
pub struct ProviderSession {
    handle: DemuxHandle,
    remote_did: String,
    protocol_hash: String,
    descriptor: InterfaceDescriptor,
    program: Program,
}

impl ProviderSession {
    /// The negotiated protocol's content hash.
    pub fn protocol_hash(&self) -> &str {
        &self.protocol_hash
    }

    /// The peer's DID.
    pub fn remote_did(&self) -> &str {
        &self.remote_did
    }

    /// This side's interface description.
    pub fn descriptor(&self) -> &InterfaceDescriptor {
        &self.descriptor
    }

    /// Register the business-logic callback. Every incoming application
    /// frame is run through this side's dispatch plan to build the
    /// callback input, the callback produces the result, and the result is
    /// sent straight back as the response application frame.
    pub fn set_protocol_callback(&self, callback: ProtocolCallback) {
        let program = self.program.clone();
        let handle = self.handle.clone();
        self.handle.set_application_handler(Arc::new(move |request| {
            let program = program.clone();
            let callback = callback.clone();
            let handle = handle.clone();
            Box::pin(async move {
                match interpreter::run_provider(&program, &request) {
                    Ok(callback_input) => {
                        let result = callback(callback_input).await;
                        let _ = handle.send_application(result);
                    }
                    Err(err) => {
                        tracing::warn!(%err, "provider dispatch plan rejected an inbound request");
                        let _ = handle.send_application(json!({
                            "code": err.as_http_code(),
                            "errorMessage": err.to_string(),
                        }));
                    }
                }
            })
        }));
    }
}
