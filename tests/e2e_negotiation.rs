//! End-to-end coverage of the full negotiate → generate → exchange flow
//! driven entirely through the public `Orchestrator` API, the way a real
//! pair of agent processes would use this crate.

use std::sync::Arc;
use std::time::Duration;

use negproto::channel::reference::InProcessChannel;
use negproto::config::Config;
use negproto::llm::mock::ScriptedClient;
use negproto::llm::LlmClient;
use negproto::{Orchestrator, SecureChannel};
use serde_json::{json, Value};
use tempfile::tempdir;

fn handshake(session_id: &str) -> (SecureChannel, SecureChannel) {
    let mut a = SecureChannel::new(session_id, Duration::from_secs(60));
    let mut b = SecureChannel::new(session_id, Duration::from_secs(60));
    let a_pub = a.local_public_key().clone();
    let b_pub = b.local_public_key().clone();
    a.complete_handshake(b_pub).unwrap();
    b.complete_handshake(a_pub).unwrap();
    (a, b)
}

fn orchestrator_with(llm: Arc<dyn LlmClient>) -> (Orchestrator, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.protocol_code_path = dir.path().to_path_buf();
    (Orchestrator::new(config, llm), dir)
}

#[tokio::test]
async fn two_round_negotiation_converges_and_artifacts_persist_to_disk() {
    // Requester proposes; provider pushes back once ("negotiating") before
    // accepting, exercising a genuine multi-round exchange rather than an
    // immediate accept.
    let requester_llm: Arc<dyn LlmClient> = Arc::new(
        ScriptedClient::new()
            .with_json(json!({"candidateProtocols": {"v": 1}, "rationale": "initial proposal"}))
            .with_json(json!({"status": "accepted", "candidateProtocols": {"v": 2}, "modificationSummary": null}))
            .with_json(json!({"moduleName": "user_lookup", "requestSchema": {}, "responseSchema": {}}))
            .with_json(json!({"steps": [{"op": "extract", "jsonPointer": "/userId", "targetField": "userId"}]})),
    );
    let provider_llm: Arc<dyn LlmClient> = Arc::new(
        ScriptedClient::new()
            .with_json(json!({"status": "negotiating", "candidateProtocols": {"v": 2}, "modificationSummary": "added a field"}))
            .with_json(json!({"status": "accepted", "candidateProtocols": {"v": 2}, "modificationSummary": null}))
            .with_json(json!({"moduleName": "user_lookup", "requestSchema": {}, "responseSchema": {}}))
            .with_json(json!({"steps": [{"op": "extract", "jsonPointer": "/userId", "targetField": "userId"}]})),
    );

    let (orchestrator_a, root_a) = orchestrator_with(requester_llm);
    let (orchestrator_b, root_b) = orchestrator_with(provider_llm);

    let (chan_a, chan_b) = handshake("e2e-two-round");
    let (t_a, t_b) = InProcessChannel::pair();

    let requester_fut = orchestrator_a.connect_with_negotiation(
        chan_a,
        Box::new(t_a),
        "did:key:zBob".to_string(),
        "look up a user by id",
        "userId: string",
        "user: object",
    );
    let provider_fut = orchestrator_b.accept_with_negotiation(chan_b, Box::new(t_b), "did:key:zAlice".to_string(), None);

    let (requester, provider) = tokio::join!(requester_fut, provider_fut);
    let requester = requester.unwrap();
    let provider = provider.unwrap();
    assert_eq!(requester.protocol_hash(), provider.protocol_hash());

    provider.set_protocol_callback(Arc::new(|input: Value| {
        Box::pin(async move { json!({"code": 200, "user": {"id": input["userId"]}}) })
    }));

    let response = requester.send_request(json!({"userId": "u-7"})).await.unwrap();
    assert_eq!(response["user"]["id"], "u-7");

    // Both sides independently wrote a verifiable bundle to their own
    // protocol_code_path.
    let has_bundle = |root: &std::path::Path| std::fs::read_dir(root).unwrap().next().is_some();
    assert!(has_bundle(root_a.path()));
    assert!(has_bundle(root_b.path()));
}

#[tokio::test]
async fn rejection_propagates_as_an_error_without_generating_artifacts() {
    let requester_llm: Arc<dyn LlmClient> = Arc::new(
        ScriptedClient::new()
            .with_json(json!({"candidateProtocols": {"v": 1}, "rationale": "initial proposal"}))
            .with_json(json!({"status": "rejected", "candidateProtocols": null, "modificationSummary": "peer declined"})),
    );
    let provider_llm: Arc<dyn LlmClient> = Arc::new(
        ScriptedClient::new().with_json(json!({"status": "rejected", "candidateProtocols": null, "modificationSummary": "cannot support this requirement"})),
    );

    let (orchestrator_a, root_a) = orchestrator_with(requester_llm);
    let (orchestrator_b, _root_b) = orchestrator_with(provider_llm);

    let (chan_a, chan_b) = handshake("e2e-rejected");
    let (t_a, t_b) = InProcessChannel::pair();

    let requester_fut = orchestrator_a.connect_with_negotiation(
        chan_a,
        Box::new(t_a),
        "did:key:zBob".to_string(),
        "an impossible requirement",
        "x: string",
        "y: string",
    );
    let provider_fut = orchestrator_b.accept_with_negotiation(chan_b, Box::new(t_b), "did:key:zAlice".to_string(), None);

    let (requester_result, provider_result) = tokio::join!(requester_fut, provider_fut);
    assert!(requester_result.is_err());
    assert!(provider_result.is_err());
    assert!(std::fs::read_dir(root_a.path()).unwrap().next().is_none());
}
