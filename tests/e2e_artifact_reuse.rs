//! A fresh `Orchestrator` pointed at a directory with prior bundles should
//! find them at construction time, without renegotiating.

use std::sync::Arc;
use std::time::Duration;

use negproto::channel::reference::InProcessChannel;
use negproto::config::Config;
use negproto::llm::mock::ScriptedClient;
use negproto::llm::LlmClient;
use negproto::{Orchestrator, SecureChannel};
use serde_json::json;
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

#[tokio::test]
async fn bundle_written_by_one_orchestrator_is_indexed_by_the_next() {
    let root = tempdir().unwrap();

    let requester_llm: Arc<dyn LlmClient> = Arc::new(
        ScriptedClient::new()
            .with_json(json!({"candidateProtocols": {"v": 1}, "rationale": "r1"}))
            .with_json(json!({"moduleName": "ping", "requestSchema": {}, "responseSchema": {}}))
            .with_json(json!({"steps": []})),
    );
    let provider_llm: Arc<dyn LlmClient> = Arc::new(
        ScriptedClient::new()
            .with_json(json!({"status": "accepted", "candidateProtocols": {"v": 1}, "modificationSummary": null}))
            .with_json(json!({"moduleName": "ping", "requestSchema": {}, "responseSchema": {}}))
            .with_json(json!({"steps": []})),
    );

    let mut config_a = Config::default();
    config_a.protocol_code_path = root.path().join("a");
    let mut config_b = Config::default();
    config_b.protocol_code_path = root.path().join("b");

    let orchestrator_a = Orchestrator::new(config_a.clone(), requester_llm);
    let orchestrator_b = Orchestrator::new(config_b, provider_llm);

    let (chan_a, chan_b) = handshake("reuse-sess");
    let (t_a, t_b) = InProcessChannel::pair();

    let requester_fut =
        orchestrator_a.connect_with_negotiation(chan_a, Box::new(t_a), "did:key:zB".to_string(), "ping", "none", "none");
    let provider_fut = orchestrator_b.accept_with_negotiation(chan_b, Box::new(t_b), "did:key:zA".to_string(), None);

    let (requester, _provider) = tokio::join!(requester_fut, provider_fut);
    let requester = requester.unwrap();
    let hash = requester.protocol_hash().to_string();

    // A second orchestrator pointed at the same directory should find the
    // bundle purely by scanning, with no LLM calls at all.
    let dead_llm: Arc<dyn LlmClient> = Arc::new(ScriptedClient::new());
    let reopened = Orchestrator::new(config_a, dead_llm);
    let registry = reopened.registry();
    let found = registry.read().await.get_requester_by_hash(&hash).cloned();
    assert!(found.is_some());
    assert_eq!(found.unwrap().document.hash(), hash);
}
