//! Single long-running task that demultiplexes one [`SecureChannel`] into
//! its four protocol lanes (spec §4.B/§9), generalized from
//! `Session::process_message`'s dispatch-by-`MessageType` match into a
//! standalone actor with its own inbound/outbound queues.
//!
//! The law this module exists to uphold: **no application frame is ever
//! lost**. An application frame that arrives before a handler is
//! registered (the negotiation + code-generation phases can take several
//! round trips) is buffered in FIFO order and drained the moment
//! [`DemuxHandle::set_application_handler`] is called.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::channel::{SecureChannel, Transport};
use crate::error::{NegError, Result};
use crate::framing::{join_frame, split_frame, Header, ProtocolType};
use crate::negotiation::{HeartbeatBody, HeartbeatKind, MetaFrame};

/// An application-frame handler: takes the decoded JSON payload, does
/// something with it, and resolves when done.
pub type AppHandler = Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

enum Outbound {
    Meta(MetaFrame),
    Application(Value),
}

/// Handle side of a running [`Demux`] task. Cheap to clone; every clone
/// shares the same outbound queue, application buffer, and cancellation
/// flag.
#[derive(Clone)]
pub struct DemuxHandle {
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    meta_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<MetaFrame>>>>,
    app_queue: Arc<Mutex<VecDeque<Value>>>,
    app_handler: Arc<Mutex<Option<AppHandler>>>,
    cancel: watch::Sender<bool>,
}

impl DemuxHandle {
    /// Queue a meta-negotiation frame for sealed transmission.
    pub fn send_meta(&self, frame: MetaFrame) -> Result<()> {
        self.outbound_tx
            .send(Outbound::Meta(frame))
            .map_err(|_| NegError::Channel("demux task is gone".to_string()))
    }

    /// Queue an application payload for sealed transmission.
    pub fn send_application(&self, value: Value) -> Result<()> {
        self.outbound_tx
            .send(Outbound::Application(value))
            .map_err(|_| NegError::Channel("demux task is gone".to_string()))
    }

    /// Take ownership of the meta-frame receiver. Only the first caller
    /// (the running [`crate::negotiation::Negotiator`] loop) gets `Some`;
    /// later callers get `None`.
    pub fn take_meta_receiver(&self) -> Option<mpsc::UnboundedReceiver<MetaFrame>> {
        self.meta_rx.lock().expect("lock poisoned").take()
    }

    /// Register the application handler, immediately draining any frames
    /// that arrived and were buffered before a handler existed.
    pub fn set_application_handler(&self, handler: AppHandler) {
        let drained: Vec<Value> = {
            let mut queue = self.app_queue.lock().expect("lock poisoned");
            queue.drain(..).collect()
        };
        *self.app_handler.lock().expect("lock poisoned") = Some(handler.clone());
        for value in drained {
            tokio::spawn(handler(value));
        }
    }

    /// Signal the demux task to stop reading from the transport. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Runs the demultiplex loop over `channel`/`transport` until shutdown or a
/// transport error, returning the handle and the task's `JoinHandle`.
pub fn spawn(channel: SecureChannel, transport: Box<dyn Transport>) -> (DemuxHandle, JoinHandle<()>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (meta_tx, meta_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let handle = DemuxHandle {
        outbound_tx,
        meta_rx: Arc::new(Mutex::new(Some(meta_rx))),
        app_queue: Arc::new(Mutex::new(VecDeque::new())),
        app_handler: Arc::new(Mutex::new(None)),
        cancel: cancel_tx,
    };

    let app_queue = handle.app_queue.clone();
    let app_handler = handle.app_handler.clone();
    let join = tokio::spawn(run(channel, transport, outbound_rx, meta_tx, app_queue, app_handler, cancel_rx));

    (handle, join)
}

async fn run(
    mut channel: SecureChannel,
    mut transport: Box<dyn Transport>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    meta_tx: mpsc::UnboundedSender<MetaFrame>,
    app_queue: Arc<Mutex<VecDeque<Value>>>,
    app_handler: Arc<Mutex<Option<AppHandler>>>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel_rx.changed() => {
                if *cancel_rx.borrow() {
                    break;
                }
            }

            outbound = outbound_rx.recv() => {
                let Some(outbound) = outbound else { break };
                if let Err(err) = send_one(&mut channel, &mut *transport, outbound).await {
                    tracing::warn!(%err, "failed to send outbound frame, closing demux");
                    break;
                }
            }

            inbound = transport.recv_frame() => {
                match inbound {
                    Ok(raw) => {
                        if let Err(err) = handle_inbound(&mut channel, &mut *transport, raw, &meta_tx, &app_queue, &app_handler).await {
                            tracing::warn!(%err, "dropping unreadable inbound frame");
                        }
                    }
                    Err(err) => {
                        tracing::info!(%err, "transport closed, stopping demux");
                        break;
                    }
                }
            }
        }
    }
}

async fn send_one(channel: &mut SecureChannel, transport: &mut dyn Transport, outbound: Outbound) -> Result<()> {
    let (header, plaintext) = match outbound {
        Outbound::Meta(frame) => (Header::new(ProtocolType::Meta), serde_json::to_vec(&frame)?),
        Outbound::Application(value) => (Header::new(ProtocolType::Application), serde_json::to_vec(&value)?),
    };
    let sealed = channel.seal(header, &plaintext)?;
    transport.send_frame(join_frame(header, &sealed)).await
}

async fn handle_inbound(
    channel: &mut SecureChannel,
    transport: &mut dyn Transport,
    raw: Vec<u8>,
    meta_tx: &mpsc::UnboundedSender<MetaFrame>,
    app_queue: &Arc<Mutex<VecDeque<Value>>>,
    app_handler: &Arc<Mutex<Option<AppHandler>>>,
) -> Result<()> {
    let (header, body) = split_frame(&raw)?;
    let plaintext = channel.open(header, body)?;

    match header.protocol_type() {
        ProtocolType::Meta => {
            let frame: MetaFrame = serde_json::from_slice(&plaintext)?;
            match frame {
                MetaFrame::Heartbeat(HeartbeatBody { kind: HeartbeatKind::Ping, sequence }) => {
                    let pong = MetaFrame::Heartbeat(HeartbeatBody { kind: HeartbeatKind::Pong, sequence });
                    send_one(channel, transport, Outbound::Meta(pong)).await?;
                }
                MetaFrame::Heartbeat(HeartbeatBody { kind: HeartbeatKind::Pong, sequence }) => {
                    tracing::debug!(sequence, "heartbeat pong received");
                }
                other => {
                    let _ = meta_tx.send(other);
                }
            }
        }
        ProtocolType::Application => {
            let value: Value = serde_json::from_slice(&plaintext)?;
            let handler = app_handler.lock().expect("lock poisoned").clone();
            match handler {
                Some(handler) => {
                    tokio::spawn(handler(value));
                }
                None => {
                    app_queue.lock().expect("lock poisoned").push_back(value);
                }
            }
        }
        ProtocolType::Natural | ProtocolType::Verification => {
            tracing::debug!(protocol_type = ?header.protocol_type(), "no lane registered for frame, discarding");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::reference::InProcessChannel;
    use crate::negotiation::{CodeGenerationBody, CodeGenerationStatus};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    fn handshake() -> (SecureChannel, SecureChannel) {
        let mut a = SecureChannel::new("demux-sess", Duration::from_secs(60));
        let mut b = SecureChannel::new("demux-sess", Duration::from_secs(60));
        let a_pub = a.local_public_key().clone();
        let b_pub = b.local_public_key().clone();
        a.complete_handshake(b_pub).unwrap();
        b.complete_handshake(a_pub).unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn application_frames_are_buffered_then_drained_on_handler_registration() {
        let (chan_a, chan_b) = handshake();
        let (t_a, t_b) = InProcessChannel::pair();

        let (handle_a, _join_a) = spawn(chan_a, Box::new(t_a));
        let (handle_b, _join_b) = spawn(chan_b, Box::new(t_b));

        handle_a.send_application(json!({"text": "hello"})).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let received = Arc::new(AsyncMutex::new(Vec::new()));
        let received_clone = received.clone();
        handle_b.set_application_handler(Arc::new(move |value| {
            let received = received_clone.clone();
            Box::pin(async move {
                received.lock().await.push(value);
            })
        }));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(received.lock().await.len(), 1);
        assert_eq!(received.lock().await[0]["text"], "hello");

        handle_a.shutdown();
        handle_b.shutdown();
    }

    #[tokio::test]
    async fn meta_frames_reach_the_taken_receiver() {
        let (chan_a, chan_b) = handshake();
        let (t_a, t_b) = InProcessChannel::pair();

        let (handle_a, _join_a) = spawn(chan_a, Box::new(t_a));
        let (handle_b, _join_b) = spawn(chan_b, Box::new(t_b));

        let mut meta_rx = handle_b.take_meta_receiver().unwrap();
        assert!(handle_b.take_meta_receiver().is_none());

        handle_a
            .send_meta(MetaFrame::CodeGeneration(CodeGenerationBody {
                status: CodeGenerationStatus::Generated,
            }))
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(1), meta_rx.recv()).await.unwrap().unwrap();
        match frame {
            MetaFrame::CodeGeneration(body) => assert_eq!(body.status, CodeGenerationStatus::Generated),
            _ => panic!("expected codeGeneration frame"),
        }

        handle_a.shutdown();
        handle_b.shutdown();
    }

    #[tokio::test]
    async fn heartbeat_ping_is_answered_with_a_pong_and_never_reaches_the_meta_receiver() {
        let (chan_a, chan_b) = handshake();
        let (t_a, t_b) = InProcessChannel::pair();

        let (handle_a, _join_a) = spawn(chan_a, Box::new(t_a));
        let (handle_b, _join_b) = spawn(chan_b, Box::new(t_b));

        let mut meta_rx_a = handle_a.take_meta_receiver().unwrap();
        let _meta_rx_b = handle_b.take_meta_receiver().unwrap();

        handle_a
            .send_meta(MetaFrame::Heartbeat(HeartbeatBody { kind: HeartbeatKind::Ping, sequence: 7 }))
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(1), meta_rx_a.recv()).await.unwrap().unwrap();
        match frame {
            MetaFrame::Heartbeat(body) => {
                assert_eq!(body.kind, HeartbeatKind::Pong);
                assert_eq!(body.sequence, 7);
            }
            _ => panic!("expected heartbeat pong"),
        }

        handle_a.shutdown();
        handle_b.shutdown();
    }
}
