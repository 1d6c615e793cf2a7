//! Report Bus - outbound message bus
//!
//! Agents and actions enqueue messages through a [`Reporter`]. A single
//! dispatch task offers each message, in order, to the registered sinks; the
//! first sink reporting "handled" wins. A streaming message is fully drained
//! before the next message is dispatched.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::{FrameworkResult, Message};

use super::bus::BusWorker;
use super::channels::{create_bus_channel, BusSender};
use super::sinks::ReportSink;

/// Cloneable producer handle for the Report Bus
#[derive(Clone, Debug)]
pub struct Reporter {
    tx: Option<BusSender>,
}

impl Reporter {
    pub fn new(tx: BusSender) -> Self {
        Self { tx: Some(tx) }
    }

    /// A reporter that drops everything (for agents outside a runtime)
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Enqueue a message; returns false if it was dropped
    pub fn report(&self, message: Message) -> bool {
        match &self.tx {
            Some(tx) => {
                if tx.send(message).is_err() {
                    tracing::warn!("[ReportBus] Queue closed, message dropped");
                    return false;
                }
                true
            }
            None => {
                tracing::trace!(
                    "[ReportBus] No bus attached, dropping {} message",
                    message.handle_type
                );
                false
            }
        }
    }
}

/// The outbound bus
pub struct ReportBus {
    tx: BusSender,
    worker: BusWorker<Message>,
    sinks: Arc<RwLock<Vec<Arc<dyn ReportSink>>>>,
}

impl ReportBus {
    pub fn new() -> Self {
        let (tx, rx) = create_bus_channel();
        Self {
            tx,
            worker: BusWorker::new("ReportBus", rx),
            sinks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Producer handle for agents and actions
    pub fn reporter(&self) -> Reporter {
        Reporter::new(self.tx.clone())
    }

    /// Append a sink; sinks are consulted in registration order
    pub async fn add_sink(&self, sink: Arc<dyn ReportSink>) {
        tracing::info!("[ReportBus] Registered sink: {}", sink.name());
        self.sinks.write().await.push(sink);
    }

    pub async fn sink_names(&self) -> Vec<String> {
        self.sinks
            .read()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Start the dispatch task (no-op while running)
    pub async fn start(&self) -> FrameworkResult<()> {
        let sinks = self.sinks.clone();
        self.worker
            .start(move |message| {
                let sinks = sinks.clone();
                async move {
                    let snapshot = sinks.read().await.clone();
                    dispatch(&snapshot, message).await;
                }
            })
            .await
    }

    /// Stop the dispatch task after its current message
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

impl Default for ReportBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Offer one message to the sinks
async fn dispatch(sinks: &[Arc<dyn ReportSink>], mut message: Message) {
    tracing::debug!(
        "[ReportBus] Dispatching {} from '{}' to '{}'",
        message.handle_type,
        message.send_from,
        message.send_to
    );

    let Some(stream) = message.stream().cloned() else {
        for sink in sinks {
            if sink.handle_message(&message).await {
                tracing::trace!("[ReportBus] Handled by {}", sink.name());
                return;
            }
        }
        tracing::trace!("[ReportBus] No sink claimed message {}", message.id);
        return;
    };

    let mut claimed_by = None;
    for sink in sinks {
        if sink.handle_stream_message(&message, stream.clone()).await {
            claimed_by = Some(sink.name().to_string());
            break;
        }
    }

    if !stream.is_ended() {
        match &claimed_by {
            Some(name) => tracing::warn!(
                "[ReportBus] Sink {} returned before draining stream {}",
                name,
                message.id
            ),
            None => tracing::debug!("[ReportBus] No sink claimed stream {}", message.id),
        }
        stream.drain(|_| {}).await;
    }
    message.settle_stream();
    tracing::debug!(
        "[ReportBus] Stream {} complete ({} bytes)",
        message.id,
        message.content.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StreamSource;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records what it sees; claims messages whose content matches `claim`
    struct Recorder {
        name: String,
        claim: Option<String>,
        drain: bool,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &str, claim: Option<&str>) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Arc::new(Self {
                    name: name.into(),
                    claim: claim.map(String::from),
                    drain: true,
                    seen: seen.clone(),
                }),
                seen,
            )
        }
    }

    #[async_trait::async_trait]
    impl ReportSink for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle_message(&self, message: &Message) -> bool {
            self.seen.lock().unwrap().push(message.content.clone());
            self.claim.as_deref() == Some(message.content.as_str())
        }

        async fn handle_stream_message(&self, _message: &Message, stream: StreamSource) -> bool {
            if self.drain {
                let content = stream.drain(|_| {}).await;
                self.seen.lock().unwrap().push(content);
            } else {
                self.seen.lock().unwrap().push("claimed".into());
            }
            true
        }
    }

    async fn wait_for(seen: &Arc<Mutex<Vec<String>>>, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while seen.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sink did not receive messages in time");
    }

    #[tokio::test]
    async fn test_first_handled_wins() {
        let bus = ReportBus::new();
        let (first, first_seen) = Recorder::new("first", Some("mine"));
        let (second, second_seen) = Recorder::new("second", None);
        bus.add_sink(first).await;
        bus.add_sink(second).await;
        bus.start().await.unwrap();

        let reporter = bus.reporter();
        reporter.report(Message::communication("alice", "user", "mine"));
        reporter.report(Message::communication("alice", "user", "shared"));

        wait_for(&second_seen, 1).await;
        assert_eq!(*first_seen.lock().unwrap(), vec!["mine", "shared"]);
        assert_eq!(*second_seen.lock().unwrap(), vec!["shared"]);
        assert_eq!(bus.sink_names().await, vec!["first", "second"]);
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_drained_before_next_message() {
        let bus = ReportBus::new();
        let (sink, seen) = Recorder::new("sink", None);
        bus.add_sink(sink).await;
        bus.start().await.unwrap();

        let reporter = bus.reporter();
        let (message, mut tx) = Message::file_upload_stream("alice", "user", "a.py");
        reporter.report(message);
        reporter.report(Message::communication("alice", "user", "after"));

        tx.send("print(");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(seen.lock().unwrap().is_empty());

        tx.send("1)");
        tx.finish();
        wait_for(&seen, 2).await;
        assert_eq!(*seen.lock().unwrap(), vec!["print(1)", "after"]);
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_bus_drains_abandoned_stream() {
        let bus = ReportBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.add_sink(Arc::new(Recorder {
            name: "lazy".into(),
            claim: None,
            drain: false,
            seen: seen.clone(),
        }))
        .await;
        bus.start().await.unwrap();

        let (message, mut tx) = Message::file_upload_stream("alice", "user", "a.py");
        let stream = message.stream().cloned().unwrap();
        bus.reporter().report(message);
        tx.send("data");
        tx.finish();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !stream.is_ended() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(stream.collected(), "data");
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnected_reporter_drops() {
        assert!(!Reporter::disconnected().report(Message::thought("a", "x")));
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let bus = ReportBus::new();
        bus.start().await.unwrap();
        bus.start().await.unwrap();
        assert!(bus.is_running());
        bus.shutdown().await;
        assert!(!bus.is_running());
    }
}
