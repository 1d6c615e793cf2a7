//! Long-poll message cache
//!
//! Records every outbound message so an HTTP front end can poll for new ones
//! by cursor, and keeps the increments of streaming messages so a client can
//! replay a stream from the start and then follow it live.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::Notify;

use crate::core::{Message, StreamItem, StreamSource, WireMessage};

use super::ReportSink;

/// Default number of messages retained
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Replay stream of a cached streaming message
pub type ReplayStream = Pin<Box<dyn Stream<Item = StreamItem> + Send>>;

/// Messages since a cursor plus the cursor to poll with next
#[derive(Debug, Clone, Serialize)]
pub struct CachedBatch {
    pub messages: Vec<WireMessage>,
    pub next_position: usize,
}

#[derive(Default)]
struct StreamRecord {
    state: Mutex<RecordState>,
    changed: Notify,
}

#[derive(Default)]
struct RecordState {
    deltas: Vec<String>,
    ended: bool,
}

impl StreamRecord {
    fn push(&self, item: StreamItem) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match item {
                StreamItem::Delta(text) => state.deltas.push(text),
                StreamItem::End => state.ended = true,
            }
        }
        self.changed.notify_waiters();
    }

    /// Item at `index`, `None` if it has not arrived yet
    fn get(&self, index: usize) -> Option<StreamItem> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.deltas.get(index) {
            Some(text) => Some(StreamItem::Delta(text.clone())),
            None if state.ended => Some(StreamItem::End),
            None => None,
        }
    }
}

struct CacheState {
    /// Absolute position of `entries[0]`
    base: usize,
    entries: VecDeque<WireMessage>,
    streams: HashMap<String, Arc<StreamRecord>>,
}

/// Report sink backing `GET /get_message` and `GET /get_stream_message`
///
/// Plain messages are recorded and passed on to later sinks; streaming
/// messages are claimed and drained here.
pub struct MessageCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                base: 0,
                entries: VecDeque::new(),
                streams: HashMap::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, wire: WireMessage, stream: Option<Arc<StreamRecord>>) {
        let mut state = self.lock();
        if let Some(stream) = stream {
            state.streams.insert(wire.id.clone(), stream);
        }
        state.entries.push_back(wire);
        while state.entries.len() > self.capacity {
            if let Some(evicted) = state.entries.pop_front() {
                state.streams.remove(&evicted.id);
                state.base += 1;
            }
        }
    }

    fn update_content(&self, id: &str, content: String) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == id) {
            entry.content = content;
        }
    }

    /// Messages recorded at or after `position`
    pub fn get_messages(&self, position: usize) -> CachedBatch {
        let state = self.lock();
        let start = position.max(state.base) - state.base;
        let messages: Vec<WireMessage> = state.entries.iter().skip(start).cloned().collect();
        CachedBatch {
            messages,
            next_position: state.base + state.entries.len(),
        }
    }

    /// Number of messages recorded so far (including evicted ones)
    pub fn position(&self) -> usize {
        let state = self.lock();
        state.base + state.entries.len()
    }

    /// Replay a cached streaming message from its first increment
    ///
    /// The stream follows the message live and ends with
    /// [`StreamItem::End`]. Returns `None` for unknown or evicted ids.
    pub fn stream(&self, message_id: &str) -> Option<ReplayStream> {
        let record = self.lock().streams.get(message_id).cloned()?;
        let stream = async_stream::stream! {
            let mut index = 0;
            loop {
                let changed = record.changed.notified();
                tokio::pin!(changed);
                changed.as_mut().enable();

                match record.get(index) {
                    Some(StreamItem::End) => {
                        yield StreamItem::End;
                        break;
                    }
                    Some(item) => {
                        index += 1;
                        yield item;
                    }
                    None => changed.await,
                }
            }
        };
        Some(Box::pin(stream))
    }
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReportSink for MessageCache {
    fn name(&self) -> &str {
        "message_cache"
    }

    async fn handle_message(&self, message: &Message) -> bool {
        self.record(message.to_wire(), None);
        false
    }

    async fn handle_stream_message(&self, message: &Message, stream: StreamSource) -> bool {
        let record = Arc::new(StreamRecord::default());
        self.record(message.to_wire(), Some(record.clone()));
        loop {
            let item = stream.next().await;
            let end = item.is_end();
            record.push(item);
            if end {
                break;
            }
        }
        self.update_content(&message.id, stream.collected());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_messages_by_cursor() {
        let cache = MessageCache::new();
        assert!(!cache.handle_message(&Message::thought("alice", "one")).await);
        cache.handle_message(&Message::thought("alice", "two")).await;

        let batch = cache.get_messages(0);
        assert_eq!(batch.messages.len(), 2);
        assert_eq!(batch.next_position, 2);

        cache.handle_message(&Message::thought("alice", "three")).await;
        let batch = cache.get_messages(batch.next_position);
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.messages[0].content, "three");
        assert_eq!(batch.next_position, 3);

        assert!(cache.get_messages(10).messages.is_empty());
    }

    #[tokio::test]
    async fn test_eviction_keeps_positions() {
        let cache = MessageCache::with_capacity(2);
        for i in 0..5 {
            cache.handle_message(&Message::thought("a", i.to_string())).await;
        }
        let batch = cache.get_messages(0);
        let contents: Vec<&str> = batch.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["3", "4"]);
        assert_eq!(batch.next_position, 5);
        assert_eq!(cache.position(), 5);
    }

    #[tokio::test]
    async fn test_stream_replay_and_follow() {
        let cache = Arc::new(MessageCache::new());
        let (message, mut tx) = Message::file_upload_stream("alice", "user", "a.py");
        let stream = message.stream().cloned().unwrap();
        let id = message.id.clone();

        let sink = cache.clone();
        let task = tokio::spawn(async move { sink.handle_stream_message(&message, stream).await });

        tx.send("print(");
        // Wait until the cache has registered the stream
        let replay = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(replay) = cache.stream(&id) {
                    return replay;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send("1)");
        tx.finish();

        let items: Vec<StreamItem> = tokio::time::timeout(Duration::from_secs(2), replay.collect())
            .await
            .unwrap();
        assert_eq!(
            items,
            vec![
                StreamItem::Delta("print(".into()),
                StreamItem::Delta("1)".into()),
                StreamItem::End
            ]
        );
        assert!(task.await.unwrap());

        let batch = cache.get_messages(0);
        assert_eq!(batch.messages[0].content, "print(1)");
        assert!(batch.messages[0].is_stream);
        assert_eq!(batch.messages[0].file_name.as_deref(), Some("a.py"));
    }

    #[tokio::test]
    async fn test_unknown_stream() {
        let cache = MessageCache::new();
        assert!(cache.stream("missing").is_none());
    }
}
