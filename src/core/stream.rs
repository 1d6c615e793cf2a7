//! Sub-stream channels carried by streaming messages
//!
//! A stream is an unbounded, ordered channel of text increments terminated by
//! exactly one end marker. In-process the marker is [`StreamItem::End`], so it
//! can never collide with content; at the wire boundary it is rendered as
//! [`STREAM_END_FLAG`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};

/// Literal end-of-stream marker used at the wire/SSE boundary
pub const STREAM_END_FLAG: &str = "[STREAM_END_FLAG]";

/// One item on a sub-stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// A content increment
    Delta(String),
    /// End of stream
    End,
}

impl StreamItem {
    /// Render the item the way it travels over the wire
    pub fn as_wire(&self) -> &str {
        match self {
            StreamItem::Delta(text) => text,
            StreamItem::End => STREAM_END_FLAG,
        }
    }

    /// Check if this is the end marker
    pub fn is_end(&self) -> bool {
        matches!(self, StreamItem::End)
    }
}

/// Create a connected sender/source pair
pub fn stream_channel() -> (StreamSender, StreamSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        StreamSender {
            tx,
            finished: false,
        },
        StreamSource {
            rx: Arc::new(Mutex::new(rx)),
            ended: Arc::new(AtomicBool::new(false)),
            collected: Arc::new(StdMutex::new(String::new())),
        },
    )
}

/// Producer half of a sub-stream
///
/// The end marker is pushed exactly once: by [`finish`](Self::finish), or on
/// drop if the producer never finished, so no consumer is left hanging.
#[derive(Debug)]
pub struct StreamSender {
    tx: mpsc::UnboundedSender<StreamItem>,
    finished: bool,
}

impl StreamSender {
    /// Push a content increment. Empty increments are skipped.
    ///
    /// Returns false if the stream is already finished or nobody is listening.
    pub fn send(&self, delta: impl Into<String>) -> bool {
        if self.finished {
            return false;
        }
        let delta = delta.into();
        if delta.is_empty() {
            return true;
        }
        self.tx.send(StreamItem::Delta(delta)).is_ok()
    }

    /// Push the end marker (idempotent)
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let _ = self.tx.send(StreamItem::End);
    }

    /// Check if the end marker has been pushed
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for StreamSender {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Consumer half of a sub-stream
///
/// Cheap to clone; clones share the same underlying queue, so each increment
/// is observed by exactly one reader. Everything read so far is collected and
/// available through [`collected`](Self::collected) on every clone.
#[derive(Clone)]
pub struct StreamSource {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<StreamItem>>>,
    ended: Arc<AtomicBool>,
    collected: Arc<StdMutex<String>>,
}

impl StreamSource {
    /// Wait for the next item
    ///
    /// Once the end marker has been seen every further call returns
    /// [`StreamItem::End`] immediately.
    pub async fn next(&self) -> StreamItem {
        if self.is_ended() {
            return StreamItem::End;
        }
        let mut rx = self.rx.lock().await;
        let item = rx.recv().await.unwrap_or(StreamItem::End);
        match &item {
            StreamItem::Delta(text) => self
                .collected
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push_str(text),
            StreamItem::End => self.ended.store(true, Ordering::SeqCst),
        }
        item
    }

    /// Read to the end marker, calling `on_delta` for every increment
    ///
    /// Returns the concatenated content.
    pub async fn drain<F>(&self, mut on_delta: F) -> String
    where
        F: FnMut(&str),
    {
        let mut content = String::new();
        loop {
            match self.next().await {
                StreamItem::Delta(text) => {
                    on_delta(&text);
                    content.push_str(&text);
                }
                StreamItem::End => break,
            }
        }
        content
    }

    /// Check if the end marker has been observed
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Content read so far by any clone; complete once [`is_ended`](Self::is_ended)
    pub fn collected(&self) -> String {
        self.collected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("ended", &self.is_ended())
            .finish()
    }
}
