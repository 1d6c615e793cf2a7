//! Dispatch task shared by the Router and the Report Bus
//!
//! A worker owns one bus queue. `start` spawns a single task that pops
//! messages in FIFO order and hands each to the bus's handler; starting an
//! already running worker is a no-op. `shutdown` cancels the task, which exits
//! after the message it is handling, and takes the queue back so the worker
//! can be started again later.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

use futures::FutureExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{FrameworkError, FrameworkResult};

struct RunningTask<T> {
    handle: JoinHandle<UnboundedReceiver<T>>,
    cancel: CancellationToken,
}

pub(crate) struct BusWorker<T> {
    label: &'static str,
    queue: Mutex<Option<UnboundedReceiver<T>>>,
    task: Mutex<Option<RunningTask<T>>>,
}

impl<T: Send + 'static> BusWorker<T> {
    pub(crate) fn new(label: &'static str, queue: UnboundedReceiver<T>) -> Self {
        Self {
            label,
            queue: Mutex::new(Some(queue)),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the dispatch task unless one is already running
    pub(crate) async fn start<F, Fut>(&self, handler: F) -> FrameworkResult<()>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            tracing::debug!("[{}] Already running", self.label);
            return Ok(());
        }
        // A finished task still holds the queue
        self.reclaim().await;

        let queue = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(FrameworkError::BusClosed(self.label))?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let label = self.label;
        let handle = tokio::spawn(async move {
            let mut queue = queue;
            tracing::info!("[{}] Dispatch task started", label);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = queue.recv() => match next {
                        Some(item) => {
                            if AssertUnwindSafe(handler(item)).catch_unwind().await.is_err() {
                                tracing::error!("[{}] Handler panicked; continuing with next message", label);
                            }
                        }
                        None => break,
                    },
                }
            }
            tracing::info!("[{}] Dispatch task stopped", label);
            queue
        });

        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(RunningTask { handle, cancel });
        Ok(())
    }

    /// Stop the dispatch task and wait for it to exit
    pub(crate) async fn shutdown(&self) {
        let running = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(running) = running {
            running.cancel.cancel();
            self.join(running).await;
        }
    }

    async fn reclaim(&self) {
        let finished = {
            let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
            match task.as_ref() {
                Some(t) if t.handle.is_finished() => task.take(),
                _ => None,
            }
        };
        if let Some(running) = finished {
            self.join(running).await;
        }
    }

    async fn join(&self, running: RunningTask<T>) {
        match running.handle.await {
            Ok(queue) => {
                *self.queue.lock().unwrap_or_else(|e| e.into_inner()) = Some(queue);
            }
            Err(e) => tracing::error!("[{}] Dispatch task failed: {}", self.label, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Message;
    use crate::runtime::channels::create_bus_channel;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_start_is_idempotent_and_restartable() {
        let (tx, rx) = create_bus_channel();
        let worker = BusWorker::new("Test", rx);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let seen_tx = Arc::new(seen_tx);

        let handler = {
            let seen_tx = seen_tx.clone();
            move |m: Message| {
                let seen_tx = seen_tx.clone();
                async move {
                    let _ = seen_tx.send(m.content);
                }
            }
        };
        worker.start(handler.clone()).await.unwrap();
        worker.start(handler.clone()).await.unwrap();
        assert!(worker.is_running());

        tx.send(Message::communication("a", "b", "first")).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("first"));

        worker.shutdown().await;
        assert!(!worker.is_running());

        // Queued while stopped, delivered after restart
        tx.send(Message::communication("a", "b", "second")).unwrap();
        worker.start(handler).await.unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("second"));
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_panic_keeps_bus_alive() {
        let (tx, rx) = create_bus_channel();
        let worker = BusWorker::new("Test", rx);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        worker
            .start(move |m: Message| {
                let seen_tx = seen_tx.clone();
                async move {
                    if m.content == "boom" {
                        panic!("handler failure");
                    }
                    let _ = seen_tx.send(m.content);
                }
            })
            .await
            .unwrap();

        tx.send(Message::communication("a", "b", "boom")).unwrap();
        tx.send(Message::communication("a", "b", "after")).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("after"));
        worker.shutdown().await;
    }
}
