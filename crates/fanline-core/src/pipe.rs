// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-producer, single-consumer handoff between a source pull and the
//! sender.
//!
//! The queue is a small bounded channel so a slow sender back-pressures the
//! producer. Cancellation flows the other way through a dedicated token:
//! after the consumer cancels it must keep draining the queue to closure so
//! the producer observes the signal at its next submit.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::FanlineError;
use crate::types::Update;

/// Queue capacity between producer and consumer.
pub const PIPE_CAPACITY: usize = 10;

/// Create a connected sink/stream pair.
pub fn update_pipe() -> (UpdateSink, UpdateStream) {
    let (tx, rx) = mpsc::channel(PIPE_CAPACITY);
    let cancel = CancellationToken::new();
    let err = Arc::new(Mutex::new(None));
    (
        UpdateSink {
            tx,
            cancel: cancel.clone(),
            err: Arc::clone(&err),
        },
        UpdateStream { rx, cancel, err },
    )
}

/// Producer half, held by the source pull task. Dropping the sink closes
/// the queue.
#[derive(Debug)]
pub struct UpdateSink {
    tx: mpsc::Sender<Update>,
    cancel: CancellationToken,
    err: Arc<Mutex<Option<FanlineError>>>,
}

impl UpdateSink {
    /// Enqueue one update, waiting for queue space. Returns `false` once
    /// the consumer has cancelled or gone away; the producer must stop
    /// producing and return.
    pub async fn submit(&self, update: Update) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(update) => sent.is_ok(),
        }
    }

    /// True once the consumer signalled cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record the producer's terminal error. Must be called before the sink
    /// is dropped; the consumer observes it after draining to closure.
    pub fn fail(&self, err: FanlineError) {
        let mut slot = self.err.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(err);
    }
}

/// Consumer half, held by the chat driver.
#[derive(Debug)]
pub struct UpdateStream {
    rx: mpsc::Receiver<Update>,
    cancel: CancellationToken,
    err: Arc<Mutex<Option<FanlineError>>>,
}

impl UpdateStream {
    /// Receive the next update; `None` once the producer closed the queue.
    pub async fn next(&mut self) -> Option<Update> {
        self.rx.recv().await
    }

    /// Signal the producer to stop. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Discard queued updates until the producer closes the queue.
    pub async fn drain(&mut self) {
        while self.rx.recv().await.is_some() {}
    }

    /// Take the producer's terminal error, if any. Meaningful only after
    /// the queue has closed.
    pub fn take_error(&self) -> Option<FanlineError> {
        self.err.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawData;

    fn update(offset: i64) -> Update {
        Update {
            offset,
            raw_data: RawData::default(),
            text: vec![format!("page {offset}")],
            media: vec![],
        }
    }

    #[tokio::test]
    async fn delivers_in_production_order() {
        let (sink, mut stream) = update_pipe();
        tokio::spawn(async move {
            for offset in 1..=3 {
                assert!(sink.submit(update(offset)).await);
            }
        });
        assert_eq!(stream.next().await.unwrap().offset, 1);
        assert_eq!(stream.next().await.unwrap().offset, 2);
        assert_eq!(stream.next().await.unwrap().offset, 3);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn submit_returns_false_after_cancel() {
        let (sink, stream) = update_pipe();
        stream.cancel();
        assert!(!sink.submit(update(1)).await);
    }

    #[tokio::test]
    async fn cancelled_producer_terminates_while_queue_is_full() {
        let (sink, mut stream) = update_pipe();
        let producer = tokio::spawn(async move {
            let mut produced = 0u32;
            loop {
                if !sink.submit(update(i64::from(produced))).await {
                    return produced;
                }
                produced += 1;
            }
        });
        // Let the producer fill the queue, then cancel without consuming.
        tokio::task::yield_now().await;
        stream.cancel();
        stream.drain().await;
        let produced = producer.await.unwrap();
        assert!(produced <= PIPE_CAPACITY as u32 + 1);
    }

    #[tokio::test]
    async fn producer_error_is_visible_after_close() {
        let (sink, mut stream) = update_pipe();
        tokio::spawn(async move {
            assert!(sink.submit(update(7)).await);
            sink.fail(FanlineError::Source {
                message: "thread gone".into(),
                source: None,
            });
        });
        assert_eq!(stream.next().await.unwrap().offset, 7);
        assert!(stream.next().await.is_none());
        let err = stream.take_error().unwrap();
        assert!(err.to_string().contains("thread gone"));
    }

    #[tokio::test]
    async fn submit_returns_false_when_consumer_dropped() {
        let (sink, stream) = update_pipe();
        drop(stream);
        assert!(!sink.submit(update(1)).await);
    }
}
