// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-chat driver loop: fair round-robin over the chat's active
//! subscriptions, one pull cycle at a time.
//!
//! Each cycle advances to the least-recently-updated subscription, spawns
//! its source pull as a producer task, and drains the pipe inline. Commits
//! happen strictly after sends, so a crash between the two redelivers the
//! batch (at-least-once). A failing subscription is suspended and isolated;
//! the driver and the chat's other subscriptions keep going.

use fanline_core::{update_pipe, Change, ChatId, FanlineError, Subscription};
use tracing::{debug, info, warn};

use crate::change::INTERNAL_USER;
use crate::engine::Engine;

impl Engine {
    pub(crate) async fn run_driver(self, chat_id: ChatId) {
        loop {
            let sub = match self.inner.store.advance(chat_id).await {
                Ok(Some(sub)) => sub,
                Ok(None) => {
                    // Subscriptions exhausted; stop until an explicit
                    // run_feed re-creates the driver.
                    self.remove_driver(chat_id);
                    info!(chat = %chat_id, "no active subscriptions, stopping chat driver");
                    return;
                }
                Err(e) => {
                    warn!(chat = %chat_id, error = %e, "advance failed, retrying next cycle");
                    if !self.sleep_cycle().await {
                        return;
                    }
                    continue;
                }
            };

            self.pull_cycle(chat_id, sub).await;

            if !self.sleep_cycle().await {
                return;
            }
        }
    }

    /// Wait out the poll interval; `false` means shutdown was requested.
    async fn sleep_cycle(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.inner.poll_interval) => true,
            _ = self.inner.shutdown.cancelled() => false,
        }
    }

    /// One pull cycle for one subscription: spawn the producer, deliver and
    /// commit each update in order, then resolve the cycle's outcome.
    async fn pull_cycle(&self, chat_id: ChatId, sub: Subscription) {
        let Some(source) = self.source(&sub.id.source) else {
            // A subscription for a source that is no longer registered;
            // suspend it so it leaves the rotation.
            self.suspend_quietly(&sub, format!("no such source: {}", sub.id.source))
                .await;
            return;
        };

        let (sink, mut stream) = update_pipe();
        let producer = {
            let sub = sub.clone();
            tokio::spawn(async move {
                if let Err(e) = source.pull(&sub, &sink).await {
                    sink.fail(e);
                }
            })
        };

        let mut delivered = false;
        let mut aborted = false;

        while let Some(update) = stream.next().await {
            delivered = true;
            let commit = Change::Commit {
                raw_data: update.raw_data.clone(),
                offset: update.offset,
            };
            let offset = update.offset;

            if let Err(e) = self.send_update(chat_id, update).await {
                // The send failed mid-batch: abandon the cycle and take
                // the subscription out of rotation with the send error.
                stream.cancel();
                stream.drain().await;
                self.suspend_quietly(&sub, e.to_string()).await;
                aborted = true;
                break;
            }

            match self.change(INTERNAL_USER, &sub.id, commit).await {
                Ok(()) => {}
                Err(FanlineError::NotFound) => {
                    // Deleted or suspended concurrently; not an error of
                    // the subscription itself. Stop pulling.
                    debug!(id = %sub.id, "commit lost its precondition, abandoning cycle");
                    stream.cancel();
                    stream.drain().await;
                    aborted = true;
                    break;
                }
                Err(e) => {
                    warn!(id = %sub.id, offset, error = %e, "commit failed, abandoning cycle");
                    stream.cancel();
                    stream.drain().await;
                    aborted = true;
                    break;
                }
            }
        }

        if !aborted {
            if let Some(err) = stream.take_error() {
                self.suspend_quietly(&sub, err.to_string()).await;
            } else if !delivered {
                // Nothing new: re-commit the current position so the
                // rotation moves on to the next subscription.
                let bump = Change::Commit {
                    raw_data: sub.raw_data.clone(),
                    offset: sub.offset,
                };
                if let Err(e) = self.change(INTERNAL_USER, &sub.id, bump).await {
                    debug!(id = %sub.id, error = %e, "rotation bump skipped");
                }
            }
        }

        // The producer has observed either queue closure or the cancel
        // signal by now; join it to surface panics.
        if let Err(e) = producer.await {
            warn!(id = %sub.id, error = %e, "producer task failed");
        }
    }

    /// Suspend through the change engine (admin notification included);
    /// a lost race with delete/suspend is expected and only logged.
    async fn suspend_quietly(&self, sub: &Subscription, reason: String) {
        match self
            .change(
                INTERNAL_USER,
                &sub.id,
                Change::Suspend { reason: reason.clone() },
            )
            .await
        {
            Ok(()) => {}
            Err(FanlineError::NotFound) => {
                debug!(id = %sub.id, "subscription gone before suspension");
            }
            Err(e) => {
                warn!(id = %sub.id, reason = %reason, error = %e, "failed to suspend");
            }
        }
    }
}
