// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable upstream source adapters.

use async_trait::async_trait;

use crate::error::FanlineError;
use crate::pipe::UpdateSink;
use crate::types::{Draft, Subscription};

/// One upstream source kind (an imageboard, a link-listing forum, ...).
///
/// Sources never persist state themselves: all progress lives in the
/// subscription's `raw_data` and `offset`.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable tag stored in [`SubscriptionId::source`](crate::types::SubscriptionId).
    fn id(&self) -> &'static str;

    /// Try to recognize an operator input as an item of this source.
    ///
    /// Returns [`FanlineError::DraftFailed`] when the input does not belong
    /// here, which makes the router try the next registered source. Any
    /// other error aborts the draft and surfaces to the user.
    async fn draft(&self, command: &str, options: &str) -> Result<Draft, FanlineError>;

    /// Produce updates with offsets strictly greater than `sub.offset`, in
    /// increasing offset order, into the sink.
    ///
    /// Must stop at the first `submit` returning `false` (consumer
    /// cancelled). A returned error is recorded as the pipe's terminal
    /// error and suspends the subscription.
    async fn pull(&self, sub: &Subscription, sink: &UpdateSink) -> Result<(), FanlineError>;
}
