// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Fanline subscription aggregator.

use thiserror::Error;

/// The primary error type used across all Fanline traits and core operations.
#[derive(Debug, Error)]
pub enum FanlineError {
    /// Configuration errors (invalid TOML, missing required fields, unknown driver).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream source errors (network failure, item gone, malformed payload).
    #[error("source error: {message}")]
    Source {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Sentinel returned by [`Source::draft`](crate::traits::Source::draft)
    /// when the operator input does not belong to that source. The next
    /// registered source is tried; any other error aborts the draft.
    #[error("input not recognized by this source")]
    DraftFailed,

    /// Messaging platform transport errors (send failure, chat lookup failure).
    #[error("chat error: {message}")]
    Chat {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Media pipeline errors (download failure, unsupported format, size limits).
    #[error("media error: {0}")]
    Media(String),

    /// A storage compare-and-set precondition failed: the subscription is
    /// gone or its state did not match the requested transition.
    #[error("not found")]
    NotFound,

    /// The issuing user is neither the target chat nor one of its admins.
    #[error("forbidden")]
    Forbidden,

    /// Malformed operator input; the message is shown to the user as-is.
    #[error("{0}")]
    Invalid(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FanlineError {
    /// Build a source error from a message and an underlying cause.
    pub fn source_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Source {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Build a chat transport error from a message and an underlying cause.
    pub fn chat_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Chat {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for the [`FanlineError::DraftFailed`] sentinel.
    pub fn is_draft_failed(&self) -> bool {
        matches!(self, Self::DraftFailed)
    }
}
