// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media handles passed between sources, the media pipeline, and the sender.
//!
//! A source submits a URL to the media manager and receives a [`MediaFuture`]
//! immediately; the manager fulfils the paired [`MediaPromise`] from a worker
//! task once the payload is downloaded and validated. The sender awaits the
//! future at delivery time: a terminal error drops that media item but never
//! fails the whole update.

use tokio::sync::oneshot;

use crate::error::FanlineError;

/// Platform media kind, decided by the converter chain from the payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

/// The sendable payload of a resolved media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    /// Let the platform fetch the URL itself.
    Url(String),
    /// Upload downloaded bytes under the given file name.
    Bytes { data: Vec<u8>, filename: String },
}

/// A media item ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub payload: MediaPayload,
}

/// Resolving handle for one submitted media item.
#[derive(Debug)]
pub struct MediaFuture {
    url: String,
    rx: oneshot::Receiver<Result<MediaRef, FanlineError>>,
}

/// Fulfilment side of a [`MediaFuture`], held by the media pipeline.
#[derive(Debug)]
pub struct MediaPromise {
    tx: oneshot::Sender<Result<MediaRef, FanlineError>>,
}

impl MediaFuture {
    /// Create an unresolved future and its promise.
    pub fn pending(url: impl Into<String>) -> (Self, MediaPromise) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                url: url.into(),
                rx,
            },
            MediaPromise { tx },
        )
    }

    /// Create an already-resolved future. Useful in tests and for media the
    /// platform can fetch without preprocessing.
    pub fn ready(url: impl Into<String>, media: MediaRef) -> Self {
        let (future, promise) = Self::pending(url);
        promise.fulfill(Ok(media));
        future
    }

    /// Create an already-failed future.
    pub fn failed(url: impl Into<String>, err: FanlineError) -> Self {
        let (future, promise) = Self::pending(url);
        promise.fulfill(Err(err));
        future
    }

    /// The URL this media was submitted under, for log context.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Await resolution. A dropped promise (pipeline shut down before the
    /// job ran) resolves to a media error.
    pub async fn resolve(self) -> Result<MediaRef, FanlineError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(FanlineError::Media(format!(
                "media pipeline dropped request for {}",
                self.url
            ))),
        }
    }
}

impl MediaPromise {
    /// Resolve the paired future. A future that was already dropped is fine;
    /// the result is discarded.
    pub fn fulfill(self, result: Result<MediaRef, FanlineError>) {
        let _ = self.tx.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> MediaRef {
        MediaRef {
            kind: MediaKind::Photo,
            payload: MediaPayload::Url("https://example.com/a.jpg".into()),
        }
    }

    #[tokio::test]
    async fn pending_resolves_when_fulfilled() {
        let (future, promise) = MediaFuture::pending("https://example.com/a.jpg");
        promise.fulfill(Ok(photo()));
        let media = future.resolve().await.unwrap();
        assert_eq!(media.kind, MediaKind::Photo);
    }

    #[tokio::test]
    async fn ready_future_is_immediately_resolved() {
        let future = MediaFuture::ready("u", photo());
        assert!(future.resolve().await.is_ok());
    }

    #[tokio::test]
    async fn failed_future_carries_error() {
        let future = MediaFuture::failed("u", FanlineError::Media("boom".into()));
        let err = future.resolve().await.unwrap_err();
        assert!(matches!(err, FanlineError::Media(_)));
    }

    #[tokio::test]
    async fn dropped_promise_resolves_to_error() {
        let (future, promise) = MediaFuture::pending("https://example.com/b.mp4");
        drop(promise);
        let err = future.resolve().await.unwrap_err();
        assert!(err.to_string().contains("b.mp4"));
    }
}
