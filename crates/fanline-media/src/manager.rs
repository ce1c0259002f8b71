// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media manager: a fixed worker pool resolving submitted URLs into
//! sendable media references.
//!
//! `submit` returns a future immediately and never blocks the caller; the
//! workers download, convert, and size-check the payload, then fulfil the
//! future. Shutdown closes the job queue and joins all workers.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use fanline_config::model::MediaConfig;
use fanline_core::{FanlineError, MediaFuture, MediaKind, MediaPayload, MediaPromise, MediaRef};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::convert::{ConvertError, Converter, SupportedFormats};

/// Payloads below this are almost certainly error pages, not media.
const MIN_MEDIA_SIZE: usize = 1024;

const MIB: usize = 1 << 20;

fn max_media_size(kind: MediaKind) -> usize {
    match kind {
        MediaKind::Photo => 10 * MIB,
        MediaKind::Video | MediaKind::Document => 50 * MIB,
    }
}

/// How a submitted URL should be handled.
#[derive(Debug, Clone)]
pub enum MediaRequest {
    /// Plain download; `format` is the expected file extension.
    Http { format: String },
    /// The source recognized the URL but could not build a usable request;
    /// the future resolves to this error once a worker picks it up.
    Failed { reason: String },
}

struct Job {
    url: String,
    request: MediaRequest,
    promise: MediaPromise,
}

struct Inner {
    client: reqwest::Client,
    converters: Vec<Box<dyn Converter>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>,
}

pub struct MediaManager {
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl MediaManager {
    /// Spawn the worker pool. Must be called within a tokio runtime.
    pub fn new(config: &MediaConfig, client: reqwest::Client) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            client,
            converters: vec![Box::new(SupportedFormats)],
            rx: tokio::sync::Mutex::new(rx),
        });

        let concurrency = config.concurrency.max(1);
        let workers = (0..concurrency)
            .map(|_| {
                let inner = Arc::clone(&inner);
                tokio::spawn(run_worker(inner))
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue one media job and return its resolving handle.
    pub fn submit(&self, url: &str, request: MediaRequest) -> MediaFuture {
        let (future, promise) = MediaFuture::pending(url);
        let job = Job {
            url: url.to_string(),
            request,
            promise,
        };

        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match tx {
            Some(tx) => {
                if let Err(rejected) = tx.send(job) {
                    rejected
                        .0
                        .promise
                        .fulfill(Err(FanlineError::Media("media manager stopped".into())));
                }
            }
            None => {
                job.promise
                    .fulfill(Err(FanlineError::Media("media manager stopped".into())));
            }
        }
        future
    }

    /// Close the job queue and wait for the workers to drain it.
    pub async fn shutdown(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()),
        );
        for worker in workers {
            let _ = worker.await;
        }
    }
}

async fn run_worker(inner: Arc<Inner>) {
    loop {
        // Hold the receiver lock only while waiting for the next job so
        // sibling workers can pick up work while this one processes.
        let job = { inner.rx.lock().await.recv().await };
        let Some(job) = job else { break };

        let started = Instant::now();
        let result = process(&inner, &job.url, job.request).await;
        match &result {
            Ok(media) => debug!(
                url = %job.url,
                kind = ?media.kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "media processed"
            ),
            Err(e) => warn!(url = %job.url, error = %e, "failed to process media"),
        }
        job.promise.fulfill(result);
    }
}

async fn process(
    inner: &Inner,
    url: &str,
    request: MediaRequest,
) -> Result<MediaRef, FanlineError> {
    let format = match request {
        MediaRequest::Failed { reason } => return Err(FanlineError::Media(reason)),
        MediaRequest::Http { format } => format.to_ascii_lowercase(),
    };

    let response = inner
        .client
        .get(url)
        .send()
        .await
        .map_err(|e| FanlineError::Media(format!("download {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(FanlineError::Media(format!(
            "download {url}: http {}",
            response.status()
        )));
    }
    let data = response
        .bytes()
        .await
        .map_err(|e| FanlineError::Media(format!("download {url}: {e}")))?
        .to_vec();

    let (kind, data) = convert(&inner.converters, &format, data)?;
    check_size(kind, data.len())?;

    Ok(MediaRef {
        kind,
        payload: MediaPayload::Bytes {
            data,
            filename: filename_for(url, &format),
        },
    })
}

fn convert(
    converters: &[Box<dyn Converter>],
    format: &str,
    data: Vec<u8>,
) -> Result<(MediaKind, Vec<u8>), FanlineError> {
    for conv in converters {
        if let Some(kind) = conv.accepts(format) {
            let data = conv
                .convert(format, data)
                .map_err(|ConvertError(reason)| {
                    FanlineError::Media(format!("conversion failed: {reason}"))
                })?;
            return Ok((kind, data));
        }
    }
    Err(FanlineError::Media(format!("unsupported format: {format}")))
}

fn check_size(kind: MediaKind, size: usize) -> Result<(), FanlineError> {
    if size < MIN_MEDIA_SIZE {
        return Err(FanlineError::Media(format!(
            "size {size} bytes is below the {MIN_MEDIA_SIZE} byte minimum"
        )));
    }
    let max = max_media_size(kind);
    if size > max {
        return Err(FanlineError::Media(format!(
            "size {} MiB exceeds the {} MiB limit for {kind:?}",
            size / MIB,
            max / MIB
        )));
    }
    Ok(())
}

fn filename_for(url: &str, format: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && name.len() <= 64)
        .map(str::to_string)
        .unwrap_or_else(|| format!("media.{format}"))
}
