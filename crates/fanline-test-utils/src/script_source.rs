// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted source adapter: each pull cycle plays the next pre-programmed
//! batch, failure, or stall.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fanline_core::{
    Draft, FanlineError, RawData, Source, Subscription, Update, UpdateSink,
};

/// What one pull cycle does.
#[derive(Debug, Clone)]
pub enum PullScript {
    /// Emit these `(offset, page)` pairs, skipping those at or below the
    /// subscription's current offset.
    Updates(Vec<(i64, String)>),
    /// Fail the pull with a source error.
    Fail(String),
    /// Sleep before producing nothing; simulates a slow upstream.
    Block(Duration),
}

pub struct ScriptSource {
    tag: &'static str,
    pulls: Mutex<VecDeque<PullScript>>,
    pull_count: AtomicUsize,
    pulled_items: Mutex<Vec<String>>,
}

impl ScriptSource {
    /// `tag` also drives draft recognition: inputs of the form
    /// `<tag>:<item>` belong to this source.
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            pulls: Mutex::new(VecDeque::new()),
            pull_count: AtomicUsize::new(0),
            pulled_items: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, script: PullScript) {
        self.pulls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(script);
    }

    /// Convenience: one batch of single-page updates at the given offsets.
    pub fn push_updates(&self, offsets: &[i64]) {
        self.push(PullScript::Updates(
            offsets
                .iter()
                .map(|&offset| (offset, format!("update {offset}")))
                .collect(),
        ));
    }

    /// How many pull cycles ran against this source.
    pub fn pull_count(&self) -> usize {
        self.pull_count.load(Ordering::SeqCst)
    }

    /// Item ids of every pull, in order; shows the rotation the scheduler
    /// actually ran.
    pub fn pulled_items(&self) -> Vec<String> {
        self.pulled_items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Source for ScriptSource {
    fn id(&self) -> &'static str {
        self.tag
    }

    async fn draft(&self, command: &str, _options: &str) -> Result<Draft, FanlineError> {
        let prefix = format!("{}:", self.tag);
        let Some(item) = command.strip_prefix(&prefix) else {
            return Err(FanlineError::DraftFailed);
        };
        if item.is_empty() {
            return Err(FanlineError::Source {
                message: "empty item".into(),
                source: None,
            });
        }
        Ok(Draft {
            item: item.to_string(),
            name: format!("#{item}"),
            raw_data: RawData::new(format!("{{\"item\":\"{item}\"}}").into_bytes()),
        })
    }

    async fn pull(&self, sub: &Subscription, sink: &UpdateSink) -> Result<(), FanlineError> {
        self.pull_count.fetch_add(1, Ordering::SeqCst);
        self.pulled_items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sub.id.item.clone());
        let script = self
            .pulls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match script {
            None => Ok(()),
            Some(PullScript::Block(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Some(PullScript::Fail(message)) => Err(FanlineError::Source {
                message,
                source: None,
            }),
            Some(PullScript::Updates(updates)) => {
                for (offset, page) in updates {
                    if offset <= sub.offset {
                        continue;
                    }
                    let update = Update {
                        offset,
                        raw_data: sub.raw_data.clone(),
                        text: vec![page],
                        media: vec![],
                    };
                    if !sink.submit(update).await {
                        break;
                    }
                }
                Ok(())
            }
        }
    }
}
