// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! 2ch imageboard thread source.
//!
//! An item is one thread on one board; the offset is the number of the last
//! delivered post. `m` in the options subscribes to attachments only.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use fanline_config::model::DvachConfig;
use fanline_core::{
    Draft, FanlineError, RawData, Source, Subscription, Update, UpdateSink,
};
use fanline_media::{MediaManager, MediaRequest};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::text::{sanitize_html, strip_tags, unescape_entities, Pager, MAX_PAGE_LEN};

pub const SOURCE_TAG: &str = "2ch/thread";

const MAX_TITLE_LEN: usize = 25;

/// Item parameters encoded into the subscription's raw data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadItem {
    pub board: String,
    pub num: i64,
    pub title: String,
    #[serde(default)]
    pub media_only: bool,
}

/// The board API serves post numbers as integers or strings depending on
/// the endpoint generation.
fn de_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "de_num")]
    pub num: i64,
    #[serde(default, deserialize_with = "de_num")]
    pub parent: i64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub files: Vec<PostFile>,
}

impl Post {
    /// The opening post carries no parent.
    pub fn is_original(&self) -> bool {
        self.parent == 0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostFile {
    pub path: String,
    #[serde(default)]
    pub name: String,
}

impl PostFile {
    pub fn format(&self) -> String {
        self.path
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }
}

/// Thin JSON client for the board's mobile API.
pub struct DvachClient {
    http: reqwest::Client,
    base_url: String,
    usercode: Option<String>,
}

impl DvachClient {
    pub fn new(config: &DvachConfig) -> Result<Self, FanlineError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| FanlineError::Internal(format!("build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            usercode: config.usercode.clone(),
        })
    }

    pub fn file_url(&self, file: &PostFile) -> String {
        format!("{}{}", self.base_url, file.path)
    }

    async fn get_posts(&self, query: &str) -> Result<Vec<Post>, FanlineError> {
        let url = format!("{}/makaba/mobile.fcgi?{query}", self.base_url);
        let mut request = self.http.get(&url);
        if let Some(code) = &self.usercode {
            request = request.header("Cookie", format!("usercode_auth={code}"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| FanlineError::source_with(format!("request {url}"), e))?;
        if !response.status().is_success() {
            return Err(FanlineError::Source {
                message: format!("request {url}: http {}", response.status()),
                source: None,
            });
        }
        response
            .json()
            .await
            .map_err(|e| FanlineError::source_with(format!("decode {url}"), e))
    }

    /// Fetch a single post.
    pub async fn get_post(&self, board: &str, num: i64) -> Result<Post, FanlineError> {
        let posts = self
            .get_posts(&format!("task=get_post&board={board}&post={num}"))
            .await?;
        posts.into_iter().next().ok_or_else(|| FanlineError::Source {
            message: format!("no such post: {board}/{num}"),
            source: None,
        })
    }

    /// Fetch thread posts starting from post number `from` (0 for all).
    pub async fn get_thread(
        &self,
        board: &str,
        thread: i64,
        from: i64,
    ) -> Result<Vec<Post>, FanlineError> {
        self.get_posts(&format!(
            "task=get_thread&board={board}&thread={thread}&num={from}"
        ))
        .await
    }
}

fn thread_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:https?://)?(?:2ch\.hk)?/([a-z0-9]+)/res/([0-9]+)\.html?$").unwrap()
    })
}

/// Recognize an operator input as a thread reference.
pub fn parse_thread_ref(command: &str) -> Option<(String, i64)> {
    let caps = thread_ref_regex().captures(command)?;
    let board = caps[1].to_string();
    let num = caps[2].parse().ok()?;
    Some((board, num))
}

/// Derive a `#CamelCase` hashtag from a post subject.
pub fn hashtag_title(subject: &str) -> String {
    let plain = strip_tags(&unescape_entities(subject));
    let mut title = String::new();
    for word in plain.split_whitespace() {
        let mut chars = word.chars().filter(|c| c.is_alphanumeric());
        if let Some(first) = chars.next() {
            title.extend(first.to_uppercase());
            title.extend(chars);
        }
    }
    let capped: String = title.chars().take(MAX_TITLE_LEN).collect();
    format!("#{capped}")
}

pub struct ThreadSource {
    client: Arc<DvachClient>,
    media: Arc<MediaManager>,
}

impl ThreadSource {
    pub fn new(client: Arc<DvachClient>, media: Arc<MediaManager>) -> Self {
        Self { client, media }
    }

    fn render_post(&self, item: &ThreadItem, post: &Post) -> Vec<String> {
        let mut pager = Pager::new(MAX_PAGE_LEN);
        pager.line(&item.title);
        let mut tag = format!("#{}{}", post_board_tag(&item.board), post.num);
        if post.is_original() {
            tag.push_str(" #OP");
        }
        pager.line(&tag);
        if !item.media_only && !post.comment.is_empty() {
            pager.line("---");
            pager.text(&sanitize_html(&post.comment));
        }
        pager.into_pages()
    }
}

fn post_board_tag(board: &str) -> String {
    board.to_uppercase()
}

#[async_trait]
impl Source for ThreadSource {
    fn id(&self) -> &'static str {
        SOURCE_TAG
    }

    async fn draft(&self, command: &str, options: &str) -> Result<Draft, FanlineError> {
        let (board, num) = parse_thread_ref(command).ok_or(FanlineError::DraftFailed)?;
        let post = self.client.get_post(&board, num).await?;
        let mut title = hashtag_title(&post.subject);
        if title == "#" {
            title = format!("#{}{num}", post_board_tag(&board));
        }
        let item = ThreadItem {
            board: board.clone(),
            num,
            title: title.clone(),
            media_only: options.starts_with('m'),
        };
        Ok(Draft {
            item: format!("{board}/{num}"),
            name: title,
            raw_data: RawData::encode(&item)?,
        })
    }

    async fn pull(&self, sub: &Subscription, sink: &UpdateSink) -> Result<(), FanlineError> {
        let item: ThreadItem = sub.raw_data.decode()?;
        let from = if sub.offset > 0 { sub.offset + 1 } else { 0 };
        let posts = self.client.get_thread(&item.board, item.num, from).await?;
        tracing::debug!(
            board = %item.board,
            thread = item.num,
            from,
            count = posts.len(),
            "fetched thread posts"
        );

        for post in posts {
            if post.num <= sub.offset {
                continue;
            }
            if item.media_only && post.files.is_empty() {
                continue;
            }
            let media = post
                .files
                .iter()
                .map(|file| {
                    self.media.submit(
                        &self.client.file_url(file),
                        MediaRequest::Http {
                            format: file.format(),
                        },
                    )
                })
                .collect();
            let update = Update {
                offset: post.num,
                raw_data: sub.raw_data.clone(),
                text: self.render_post(&item, &post),
                media,
            };
            if !sink.submit(update).await {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_and_short_thread_refs() {
        assert_eq!(
            parse_thread_ref("https://2ch.hk/b/res/123456.html"),
            Some(("b".into(), 123456))
        );
        assert_eq!(
            parse_thread_ref("/pr/res/42.htm"),
            Some(("pr".into(), 42))
        );
    }

    #[test]
    fn rejects_non_thread_inputs() {
        assert!(parse_thread_ref("https://example.com/b/res/1.html").is_none());
        assert!(parse_thread_ref("/r/rust").is_none());
        assert!(parse_thread_ref("2ch.hk/b/").is_none());
    }

    #[test]
    fn hashtag_title_compacts_and_caps() {
        assert_eq!(hashtag_title("hello brave world"), "#HelloBraveWorld");
        assert_eq!(hashtag_title("<b>tags &amp; junk!</b>"), "#TagsJunk");
        let long = hashtag_title(&"word ".repeat(20));
        assert_eq!(long.chars().count(), MAX_TITLE_LEN + 1);
    }

    #[test]
    fn post_numbers_decode_from_int_or_string() {
        let a: Post = serde_json::from_str(r#"{"num": 10, "parent": 0}"#).unwrap();
        assert_eq!(a.num, 10);
        assert!(a.is_original());
        let b: Post =
            serde_json::from_str(r#"{"num": "11", "parent": "10", "comment": "hi"}"#).unwrap();
        assert_eq!(b.num, 11);
        assert!(!b.is_original());
    }

    #[test]
    fn file_format_is_extension() {
        let file = PostFile {
            path: "/b/src/123/foo.JPG".into(),
            name: "foo.jpg".into(),
        };
        assert_eq!(file.format(), "jpg");
    }
}
