// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reddit subreddit listing source.
//!
//! An item is one subreddit with a sort mode; the offset is the creation
//! time (unix seconds) of the last delivered thing. A numeric options
//! string sets the minimum-ups filter.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use fanline_config::model::RedditConfig;
use fanline_core::{
    Draft, FanlineError, RawData, Source, Subscription, Update, UpdateSink,
};
use fanline_media::{MediaManager, MediaRequest};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::{escape_html, Pager, MAX_PAGE_LEN};

pub const SOURCE_TAG: &str = "reddit";

const LISTING_LIMIT: u32 = 100;

/// Item parameters encoded into the subscription's raw data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    pub subreddit: String,
    pub sort: String,
    #[serde(default)]
    pub min_ups: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditVideo {
    #[serde(default)]
    pub fallback_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaContainer {
    #[serde(default)]
    pub reddit_video: Option<RedditVideo>,
}

/// Media containers of a crosspost's parent post; checked when the post
/// itself carries no playable video.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrosspostParent {
    #[serde(default)]
    pub media: Option<MediaContainer>,
    #[serde(default)]
    pub secure_media: Option<MediaContainer>,
}

/// One listing entry, flattened from the API's `data` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thing {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub ups: i64,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub media: Option<MediaContainer>,
    #[serde(default)]
    pub secure_media: Option<MediaContainer>,
    #[serde(default)]
    pub crosspost_parent_list: Vec<CrosspostParent>,
}

fn video_url_in(container: &Option<MediaContainer>) -> Option<String> {
    container
        .as_ref()?
        .reddit_video
        .as_ref()
        .filter(|video| !video.fallback_url.is_empty())
        .map(|video| video.fallback_url.clone())
}

impl Thing {
    pub fn created(&self) -> i64 {
        self.created_utc as i64
    }

    /// The playable video URL: the post's own containers first, then each
    /// crosspost parent's.
    fn fallback_video_url(&self) -> Option<String> {
        video_url_in(&self.media)
            .or_else(|| video_url_in(&self.secure_media))
            .or_else(|| {
                self.crosspost_parent_list.iter().find_map(|parent| {
                    video_url_in(&parent.media).or_else(|| video_url_in(&parent.secure_media))
                })
            })
    }
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Deserialize)]
struct Child {
    data: Thing,
}

/// Thin JSON client for the public listing endpoint.
pub struct RedditClient {
    http: reqwest::Client,
    base_url: String,
}

impl RedditClient {
    pub fn new(config: &RedditConfig) -> Result<Self, FanlineError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| FanlineError::Internal(format!("build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn listing(
        &self,
        subreddit: &str,
        sort: &str,
        limit: u32,
    ) -> Result<Vec<Thing>, FanlineError> {
        let url = format!(
            "{}/r/{subreddit}/{sort}.json?limit={limit}&raw_json=1",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FanlineError::source_with(format!("request {url}"), e))?;
        if !response.status().is_success() {
            return Err(FanlineError::Source {
                message: format!("request {url}: http {}", response.status()),
                source: None,
            });
        }
        let listing: Listing = response
            .json()
            .await
            .map_err(|e| FanlineError::source_with(format!("decode {url}"), e))?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }
}

fn listing_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:https?://)?(?:www\.)?reddit\.com)?/r/([0-9A-Za-z_]+)(?:/(hot|new|top))?$")
            .unwrap()
    })
}

/// Recognize an operator input as a subreddit reference; the sort defaults
/// to `hot`.
pub fn parse_listing_ref(command: &str) -> Option<(String, String)> {
    let caps = listing_ref_regex().captures(command)?;
    let subreddit = caps[1].to_string();
    let sort = caps
        .get(2)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "hot".to_string());
    Some((subreddit, sort))
}

/// Build the media request for a link post, by domain.
pub fn media_request_for(thing: &Thing) -> MediaRequest {
    match thing.domain.as_str() {
        "i.redd.it" | "i.imgur.com" | "vidble.com" => match url_format(&thing.url) {
            Some(format) => MediaRequest::Http { format },
            None => MediaRequest::Failed {
                reason: format!("unable to recognize format of {}", thing.url),
            },
        },
        "v.redd.it" => match thing.fallback_video_url() {
            Some(_) => MediaRequest::Http {
                format: "mp4".into(),
            },
            None => MediaRequest::Failed {
                reason: "no fallback URL".into(),
            },
        },
        other => MediaRequest::Failed {
            reason: format!("unknown domain: {other}"),
        },
    }
}

fn url_format(url: &str) -> Option<String> {
    let ext = url.rsplit('.').next()?;
    if ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}

pub struct RedditSource {
    client: Arc<RedditClient>,
    media: Arc<MediaManager>,
}

impl RedditSource {
    pub fn new(client: Arc<RedditClient>, media: Arc<MediaManager>) -> Self {
        Self { client, media }
    }

    fn render_thing(&self, item: &ListingItem, thing: &Thing) -> Vec<String> {
        let mut pager = Pager::new(MAX_PAGE_LEN);
        pager.line(&format!("#{}", item.subreddit));
        if thing.is_self {
            pager.line(&format!("<b>{}</b>", escape_html(&thing.title)));
            pager.text(&escape_html(&thing.selftext));
        } else {
            pager.text(&escape_html(&thing.title));
        }
        pager.into_pages()
    }
}

#[async_trait]
impl Source for RedditSource {
    fn id(&self) -> &'static str {
        SOURCE_TAG
    }

    async fn draft(&self, command: &str, options: &str) -> Result<Draft, FanlineError> {
        let (subreddit, sort) = parse_listing_ref(command).ok_or(FanlineError::DraftFailed)?;
        let min_ups = if options.is_empty() {
            0
        } else {
            options.parse().map_err(|_| FanlineError::Source {
                message: format!("invalid minimum ups: {options}"),
                source: None,
            })?
        };
        let things = self.client.listing(&subreddit, &sort, 1).await?;
        if things.is_empty() {
            return Err(FanlineError::Source {
                message: format!("no entries in /r/{subreddit}"),
                source: None,
            });
        }
        let item = ListingItem {
            subreddit: subreddit.clone(),
            sort,
            min_ups,
        };
        Ok(Draft {
            item: subreddit.clone(),
            name: format!("#{subreddit}"),
            raw_data: RawData::encode(&item)?,
        })
    }

    async fn pull(&self, sub: &Subscription, sink: &UpdateSink) -> Result<(), FanlineError> {
        let item: ListingItem = sub.raw_data.decode()?;
        let mut things = self
            .client
            .listing(&item.subreddit, &item.sort, LISTING_LIMIT)
            .await?;
        things.sort_by_key(Thing::created);
        tracing::debug!(
            subreddit = %item.subreddit,
            count = things.len(),
            "fetched listing"
        );

        for thing in things {
            if thing.created() <= sub.offset || thing.ups < item.min_ups {
                continue;
            }
            let mut media = Vec::new();
            if !thing.is_self {
                let url = thing
                    .fallback_video_url()
                    .unwrap_or_else(|| thing.url.clone());
                media.push(self.media.submit(&url, media_request_for(&thing)));
            }
            let update = Update {
                offset: thing.created(),
                raw_data: sub.raw_data.clone(),
                text: self.render_thing(&item, &thing),
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
    fn parses_listing_refs_with_default_sort() {
        assert_eq!(
            parse_listing_ref("/r/rust"),
            Some(("rust".into(), "hot".into()))
        );
        assert_eq!(
            parse_listing_ref("https://www.reddit.com/r/pics/top"),
            Some(("pics".into(), "top".into()))
        );
    }

    #[test]
    fn rejects_non_listing_inputs() {
        assert!(parse_listing_ref("/b/res/1.html").is_none());
        assert!(parse_listing_ref("/r/rust/controversial").is_none());
        assert!(parse_listing_ref("reddit.com/user/someone").is_none());
    }

    #[test]
    fn listing_payload_decodes() {
        let json = r#"{
            "data": {
                "children": [
                    {"data": {"title": "t", "created_utc": 1700000000.0,
                              "ups": 12, "is_self": false,
                              "url": "https://i.redd.it/abc.jpg",
                              "domain": "i.redd.it"}}
                ]
            }
        }"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        let things: Vec<Thing> = listing.data.children.into_iter().map(|c| c.data).collect();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0].created(), 1700000000);
        assert_eq!(things[0].ups, 12);
    }

    #[test]
    fn media_request_by_domain() {
        let image = Thing {
            url: "https://i.redd.it/abc.jpg".into(),
            domain: "i.redd.it".into(),
            ..Thing::default()
        };
        assert!(matches!(
            media_request_for(&image),
            MediaRequest::Http { ref format } if format == "jpg"
        ));

        let video = Thing {
            url: "https://v.redd.it/xyz".into(),
            domain: "v.redd.it".into(),
            media: Some(MediaContainer {
                reddit_video: Some(RedditVideo {
                    fallback_url: "https://v.redd.it/xyz/DASH_720.mp4".into(),
                }),
            }),
            ..Thing::default()
        };
        assert!(matches!(
            media_request_for(&video),
            MediaRequest::Http { ref format } if format == "mp4"
        ));

        let unknown = Thing {
            url: "https://example.com/page".into(),
            domain: "example.com".into(),
            ..Thing::default()
        };
        assert!(matches!(media_request_for(&unknown), MediaRequest::Failed { .. }));
    }

    #[test]
    fn fallback_url_prefers_media_then_secure_media() {
        let thing = Thing {
            secure_media: Some(MediaContainer {
                reddit_video: Some(RedditVideo {
                    fallback_url: "https://v.redd.it/s/DASH_480.mp4".into(),
                }),
            }),
            ..Thing::default()
        };
        assert_eq!(
            thing.fallback_video_url().as_deref(),
            Some("https://v.redd.it/s/DASH_480.mp4")
        );
    }

    #[test]
    fn fallback_url_walks_crosspost_parents() {
        let thing = Thing {
            url: "https://v.redd.it/xyz".into(),
            domain: "v.redd.it".into(),
            crosspost_parent_list: vec![
                CrosspostParent::default(),
                CrosspostParent {
                    secure_media: Some(MediaContainer {
                        reddit_video: Some(RedditVideo {
                            fallback_url: "https://v.redd.it/p/DASH_720.mp4".into(),
                        }),
                    }),
                    ..CrosspostParent::default()
                },
            ],
            ..Thing::default()
        };
        assert_eq!(
            thing.fallback_video_url().as_deref(),
            Some("https://v.redd.it/p/DASH_720.mp4")
        );
        // The v.redd.it request now resolves instead of failing.
        assert!(matches!(
            media_request_for(&thing),
            MediaRequest::Http { ref format } if format == "mp4"
        ));
    }

    #[test]
    fn crosspost_parent_list_decodes_from_listing_json() {
        let json = r#"{
            "url": "https://v.redd.it/abc",
            "domain": "v.redd.it",
            "crosspost_parent_list": [
                {"media": {"reddit_video": {"fallback_url": "https://v.redd.it/abc/DASH_480.mp4"}}}
            ]
        }"#;
        let thing: Thing = serde_json::from_str(json).unwrap();
        assert_eq!(
            thing.fallback_video_url().as_deref(),
            Some("https://v.redd.it/abc/DASH_480.mp4")
        );
    }
}
