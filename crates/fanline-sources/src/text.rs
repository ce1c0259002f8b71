// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text page building for platform messages.
//!
//! Sources hand the sender pre-formatted pages, each already within the
//! platform size limit; the [`Pager`] does the splitting. HTML coming from
//! upstream APIs is reduced to the tag subset Telegram accepts.

use std::sync::OnceLock;

use regex::Regex;

/// Telegram's maximum message length.
pub const MAX_PAGE_LEN: usize = 4096;

/// Tags kept verbatim when sanitizing upstream HTML.
const ALLOWED_TAGS: &[&str] = &["b", "i", "u", "s", "code", "pre"];

/// Accumulates text into pages no longer than `limit` bytes.
pub struct Pager {
    limit: usize,
    pages: Vec<String>,
    current: String,
}

impl Pager {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            pages: Vec::new(),
            current: String::new(),
        }
    }

    /// Append text, starting new pages at the limit. Splits happen on char
    /// boundaries, preferring line breaks.
    pub fn text(&mut self, text: &str) {
        for ch in text.chars() {
            if self.current.len() + ch.len_utf8() > self.limit {
                self.break_page();
            }
            self.current.push(ch);
        }
    }

    /// Append text followed by a newline.
    pub fn line(&mut self, text: &str) {
        self.text(text);
        self.text("\n");
    }

    fn break_page(&mut self) {
        // Prefer breaking at the last newline so pages do not cut words.
        if let Some(pos) = self.current.rfind('\n') {
            if pos > self.limit / 2 {
                let rest = self.current.split_off(pos + 1);
                let page = std::mem::replace(&mut self.current, rest);
                self.pages.push(page.trim_end().to_string());
                return;
            }
        }
        self.pages.push(std::mem::take(&mut self.current));
    }

    pub fn into_pages(mut self) -> Vec<String> {
        let trimmed = self.current.trim_end();
        if !trimmed.is_empty() {
            let page = trimmed.to_string();
            self.pages.push(page);
        }
        self.pages
    }
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?([a-zA-Z][a-zA-Z0-9]*)[^>]*>").unwrap())
}

/// Reduce upstream HTML to the platform-supported subset: `<br>` becomes a
/// newline, allowed inline tags are kept (attributes dropped), everything
/// else is stripped. Entity escapes are left alone; the output is sent as
/// HTML.
pub fn sanitize_html(input: &str) -> String {
    static BR: OnceLock<Regex> = OnceLock::new();
    let br = BR.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
    let with_breaks = br.replace_all(input, "\n");

    tag_regex()
        .replace_all(&with_breaks, |caps: &regex::Captures<'_>| {
            let name = caps[1].to_ascii_lowercase();
            if ALLOWED_TAGS.contains(&name.as_str()) {
                let closing = caps[0].starts_with("</");
                if closing {
                    format!("</{name}>")
                } else {
                    format!("<{name}>")
                }
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Remove every tag; for plain-text contexts such as titles.
pub fn strip_tags(input: &str) -> String {
    tag_regex().replace_all(input, "").into_owned()
}

/// Escape plain text for inclusion in an HTML-mode message.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Decode the handful of entities upstream APIs put into plain-text fields.
pub fn unescape_entities(input: &str) -> String {
    input
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
