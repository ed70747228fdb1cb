// Scrapes the newest post from a nitter timeline page. Nitter serves
// plain server-rendered HTML, so a few targeted regexes are enough.

use super::FeedSource;
use crate::models::RawPost;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

static TWEET_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a class="tweet-link" href="([^"]*/status/(\d+)[^"]*)""#).unwrap()
});

static TWEET_CONTENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div class="tweet-content[^"]*"[^>]*>(.*?)</div>"#).unwrap()
});

static TWEET_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="tweet-date"><a[^>]*title="([^"]+)""#).unwrap()
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

pub struct NitterFeed {
    client: Client,
    url: String,
    origin: String,
}

impl NitterFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        let origin = origin_of(&url).unwrap_or_default().to_string();

        Ok(Self {
            client,
            url,
            origin,
        })
    }
}

#[async_trait]
impl FeedSource for NitterFeed {
    async fn fetch_latest(&self) -> Result<Option<RawPost>> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("feed responded with status {}", status);
        }

        let body = response.text().await?;
        let post = extract_latest(&body, &self.origin);
        if post.is_none() {
            tracing::warn!(url = %self.url, "no parseable post on the timeline page");
        }
        Ok(post)
    }
}

/// Pull the first timeline item out of a nitter page. Returns `None`
/// when the page has no item or the item lacks a status permalink.
fn extract_latest(html: &str, origin: &str) -> Option<RawPost> {
    let start = html.find("timeline-item")?;
    let item = &html[start..];

    let link_caps = TWEET_LINK_RE.captures(item)?;
    let href = link_caps.get(1)?.as_str();
    let id = link_caps.get(2)?.as_str().to_string();

    let text = TWEET_CONTENT_RE
        .captures(item)
        .and_then(|c| c.get(1))
        .map(|m| clean_fragment(m.as_str()))?;

    let timestamp_title = TWEET_DATE_RE
        .captures(item)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let link = if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        href.to_string()
    };

    Some(RawPost {
        id,
        text,
        timestamp_title,
        link: Some(link),
        observed_at: Utc::now(),
    })
}

fn clean_fragment(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    unescape_entities(stripped.trim())
}

/// The handful of entities nitter actually emits. `&amp;` goes last so
/// double-escaped sequences do not unescape twice.
fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn origin_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    match rest.find('/') {
        Some(i) => Some(&url[..scheme_end + 3 + i]),
        None => Some(url),
    }
}
