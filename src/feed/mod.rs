// Feed polling with de-duplication by post id

pub mod nitter;

pub use nitter::NitterFeed;

use crate::models::RawPost;
use anyhow::Result;
use async_trait::async_trait;

/// A newest-first post source. Implementations fetch only the most
/// recent item per call.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Option<RawPost>>;
}

/// Wraps a [`FeedSource`] and yields each post id at most once.
///
/// Only the single most recent id is remembered: a feed that alternates
/// between two posts will yield both repeatedly. In practice the
/// timeline moves forward, so one id of lookback is enough.
pub struct Poller {
    source: Box<dyn FeedSource>,
    last_seen_id: Option<String>,
}

impl Poller {
    pub fn new(source: Box<dyn FeedSource>) -> Self {
        Self {
            source,
            last_seen_id: None,
        }
    }

    /// The newest post if it has not been seen before.
    pub async fn poll(&mut self) -> Result<Option<RawPost>> {
        let Some(post) = self.source.fetch_latest().await? else {
            return Ok(None);
        };

        if self.last_seen_id.as_deref() == Some(post.id.as_str()) {
            tracing::debug!(id = %post.id, "top post unchanged");
            return Ok(None);
        }

        self.last_seen_id = Some(post.id.clone());
        Ok(Some(post))
    }

    pub fn last_seen_id(&self) -> Option<&str> {
        self.last_seen_id.as_deref()
    }
}
