use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{header::ACCEPT, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SubstackConfig;

/// Maximum number of characters kept from a cleaned description
pub const SUMMARY_MAX_CHARS: usize = 220;

const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml";

static ITEM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<item[\s\S]*?</item>").expect("Invalid item pattern"));

static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| tag_pattern("title"));
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| tag_pattern("link"));
static DESCRIPTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| tag_pattern("description"));
static PUB_DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| tag_pattern("pubDate"));

static CDATA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!\[CDATA\[|\]\]>").expect("Invalid CDATA pattern"));

static MARKUP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid markup pattern"));

static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace pattern"));

fn tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?i)<{tag}[^>]*>([\s\S]*?)</{tag}>")).expect("Invalid tag pattern")
}

/// One post as shown on the portfolio page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published_at: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedLimits {
    /// Used when the caller gives no usable limit
    pub default_limit: u32,
    /// Upper bound on items returned, whatever the caller asks for
    pub max_limit: u32,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            default_limit: 3,
            max_limit: 6,
        }
    }
}

impl FeedLimits {
    /// Interpret a raw `limit` query value.
    ///
    /// Anything that is not a finite number (including an absent or blank
    /// value) falls back to the default. Fractions are floored. The result
    /// is not clamped yet; see [`FeedLimits::clamp`].
    pub fn parse_requested(&self, raw: Option<&str>) -> i64 {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(|v| v.floor().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
            .unwrap_or(i64::from(self.default_limit))
    }

    /// Constrain a requested count into `[1, max_limit]`
    pub fn clamp(&self, requested: i64) -> usize {
        let max = i64::from(self.max_limit.max(1));
        requested.clamp(1, max) as usize
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed URL does not contain provider marker '{0}'")]
    NotConfigured(String),

    #[error("feed responded with status {0}")]
    Status(StatusCode),

    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Fetches a provider feed and reshapes it into [`FeedItem`]s.
///
/// Holds no per-request state; one instance is shared by every handler.
pub struct FeedAdapter {
    client: Client,
    provider_marker: String,
    limits: FeedLimits,
}

impl FeedAdapter {
    pub fn new(
        provider_marker: impl Into<String>,
        limits: FeedLimits,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder().user_agent("PortfolioFeed/1.0 (Substack proxy)");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            provider_marker: provider_marker.into(),
            limits,
        })
    }

    pub fn from_config(config: &SubstackConfig) -> anyhow::Result<Self> {
        Self::new(
            config.provider_marker.clone(),
            config.limits(),
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn limits(&self) -> FeedLimits {
        self.limits
    }

    /// Plain substring test, not a host check.
    pub fn is_allowed(&self, feed_url: &str) -> bool {
        feed_url.contains(&self.provider_marker)
    }

    /// Fetch up to `requested_limit` items from `feed_url`.
    ///
    /// Never fails: a disallowed URL, a non-success status or a transport
    /// error all yield an empty list.
    pub async fn fetch_feed_items(&self, feed_url: &str, requested_limit: i64) -> Vec<FeedItem> {
        let limit = self.limits.clamp(requested_limit);

        match self.try_fetch(feed_url, limit).await {
            Ok(items) => {
                debug!("Extracted {} items from {}", items.len(), feed_url);
                items
            }
            Err(FeedError::NotConfigured(marker)) => {
                debug!("Skipping feed {}: missing marker '{}'", feed_url, marker);
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to fetch feed {}: {}", feed_url, e);
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, feed_url: &str, limit: usize) -> Result<Vec<FeedItem>, FeedError> {
        if !self.is_allowed(feed_url) {
            return Err(FeedError::NotConfigured(self.provider_marker.clone()));
        }

        info!("Fetching feed: {}", feed_url);

        let response = self
            .client
            .get(feed_url)
            .header(ACCEPT, FEED_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let xml = response.text().await?;
        Ok(parse_items(&xml, limit))
    }
}

/// Extract the first `limit` item blocks of an RSS document.
///
/// Blocks past the limit are never parsed.
pub fn parse_items(xml: &str, limit: usize) -> Vec<FeedItem> {
    ITEM_PATTERN
        .find_iter(xml)
        .take(limit)
        .map(|block| parse_item(block.as_str()))
        .collect()
}

fn parse_item(block: &str) -> FeedItem {
    let description = extract_tag(&DESCRIPTION_PATTERN, block);

    FeedItem {
        title: decode_entities(extract_tag(&TITLE_PATTERN, block)),
        link: decode_entities(extract_tag(&LINK_PATTERN, block)),
        published_at: decode_entities(extract_tag(&PUB_DATE_PATTERN, block)),
        summary: truncate_chars(&strip_html(description), SUMMARY_MAX_CHARS),
    }
}

/// Trimmed inner text of the first match, or "" when the tag is absent
fn extract_tag<'a>(pattern: &Regex, block: &'a str) -> &'a str {
    pattern
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or("")
}

/// Drop CDATA markers and unescape the five XML escapes, in order.
///
/// Numeric and named entities beyond those five are left as they are.
pub fn decode_entities(input: &str) -> String {
    CDATA_PATTERN
        .replace_all(input, "")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

pub fn strip_html(input: &str) -> String {
    let decoded = decode_entities(input);
    let untagged = MARKUP_PATTERN.replace_all(&decoded, " ");
    WHITESPACE_PATTERN
        .replace_all(&untagged, " ")
        .trim()
        .to_string()
}

fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}
