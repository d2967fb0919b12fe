use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::feed::FeedLimits;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the HTTP server listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub substack: SubstackConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubstackConfig {
    #[serde(default)]
    pub publication_url: String,
    pub feed_url: String,
    /// Substring a feed URL must contain before it is fetched
    #[serde(default = "default_provider_marker")]
    pub provider_marker: String,
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    /// Freshness hint in seconds, advertised via Cache-Control
    #[serde(default = "default_revalidate_secs")]
    pub revalidate_secs: u64,
    /// Outbound timeout; unset leaves the HTTP client's default in place
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub curated_posts: Vec<CuratedPost>,
}

fn default_provider_marker() -> String {
    "substack.com".to_string()
}

fn default_limit() -> u32 {
    3
}

fn default_max_limit() -> u32 {
    6
}

fn default_revalidate_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CuratedPost {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub note: String,
    pub link: String,
}

impl SubstackConfig {
    pub fn limits(&self) -> FeedLimits {
        FeedLimits {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.substack.max_limit == 0 {
            anyhow::bail!("substack.max_limit must be at least 1");
        }
        if self.substack.default_limit == 0 {
            anyhow::bail!("substack.default_limit must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        assert_eq!(default_bind_addr(), "0.0.0.0:3000");
        assert_eq!(default_provider_marker(), "substack.com");
        assert_eq!(default_limit(), 3);
        assert_eq!(default_max_limit(), 6);
        assert_eq!(default_revalidate_secs(), 3600);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            bind_addr = "127.0.0.1:8080"

            [substack]
            publication_url = "https://substack.com/@writer"
            feed_url = "https://writer.substack.com/feed"
            default_limit = 2
            max_limit = 5
            revalidate_secs = 600
            request_timeout_secs = 10

            [[substack.curated_posts]]
            title = "A Good Read"
            author = "Someone"
            note = "Worth it."
            link = "https://example.com/p/good-read"

            [[substack.curated_posts]]
            title = "Another"
            author = "Someone Else"
            link = "https://example.org/p/another"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.substack.feed_url, "https://writer.substack.com/feed");
        assert_eq!(config.substack.default_limit, 2);
        assert_eq!(config.substack.max_limit, 5);
        assert_eq!(config.substack.revalidate_secs, 600);
        assert_eq!(config.substack.request_timeout_secs, Some(10));
        assert_eq!(config.substack.curated_posts.len(), 2);
        assert_eq!(config.substack.curated_posts[0].note, "Worth it.");
        assert_eq!(config.substack.curated_posts[1].note, "");
    }

    #[test]
    fn test_load_config_with_defaults() {
        let content = r#"
            [substack]
            feed_url = "https://writer.substack.com/feed"
        "#;

        let config = Config::from_str(content).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.substack.provider_marker, "substack.com");
        assert_eq!(config.substack.default_limit, 3);
        assert_eq!(config.substack.max_limit, 6);
        assert_eq!(config.substack.revalidate_secs, 3600);
        assert_eq!(config.substack.request_timeout_secs, None);
        assert!(config.substack.curated_posts.is_empty());
    }

    #[test]
    fn test_limits_from_config() {
        let content = r#"
            [substack]
            feed_url = "https://writer.substack.com/feed"
            default_limit = 4
            max_limit = 8
        "#;

        let limits = Config::from_str(content).unwrap().substack.limits();
        assert_eq!(
            limits,
            FeedLimits {
                default_limit: 4,
                max_limit: 8
            }
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/site.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_feed_url() {
        let content = r#"
            [substack]
            publication_url = "https://substack.com/@writer"
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_zero_max_limit_rejected() {
        let content = r#"
            [substack]
            feed_url = "https://writer.substack.com/feed"
            max_limit = 0
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_zero_default_limit_rejected() {
        let content = r#"
            [substack]
            feed_url = "https://writer.substack.com/feed"
            default_limit = 0
        "#;

        assert!(Config::from_str(content).is_err());
    }
}
