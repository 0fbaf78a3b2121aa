//! YAML configuration.
//!
//! Every field is optional; a missing file section falls back to the
//! built-in defaults. Command-line flags are applied on top by `main`.
//!
//! ```yaml
//! user_agents:
//!   - "Mozilla/5.0 (X11; Linux x86_64) ..."
//! rotate_user_agent: true
//! timeout_secs: 10
//! max_retries: 3
//! retry_delay_secs: 1.0
//! feeds:
//!   - category: International
//!     url: https://www.lemonde.fr/international/rss_full.xml
//! max_articles_per_feed: 2
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::fetcher::{DEFAULT_USER_AGENTS, FetchPolicy};
use crate::models::FeedSource;
use crate::news::NewsSettings;

/// Settings loaded from `--config`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub user_agents: Vec<String>,
    pub rotate_user_agent: bool,
    pub timeout_secs: f64,
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    /// Timeout for feed and article requests in the news pipeline.
    pub news_timeout_secs: f64,
    pub feeds: Vec<FeedSource>,
    pub max_feeds: usize,
    pub max_articles_per_feed: usize,
    pub full_content: bool,
    pub article_pause_secs: f64,
    pub feed_pause_secs: f64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            rotate_user_agent: true,
            timeout_secs: 10.0,
            max_retries: 3,
            retry_delay_secs: 1.0,
            news_timeout_secs: 15.0,
            feeds: default_feeds(),
            max_feeds: 5,
            max_articles_per_feed: 5,
            full_content: true,
            article_pause_secs: 1.0,
            feed_pause_secs: 2.0,
        }
    }
}

/// Le Monde section feeds.
pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("International", "https://www.lemonde.fr/international/rss_full.xml"),
        FeedSource::new("Politique", "https://www.lemonde.fr/politique/rss_full.xml"),
        FeedSource::new("Économie", "https://www.lemonde.fr/economie/rss_full.xml"),
        FeedSource::new("Technologies", "https://www.lemonde.fr/technologies/rss_full.xml"),
    ]
}

/// Seconds to a `Duration`; negative, NaN or overflowing values fall back to `fallback`.
fn secs(value: f64, fallback: Duration, name: &str) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|e| {
        warn!(field = name, value, error = %e, "Invalid duration; using default");
        fallback
    })
}

impl ScraperConfig {
    /// Read and parse a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text, &path.display().to_string())?;
        info!(path = %path.display(), feeds = config.feeds.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parse YAML text; `origin` only labels errors.
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agents.iter().all(|ua| ua.trim().is_empty()) {
            return Err(ConfigError::EmptyUserAgentPool);
        }
        Ok(())
    }

    /// Non-blank user agents, in file order.
    pub fn user_agent_pool(&self) -> Vec<String> {
        self.user_agents
            .iter()
            .map(|ua| ua.trim())
            .filter(|ua| !ua.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        let defaults = FetchPolicy::default();
        FetchPolicy {
            timeout: secs(self.timeout_secs, defaults.timeout, "timeout_secs"),
            max_retries: self.max_retries,
            retry_delay: secs(self.retry_delay_secs, defaults.retry_delay, "retry_delay_secs"),
        }
    }

    pub fn news_settings(&self) -> NewsSettings {
        let defaults = NewsSettings::default();
        let policy = self.fetch_policy();
        NewsSettings {
            max_feeds: self.max_feeds,
            max_articles_per_feed: self.max_articles_per_feed,
            full_content: self.full_content,
            article_pause: secs(self.article_pause_secs, defaults.article_pause, "article_pause_secs"),
            feed_pause: secs(self.feed_pause_secs, defaults.feed_pause, "feed_pause_secs"),
            policy: FetchPolicy {
                timeout: secs(self.news_timeout_secs, defaults.policy.timeout, "news_timeout_secs"),
                ..policy
            },
        }
    }
}
