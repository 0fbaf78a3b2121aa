//! Error types for fetching, parsing and configuration.
//!
//! Retryable failures ([`FetchError::Transport`], [`FetchError::HttpStatus`])
//! are absorbed by the fetcher's retry loop. Callers only ever see them wrapped
//! in [`FetchError::RetriesExhausted`] once every attempt has been spent.

use thiserror::Error;

/// Failures produced by the HTTP layer.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("transport error for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        timed_out: bool,
    },

    /// The server answered with a status outside 200..=399.
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// Every attempt failed. `source` is the last failure seen.
    #[error("request to {url} failed after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },

    /// The session has been released with `close()`.
    #[error("fetcher is closed")]
    Closed,
}

impl FetchError {
    pub fn transport(url: &str, err: &reqwest::Error) -> Self {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }

    /// Status code of the last failed attempt, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            FetchError::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Failures while reading a feed or a document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("feed item has neither title nor link")]
    EmptyItem,

    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Problems with the YAML config file or the values it carries.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("user-agent pool must contain at least one entry")]
    EmptyUserAgentPool,
}

/// Umbrella error for page and article scraping.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_unwraps_exhausted() {
        let err = FetchError::RetriesExhausted {
            url: "https://example.com".to_string(),
            attempts: 4,
            source: Box::new(FetchError::HttpStatus {
                url: "https://example.com".to_string(),
                status: 503,
            }),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(
            err.to_string(),
            "request to https://example.com failed after 4 attempts"
        );
    }

    #[test]
    fn test_status_absent_for_transport_errors() {
        let err = FetchError::Transport {
            url: "https://example.com".to_string(),
            message: "connection refused".to_string(),
            timed_out: false,
        };
        assert_eq!(err.status(), None);
        assert_eq!(FetchError::Closed.status(), None);
    }
}
