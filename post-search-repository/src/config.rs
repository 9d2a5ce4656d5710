//! Configuration types for the search engine client.

use std::str::FromStr;
use std::time::Duration;

/// Default OpenSearch URL.
pub const DEFAULT_SEARCH_HOST: &str = "http://localhost:9200";

/// When written documents become visible to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Leave refreshing to the engine's refresh interval.
    #[default]
    None,
    /// Block the write until the next refresh makes it visible.
    WaitFor,
    /// Force a refresh right after the write.
    Immediate,
}

impl FromStr for RefreshPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "false" => Ok(Self::None),
            "wait_for" => Ok(Self::WaitFor),
            "true" | "immediate" => Ok(Self::Immediate),
            other => Err(format!("unknown refresh policy: {}", other)),
        }
    }
}

/// Configuration for the search engine client.
#[derive(Debug, Clone)]
pub struct SearchEngineConfig {
    /// Engine node URLs. Requests are spread round-robin when more than one is given.
    pub hosts: Vec<String>,
    /// Refresh behaviour for index and delete requests.
    pub refresh: RefreshPolicy,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for SearchEngineConfig {
    fn default() -> Self {
        Self {
            hosts: vec![DEFAULT_SEARCH_HOST.to_string()],
            refresh: RefreshPolicy::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl SearchEngineConfig {
    /// Create a config for the given hosts.
    pub fn with_hosts<S: Into<String>>(hosts: impl IntoIterator<Item = S>) -> Self {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Parse a comma-separated host list, ignoring blank entries.
    pub fn parse_hosts(hosts: &str) -> Vec<String> {
        hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect()
    }
}
