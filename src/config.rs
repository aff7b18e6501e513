use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000";
pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub search_ttl: Duration,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            search_ttl: DEFAULT_SEARCH_TTL,
        }
    }
}

impl ExplorerConfig {
    /// Reads `ARM_EXPLORER_URL`, `ARM_EXPLORER_TOKEN` and
    /// `ARM_EXPLORER_SEARCH_TTL_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let endpoint = lookup("ARM_EXPLORER_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.endpoint);
        let token = lookup("ARM_EXPLORER_TOKEN").filter(|v| !v.trim().is_empty());
        let search_ttl = match lookup("ARM_EXPLORER_SEARCH_TTL_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("ARM_EXPLORER_SEARCH_TTL_SECS must be seconds, got {raw:?}"))?;
                Duration::from_secs(secs)
            }
            None => defaults.search_ttl,
        };
        Ok(Self {
            endpoint,
            token,
            search_ttl,
        })
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        self
    }
}
