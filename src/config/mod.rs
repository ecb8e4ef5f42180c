//! Origin cache configuration.
//!
//! Deployments opt into origin caching through a JSON document:
//!
//! ```json
//! {
//!     "enabled": true,
//!     "seconds": 86400,
//!     "stale_while_revalidate": 300,
//!     "stale_if_error": 432000
//! }
//! ```
//!
//! Every field is optional. Caching is disabled unless `enabled` is `true`,
//! in which case [`OriginCacheConfig::register`] installs a
//! [`SurrogateKeyCache`] as the request-visible [`OriginCache`].

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::cache::{CachePolicy, OriginCache, SurrogateKeyCache};
use crate::services::ServiceRegistry;

/// Errors produced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid origin cache configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Origin cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OriginCacheConfig {
    /// Whether an origin cache is registered at all.
    pub enabled: bool,

    #[serde(flatten)]
    pub policy: CachePolicy,
}

impl OriginCacheConfig {
    /// Parses configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or mistyped fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use origin_cache::config::OriginCacheConfig;
    ///
    /// let config = OriginCacheConfig::from_json(r#"{"enabled": true, "seconds": 60}"#).unwrap();
    /// assert!(config.enabled);
    /// assert_eq!(config.policy.seconds, Some(60));
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if its contents are invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&json)
    }

    /// Registers the configured origin cache, if enabled.
    ///
    /// Returns `true` when a cache was registered.
    pub fn register(&self, services: &mut ServiceRegistry) -> bool {
        if !self.enabled {
            tracing::info!("origin cache disabled");
            return false;
        }

        tracing::info!(policy = ?self.policy, "origin cache enabled");
        services.register::<dyn OriginCache>(Arc::new(SurrogateKeyCache::new(self.policy)));
        true
    }
}
