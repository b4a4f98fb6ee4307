//! Redis connection settings.

use serde::{Deserialize, Serialize};

/// Redis credential store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Prepended to every key, for sharing a database between deployments
    #[serde(default)]
    pub key_prefix: Option<String>,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            key_prefix: None,
        }
    }
}

impl RedisStoreConfig {
    /// Checks the settings a pool cannot be built without.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err("redis.url must start with redis:// or rediss://".into());
        }
        if self.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.timeout_ms == 0 {
            return Err("redis.timeout_ms must be > 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.pool_size, 10);
        assert!(config.key_prefix.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: RedisStoreConfig =
            serde_json::from_str(r#"{"url": "redis://cache:6380", "key_prefix": "staging"}"#)
                .unwrap();
        assert_eq!(config.url, "redis://cache:6380");
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.key_prefix.as_deref(), Some("staging"));
    }

    #[test]
    fn test_validate() {
        let mut config = RedisStoreConfig {
            url: "http://localhost".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.url = "rediss://secure:6379".into();
        config.pool_size = 0;
        assert!(config.validate().unwrap_err().contains("pool_size"));
    }
}
