use serde::{Deserialize, Serialize};
use subgate_auth::AuthConfig;
use subgate_auth_redis::RedisStoreConfig;

/// Top-level CLI configuration, read from `subgate.toml` and `SUBGATE__*`
/// environment variables.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub redis: RedisStoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CliConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.auth.validate().map_err(|e| format!("auth: {e}"))?;
        self.redis.validate()?;
        if self.logging.level.trim().is_empty() {
            return Err("logging.level must not be empty".into());
        }
        Ok(())
    }

    /// Copy safe to print: the signing secret is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.auth.jwt.secret.is_empty() {
            copy.auth.jwt.secret = "********".to_string();
        }
        copy
    }
}

pub mod loader {
    use super::CliConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_FILE: &str = "subgate.toml";

    pub fn load_config(path: Option<&str>) -> Result<CliConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., SUBGATE__AUTH__JWT__SECRET=...
        builder = builder.add_source(
            Environment::with_prefix("SUBGATE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: CliConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<CliConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
