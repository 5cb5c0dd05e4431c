use crate::db::DbSettings;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

pub const DEFAULT_PARALLEL: usize = 4;
/// Per-statement budget, mirrored server-side via `statement_timeout`.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
/// Result capture cap per statement.
pub const DEFAULT_MAX_ROWS: usize = 10_000;

/// Optional YAML run configuration. Every field has a CLI-flag override;
/// the file exists so a benchmark setup can be checked in once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default = "default_version", alias = "configVersion")]
    pub version: u32,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub database: DbSettings,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            settings: Settings::default(),
            database: DbSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<usize>,
}

pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::HashSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);

    // serde_ignored wrapper to capture unknown fields
    let cfg: RunConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if !ignored_keys.is_empty() {
        tracing::warn!(?ignored_keys, "ignored unknown config fields");
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }

    Ok(cfg)
}

/// Database password is environment-only: an explicit value (already pulled
/// from `SQLBENCH_PG_PASSWORD` by the CLI) wins, then `POSTGRES_PASSWORD`.
pub fn resolve_password(explicit: Option<String>) -> Option<String> {
    explicit
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("POSTGRES_PASSWORD").ok().filter(|s| !s.is_empty()))
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
settings:
  parallel: 4
  timeout_seconds: 60
database:
  host: localhost
  port: 5432
  user: root
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
