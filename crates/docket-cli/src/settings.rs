//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `DOCKET_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use docket_core::pipeline::DEFAULT_INCREMENTAL_DAYS;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "docket.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite file holding the history. A leading `~/` is expanded.
  pub store_path:          PathBuf,
  /// Window length for incremental runs.
  pub incremental_days:    u32,
  pub host:                String,
  pub port:                u16,
  /// Refuse batches with a larger share of malformed rows, e.g. `0.2`.
  #[serde(default)]
  pub max_malformed_ratio: Option<f64>,
}

impl Settings {
  /// Load settings from `file` (missing is fine) and the environment.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(file).required(false))
        .add_source(config::Environment::with_prefix("DOCKET").try_parsing(true)),
    )
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    let settings = defaults(builder)?
      .build()
      .context("failed to read configuration")?;

    let mut settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise Settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }
}

/// Defaults sit underneath every other source.
fn defaults(
  builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
  builder
    .set_default("store_path", "docket.db")?
    .set_default("incremental_days", i64::from(DEFAULT_INCREMENTAL_DAYS))?
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080_i64)
    .context("invalid default setting")
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
