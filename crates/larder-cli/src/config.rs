//! Ledger configuration: an optional TOML file layered under `LARDER_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use larder_core::allocation::ExpiredLotPolicy;
use larder_store_sqlite::StoreOptions;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
  pub store_path:        PathBuf,
  pub lock_timeout_ms:   u64,
  pub expired_lots:      ExpiredLotPolicy,
  pub history_page_size: usize,
  pub cache_ttl_ms:      u64,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    let options = StoreOptions::default();
    Self {
      store_path:        PathBuf::from("larder.db"),
      lock_timeout_ms:   millis(options.lock_timeout),
      expired_lots:      options.expired_lots,
      history_page_size: options.history_page_size,
      cache_ttl_ms:      millis(options.cache_ttl),
    }
  }
}

fn millis(d: Duration) -> u64 { u64::try_from(d.as_millis()).unwrap_or(u64::MAX) }

impl LedgerConfig {
  /// Read `path` if it exists, then apply `LARDER_*` overrides.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("LARDER").try_parsing(true))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise LedgerConfig")
  }

  /// The store path with a leading `~` expanded.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      lock_timeout:      Duration::from_millis(self.lock_timeout_ms),
      expired_lots:      self.expired_lots,
      history_page_size: self.history_page_size.max(1),
      cache_ttl:         Duration::from_millis(self.cache_ttl_ms),
    }
  }
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

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_store_defaults() {
    let config = LedgerConfig::default();
    assert_eq!(config.store_path, PathBuf::from("larder.db"));
    assert_eq!(config.lock_timeout_ms, 5000);
    assert_eq!(config.cache_ttl_ms, 2000);
    assert_eq!(config.expired_lots, ExpiredLotPolicy::Block);

    let options = config.store_options();
    assert_eq!(options.lock_timeout, Duration::from_secs(5));
    assert_eq!(options.history_page_size, 100);
  }

  #[test]
  fn file_values_override_defaults() {
    let path = std::env::temp_dir().join(format!("larder-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
      &path,
      "store_path = \"/var/lib/larder/ledger.db\"\n\
       lock_timeout_ms = 250\n\
       expired_lots = \"sell_off\"\n",
    )
    .unwrap();

    let config = LedgerConfig::load(&path);
    std::fs::remove_file(&path).unwrap();
    let config = config.unwrap();

    assert_eq!(config.store_path, PathBuf::from("/var/lib/larder/ledger.db"));
    assert_eq!(config.store_options().lock_timeout, Duration::from_millis(250));
    assert_eq!(config.expired_lots, ExpiredLotPolicy::SellOff);
    assert_eq!(config.history_page_size, 100);
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    let expanded = expand_tilde(Path::new("~/larder.db"));
    assert_eq!(expanded, PathBuf::from(home).join("larder.db"));
    assert_eq!(expand_tilde(Path::new("/srv/larder.db")), PathBuf::from("/srv/larder.db"));
  }
}
