//! Runtime tuning for [`crate::SqliteStore`].

use std::time::Duration;

use larder_core::allocation::ExpiredLotPolicy;

#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// How long a write waits for the database lock before failing with
  /// `LockTimeout`.
  pub lock_timeout:      Duration,
  pub expired_lots:      ExpiredLotPolicy,
  pub history_page_size: usize,
  /// Freshness bound of the aggregate read cache. Zero disables it.
  pub cache_ttl:         Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      lock_timeout:      Duration::from_secs(5),
      expired_lots:      ExpiredLotPolicy::Block,
      history_page_size: larder_core::history::DEFAULT_PAGE_SIZE,
      cache_ttl:         Duration::from_secs(2),
    }
  }
}
