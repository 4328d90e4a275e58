//! A time-bounded read replica of aggregate rows.
//!
//! Only [`crate::TenantSession::aggregate`] reads from it. Writes always go
//! to the database first and invalidate the affected pairs once committed,
//! so no write decision is ever taken from a cached value.

use std::{
  collections::HashMap,
  sync::RwLock,
  time::{Duration, Instant},
};

use larder_core::{
  id::{LocationId, ProductId, TenantId},
  stock::AggregateStock,
};

type Key = (TenantId, LocationId, ProductId);

#[derive(Debug)]
pub struct AggregateCache {
  ttl:     Duration,
  entries: RwLock<HashMap<Key, (Instant, AggregateStock)>>,
}

impl AggregateCache {
  /// A zero `ttl` disables caching.
  pub fn new(ttl: Duration) -> Self { Self { ttl, entries: RwLock::new(HashMap::new()) } }

  pub fn is_enabled(&self) -> bool { !self.ttl.is_zero() }

  pub fn get(&self, key: Key) -> Option<AggregateStock> {
    if !self.is_enabled() {
      return None;
    }
    let entries = self.entries.read().ok()?;
    let (stored_at, stock) = entries.get(&key)?;
    (stored_at.elapsed() < self.ttl).then(|| stock.clone())
  }

  pub fn put(&self, stock: &AggregateStock) {
    if !self.is_enabled() {
      return;
    }
    if let Ok(mut entries) = self.entries.write() {
      let key = (stock.tenant_id, stock.location_id, stock.product_id);
      entries.insert(key, (Instant::now(), stock.clone()));
    }
  }

  pub fn invalidate(&self, key: Key) {
    if let Ok(mut entries) = self.entries.write() {
      entries.remove(&key);
    }
  }

  /// Drop every entry of `tenant`.
  pub fn invalidate_tenant(&self, tenant: TenantId) {
    if let Ok(mut entries) = self.entries.write() {
      entries.retain(|(t, _, _), _| *t != tenant);
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use larder_core::stock::{StockBand, Thresholds};

  use super::*;

  fn stock(tenant: TenantId, quantity: i64) -> AggregateStock {
    AggregateStock {
      tenant_id: tenant,
      location_id: LocationId(1),
      product_id: ProductId(1),
      quantity,
      thresholds: Thresholds::default(),
      band: StockBand::Normal,
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn zero_ttl_never_caches() {
    let cache = AggregateCache::new(Duration::ZERO);
    let t = TenantId::new();
    cache.put(&stock(t, 5));
    assert!(cache.get((t, LocationId(1), ProductId(1))).is_none());
  }

  #[test]
  fn entries_are_keyed_by_tenant() {
    let cache = AggregateCache::new(Duration::from_secs(60));
    let a = TenantId::new();
    let b = TenantId::new();
    cache.put(&stock(a, 5));

    assert_eq!(cache.get((a, LocationId(1), ProductId(1))).unwrap().quantity, 5);
    assert!(cache.get((b, LocationId(1), ProductId(1))).is_none());

    cache.invalidate_tenant(a);
    assert!(cache.get((a, LocationId(1), ProductId(1))).is_none());
  }

  #[test]
  fn stale_entries_are_not_served() {
    let cache = AggregateCache::new(Duration::from_millis(1));
    let t = TenantId::new();
    cache.put(&stock(t, 5));
    std::thread::sleep(Duration::from_millis(5));
    assert!(cache.get((t, LocationId(1), ProductId(1))).is_none());
  }
}
