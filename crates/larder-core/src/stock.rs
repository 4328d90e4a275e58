//! Aggregate stock: the per-location, per-product summary derived from lots.
//!
//! The quantity is never written independently: backends recompute it from
//! the lots inside the same transaction that mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  id::{LocationId, ProductId, TenantId},
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StockBand {
  Out,
  Low,
  Normal,
  High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
  pub minimum: i64,
  pub maximum: Option<i64>,
}

impl Thresholds {
  pub fn validate(&self) -> Result<()> {
    let invalid = self.minimum < 0 || self.maximum.is_some_and(|max| max < self.minimum);
    if invalid {
      return Err(Error::InvalidThresholds {
        minimum: self.minimum,
        maximum: self.maximum.unwrap_or(-1),
      });
    }
    Ok(())
  }
}

impl StockBand {
  pub fn classify(quantity: i64, thresholds: &Thresholds) -> Self {
    if quantity <= 0 {
      Self::Out
    } else if thresholds.minimum > 0 && quantity <= thresholds.minimum {
      Self::Low
    } else if thresholds.maximum.is_some_and(|max| quantity > max) {
      Self::High
    } else {
      Self::Normal
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStock {
  pub tenant_id:   TenantId,
  pub location_id: LocationId,
  pub product_id:  ProductId,
  /// Sum of `remaining` over every non-blocked lot of the pair.
  pub quantity:    i64,
  pub thresholds:  Thresholds,
  pub band:        StockBand,
  pub updated_at:  DateTime<Utc>,
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// One aggregate whose stored value disagrees with its lots or its ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockDrift {
  pub location_id: LocationId,
  pub product_id:  ProductId,
  pub stored:      i64,
  pub from_lots:   i64,
  /// `None` when the ledger chain itself is broken and cannot be replayed.
  pub from_ledger: Option<i64>,
}

/// Outcome of an out-of-band integrity pass over one tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
  pub checked: usize,
  pub drifts:  Vec<StockDrift>,
}

impl ReconciliationReport {
  pub fn is_clean(&self) -> bool { self.drifts.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bands_follow_thresholds() {
    let t = Thresholds { minimum: 10, maximum: Some(100) };
    assert_eq!(StockBand::classify(0, &t), StockBand::Out);
    assert_eq!(StockBand::classify(10, &t), StockBand::Low);
    assert_eq!(StockBand::classify(11, &t), StockBand::Normal);
    assert_eq!(StockBand::classify(100, &t), StockBand::Normal);
    assert_eq!(StockBand::classify(101, &t), StockBand::High);
  }

  #[test]
  fn no_thresholds_means_out_or_normal() {
    let t = Thresholds::default();
    assert_eq!(StockBand::classify(0, &t), StockBand::Out);
    assert_eq!(StockBand::classify(1, &t), StockBand::Normal);
    assert_eq!(StockBand::classify(1_000_000, &t), StockBand::Normal);
  }

  #[test]
  fn maximum_below_minimum_is_invalid() {
    let t = Thresholds { minimum: 5, maximum: Some(4) };
    assert!(matches!(t.validate(), Err(Error::InvalidThresholds { .. })));
    assert!(Thresholds { minimum: 5, maximum: Some(5) }.validate().is_ok());
  }
}
