//! Lots: dated batches of a product held at a location.
//!
//! A lot is never deleted. Consumption and corrections move its `remaining`
//! quantity and its status; the history of those moves lives in the movement
//! ledger.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  error::add_quantity,
  id::{LocationId, LotId, ProductId, TenantId},
  movement::MovementNote,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LotStatus {
  Active,
  /// `remaining` reached zero.
  Exhausted,
  /// Past its expiration date with stock left. Flagged, not removed.
  Expired,
  /// Withheld from allocation and from the aggregate.
  Blocked,
}

impl LotStatus {
  /// The status a non-blocked lot should carry given its quantity and
  /// expiration.
  pub fn settle(remaining: i64, expires_on: Option<NaiveDate>, today: NaiveDate) -> Self {
    if remaining == 0 {
      Self::Exhausted
    } else if expires_on.is_some_and(|d| d < today) {
      Self::Expired
    } else {
      Self::Active
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
  pub lot_id:      LotId,
  pub tenant_id:   TenantId,
  pub location_id: LocationId,
  pub product_id:  ProductId,
  pub batch_label: String,
  pub initial:     i64,
  pub remaining:   i64,
  /// `None` only for the implicit lot of a non-perishable product.
  pub expires_on:  Option<NaiveDate>,
  pub status:      LotStatus,
  /// Store-assigned creation order; breaks ties between equal expirations.
  pub sequence:    i64,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Lot {
  pub fn is_blocked(&self) -> bool { self.status == LotStatus::Blocked }

  pub fn is_expired_on(&self, today: NaiveDate) -> bool {
    self.expires_on.is_some_and(|d| d < today)
  }

  /// Blocked lots are excluded from the aggregate quantity.
  pub fn counts_toward_stock(&self) -> bool { !self.is_blocked() }

  /// Apply a signed correction, keeping `0 <= remaining <= initial`.
  pub fn apply_delta(&mut self, delta: i64, today: NaiveDate) -> Result<()> {
    if self.is_blocked() {
      return Err(Error::LotBlocked(self.lot_id));
    }
    let attempted = add_quantity(self.remaining, delta)?;
    if attempted < 0 {
      return Err(Error::NegativeRemaining {
        lot: self.lot_id,
        delta,
        remaining: attempted,
      });
    }
    if attempted > self.initial {
      return Err(Error::ExceedsInitial {
        lot: self.lot_id,
        initial: self.initial,
        attempted,
      });
    }
    self.remaining = attempted;
    self.status = LotStatus::settle(self.remaining, self.expires_on, today);
    Ok(())
  }

  /// Take `quantity` out of the lot as part of an allocation.
  pub fn withdraw(&mut self, quantity: i64, today: NaiveDate) -> Result<()> {
    if quantity <= 0 {
      return Err(Error::InvalidQuantity(quantity));
    }
    self.apply_delta(-quantity, today)
  }

  /// Grow the implicit lot of a non-perishable product by a new receipt.
  pub fn top_up(&mut self, quantity: i64, today: NaiveDate) -> Result<()> {
    if quantity <= 0 {
      return Err(Error::InvalidQuantity(quantity));
    }
    if self.is_blocked() {
      return Err(Error::LotBlocked(self.lot_id));
    }
    let initial = add_quantity(self.initial, quantity)?;
    let remaining = add_quantity(self.remaining, quantity)?;
    self.initial = initial;
    self.remaining = remaining;
    self.status = LotStatus::settle(self.remaining, self.expires_on, today);
    Ok(())
  }
}

/// Allocation order: expiration ascending with non-expiring lots last, then
/// creation order.
pub fn expiration_order(a: &Lot, b: &Lot) -> Ordering {
  match (a.expires_on, b.expires_on) {
    (Some(x), Some(y)) => x.cmp(&y),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
  .then(a.sequence.cmp(&b.sequence))
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::InventoryLedger::receive`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveStock {
  pub location_id: LocationId,
  pub product_id:  ProductId,
  pub batch_label: String,
  pub quantity:    i64,
  pub expires_on:  Option<NaiveDate>,
  #[serde(default)]
  pub note:        MovementNote,
}

/// Input to [`crate::store::InventoryLedger::adjust`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustLot {
  pub lot_id: LotId,
  /// Signed correction applied directly to the lot, bypassing allocation.
  pub delta:  i64,
  pub note:   MovementNote,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(s: &str) -> NaiveDate { s.parse().unwrap() }

  fn lot(remaining: i64, initial: i64, expires_on: Option<&str>, sequence: i64) -> Lot {
    Lot {
      lot_id: LotId::new(),
      tenant_id: TenantId::new(),
      location_id: LocationId(1),
      product_id: ProductId(1),
      batch_label: format!("B{sequence}"),
      initial,
      remaining,
      expires_on: expires_on.map(date),
      status: LotStatus::Active,
      sequence,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn withdrawing_everything_exhausts() {
    let mut l = lot(5, 5, Some("2024-03-01"), 1);
    l.withdraw(5, date("2024-01-01")).unwrap();
    assert_eq!(l.remaining, 0);
    assert_eq!(l.status, LotStatus::Exhausted);
  }

  #[test]
  fn negative_result_is_rejected_and_lot_untouched() {
    let mut l = lot(3, 5, Some("2024-03-01"), 1);
    let err = l.apply_delta(-4, date("2024-01-01")).unwrap_err();
    assert!(matches!(err, Error::NegativeRemaining { remaining: -1, .. }));
    assert_eq!(l.remaining, 3);
  }

  #[test]
  fn correction_cannot_exceed_initial() {
    let mut l = lot(3, 5, Some("2024-03-01"), 1);
    assert!(matches!(
      l.apply_delta(3, date("2024-01-01")),
      Err(Error::ExceedsInitial { attempted: 6, .. })
    ));
    l.apply_delta(2, date("2024-01-01")).unwrap();
    assert_eq!(l.remaining, 5);
  }

  #[test]
  fn restocking_an_exhausted_lot_past_expiry_marks_it_expired() {
    let mut l = lot(0, 5, Some("2024-01-10"), 1);
    l.status = LotStatus::Exhausted;
    l.apply_delta(2, date("2024-02-01")).unwrap();
    assert_eq!(l.status, LotStatus::Expired);
  }

  #[test]
  fn blocked_lots_reject_corrections() {
    let mut l = lot(3, 5, None, 1);
    l.status = LotStatus::Blocked;
    assert!(matches!(l.apply_delta(-1, date("2024-01-01")), Err(Error::LotBlocked(_))));
  }

  #[test]
  fn oversized_quantities_fail_without_touching_the_lot() {
    let mut l = lot(3, 5, None, 1);
    assert!(matches!(
      l.apply_delta(i64::MAX, date("2024-01-01")),
      Err(Error::QuantityOverflow { base: 3, .. })
    ));
    assert!(matches!(
      l.top_up(i64::MAX, date("2024-01-01")),
      Err(Error::QuantityOverflow { base: 5, .. })
    ));
    assert_eq!((l.remaining, l.initial), (3, 5));
  }

  #[test]
  fn ordering_puts_nulls_last_and_breaks_ties_by_sequence() {
    let mut lots = vec![
      lot(1, 1, None, 1),
      lot(1, 1, Some("2024-01-10"), 4),
      lot(1, 1, Some("2024-01-05"), 3),
      lot(1, 1, Some("2024-01-10"), 2),
    ];
    lots.sort_by(expiration_order);
    let seqs: Vec<_> = lots.iter().map(|l| l.sequence).collect();
    assert_eq!(seqs, vec![3, 2, 4, 1]);
  }
}
