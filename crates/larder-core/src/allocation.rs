//! The allocation engine: which lots a withdrawal draws from, and how much.
//!
//! Lots are visited soonest-expiring first (non-expiring lots last, creation
//! order within an expiration date) and each contributes
//! `min(remaining, still_needed)`. Urgency is a consequence of that ordering
//! alone; there are no named priority bands here.
//!
//! The engine is pure. It never mutates the lots it is given, so a failed
//! allocation leaves nothing to undo.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  error::add_quantity,
  id::LotId,
  lot::{Lot, LotStatus, expiration_order},
};

/// Whether lots past their expiration date may still be drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredLotPolicy {
  /// Expired lots are never allocated.
  #[default]
  Block,
  /// Expired lots are allocated first, ahead of everything still in date.
  SellOff,
}

/// One lot's contribution to a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
  pub lot_id:          LotId,
  pub taken:           i64,
  pub remaining_after: i64,
}

/// Whether `lot` may be drawn from on `today` under `policy`.
pub fn is_eligible(lot: &Lot, today: NaiveDate, policy: ExpiredLotPolicy) -> bool {
  if lot.remaining <= 0 {
    return false;
  }
  match lot.status {
    LotStatus::Blocked | LotStatus::Exhausted => false,
    LotStatus::Active | LotStatus::Expired => {
      policy == ExpiredLotPolicy::SellOff || !lot.is_expired_on(today)
    }
  }
}

/// Select lots and partial quantities that together satisfy `requested`.
///
/// Fails with [`Error::InsufficientStock`] carrying the shortfall when the
/// eligible lots cannot cover the request; no partial allocation is returned.
pub fn allocate(
  lots: &[Lot],
  requested: i64,
  today: NaiveDate,
  policy: ExpiredLotPolicy,
) -> Result<Vec<Allocation>> {
  if requested <= 0 {
    return Err(Error::InvalidQuantity(requested));
  }

  let mut eligible: Vec<&Lot> =
    lots.iter().filter(|lot| is_eligible(lot, today, policy)).collect();
  eligible.sort_by(|a, b| expiration_order(a, b));

  let available = eligible.iter().try_fold(0, |sum, lot| add_quantity(sum, lot.remaining))?;
  if available < requested {
    return Err(Error::InsufficientStock {
      requested,
      available,
      shortfall: requested - available,
    });
  }

  let mut still_needed = requested;
  let mut allocations = Vec::new();
  for lot in eligible {
    if still_needed == 0 {
      break;
    }
    let taken = lot.remaining.min(still_needed);
    still_needed -= taken;
    allocations.push(Allocation {
      lot_id: lot.lot_id,
      taken,
      remaining_after: lot.remaining - taken,
    });
  }

  Ok(allocations)
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use proptest::prelude::*;

  use super::*;
  use crate::id::{LocationId, ProductId, TenantId};

  fn date(s: &str) -> NaiveDate { s.parse().unwrap() }

  fn lot(remaining: i64, expires_on: Option<&str>, sequence: i64) -> Lot {
    Lot {
      lot_id: LotId::new(),
      tenant_id: TenantId::new(),
      location_id: LocationId(1),
      product_id: ProductId(1),
      batch_label: format!("B{sequence}"),
      initial: remaining,
      remaining,
      expires_on: expires_on.map(date),
      status: LotStatus::Active,
      sequence,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn today() -> NaiveDate { date("2024-01-01") }

  #[test]
  fn lots_too_large_to_total_are_an_input_error() {
    let lots = vec![lot(i64::MAX, Some("2024-01-10"), 1), lot(1, Some("2024-01-12"), 2)];
    assert!(matches!(
      allocate(&lots, 5, today(), ExpiredLotPolicy::Block),
      Err(Error::QuantityOverflow { .. })
    ));
  }

  #[test]
  fn draws_soonest_expiring_first() {
    let lots = vec![
      lot(5, Some("2024-01-10"), 1),
      lot(3, Some("2024-01-05"), 2),
      lot(10, Some("2024-02-01"), 3),
    ];
    let result = allocate(&lots, 6, today(), ExpiredLotPolicy::Block).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result[0].lot_id, lots[1].lot_id);
    assert_eq!(result[0].taken, 3);
    assert_eq!(result[0].remaining_after, 0);
    assert_eq!(result[1].lot_id, lots[0].lot_id);
    assert_eq!(result[1].taken, 3);
    assert_eq!(result[1].remaining_after, 2);
  }

  #[test]
  fn shortfall_is_reported_without_partial_allocation() {
    let lots = vec![
      lot(5, Some("2024-01-10"), 1),
      lot(3, Some("2024-01-05"), 2),
      lot(10, Some("2024-02-01"), 3),
    ];
    let err = allocate(&lots, 50, today(), ExpiredLotPolicy::Block).unwrap_err();
    assert!(matches!(
      err,
      Error::InsufficientStock { requested: 50, available: 18, shortfall: 32 }
    ));
  }

  #[test]
  fn equal_expirations_fall_back_to_creation_order() {
    let lots = vec![lot(4, Some("2024-01-10"), 9), lot(4, Some("2024-01-10"), 2)];
    let result = allocate(&lots, 5, today(), ExpiredLotPolicy::Block).unwrap();
    assert_eq!(result[0].lot_id, lots[1].lot_id);
    assert_eq!(result[0].taken, 4);
    assert_eq!(result[1].lot_id, lots[0].lot_id);
    assert_eq!(result[1].taken, 1);
  }

  #[test]
  fn blocked_lots_are_skipped_even_when_soonest() {
    let mut blocked = lot(10, Some("2024-01-02"), 1);
    blocked.status = LotStatus::Blocked;
    let lots = vec![blocked, lot(4, Some("2024-06-01"), 2)];

    let result = allocate(&lots, 4, today(), ExpiredLotPolicy::Block).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].lot_id, lots[1].lot_id);

    assert!(matches!(
      allocate(&lots, 5, today(), ExpiredLotPolicy::Block),
      Err(Error::InsufficientStock { shortfall: 1, .. })
    ));
  }

  #[test]
  fn non_expiring_lots_come_last() {
    let lots = vec![lot(5, None, 1), lot(5, Some("2030-01-01"), 2)];
    let result = allocate(&lots, 6, today(), ExpiredLotPolicy::Block).unwrap();
    assert_eq!(result[0].lot_id, lots[1].lot_id);
    assert_eq!(result[1].lot_id, lots[0].lot_id);
    assert_eq!(result[1].taken, 1);
  }

  #[test]
  fn expired_lots_follow_the_policy() {
    let lots = vec![lot(3, Some("2023-12-20"), 1), lot(3, Some("2024-03-01"), 2)];

    let blocked = allocate(&lots, 4, today(), ExpiredLotPolicy::Block).unwrap_err();
    assert_eq!(blocked.shortfall(), Some(1));

    let sold_off = allocate(&lots, 4, today(), ExpiredLotPolicy::SellOff).unwrap();
    assert_eq!(sold_off[0].lot_id, lots[0].lot_id);
    assert_eq!(sold_off[0].taken, 3);
    assert_eq!(sold_off[1].taken, 1);
  }

  #[test]
  fn non_positive_requests_are_invalid() {
    let lots = vec![lot(3, None, 1)];
    assert!(matches!(
      allocate(&lots, 0, today(), ExpiredLotPolicy::Block),
      Err(Error::InvalidQuantity(0))
    ));
  }

  proptest! {
    /// Property: a successful allocation takes exactly the requested amount,
    /// never more than a lot holds, and a failed one reports the exact gap.
    #[test]
    fn allocation_is_exact_or_reports_shortfall(
      quantities in prop::collection::vec((1i64..50, 0u32..60), 0..8),
      requested in 1i64..300,
    ) {
      let lots: Vec<Lot> = quantities
        .iter()
        .enumerate()
        .map(|(i, (q, days))| {
          let mut l = lot(*q, None, i as i64);
          l.expires_on = Some(today() + chrono::Days::new(u64::from(*days)));
          l
        })
        .collect();
      let total: i64 = lots.iter().map(|l| l.remaining).sum();

      match allocate(&lots, requested, today(), ExpiredLotPolicy::Block) {
        Ok(allocs) => {
          prop_assert!(total >= requested);
          prop_assert_eq!(allocs.iter().map(|a| a.taken).sum::<i64>(), requested);
          for a in &allocs {
            let source = lots.iter().find(|l| l.lot_id == a.lot_id).unwrap();
            prop_assert!(a.taken > 0 && a.taken <= source.remaining);
            prop_assert_eq!(a.remaining_after, source.remaining - a.taken);
          }
        }
        Err(err) => {
          prop_assert!(total < requested);
          prop_assert_eq!(err.shortfall(), Some(requested - total));
        }
      }
    }
  }
}
