//! Movement records: the append-only ledger of quantity changes.
//!
//! Every record carries the aggregate quantity before and after it, so the
//! ordered sequence for a (location, product) pair replays to the current
//! aggregate value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  id::{LocationId, LotId, MovementId, ProductId, TenantId},
};

/// The ledger's event types, stored under their Portuguese names.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
pub enum MovementKind {
  #[serde(rename = "entrada")]
  #[strum(serialize = "entrada")]
  Receipt,
  #[serde(rename = "saida")]
  #[strum(serialize = "saida")]
  Consumption,
  #[serde(rename = "ajuste")]
  #[strum(serialize = "ajuste")]
  Adjustment,
  #[serde(rename = "transferencia")]
  #[strum(serialize = "transferencia")]
  Transfer,
}

/// Free-form provenance attached to a movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementNote {
  pub reason:   Option<String>,
  /// External document reference (invoice, delivery note, count sheet).
  pub document: Option<String>,
  pub actor:    Option<String>,
}

impl MovementNote {
  pub fn reason(reason: impl Into<String>) -> Self {
    Self { reason: Some(reason.into()), ..Self::default() }
  }
}

/// An immutable ledger entry. Once written, no field is ever updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRecord {
  pub movement_id:     MovementId,
  /// Store-assigned, strictly increasing append order.
  pub sequence:        i64,
  pub tenant_id:       TenantId,
  pub location_id:     LocationId,
  pub product_id:      ProductId,
  pub kind:            MovementKind,
  pub lot_id:          LotId,
  pub quantity_before: i64,
  pub delta:           i64,
  pub quantity_after:  i64,
  pub note:            MovementNote,
  pub recorded_at:     DateTime<Utc>,
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Inclusive time bounds on `recorded_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
  pub from: Option<DateTime<Utc>>,
  pub to:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
  pub location_id: LocationId,
  pub product_id:  ProductId,
  #[serde(default)]
  pub window:      HistoryWindow,
}

impl HistoryQuery {
  pub fn new(location_id: LocationId, product_id: ProductId) -> Self {
    Self { location_id, product_id, window: HistoryWindow::default() }
  }
}

// ─── Replay ──────────────────────────────────────────────────────────────────

/// Replay records oldest-first from zero and return the resulting quantity.
///
/// Fails with [`Error::LedgerChainBroken`] as soon as a record's
/// `quantity_before` or `quantity_after` disagrees with the running total.
pub fn replay<'a, I>(records: I) -> Result<i64>
where
  I: IntoIterator<Item = &'a MovementRecord>,
{
  let mut total = 0_i64;
  for record in records {
    if record.quantity_before != total {
      return Err(Error::LedgerChainBroken {
        sequence: record.sequence,
        expected: total,
        found:    record.quantity_before,
      });
    }
    total += record.delta;
    if record.quantity_after != total {
      return Err(Error::LedgerChainBroken {
        sequence: record.sequence,
        expected: total,
        found:    record.quantity_after,
      });
    }
  }
  Ok(total)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(sequence: i64, before: i64, delta: i64) -> MovementRecord {
    MovementRecord {
      movement_id: MovementId::new(),
      sequence,
      tenant_id: TenantId::new(),
      location_id: LocationId(1),
      product_id: ProductId(1),
      kind: if delta > 0 { MovementKind::Receipt } else { MovementKind::Consumption },
      lot_id: LotId::new(),
      quantity_before: before,
      delta,
      quantity_after: before + delta,
      note: MovementNote::default(),
      recorded_at: Utc::now(),
    }
  }

  #[test]
  fn replay_sums_a_consistent_chain() {
    let records = [record(1, 0, 10), record(2, 10, -3), record(3, 7, 5)];
    assert_eq!(replay(&records).unwrap(), 12);
  }

  #[test]
  fn replay_of_nothing_is_zero() {
    assert_eq!(replay(std::iter::empty()).unwrap(), 0);
  }

  #[test]
  fn replay_detects_a_gap() {
    let records = [record(1, 0, 10), record(2, 9, -3)];
    assert!(matches!(
      replay(&records),
      Err(Error::LedgerChainBroken { sequence: 2, expected: 10, found: 9 })
    ));
  }

  #[test]
  fn kinds_use_ledger_names() {
    assert_eq!(MovementKind::Consumption.as_ref(), "saida");
    assert_eq!("transferencia".parse::<MovementKind>().unwrap(), MovementKind::Transfer);
    assert_eq!(serde_json::to_string(&MovementKind::Receipt).unwrap(), "\"entrada\"");
  }
}
