//! The consistency enforcer.
//!
//! Each logical operation runs through [`operate`]: one `BEGIN IMMEDIATE`
//! transaction in which lots, the aggregate and the ledger change together,
//! tracked by an [`Operation`] that reports the phase a failure interrupted.
//! The movement records are appended last; any error before commit drops
//! the transaction and nothing is left behind.

use chrono::{DateTime, Utc};
use larder_core::{
  Error as CoreError,
  allocation::{Allocation, ExpiredLotPolicy, allocate},
  error::add_quantity,
  id::{LocationId, LotId, ProductId, TenantId},
  lot::{AdjustLot, Lot, LotStatus, ReceiveStock},
  movement::{MovementKind, MovementNote},
  operation::{Operation, OperationKind, Phase},
  store::{ConsumeStock, Consumption, Transfer, TransferStock},
  tenant::Product,
};
use rusqlite::{Connection, TransactionBehavior};

use crate::{
  Result,
  journal::Entry,
  scope::{TenantTx, transact},
};

/// Run one tracked write operation as a single immediate transaction.
pub fn operate<T>(
  conn: &mut Connection,
  tenant: TenantId,
  now: DateTime<Utc>,
  kind: OperationKind,
  f: impl FnOnce(&TenantTx<'_>, &mut Operation) -> Result<T>,
) -> Result<T> {
  let mut op = Operation::begin(kind, tenant);
  match transact(conn, TransactionBehavior::Immediate, tenant, now, |scoped| {
    f(scoped, &mut op)
  }) {
    Ok(value) => {
      // Already durable; a phase mismatch is only logged.
      if let Err(e) = op.advance(Phase::Committed) {
        tracing::error!(operation = %op.kind(), %tenant, error = %e, "committed out of phase");
      }
      Ok(value)
    }
    Err(e) => {
      op.abort(&e);
      Err(e)
    }
  }
}

fn positive(quantity: i64) -> Result<()> {
  if quantity <= 0 {
    return Err(CoreError::InvalidQuantity(quantity).into());
  }
  Ok(())
}

impl TenantTx<'_> {
  // ── Receive ───────────────────────────────────────────────────────────

  pub fn receive(&self, op: &mut Operation, input: ReceiveStock) -> Result<Lot> {
    positive(input.quantity)?;
    self.require_location(input.location_id)?;
    let product = self.require_product(input.product_id)?;
    match (product.perishable, input.expires_on) {
      (true, None) => return Err(CoreError::MissingExpiration(product.product_id).into()),
      (false, Some(_)) => {
        return Err(CoreError::UnexpectedExpiration(product.product_id).into());
      }
      _ => {}
    }
    op.advance(Phase::Validated)?;

    let before = self.projected_quantity(input.location_id, input.product_id)?;
    add_quantity(before, input.quantity)?;
    let lot = self.stock_lot(
      &product,
      input.location_id,
      input.batch_label,
      input.quantity,
      input.expires_on,
    )?;
    self.refresh_aggregate(input.location_id, input.product_id)?;
    op.advance(Phase::Applied)?;

    self.append_movement(Entry {
      kind:     MovementKind::Receipt,
      location: input.location_id,
      product:  input.product_id,
      lot:      lot.lot_id,
      before,
      delta:    input.quantity,
      note:     &input.note,
    })?;
    Ok(lot)
  }

  /// Put `quantity` into a lot at `location`: a fresh lot for perishables,
  /// the implicit lot (created on first use) otherwise.
  fn stock_lot(
    &self,
    product: &Product,
    location: LocationId,
    batch_label: String,
    quantity: i64,
    expires_on: Option<chrono::NaiveDate>,
  ) -> Result<Lot> {
    if !product.perishable {
      if let Some(mut lot) = self.implicit_lot(location, product.product_id)? {
        let expected = lot.remaining;
        lot.top_up(quantity, self.today())?;
        self.update_lot(&mut lot, expected)?;
        return Ok(lot);
      }
    }

    self.insert_lot(Lot {
      lot_id: LotId::new(),
      tenant_id: self.tenant(),
      location_id: location,
      product_id: product.product_id,
      batch_label,
      initial: quantity,
      remaining: quantity,
      expires_on,
      status: LotStatus::settle(quantity, expires_on, self.today()),
      sequence: 0,
      created_at: self.now(),
      updated_at: self.now(),
    })
  }

  // ── Consume ───────────────────────────────────────────────────────────

  pub fn consume(
    &self,
    op: &mut Operation,
    input: ConsumeStock,
    policy: ExpiredLotPolicy,
  ) -> Result<Consumption> {
    positive(input.quantity)?;
    self.require_location(input.location_id)?;
    self.require_product(input.product_id)?;
    op.advance(Phase::Validated)?;

    let before = self.projected_quantity(input.location_id, input.product_id)?;
    let drawn = self.draw(input.location_id, input.product_id, input.quantity, policy)?;
    let aggregate = self.refresh_aggregate(input.location_id, input.product_id)?;
    op.advance(Phase::Applied)?;

    let mut running = before;
    let mut movements = Vec::with_capacity(drawn.len());
    for (allocation, _) in &drawn {
      let record = self.append_movement(Entry {
        kind:     MovementKind::Consumption,
        location: input.location_id,
        product:  input.product_id,
        lot:      allocation.lot_id,
        before:   running,
        delta:    -allocation.taken,
        note:     &input.note,
      })?;
      running = record.quantity_after;
      movements.push(record);
    }

    Ok(Consumption {
      allocations: drawn.into_iter().map(|(a, _)| a).collect(),
      aggregate,
      movements,
    })
  }

  /// Allocate `quantity` across the pair's lots and withdraw it. Returns
  /// each allocation with the lot as it now stands.
  fn draw(
    &self,
    location: LocationId,
    product: ProductId,
    quantity: i64,
    policy: ExpiredLotPolicy,
  ) -> Result<Vec<(Allocation, Lot)>> {
    let lots = self.open_lots(location, product)?;
    let allocations = allocate(&lots, quantity, self.today(), policy)?;

    allocations
      .into_iter()
      .map(|allocation| -> Result<(Allocation, Lot)> {
        let mut lot = lots
          .iter()
          .find(|l| l.lot_id == allocation.lot_id)
          .cloned()
          .ok_or(CoreError::LotNotFound(allocation.lot_id))?;
        let expected = lot.remaining;
        lot.withdraw(allocation.taken, self.today())?;
        self.update_lot(&mut lot, expected)?;
        Ok((allocation, lot))
      })
      .collect()
  }

  // ── Adjust ────────────────────────────────────────────────────────────

  pub fn adjust(&self, op: &mut Operation, input: AdjustLot) -> Result<Lot> {
    if input.delta == 0 {
      return Err(CoreError::InvalidQuantity(0).into());
    }
    let mut lot = self.require_lot(input.lot_id)?;
    let expected = lot.remaining;
    lot.apply_delta(input.delta, self.today())?;
    op.advance(Phase::Validated)?;

    let before = self.projected_quantity(lot.location_id, lot.product_id)?;
    self.update_lot(&mut lot, expected)?;
    self.refresh_aggregate(lot.location_id, lot.product_id)?;
    op.advance(Phase::Applied)?;

    self.append_movement(Entry {
      kind:     MovementKind::Adjustment,
      location: lot.location_id,
      product:  lot.product_id,
      lot:      lot.lot_id,
      before,
      delta:    input.delta,
      note:     &input.note,
    })?;
    Ok(lot)
  }

  // ── Block / unblock ───────────────────────────────────────────────────

  /// Withhold a lot from allocation and from the aggregate. Its remaining
  /// quantity leaves the aggregate through an `ajuste` record.
  pub fn block_lot(&self, op: &mut Operation, id: LotId, note: &MovementNote) -> Result<Lot> {
    let mut lot = self.require_lot(id)?;
    if lot.is_blocked() {
      return Err(CoreError::LotBlocked(id).into());
    }
    op.advance(Phase::Validated)?;

    let delta = -lot.remaining;
    self.restatus(op, &mut lot, LotStatus::Blocked, delta, note)?;
    Ok(lot)
  }

  /// Return a blocked lot to circulation, re-deriving its status.
  pub fn unblock_lot(&self, op: &mut Operation, id: LotId, note: &MovementNote) -> Result<Lot> {
    let mut lot = self.require_lot(id)?;
    if !lot.is_blocked() {
      return Err(CoreError::LotNotBlocked(id).into());
    }
    op.advance(Phase::Validated)?;

    let status = LotStatus::settle(lot.remaining, lot.expires_on, self.today());
    let delta = lot.remaining;
    self.restatus(op, &mut lot, status, delta, note)?;
    Ok(lot)
  }

  fn restatus(
    &self,
    op: &mut Operation,
    lot: &mut Lot,
    status: LotStatus,
    delta: i64,
    note: &MovementNote,
  ) -> Result<()> {
    let before = self.projected_quantity(lot.location_id, lot.product_id)?;
    let expected = lot.remaining;
    lot.status = status;
    self.update_lot(lot, expected)?;
    self.refresh_aggregate(lot.location_id, lot.product_id)?;
    op.advance(Phase::Applied)?;

    if delta != 0 {
      self.append_movement(Entry {
        kind: MovementKind::Adjustment,
        location: lot.location_id,
        product: lot.product_id,
        lot: lot.lot_id,
        before,
        delta,
        note,
      })?;
    }
    Ok(())
  }

  // ── Transfer ──────────────────────────────────────────────────────────

  pub fn transfer(
    &self,
    op: &mut Operation,
    input: TransferStock,
    policy: ExpiredLotPolicy,
  ) -> Result<Transfer> {
    if input.from == input.to {
      return Err(CoreError::SameLocation(input.from).into());
    }
    positive(input.quantity)?;
    self.require_location(input.from)?;
    self.require_location(input.to)?;
    let product = self.require_product(input.product_id)?;
    op.advance(Phase::Validated)?;

    let source_before = self.projected_quantity(input.from, input.product_id)?;
    let destination_before = self.projected_quantity(input.to, input.product_id)?;
    add_quantity(destination_before, input.quantity)?;

    let drawn = self.draw(input.from, input.product_id, input.quantity, policy)?;
    let mut received = Vec::with_capacity(drawn.len());
    for (allocation, source_lot) in &drawn {
      let lot = self.stock_lot(
        &product,
        input.to,
        source_lot.batch_label.clone(),
        allocation.taken,
        source_lot.expires_on,
      )?;
      received.push((lot, allocation.taken));
    }
    let source = self.refresh_aggregate(input.from, input.product_id)?;
    let destination = self.refresh_aggregate(input.to, input.product_id)?;
    op.advance(Phase::Applied)?;

    let mut running = source_before;
    for (allocation, _) in &drawn {
      running = self
        .append_movement(Entry {
          kind:     MovementKind::Transfer,
          location: input.from,
          product:  input.product_id,
          lot:      allocation.lot_id,
          before:   running,
          delta:    -allocation.taken,
          note:     &input.note,
        })?
        .quantity_after;
    }
    let mut running = destination_before;
    for (lot, taken) in &received {
      running = self
        .append_movement(Entry {
          kind:     MovementKind::Transfer,
          location: input.to,
          product:  input.product_id,
          lot:      lot.lot_id,
          before:   running,
          delta:    *taken,
          note:     &input.note,
        })?
        .quantity_after;
    }

    Ok(Transfer {
      allocations: drawn.into_iter().map(|(a, _)| a).collect(),
      received: received.into_iter().map(|(lot, _)| lot).collect(),
      source,
      destination,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;
  use crate::{
    encode::{encode_dt, encode_uuid},
    schema::SCHEMA,
  };

  fn connection_with_tenant(tenant: TenantId, now: DateTime<Utc>) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn
      .execute(
        "INSERT INTO tenants (tenant_id, name, status, created_at)
         VALUES (?1, 'Rede', 'active', ?2)",
        rusqlite::params![encode_uuid(*tenant.as_uuid()), encode_dt(now)],
      )
      .unwrap();
    conn
  }

  #[test]
  fn committed_work_is_reported_even_when_phases_were_skipped() {
    let tenant = TenantId::new();
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut conn = connection_with_tenant(tenant, now);

    let value = operate(&mut conn, tenant, now, OperationKind::Adjust, |_, _| Ok(7)).unwrap();
    assert_eq!(value, 7);
  }

  #[test]
  fn failures_roll_back_and_surface() {
    let tenant = TenantId::new();
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut conn = connection_with_tenant(tenant, now);

    let err = operate(&mut conn, tenant, now, OperationKind::Receive, |tx, op| -> Result<()> {
      tx.insert_location(LocationId(1), "Escola".into())?;
      op.advance(Phase::Validated)?;
      Err(CoreError::InvalidQuantity(0).into())
    })
    .unwrap_err();
    assert!(matches!(err.as_core(), Some(CoreError::InvalidQuantity(0))));

    let locations: i64 =
      conn.query_row("SELECT COUNT(*) FROM locations", [], |r| r.get(0)).unwrap();
    assert_eq!(locations, 0);
  }
}
