//! Lot storage: the rows the allocation engine reads and the enforcer writes.

use larder_core::{
  Error as CoreError,
  id::{LocationId, LotId, ProductId},
  lot::{Lot, LotStatus},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Result,
  encode::{LOT_COLUMNS, RawLot, encode_date, encode_dt, encode_uuid},
  scope::TenantTx,
};

const ALLOCATION_ORDER: &str = "ORDER BY expires_on IS NULL, expires_on, lot_seq";

impl TenantTx<'_> {
  pub fn find_lot(&self, id: LotId) -> Result<Option<Lot>> {
    self
      .conn()
      .query_row(
        &format!("SELECT {LOT_COLUMNS} FROM lots WHERE tenant_id = ?1 AND lot_id = ?2"),
        rusqlite::params![self.key(), encode_uuid(*id.as_uuid())],
        RawLot::from_row,
      )
      .optional()?
      .map(RawLot::into_lot)
      .transpose()
  }

  pub fn require_lot(&self, id: LotId) -> Result<Lot> {
    Ok(self.find_lot(id)?.ok_or(CoreError::LotNotFound(id))?)
  }

  /// Lots that still hold stock and are not blocked, in allocation order.
  /// Whether expired ones may be drawn from is the allocator's decision.
  pub fn open_lots(&self, location: LocationId, product: ProductId) -> Result<Vec<Lot>> {
    self.select_lots(
      &format!(
        "SELECT {LOT_COLUMNS} FROM lots
         WHERE tenant_id = ?1 AND location_id = ?2 AND product_id = ?3
           AND status IN ('active', 'expired') AND remaining > 0
         {ALLOCATION_ORDER}"
      ),
      rusqlite::params![self.key(), location.get(), product.get()],
    )
  }

  /// Lots shown to callers. A lot whose date has passed counts as expired
  /// even before the sweep has flagged it.
  pub fn listed_lots(
    &self,
    location: LocationId,
    product: ProductId,
    include_expired: bool,
  ) -> Result<Vec<Lot>> {
    if include_expired {
      return self.open_lots(location, product);
    }
    self.select_lots(
      &format!(
        "SELECT {LOT_COLUMNS} FROM lots
         WHERE tenant_id = ?1 AND location_id = ?2 AND product_id = ?3
           AND status = 'active' AND remaining > 0
           AND (expires_on IS NULL OR expires_on >= ?4)
         {ALLOCATION_ORDER}"
      ),
      rusqlite::params![self.key(), location.get(), product.get(), encode_date(self.today())],
    )
  }

  /// The non-expiring lot a non-perishable product's receipts go into at
  /// `location`. Blocked lots are passed over, so a receipt while the
  /// implicit lot is withheld opens a fresh one instead of failing.
  pub fn implicit_lot(&self, location: LocationId, product: ProductId) -> Result<Option<Lot>> {
    self
      .conn()
      .query_row(
        &format!(
          "SELECT {LOT_COLUMNS} FROM lots
           WHERE tenant_id = ?1 AND location_id = ?2 AND product_id = ?3
             AND expires_on IS NULL AND status != 'blocked'
           ORDER BY lot_seq LIMIT 1"
        ),
        rusqlite::params![self.key(), location.get(), product.get()],
        RawLot::from_row,
      )
      .optional()?
      .map(RawLot::into_lot)
      .transpose()
  }

  /// Insert a new lot and return it with its store-assigned sequence.
  pub fn insert_lot(&self, mut lot: Lot) -> Result<Lot> {
    self.conn().execute(
      "INSERT INTO lots (
         lot_id, tenant_id, location_id, product_id, batch_label,
         initial, remaining, expires_on, status, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
      rusqlite::params![
        encode_uuid(*lot.lot_id.as_uuid()),
        self.key(),
        lot.location_id.get(),
        lot.product_id.get(),
        lot.batch_label,
        lot.initial,
        lot.remaining,
        lot.expires_on.map(encode_date),
        lot.status.as_ref(),
        encode_dt(lot.created_at),
        encode_dt(lot.updated_at),
      ],
    )?;
    lot.sequence = self.conn().last_insert_rowid();
    Ok(lot)
  }

  /// Persist `lot`'s quantities and status, provided its stored `remaining`
  /// is still `expected_remaining`. Zero affected rows means another writer
  /// got there first.
  pub fn update_lot(&self, lot: &mut Lot, expected_remaining: i64) -> Result<()> {
    lot.updated_at = self.now();
    let changed = self.conn().execute(
      "UPDATE lots
       SET initial = ?1, remaining = ?2, status = ?3, updated_at = ?4
       WHERE tenant_id = ?5 AND lot_id = ?6 AND remaining = ?7",
      rusqlite::params![
        lot.initial,
        lot.remaining,
        lot.status.as_ref(),
        encode_dt(lot.updated_at),
        self.key(),
        encode_uuid(*lot.lot_id.as_uuid()),
        expected_remaining,
      ],
    )?;
    if changed == 0 {
      return Err(CoreError::TransactionConflict(lot.lot_id).into());
    }
    Ok(())
  }

  /// Flag active lots past their date as expired. Blocked and exhausted
  /// lots keep their status.
  pub fn sweep_expired(&self) -> Result<u64> {
    let changed = self.conn().execute(
      "UPDATE lots SET status = ?1, updated_at = ?2
       WHERE tenant_id = ?3 AND status = ?4 AND remaining > 0
         AND expires_on IS NOT NULL AND expires_on < ?5",
      rusqlite::params![
        LotStatus::Expired.as_ref(),
        encode_dt(self.now()),
        self.key(),
        LotStatus::Active.as_ref(),
        encode_date(self.today()),
      ],
    )?;
    Ok(changed as u64)
  }

  fn select_lots(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Lot>> {
    let mut stmt = self.conn().prepare(sql)?;
    let raws = stmt
      .query_map(params, RawLot::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawLot::into_lot).collect()
  }
}
