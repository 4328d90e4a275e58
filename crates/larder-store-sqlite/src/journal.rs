//! The movement ledger: append, page through, and audit.

use larder_core::{
  error::add_quantity,
  id::{LocationId, LotId, MovementId, ProductId},
  movement::{HistoryQuery, MovementKind, MovementNote, MovementRecord, replay},
  stock::{ReconciliationReport, StockDrift},
};

use crate::{
  Result,
  encode::{MOVEMENT_COLUMNS, RawMovement, encode_dt, encode_uuid},
  scope::TenantTx,
};

/// What an enforcer step hands the ledger. `quantity_after` is derived.
pub struct Entry<'n> {
  pub kind:     MovementKind,
  pub location: LocationId,
  pub product:  ProductId,
  pub lot:      LotId,
  pub before:   i64,
  pub delta:    i64,
  pub note:     &'n MovementNote,
}

impl TenantTx<'_> {
  pub fn append_movement(&self, entry: Entry<'_>) -> Result<MovementRecord> {
    let quantity_after = add_quantity(entry.before, entry.delta)?;
    let mut record = MovementRecord {
      movement_id:     MovementId::new(),
      sequence:        0,
      tenant_id:       self.tenant(),
      location_id:     entry.location,
      product_id:      entry.product,
      kind:            entry.kind,
      lot_id:          entry.lot,
      quantity_before: entry.before,
      delta:           entry.delta,
      quantity_after,
      note:            entry.note.clone(),
      recorded_at:     self.now(),
    };

    self.conn().execute(
      "INSERT INTO movements (
         movement_id, tenant_id, location_id, product_id, kind, lot_id,
         quantity_before, delta, quantity_after, reason, document, actor, recorded_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
      rusqlite::params![
        encode_uuid(*record.movement_id.as_uuid()),
        self.key(),
        record.location_id.get(),
        record.product_id.get(),
        record.kind.as_ref(),
        encode_uuid(*record.lot_id.as_uuid()),
        record.quantity_before,
        record.delta,
        record.quantity_after,
        record.note.reason,
        record.note.document,
        record.note.actor,
        encode_dt(record.recorded_at),
      ],
    )?;
    record.sequence = self.conn().last_insert_rowid();
    Ok(record)
  }

  /// One newest-first page, keyed on `movement_seq`.
  pub fn history_page(
    &self,
    query: &HistoryQuery,
    before_sequence: Option<i64>,
    limit: usize,
  ) -> Result<Vec<MovementRecord>> {
    let mut stmt = self.conn().prepare(&format!(
      "SELECT {MOVEMENT_COLUMNS} FROM movements
       WHERE tenant_id = ?1 AND location_id = ?2 AND product_id = ?3
         AND (?4 IS NULL OR movement_seq < ?4)
         AND (?5 IS NULL OR recorded_at >= ?5)
         AND (?6 IS NULL OR recorded_at <= ?6)
       ORDER BY movement_seq DESC
       LIMIT ?7"
    ))?;
    let raws = stmt
      .query_map(
        rusqlite::params![
          self.key(),
          query.location_id.get(),
          query.product_id.get(),
          before_sequence,
          query.window.from.map(encode_dt),
          query.window.to.map(encode_dt),
          i64::try_from(limit).unwrap_or(i64::MAX),
        ],
        RawMovement::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawMovement::into_record).collect()
  }

  /// The pair's full ledger, oldest first.
  pub fn movements_oldest_first(
    &self,
    location: LocationId,
    product: ProductId,
  ) -> Result<Vec<MovementRecord>> {
    let mut stmt = self.conn().prepare(&format!(
      "SELECT {MOVEMENT_COLUMNS} FROM movements
       WHERE tenant_id = ?1 AND location_id = ?2 AND product_id = ?3
       ORDER BY movement_seq"
    ))?;
    let raws = stmt
      .query_map(
        rusqlite::params![self.key(), location.get(), product.get()],
        RawMovement::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawMovement::into_record).collect()
  }

  /// Check every stored aggregate against its lots and its replayed ledger.
  pub fn reconcile(&self) -> Result<ReconciliationReport> {
    let mut report = ReconciliationReport::default();
    for stock in self.list_stock()? {
      report.checked += 1;
      let from_lots = self.lot_sum(stock.location_id, stock.product_id)?;
      let records = self.movements_oldest_first(stock.location_id, stock.product_id)?;
      let from_ledger = match replay(&records) {
        Ok(total) => Some(total),
        Err(e) => {
          tracing::warn!(
            tenant = %self.tenant(),
            location = %stock.location_id,
            product = %stock.product_id,
            error = %e,
            "ledger chain cannot be replayed"
          );
          None
        }
      };

      if stock.quantity != from_lots || from_ledger != Some(stock.quantity) {
        tracing::warn!(
          tenant = %self.tenant(),
          location = %stock.location_id,
          product = %stock.product_id,
          stored = stock.quantity,
          from_lots,
          from_ledger = ?from_ledger,
          "aggregate drift"
        );
        report.drifts.push(StockDrift {
          location_id: stock.location_id,
          product_id: stock.product_id,
          stored: stock.quantity,
          from_lots,
          from_ledger,
        });
      }
    }
    Ok(report)
  }
}
