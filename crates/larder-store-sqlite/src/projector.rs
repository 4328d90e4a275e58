//! The aggregate stock projector.
//!
//! `stock.quantity` is only ever written by [`TenantTx::refresh_aggregate`],
//! which recomputes it from the pair's lots inside the caller's transaction.

use larder_core::{
  id::{LocationId, ProductId},
  stock::{AggregateStock, StockBand, Thresholds},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Result,
  encode::{RawStock, STOCK_COLUMNS, encode_dt},
  scope::TenantTx,
};

impl TenantTx<'_> {
  /// `Σ remaining` over the pair's non-blocked lots.
  pub fn lot_sum(&self, location: LocationId, product: ProductId) -> Result<i64> {
    Ok(self.conn().query_row(
      "SELECT COALESCE(SUM(remaining), 0) FROM lots
       WHERE tenant_id = ?1 AND location_id = ?2 AND product_id = ?3
         AND status != 'blocked'",
      rusqlite::params![self.key(), location.get(), product.get()],
      |r| r.get(0),
    )?)
  }

  pub fn find_stock(
    &self,
    location: LocationId,
    product: ProductId,
  ) -> Result<Option<AggregateStock>> {
    self
      .conn()
      .query_row(
        &format!(
          "SELECT {STOCK_COLUMNS} FROM stock
           WHERE tenant_id = ?1 AND location_id = ?2 AND product_id = ?3"
        ),
        rusqlite::params![self.key(), location.get(), product.get()],
        RawStock::from_row,
      )
      .optional()?
      .map(RawStock::into_stock)
      .transpose()
  }

  pub fn list_stock(&self) -> Result<Vec<AggregateStock>> {
    let mut stmt = self.conn().prepare(&format!(
      "SELECT {STOCK_COLUMNS} FROM stock WHERE tenant_id = ?1
       ORDER BY location_id, product_id"
    ))?;
    let raws = stmt
      .query_map(rusqlite::params![self.key()], RawStock::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawStock::into_stock).collect()
  }

  /// The pair's quantity before a mutation, as the ledger chain expects it.
  ///
  /// The lots are authoritative. A stored aggregate that disagrees with them
  /// is logged and healed by the next [`Self::refresh_aggregate`].
  pub fn projected_quantity(&self, location: LocationId, product: ProductId) -> Result<i64> {
    let from_lots = self.lot_sum(location, product)?;
    let stored = self.find_stock(location, product)?.map(|s| s.quantity);
    if stored.is_some_and(|q| q != from_lots) {
      tracing::warn!(
        tenant = %self.tenant(),
        location = %location,
        product = %product,
        stored = stored.unwrap_or_default(),
        from_lots,
        "aggregate drift detected; recomputing from lots"
      );
    }
    Ok(from_lots)
  }

  /// Recompute the pair's aggregate from its lots and store it, creating
  /// the row on first use.
  pub fn refresh_aggregate(
    &self,
    location: LocationId,
    product: ProductId,
  ) -> Result<AggregateStock> {
    let thresholds = self
      .find_stock(location, product)?
      .map(|s| s.thresholds)
      .unwrap_or_default();
    self.write_aggregate(location, product, thresholds)
  }

  /// Replace the pair's thresholds and re-derive its band. The aggregate
  /// must already exist.
  pub fn set_thresholds(
    &self,
    location: LocationId,
    product: ProductId,
    thresholds: Thresholds,
  ) -> Result<AggregateStock> {
    thresholds.validate()?;
    if self.find_stock(location, product)?.is_none() {
      return Err(larder_core::Error::StockNotFound { location, product }.into());
    }
    self.write_aggregate(location, product, thresholds)
  }

  fn write_aggregate(
    &self,
    location: LocationId,
    product: ProductId,
    thresholds: Thresholds,
  ) -> Result<AggregateStock> {
    let quantity = self.lot_sum(location, product)?;
    let stock = AggregateStock {
      tenant_id: self.tenant(),
      location_id: location,
      product_id: product,
      quantity,
      thresholds,
      band: StockBand::classify(quantity, &thresholds),
      updated_at: self.now(),
    };

    self.conn().execute(
      "INSERT INTO stock (
         tenant_id, location_id, product_id, quantity, minimum, maximum, band, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT (tenant_id, location_id, product_id) DO UPDATE SET
         quantity   = excluded.quantity,
         minimum    = excluded.minimum,
         maximum    = excluded.maximum,
         band       = excluded.band,
         updated_at = excluded.updated_at",
      rusqlite::params![
        self.key(),
        location.get(),
        product.get(),
        stock.quantity,
        stock.thresholds.minimum,
        stock.thresholds.maximum,
        stock.band.as_ref(),
        encode_dt(stock.updated_at),
      ],
    )?;
    Ok(stock)
  }
}
