//! [`TenantSession`]: the tenant-bound implementation of [`InventoryLedger`].

use std::sync::Arc;

use larder_core::{
  clock::Clock,
  context,
  history::History,
  id::{LocationId, LotId, ProductId, TenantId},
  lot::{AdjustLot, Lot, ReceiveStock},
  movement::{HistoryQuery, MovementNote, MovementRecord},
  operation::{Operation, OperationKind},
  stock::{AggregateStock, ReconciliationReport, Thresholds},
  store::{ConsumeStock, Consumption, InventoryLedger, Transfer, TransferStock},
  tenant::{Location, NewProduct, Product},
};
use rusqlite::TransactionBehavior;

use crate::{
  Error, Result, StoreOptions,
  cache::AggregateCache,
  enforcer,
  scope::{TenantTx, transact},
};

/// A handle on one tenant's partition of the store.
///
/// Obtained from [`crate::SqliteStore`] via
/// [`larder_core::store::TenantDirectory::bind`]. Every operation first checks
/// that this session's tenant is the one bound to the current task, then runs
/// one transaction in which every statement is filtered by that tenant.
#[derive(Clone)]
pub struct TenantSession {
  conn:      tokio_rusqlite::Connection,
  tenant_id: TenantId,
  clock:     Arc<dyn Clock>,
  options:   Arc<StoreOptions>,
  cache:     Arc<AggregateCache>,
}

impl std::fmt::Debug for TenantSession {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TenantSession").field("tenant_id", &self.tenant_id).finish_non_exhaustive()
  }
}

impl TenantSession {
  pub(crate) fn new(
    conn: tokio_rusqlite::Connection,
    tenant_id: TenantId,
    clock: Arc<dyn Clock>,
    options: Arc<StoreOptions>,
    cache: Arc<AggregateCache>,
  ) -> Self {
    Self { conn, tenant_id, clock, options, cache }
  }

  /// A lazy, newest-first cursor over one pair's history, paged by the
  /// store's configured page size.
  pub fn history(&self, query: HistoryQuery) -> History<Self> {
    History::new(self.clone(), query, self.options.history_page_size)
  }

  /// Run `f` in a deferred transaction.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&TenantTx<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.run(TransactionBehavior::Deferred, f).await
  }

  /// Run `f` in an immediate transaction, outside the operation state
  /// machine. Used for catalogue and maintenance writes.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&TenantTx<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.run(TransactionBehavior::Immediate, f).await
  }

  async fn run<T, F>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
  where
    F: FnOnce(&TenantTx<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    context::ensure(self.tenant_id)?;
    let tenant = self.tenant_id;
    let now = self.clock.now();
    self
      .conn
      .call(move |conn| Ok(transact(conn, behavior, tenant, now, f)))
      .await?
  }

  /// Run one tracked stock operation through the consistency enforcer.
  async fn operate<T, F>(&self, kind: OperationKind, f: F) -> Result<T>
  where
    F: FnOnce(&TenantTx<'_>, &mut Operation) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    context::ensure(self.tenant_id)?;
    let tenant = self.tenant_id;
    let now = self.clock.now();
    self
      .conn
      .call(move |conn| Ok(enforcer::operate(conn, tenant, now, kind, f)))
      .await?
  }

  fn invalidate(&self, location: LocationId, product: ProductId) {
    self.cache.invalidate((self.tenant_id, location, product));
  }
}

// ─── InventoryLedger impl ────────────────────────────────────────────────────

impl InventoryLedger for TenantSession {
  type Error = Error;

  fn tenant_id(&self) -> TenantId { self.tenant_id }

  // ── Catalogue ─────────────────────────────────────────────────────────────

  async fn add_location(&self, id: LocationId, name: String) -> Result<Location> {
    let location = self.write(move |tx| tx.insert_location(id, name)).await?;
    tracing::info!(tenant = %self.tenant_id, location = %id, "location added");
    Ok(location)
  }

  async fn list_locations(&self) -> Result<Vec<Location>> {
    self.read(|tx| tx.list_locations()).await
  }

  async fn add_product(&self, input: NewProduct) -> Result<Product> {
    let product = self.write(move |tx| tx.insert_product(input)).await?;
    tracing::info!(tenant = %self.tenant_id, product = %product.product_id, "product added");
    Ok(product)
  }

  async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
    self.read(move |tx| tx.find_product(id)).await
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    self.read(|tx| tx.list_products()).await
  }

  // ── Lots ──────────────────────────────────────────────────────────────────

  async fn receive(&self, input: ReceiveStock) -> Result<Lot> {
    let (location, product, quantity) = (input.location_id, input.product_id, input.quantity);
    let lot = self.operate(OperationKind::Receive, move |tx, op| tx.receive(op, input)).await?;
    self.invalidate(location, product);
    tracing::info!(
      tenant = %self.tenant_id,
      %location,
      %product,
      lot = %lot.lot_id,
      quantity,
      "stock received"
    );
    Ok(lot)
  }

  async fn get_lot(&self, id: LotId) -> Result<Option<Lot>> {
    self.read(move |tx| tx.find_lot(id)).await
  }

  async fn list_lots(
    &self,
    location: LocationId,
    product: ProductId,
    include_expired: bool,
  ) -> Result<Vec<Lot>> {
    self.read(move |tx| tx.listed_lots(location, product, include_expired)).await
  }

  async fn adjust(&self, input: AdjustLot) -> Result<Lot> {
    let delta = input.delta;
    let lot = self.operate(OperationKind::Adjust, move |tx, op| tx.adjust(op, input)).await?;
    self.invalidate(lot.location_id, lot.product_id);
    tracing::info!(tenant = %self.tenant_id, lot = %lot.lot_id, delta, "lot adjusted");
    Ok(lot)
  }

  async fn block_lot(&self, id: LotId, note: MovementNote) -> Result<Lot> {
    let lot = self.operate(OperationKind::Block, move |tx, op| tx.block_lot(op, id, &note)).await?;
    self.invalidate(lot.location_id, lot.product_id);
    tracing::info!(tenant = %self.tenant_id, lot = %id, "lot blocked");
    Ok(lot)
  }

  async fn unblock_lot(&self, id: LotId, note: MovementNote) -> Result<Lot> {
    let lot = self
      .operate(OperationKind::Unblock, move |tx, op| tx.unblock_lot(op, id, &note))
      .await?;
    self.invalidate(lot.location_id, lot.product_id);
    tracing::info!(tenant = %self.tenant_id, lot = %id, status = %lot.status, "lot unblocked");
    Ok(lot)
  }

  async fn sweep_expired(&self) -> Result<u64> {
    let flagged = self.write(|tx| tx.sweep_expired()).await?;
    if flagged > 0 {
      tracing::info!(tenant = %self.tenant_id, flagged, "expired lots flagged");
    }
    Ok(flagged)
  }

  // ── Consistency enforcer ──────────────────────────────────────────────────

  async fn consume(&self, input: ConsumeStock) -> Result<Consumption> {
    let policy = self.options.expired_lots;
    let consumption =
      self.operate(OperationKind::Consume, move |tx, op| tx.consume(op, input, policy)).await?;
    let stock = &consumption.aggregate;
    self.invalidate(stock.location_id, stock.product_id);
    tracing::info!(
      tenant = %self.tenant_id,
      location = %stock.location_id,
      product = %stock.product_id,
      lots = consumption.allocations.len(),
      quantity = stock.quantity,
      "stock consumed"
    );
    Ok(consumption)
  }

  async fn transfer(&self, input: TransferStock) -> Result<Transfer> {
    let policy = self.options.expired_lots;
    let (from, to, product, quantity) =
      (input.from, input.to, input.product_id, input.quantity);
    let transfer =
      self.operate(OperationKind::Transfer, move |tx, op| tx.transfer(op, input, policy)).await?;
    self.invalidate(from, product);
    self.invalidate(to, product);
    tracing::info!(tenant = %self.tenant_id, %from, %to, %product, quantity, "stock transferred");
    Ok(transfer)
  }

  // ── Aggregate ─────────────────────────────────────────────────────────────

  async fn aggregate(
    &self,
    location: LocationId,
    product: ProductId,
  ) -> Result<Option<AggregateStock>> {
    context::ensure(self.tenant_id)?;
    if let Some(hit) = self.cache.get((self.tenant_id, location, product)) {
      return Ok(Some(hit));
    }
    let stock = self.read(move |tx| tx.find_stock(location, product)).await?;
    if let Some(stock) = &stock {
      self.cache.put(stock);
    }
    Ok(stock)
  }

  async fn set_thresholds(
    &self,
    location: LocationId,
    product: ProductId,
    thresholds: Thresholds,
  ) -> Result<AggregateStock> {
    let stock = self.write(move |tx| tx.set_thresholds(location, product, thresholds)).await?;
    self.invalidate(location, product);
    Ok(stock)
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  async fn history_page(
    &self,
    query: HistoryQuery,
    before_sequence: Option<i64>,
    limit: usize,
  ) -> Result<Vec<MovementRecord>> {
    self.read(move |tx| tx.history_page(&query, before_sequence, limit)).await
  }

  async fn reconcile(&self) -> Result<ReconciliationReport> {
    let report = self.read(|tx| tx.reconcile()).await?;
    self.cache.invalidate_tenant(self.tenant_id);
    tracing::info!(
      tenant = %self.tenant_id,
      checked = report.checked,
      drifts = report.drifts.len(),
      "reconciliation finished"
    );
    Ok(report)
  }
}
