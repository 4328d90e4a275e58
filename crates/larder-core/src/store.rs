//! The storage traits and their operation payloads.
//!
//! [`TenantDirectory`] manages tenants and hands out tenant-bound sessions.
//! [`InventoryLedger`] is implemented by those sessions: every method is
//! implicitly scoped to the session's tenant, so no call site passes a tenant
//! identifier and none can forget to. Higher layers depend on these traits,
//! not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  allocation::Allocation,
  id::{LocationId, LotId, ProductId, TenantId},
  lot::{AdjustLot, Lot, ReceiveStock},
  movement::{HistoryQuery, MovementNote, MovementRecord},
  stock::{AggregateStock, ReconciliationReport, Thresholds},
  tenant::{Location, NewProduct, Product, Tenant, TenantLimits, TenantStatus},
};

// ─── Operation payloads ──────────────────────────────────────────────────────

/// Input to [`InventoryLedger::consume`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeStock {
  pub location_id: LocationId,
  pub product_id:  ProductId,
  pub quantity:    i64,
  #[serde(default)]
  pub note:        MovementNote,
}

/// Result of a committed consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumption {
  pub allocations: Vec<Allocation>,
  pub aggregate:   AggregateStock,
  /// One `saida` record per allocated lot, in allocation order.
  pub movements:   Vec<MovementRecord>,
}

/// Input to [`InventoryLedger::transfer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStock {
  pub from:       LocationId,
  pub to:         LocationId,
  pub product_id: ProductId,
  pub quantity:   i64,
  #[serde(default)]
  pub note:       MovementNote,
}

/// Result of a committed transfer: the source-side allocation and the lots
/// created (or topped up) at the destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
  pub allocations: Vec<Allocation>,
  pub received:    Vec<Lot>,
  pub source:      AggregateStock,
  pub destination: AggregateStock,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Tenant administration and binding.
pub trait TenantDirectory: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;
  type Session: InventoryLedger<Error = Self::Error> + Clone + 'static;

  fn create_tenant(
    &self,
    name: String,
    limits: TenantLimits,
  ) -> impl Future<Output = Result<Tenant, Self::Error>> + Send + '_;

  fn get_tenant(
    &self,
    id: TenantId,
  ) -> impl Future<Output = Result<Option<Tenant>, Self::Error>> + Send + '_;

  fn set_tenant_status(
    &self,
    id: TenantId,
    status: TenantStatus,
  ) -> impl Future<Output = Result<Tenant, Self::Error>> + Send + '_;

  /// Resolve `id` and return a session scoped to it.
  ///
  /// Fails with [`crate::Error::TenantNotFound`] or
  /// [`crate::Error::TenantInactive`]. The session's operations only run
  /// inside a matching [`crate::context::scope`]; see
  /// [`crate::ledger::with_tenant`].
  fn bind(
    &self,
    id: TenantId,
  ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send + '_;
}

/// The tenant-scoped inventory ledger.
///
/// Every write runs as a single transaction: lots, aggregate and ledger are
/// updated together or not at all.
pub trait InventoryLedger: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  fn tenant_id(&self) -> TenantId;

  // ── Catalogue ─────────────────────────────────────────────────────────

  fn add_location(
    &self,
    id: LocationId,
    name: String,
  ) -> impl Future<Output = Result<Location, Self::Error>> + Send + '_;

  fn list_locations(
    &self,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + '_;

  fn add_product(
    &self,
    input: NewProduct,
  ) -> impl Future<Output = Result<Product, Self::Error>> + Send + '_;

  fn get_product(
    &self,
    id: ProductId,
  ) -> impl Future<Output = Result<Option<Product>, Self::Error>> + Send + '_;

  fn list_products(
    &self,
  ) -> impl Future<Output = Result<Vec<Product>, Self::Error>> + Send + '_;

  // ── Lots ──────────────────────────────────────────────────────────────

  /// Record a receipt. Creates a lot with `remaining == initial == quantity`
  /// (or tops up the implicit lot of a non-perishable product) and appends
  /// an `entrada` record.
  fn receive(
    &self,
    input: ReceiveStock,
  ) -> impl Future<Output = Result<Lot, Self::Error>> + Send + '_;

  fn get_lot(
    &self,
    id: LotId,
  ) -> impl Future<Output = Result<Option<Lot>, Self::Error>> + Send + '_;

  /// Allocatable lots of a pair in allocation order: expiration ascending,
  /// non-expiring last, then creation order. Exhausted and blocked lots are
  /// never listed; expired ones only when `include_expired`.
  fn list_lots(
    &self,
    location: LocationId,
    product: ProductId,
    include_expired: bool,
  ) -> impl Future<Output = Result<Vec<Lot>, Self::Error>> + Send + '_;

  /// Apply a signed correction directly to one lot and append an `ajuste`.
  fn adjust(
    &self,
    input: AdjustLot,
  ) -> impl Future<Output = Result<Lot, Self::Error>> + Send + '_;

  fn block_lot(
    &self,
    id: LotId,
    note: MovementNote,
  ) -> impl Future<Output = Result<Lot, Self::Error>> + Send + '_;

  fn unblock_lot(
    &self,
    id: LotId,
    note: MovementNote,
  ) -> impl Future<Output = Result<Lot, Self::Error>> + Send + '_;

  /// Flag every active lot past its expiration date as expired. Returns the
  /// number of lots flagged.
  fn sweep_expired(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Consistency enforcer ──────────────────────────────────────────────

  /// Withdraw `quantity` across lots in expiration order. All-or-nothing.
  fn consume(
    &self,
    input: ConsumeStock,
  ) -> impl Future<Output = Result<Consumption, Self::Error>> + Send + '_;

  /// Consume at the source and receive at the destination in one
  /// transaction.
  fn transfer(
    &self,
    input: TransferStock,
  ) -> impl Future<Output = Result<Transfer, Self::Error>> + Send + '_;

  // ── Aggregate ─────────────────────────────────────────────────────────

  fn aggregate(
    &self,
    location: LocationId,
    product: ProductId,
  ) -> impl Future<Output = Result<Option<AggregateStock>, Self::Error>> + Send + '_;

  fn set_thresholds(
    &self,
    location: LocationId,
    product: ProductId,
    thresholds: Thresholds,
  ) -> impl Future<Output = Result<AggregateStock, Self::Error>> + Send + '_;

  // ── Ledger ────────────────────────────────────────────────────────────

  /// One page of history, newest first, strictly older than
  /// `before_sequence` when given. Drive it through [`crate::history::History`].
  fn history_page(
    &self,
    query: HistoryQuery,
    before_sequence: Option<i64>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<MovementRecord>, Self::Error>> + Send + '_;

  /// Compare every aggregate of the tenant with its lots and its ledger.
  /// Drift is reported, never raised.
  fn reconcile(
    &self,
  ) -> impl Future<Output = Result<ReconciliationReport, Self::Error>> + Send + '_;
}
