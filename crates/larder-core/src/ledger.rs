//! Tenant-identified entry points for collaborators (batch jobs, transport
//! layers, reporting).
//!
//! Each function resolves the tenant, binds it for the duration of one
//! logical operation and runs the operation through a tenant-scoped session.
//! The binding is undone on every exit path.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  context,
  history::History,
  id::{LocationId, LotId, ProductId, TenantId},
  lot::{AdjustLot, Lot, ReceiveStock},
  movement::{HistoryQuery, HistoryWindow, MovementNote},
  stock::AggregateStock,
  store::{ConsumeStock, Consumption, InventoryLedger, TenantDirectory},
};

/// Run `op` with `tenant_id` bound.
///
/// Fails before running `op` if the tenant does not exist or is not active.
/// Whatever tenant was bound before (possibly none) is bound again once `op`
/// finishes, whether it succeeded or failed.
pub async fn with_tenant<D, F, Fut, T>(
  directory: &D,
  tenant_id: TenantId,
  op: F,
) -> Result<T, D::Error>
where
  D: TenantDirectory,
  F: FnOnce(D::Session) -> Fut,
  Fut: Future<Output = Result<T, D::Error>>,
{
  let session = directory.bind(tenant_id).await?;
  context::scope(tenant_id, op(session)).await
}

pub async fn receive_stock<D: TenantDirectory>(
  directory: &D,
  tenant_id: TenantId,
  input: ReceiveStock,
) -> Result<Lot, D::Error> {
  with_tenant(directory, tenant_id, |ledger| async move { ledger.receive(input).await }).await
}

pub async fn consume_stock<D: TenantDirectory>(
  directory: &D,
  tenant_id: TenantId,
  location_id: LocationId,
  product_id: ProductId,
  quantity: i64,
  reason: Option<String>,
) -> Result<Consumption, D::Error> {
  let input = ConsumeStock {
    location_id,
    product_id,
    quantity,
    note: MovementNote { reason, ..MovementNote::default() },
  };
  with_tenant(directory, tenant_id, |ledger| async move { ledger.consume(input).await }).await
}

pub async fn adjust_stock<D: TenantDirectory>(
  directory: &D,
  tenant_id: TenantId,
  lot_id: LotId,
  delta: i64,
  reason: String,
) -> Result<Lot, D::Error> {
  let input = AdjustLot { lot_id, delta, note: MovementNote::reason(reason) };
  with_tenant(directory, tenant_id, |ledger| async move { ledger.adjust(input).await }).await
}

pub async fn get_aggregate<D: TenantDirectory>(
  directory: &D,
  tenant_id: TenantId,
  location_id: LocationId,
  product_id: ProductId,
) -> Result<Option<AggregateStock>, D::Error> {
  with_tenant(directory, tenant_id, |ledger| async move {
    ledger.aggregate(location_id, product_id).await
  })
  .await
}

pub async fn list_lots<D: TenantDirectory>(
  directory: &D,
  tenant_id: TenantId,
  location_id: LocationId,
  product_id: ProductId,
  include_expired: bool,
) -> Result<Vec<Lot>, D::Error> {
  with_tenant(directory, tenant_id, |ledger| async move {
    ledger.list_lots(location_id, product_id, include_expired).await
  })
  .await
}

/// A lazy, newest-first history cursor bound to `tenant_id`.
pub async fn get_history<D: TenantDirectory>(
  directory: &D,
  tenant_id: TenantId,
  location_id: LocationId,
  product_id: ProductId,
  from: Option<DateTime<Utc>>,
  to: Option<DateTime<Utc>>,
  page_size: usize,
) -> Result<History<D::Session>, D::Error> {
  let session = directory.bind(tenant_id).await?;
  let query = HistoryQuery { location_id, product_id, window: HistoryWindow { from, to } };
  Ok(History::new(session, query, page_size))
}
