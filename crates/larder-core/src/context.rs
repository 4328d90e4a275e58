//! The tenant context manager.
//!
//! The active tenant is a tokio task-local. A binding is visible only to the
//! future it wraps: spawned tasks and concurrently running operations never
//! observe it, even when they serve the same tenant. [`scope`] restores the
//! previous binding (or clears it) when the wrapped future completes, fails
//! or unwinds, because the task-local guard is dropped on every exit path.

use std::future::Future;

use crate::{Error, Result, id::TenantId};

tokio::task_local! {
  static BOUND_TENANT: TenantId;
}

/// The tenant bound to the current task, if any.
pub fn current() -> Option<TenantId> { BOUND_TENANT.try_with(|t| *t).ok() }

/// Run `fut` with `tenant` bound, restoring the previous binding afterwards.
pub async fn scope<F>(tenant: TenantId, fut: F) -> F::Output
where
  F: Future,
{
  BOUND_TENANT.scope(tenant, fut).await
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<R>(tenant: TenantId, f: impl FnOnce() -> R) -> R {
  BOUND_TENANT.sync_scope(tenant, f)
}

/// Storage-boundary check: `tenant` must be exactly the bound tenant.
pub fn ensure(tenant: TenantId) -> Result<()> {
  match current() {
    None => Err(Error::TenantNotBound),
    Some(bound) if bound != tenant => {
      Err(Error::CrossTenantAccess { bound, attempted: tenant })
    }
    Some(_) => Ok(()),
  }
}
