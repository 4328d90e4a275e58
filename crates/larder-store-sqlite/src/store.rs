//! [`SqliteStore`]: the SQLite implementation of [`TenantDirectory`].

use std::{path::Path, sync::Arc};

use larder_core::{
  clock::{Clock, SystemClock},
  id::TenantId,
  store::TenantDirectory,
  tenant::{Tenant, TenantLimits, TenantStatus},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result, StoreOptions, TenantSession,
  cache::AggregateCache,
  encode::{RawTenant, TENANT_COLUMNS, encode_dt, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Larder ledger backed by a single SQLite file.
///
/// Cloning is cheap; the connection, clock and cache are shared.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  clock:   Arc<dyn Clock>,
  options: Arc<StoreOptions>,
  cache:   Arc<AggregateCache>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, StoreOptions::default()).await
  }

  /// Replace the time source used for timestamps and expiration checks.
  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn options(&self) -> &StoreOptions { &self.options }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let lock_timeout = options.lock_timeout;
    conn
      .call(move |conn| {
        conn.busy_timeout(lock_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;

    tracing::debug!(?options, "sqlite store ready");
    Ok(Self {
      conn,
      clock: Arc::new(SystemClock),
      cache: Arc::new(AggregateCache::new(options.cache_ttl)),
      options: Arc::new(options),
    })
  }

  async fn load_tenant(&self, id: TenantId) -> Result<Option<Tenant>> {
    let key = encode_uuid(*id.as_uuid());
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE tenant_id = ?1"),
              rusqlite::params![key],
              RawTenant::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawTenant::into_tenant).transpose()
  }
}

// ─── TenantDirectory impl ────────────────────────────────────────────────────

impl TenantDirectory for SqliteStore {
  type Error = Error;
  type Session = TenantSession;

  async fn create_tenant(&self, name: String, limits: TenantLimits) -> Result<Tenant> {
    let tenant = Tenant {
      tenant_id: TenantId::new(),
      name,
      status: TenantStatus::Active,
      limits,
      created_at: self.clock.now(),
    };

    let id_str = encode_uuid(*tenant.tenant_id.as_uuid());
    let name = tenant.name.clone();
    let status = tenant.status.as_ref().to_owned();
    let max_locations = tenant.limits.max_locations;
    let max_products = tenant.limits.max_products;
    let at_str = encode_dt(tenant.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tenants (
             tenant_id, name, status, max_locations, max_products, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, name, status, max_locations, max_products, at_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::info!(tenant = %tenant.tenant_id, name = %tenant.name, "tenant created");
    Ok(tenant)
  }

  async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>> { self.load_tenant(id).await }

  async fn set_tenant_status(&self, id: TenantId, status: TenantStatus) -> Result<Tenant> {
    let key = encode_uuid(*id.as_uuid());
    let status_str = status.as_ref().to_owned();
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE tenants SET status = ?1 WHERE tenant_id = ?2",
          rusqlite::params![status_str, key],
        )?)
      })
      .await?;
    if changed == 0 {
      return Err(larder_core::Error::TenantNotFound(id).into());
    }

    self.cache.invalidate_tenant(id);
    tracing::info!(tenant = %id, %status, "tenant status changed");
    self
      .load_tenant(id)
      .await?
      .ok_or(Error::Core(larder_core::Error::TenantNotFound(id)))
  }

  async fn bind(&self, id: TenantId) -> Result<TenantSession> {
    let tenant = self
      .load_tenant(id)
      .await?
      .ok_or(larder_core::Error::TenantNotFound(id))?;
    tenant.ensure_active()?;

    Ok(TenantSession::new(
      self.conn.clone(),
      id,
      self.clock.clone(),
      self.options.clone(),
      self.cache.clone(),
    ))
  }
}
