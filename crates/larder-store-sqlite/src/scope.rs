//! [`TenantTx`]: the one place SQL is issued against tenant-owned tables.
//!
//! A `TenantTx` wraps the connection of an open transaction together with
//! the bound tenant's key. Every helper on it (here and in `lots`,
//! `projector` and `journal`) binds that key into its `WHERE` clause or its
//! inserted row, so nothing inside a transaction can name another tenant.

use chrono::{DateTime, NaiveDate, Utc};
use larder_core::{
  id::{LocationId, ProductId, TenantId},
  tenant::{Location, NewProduct, Product, Tenant},
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{
    LOCATION_COLUMNS, PRODUCT_COLUMNS, RawLocation, RawProduct, RawTenant, TENANT_COLUMNS,
    encode_dt, encode_uuid,
  },
};

/// Run `f` inside one transaction scoped to `tenant`.
///
/// The tenant is re-checked first, since it may have been deactivated after
/// the session was handed out. Returning an error drops the transaction,
/// which rolls it back.
pub fn transact<T>(
  conn: &mut Connection,
  behavior: TransactionBehavior,
  tenant: TenantId,
  now: DateTime<Utc>,
  f: impl FnOnce(&TenantTx<'_>) -> Result<T>,
) -> Result<T> {
  let tx = conn.transaction_with_behavior(behavior)?;
  let value = {
    let scoped = TenantTx::new(&tx, tenant, now);
    scoped.require_active_tenant()?;
    f(&scoped)?
  };
  tx.commit()?;
  Ok(value)
}

pub struct TenantTx<'c> {
  conn:   &'c Connection,
  tenant: TenantId,
  key:    String,
  now:    DateTime<Utc>,
}

impl<'c> TenantTx<'c> {
  pub fn new(conn: &'c Connection, tenant: TenantId, now: DateTime<Utc>) -> Self {
    Self { conn, tenant, key: encode_uuid(*tenant.as_uuid()), now }
  }

  pub fn conn(&self) -> &'c Connection { self.conn }

  pub fn tenant(&self) -> TenantId { self.tenant }

  /// The encoded tenant identifier bound into every statement.
  pub fn key(&self) -> &str { &self.key }

  pub fn now(&self) -> DateTime<Utc> { self.now }

  pub fn today(&self) -> NaiveDate { self.now.date_naive() }

  // ── Tenant ────────────────────────────────────────────────────────────

  pub fn require_active_tenant(&self) -> Result<Tenant> {
    let raw = self
      .conn
      .query_row(
        &format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE tenant_id = ?1"),
        rusqlite::params![self.key],
        RawTenant::from_row,
      )
      .optional()?
      .ok_or(larder_core::Error::TenantNotFound(self.tenant))?;
    let tenant = raw.into_tenant()?;
    tenant.ensure_active()?;
    Ok(tenant)
  }

  // ── Locations ─────────────────────────────────────────────────────────

  pub fn find_location(&self, id: LocationId) -> Result<Option<Location>> {
    self
      .conn
      .query_row(
        &format!(
          "SELECT {LOCATION_COLUMNS} FROM locations WHERE tenant_id = ?1 AND location_id = ?2"
        ),
        rusqlite::params![self.key, id.get()],
        RawLocation::from_row,
      )
      .optional()?
      .map(RawLocation::into_location)
      .transpose()
  }

  pub fn require_location(&self, id: LocationId) -> Result<Location> {
    self.find_location(id)?.ok_or(Error::Core(larder_core::Error::LocationNotFound(id)))
  }

  pub fn list_locations(&self) -> Result<Vec<Location>> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {LOCATION_COLUMNS} FROM locations WHERE tenant_id = ?1 ORDER BY location_id"
    ))?;
    let raws = stmt
      .query_map(rusqlite::params![self.key], RawLocation::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawLocation::into_location).collect()
  }

  pub fn insert_location(&self, id: LocationId, name: String) -> Result<Location> {
    let tenant = self.require_active_tenant()?;
    if self.find_location(id)?.is_some() {
      return Err(larder_core::Error::DuplicateLocation(id).into());
    }
    tenant.limits.check_locations(self.count("locations")?)?;

    let location = Location {
      tenant_id:   self.tenant,
      location_id: id,
      name,
      created_at:  self.now,
    };
    self.conn.execute(
      "INSERT INTO locations (tenant_id, location_id, name, created_at)
       VALUES (?1, ?2, ?3, ?4)",
      rusqlite::params![self.key, id.get(), location.name, encode_dt(self.now)],
    )?;
    Ok(location)
  }

  // ── Products ──────────────────────────────────────────────────────────

  pub fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
    self
      .conn
      .query_row(
        &format!(
          "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = ?1 AND product_id = ?2"
        ),
        rusqlite::params![self.key, id.get()],
        RawProduct::from_row,
      )
      .optional()?
      .map(RawProduct::into_product)
      .transpose()
  }

  pub fn require_product(&self, id: ProductId) -> Result<Product> {
    self.find_product(id)?.ok_or(Error::Core(larder_core::Error::ProductNotFound(id)))
  }

  pub fn list_products(&self) -> Result<Vec<Product>> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = ?1 ORDER BY product_id"
    ))?;
    let raws = stmt
      .query_map(rusqlite::params![self.key], RawProduct::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawProduct::into_product).collect()
  }

  pub fn insert_product(&self, input: NewProduct) -> Result<Product> {
    let tenant = self.require_active_tenant()?;
    if self.find_product(input.product_id)?.is_some() {
      return Err(larder_core::Error::DuplicateProduct(input.product_id).into());
    }
    tenant.limits.check_products(self.count("products")?)?;

    let product = Product {
      tenant_id:  self.tenant,
      product_id: input.product_id,
      name:       input.name,
      unit:       input.unit,
      perishable: input.perishable,
      created_at: self.now,
    };
    self.conn.execute(
      "INSERT INTO products (tenant_id, product_id, name, unit, perishable, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![
        self.key,
        product.product_id.get(),
        product.name,
        product.unit,
        product.perishable,
        encode_dt(self.now),
      ],
    )?;
    Ok(product)
  }

  /// Rows of `table` owned by the tenant. `table` is always a literal.
  fn count(&self, table: &'static str) -> Result<u64> {
    let n: i64 = self.conn.query_row(
      &format!("SELECT COUNT(*) FROM {table} WHERE tenant_id = ?1"),
      rusqlite::params![self.key],
      |r| r.get(0),
    )?;
    Ok(u64::try_from(n).unwrap_or_default())
  }
}
