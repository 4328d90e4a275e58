//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so they compare correctly as text. Dates are `YYYY-MM-DD`. UUIDs are
//! hyphenated lowercase strings. Status enums use their snake_case names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use larder_core::{
  id::{LocationId, LotId, MovementId, ProductId, TenantId},
  lot::{Lot, LotStatus},
  movement::{MovementKind, MovementNote, MovementRecord},
  stock::{AggregateStock, StockBand, Thresholds},
  tenant::{Location, Product, Tenant, TenantLimits, TenantStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_enum<T: FromStr>(column: &'static str, value: String) -> Result<T> {
  value.parse().map_err(|_| Error::Decode { column, value })
}

fn decode_limit(value: Option<i64>) -> Option<u32> {
  value.and_then(|v| u32::try_from(v).ok())
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const TENANT_COLUMNS: &str =
  "tenant_id, name, status, max_locations, max_products, created_at";

pub const LOCATION_COLUMNS: &str = "tenant_id, location_id, name, created_at";

pub const PRODUCT_COLUMNS: &str =
  "tenant_id, product_id, name, unit, perishable, created_at";

pub const LOT_COLUMNS: &str = "lot_id, tenant_id, location_id, product_id, batch_label, \
   initial, remaining, expires_on, status, lot_seq, created_at, updated_at";

pub const STOCK_COLUMNS: &str =
  "tenant_id, location_id, product_id, quantity, minimum, maximum, band, updated_at";

pub const MOVEMENT_COLUMNS: &str = "movement_id, movement_seq, tenant_id, location_id, \
   product_id, kind, lot_id, quantity_before, delta, quantity_after, reason, document, \
   actor, recorded_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `tenants` row.
pub struct RawTenant {
  pub tenant_id:     String,
  pub name:          String,
  pub status:        String,
  pub max_locations: Option<i64>,
  pub max_products:  Option<i64>,
  pub created_at:    String,
}

impl RawTenant {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:     row.get(0)?,
      name:          row.get(1)?,
      status:        row.get(2)?,
      max_locations: row.get(3)?,
      max_products:  row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_tenant(self) -> Result<Tenant> {
    Ok(Tenant {
      tenant_id:  TenantId::from_uuid(decode_uuid(&self.tenant_id)?),
      name:       self.name,
      status:     decode_enum::<TenantStatus>("tenants.status", self.status)?,
      limits:     TenantLimits {
        max_locations: decode_limit(self.max_locations),
        max_products:  decode_limit(self.max_products),
      },
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `locations` row.
pub struct RawLocation {
  pub tenant_id:   String,
  pub location_id: i64,
  pub name:        String,
  pub created_at:  String,
}

impl RawLocation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:   row.get(0)?,
      location_id: row.get(1)?,
      name:        row.get(2)?,
      created_at:  row.get(3)?,
    })
  }

  pub fn into_location(self) -> Result<Location> {
    Ok(Location {
      tenant_id:   TenantId::from_uuid(decode_uuid(&self.tenant_id)?),
      location_id: LocationId(self.location_id),
      name:        self.name,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `products` row.
pub struct RawProduct {
  pub tenant_id:  String,
  pub product_id: i64,
  pub name:       String,
  pub unit:       String,
  pub perishable: bool,
  pub created_at: String,
}

impl RawProduct {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:  row.get(0)?,
      product_id: row.get(1)?,
      name:       row.get(2)?,
      unit:       row.get(3)?,
      perishable: row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_product(self) -> Result<Product> {
    Ok(Product {
      tenant_id:  TenantId::from_uuid(decode_uuid(&self.tenant_id)?),
      product_id: ProductId(self.product_id),
      name:       self.name,
      unit:       self.unit,
      perishable: self.perishable,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `lots` row.
pub struct RawLot {
  pub lot_id:      String,
  pub tenant_id:   String,
  pub location_id: i64,
  pub product_id:  i64,
  pub batch_label: String,
  pub initial:     i64,
  pub remaining:   i64,
  pub expires_on:  Option<String>,
  pub status:      String,
  pub sequence:    i64,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawLot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      lot_id:      row.get(0)?,
      tenant_id:   row.get(1)?,
      location_id: row.get(2)?,
      product_id:  row.get(3)?,
      batch_label: row.get(4)?,
      initial:     row.get(5)?,
      remaining:   row.get(6)?,
      expires_on:  row.get(7)?,
      status:      row.get(8)?,
      sequence:    row.get(9)?,
      created_at:  row.get(10)?,
      updated_at:  row.get(11)?,
    })
  }

  pub fn into_lot(self) -> Result<Lot> {
    Ok(Lot {
      lot_id:      LotId::from_uuid(decode_uuid(&self.lot_id)?),
      tenant_id:   TenantId::from_uuid(decode_uuid(&self.tenant_id)?),
      location_id: LocationId(self.location_id),
      product_id:  ProductId(self.product_id),
      batch_label: self.batch_label,
      initial:     self.initial,
      remaining:   self.remaining,
      expires_on:  self.expires_on.as_deref().map(decode_date).transpose()?,
      status:      decode_enum::<LotStatus>("lots.status", self.status)?,
      sequence:    self.sequence,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `stock` row.
pub struct RawStock {
  pub tenant_id:   String,
  pub location_id: i64,
  pub product_id:  i64,
  pub quantity:    i64,
  pub minimum:     i64,
  pub maximum:     Option<i64>,
  pub band:        String,
  pub updated_at:  String,
}

impl RawStock {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:   row.get(0)?,
      location_id: row.get(1)?,
      product_id:  row.get(2)?,
      quantity:    row.get(3)?,
      minimum:     row.get(4)?,
      maximum:     row.get(5)?,
      band:        row.get(6)?,
      updated_at:  row.get(7)?,
    })
  }

  pub fn into_stock(self) -> Result<AggregateStock> {
    Ok(AggregateStock {
      tenant_id:   TenantId::from_uuid(decode_uuid(&self.tenant_id)?),
      location_id: LocationId(self.location_id),
      product_id:  ProductId(self.product_id),
      quantity:    self.quantity,
      thresholds:  Thresholds { minimum: self.minimum, maximum: self.maximum },
      band:        decode_enum::<StockBand>("stock.band", self.band)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `movements` row.
pub struct RawMovement {
  pub movement_id:     String,
  pub sequence:        i64,
  pub tenant_id:       String,
  pub location_id:     i64,
  pub product_id:      i64,
  pub kind:            String,
  pub lot_id:          String,
  pub quantity_before: i64,
  pub delta:           i64,
  pub quantity_after:  i64,
  pub reason:          Option<String>,
  pub document:        Option<String>,
  pub actor:           Option<String>,
  pub recorded_at:     String,
}

impl RawMovement {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      movement_id:     row.get(0)?,
      sequence:        row.get(1)?,
      tenant_id:       row.get(2)?,
      location_id:     row.get(3)?,
      product_id:      row.get(4)?,
      kind:            row.get(5)?,
      lot_id:          row.get(6)?,
      quantity_before: row.get(7)?,
      delta:           row.get(8)?,
      quantity_after:  row.get(9)?,
      reason:          row.get(10)?,
      document:        row.get(11)?,
      actor:           row.get(12)?,
      recorded_at:     row.get(13)?,
    })
  }

  pub fn into_record(self) -> Result<MovementRecord> {
    Ok(MovementRecord {
      movement_id:     MovementId::from_uuid(decode_uuid(&self.movement_id)?),
      sequence:        self.sequence,
      tenant_id:       TenantId::from_uuid(decode_uuid(&self.tenant_id)?),
      location_id:     LocationId(self.location_id),
      product_id:      ProductId(self.product_id),
      kind:            decode_enum::<MovementKind>("movements.kind", self.kind)?,
      lot_id:          LotId::from_uuid(decode_uuid(&self.lot_id)?),
      quantity_before: self.quantity_before,
      delta:           self.delta,
      quantity_after:  self.quantity_after,
      note:            MovementNote {
        reason:   self.reason,
        document: self.document,
        actor:    self.actor,
      },
      recorded_at:     decode_dt(&self.recorded_at)?,
    })
  }
}
