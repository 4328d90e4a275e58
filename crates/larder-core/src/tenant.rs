//! Tenants and the locations and products they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  id::{LocationId, ProductId, TenantId},
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TenantStatus {
  Active,
  Inactive,
  Suspended,
}

/// Per-tenant quotas. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantLimits {
  pub max_locations: Option<u32>,
  pub max_products:  Option<u32>,
}

impl TenantLimits {
  pub fn check_locations(&self, current: u64) -> Result<()> {
    check_limit("locations", self.max_locations, current)
  }

  pub fn check_products(&self, current: u64) -> Result<()> {
    check_limit("products", self.max_products, current)
  }
}

fn check_limit(resource: &'static str, max: Option<u32>, current: u64) -> Result<()> {
  match max {
    Some(max) if current >= u64::from(max) => {
      Err(Error::TenantLimitExceeded { resource, max })
    }
    _ => Ok(()),
  }
}

/// An organisation owning its own partition of the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
  pub tenant_id:  TenantId,
  pub name:       String,
  pub status:     TenantStatus,
  pub limits:     TenantLimits,
  pub created_at: DateTime<Utc>,
}

impl Tenant {
  /// Fails with [`Error::TenantInactive`] unless the tenant may be bound.
  pub fn ensure_active(&self) -> Result<()> {
    match self.status {
      TenantStatus::Active => Ok(()),
      status => Err(Error::TenantInactive { tenant: self.tenant_id, status }),
    }
  }
}

/// A school holding stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
  pub tenant_id:   TenantId,
  pub location_id: LocationId,
  pub name:        String,
  pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
  pub tenant_id:  TenantId,
  pub product_id: ProductId,
  pub name:       String,
  /// Unit of measure all quantities of this product are expressed in.
  pub unit:       String,
  /// Non-perishable products hold at most one implicit, non-expiring lot
  /// per location.
  pub perishable: bool,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::InventoryLedger::add_product`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
  pub product_id: ProductId,
  pub name:       String,
  pub unit:       String,
  pub perishable: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tenant(status: TenantStatus) -> Tenant {
    Tenant {
      tenant_id: TenantId::new(),
      name: "Escola Municipal".into(),
      status,
      limits: TenantLimits::default(),
      created_at: Utc::now(),
    }
  }

  #[test]
  fn only_active_tenants_bind() {
    assert!(tenant(TenantStatus::Active).ensure_active().is_ok());
    assert!(matches!(
      tenant(TenantStatus::Suspended).ensure_active(),
      Err(Error::TenantInactive { status: TenantStatus::Suspended, .. })
    ));
  }

  #[test]
  fn limits_reject_at_capacity() {
    let limits = TenantLimits { max_locations: Some(2), max_products: None };
    assert!(limits.check_locations(1).is_ok());
    assert!(matches!(
      limits.check_locations(2),
      Err(Error::TenantLimitExceeded { resource: "locations", max: 2 })
    ));
    assert!(limits.check_products(10_000).is_ok());
  }

  #[test]
  fn status_text_form() {
    assert_eq!(TenantStatus::Suspended.as_ref(), "suspended");
    assert_eq!("inactive".parse::<TenantStatus>().unwrap(), TenantStatus::Inactive);
  }
}
