//! Strongly-typed identifiers.
//!
//! Tenants, lots and movements are identified by UUIDs. Locations and
//! products carry caller-assigned integers that are only unique within their
//! tenant, so two tenants may both own a location `1`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(Uuid);

    impl $name {
      pub fn new() -> Self { Self(Uuid::new_v4()) }

      pub fn from_uuid(uuid: Uuid) -> Self { Self(uuid) }

      pub fn as_uuid(&self) -> &Uuid { &self.0 }
    }

    impl Default for $name {
      fn default() -> Self { Self::new() }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
      }
    }

    impl From<Uuid> for $name {
      fn from(value: Uuid) -> Self { Self(value) }
    }

    impl FromStr for $name {
      type Err = uuid::Error;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
      }
    }
  };
}

macro_rules! int_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name {
      pub fn get(self) -> i64 { self.0 }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
      }
    }

    impl From<i64> for $name {
      fn from(value: i64) -> Self { Self(value) }
    }
  };
}

uuid_id!(
  /// The isolation boundary. Every persisted row carries one.
  TenantId
);
uuid_id!(
  /// A physical batch of a product at a location.
  LotId
);
uuid_id!(
  /// One immutable ledger entry.
  MovementId
);

int_id!(
  /// A school (physical site) holding stock, unique within its tenant.
  LocationId
);
int_id!(
  /// A product in a tenant's catalogue, unique within its tenant.
  ProductId
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tenant_id_parses_its_display_form() {
    let id = TenantId::new();
    let parsed: TenantId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
  }

  #[test]
  fn integer_ids_serialise_transparently() {
    let json = serde_json::to_string(&LocationId(7)).unwrap();
    assert_eq!(json, "7");
  }
}
