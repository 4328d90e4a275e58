//! Error types for `larder-core`.
//!
//! Every variant belongs to exactly one [`ErrorClass`]. Callers decide how to
//! surface a failure (authorization, client input, retry) from the class, not
//! from the individual variant.

use serde::Serialize;
use thiserror::Error;

use crate::{
  id::{LocationId, LotId, ProductId, TenantId},
  operation::Phase,
  tenant::TenantStatus,
};

/// The failure taxonomy callers dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
  /// Unknown or inactive tenant, or an attempt to reach another tenant's
  /// rows. Never retried.
  Isolation,
  /// Bad input. Retrying with the same input reproduces the error.
  Validation,
  /// The request is valid but the current stock cannot satisfy it.
  BusinessState,
  /// Lock contention or a conflicting writer. No partial work was done; safe
  /// to retry with backoff.
  Concurrency,
  /// The ledger and the stored aggregates disagree.
  Integrity,
  /// A bug or an unexpected storage failure.
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  // ── Isolation ─────────────────────────────────────────────────────────────
  #[error("tenant not found: {0}")]
  TenantNotFound(TenantId),

  #[error("tenant {tenant} is {status}")]
  TenantInactive {
    tenant: TenantId,
    status: TenantStatus,
  },

  #[error("no tenant is bound to the current task")]
  TenantNotBound,

  #[error("tenant {attempted} used while tenant {bound} is bound")]
  CrossTenantAccess {
    bound:     TenantId,
    attempted: TenantId,
  },

  /// Rows of other tenants are indistinguishable from absent rows, so a
  /// cross-tenant reference surfaces as one of these not-found variants.
  #[error("location not found: {0}")]
  LocationNotFound(LocationId),

  #[error("product not found: {0}")]
  ProductNotFound(ProductId),

  #[error("lot not found: {0}")]
  LotNotFound(LotId),

  #[error("no stock recorded for product {product} at location {location}")]
  StockNotFound {
    location: LocationId,
    product:  ProductId,
  },

  // ── Validation ────────────────────────────────────────────────────────────
  #[error("quantity must be positive, got {0}")]
  InvalidQuantity(i64),

  #[error("adjusting lot {lot} by {delta} would leave {remaining} remaining")]
  NegativeRemaining {
    lot:       LotId,
    delta:     i64,
    remaining: i64,
  },

  #[error("adjusting lot {lot} to {attempted} exceeds its initial quantity {initial}")]
  ExceedsInitial {
    lot:       LotId,
    initial:   i64,
    attempted: i64,
  },

  #[error("quantity {base} plus {delta} does not fit in a 64-bit integer")]
  QuantityOverflow { base: i64, delta: i64 },

  #[error("product {0} is perishable and needs an expiration date")]
  MissingExpiration(ProductId),

  #[error("product {0} is not perishable and cannot carry an expiration date")]
  UnexpectedExpiration(ProductId),

  #[error("invalid thresholds: minimum {minimum}, maximum {maximum}")]
  InvalidThresholds { minimum: i64, maximum: i64 },

  #[error("source and destination are both location {0}")]
  SameLocation(LocationId),

  #[error("location {0} already exists")]
  DuplicateLocation(LocationId),

  #[error("product {0} already exists")]
  DuplicateProduct(ProductId),

  #[error("tenant limit reached: at most {max} {resource}")]
  TenantLimitExceeded { resource: &'static str, max: u32 },

  #[error("lot {0} is blocked")]
  LotBlocked(LotId),

  #[error("lot {0} is not blocked")]
  LotNotBlocked(LotId),

  // ── Business state ────────────────────────────────────────────────────────
  #[error(
    "insufficient stock: requested {requested}, available {available}, short by {shortfall}"
  )]
  InsufficientStock {
    requested: i64,
    available: i64,
    shortfall: i64,
  },

  // ── Concurrency ───────────────────────────────────────────────────────────
  #[error("timed out waiting for the stock lock")]
  LockTimeout,

  #[error("concurrent modification of lot {0}")]
  TransactionConflict(LotId),

  // ── Integrity ─────────────────────────────────────────────────────────────
  #[error(
    "ledger chain broken at movement {sequence}: expected quantity {expected}, found {found}"
  )]
  LedgerChainBroken {
    sequence: i64,
    expected: i64,
    found:    i64,
  },

  // ── Internal ──────────────────────────────────────────────────────────────
  #[error("illegal operation transition {from:?} -> {to:?}")]
  IllegalTransition { from: Phase, to: Phase },
}

impl Error {
  pub fn class(&self) -> ErrorClass {
    match self {
      Self::TenantNotFound(_)
      | Self::TenantInactive { .. }
      | Self::TenantNotBound
      | Self::CrossTenantAccess { .. }
      | Self::LocationNotFound(_)
      | Self::ProductNotFound(_)
      | Self::LotNotFound(_)
      | Self::StockNotFound { .. } => ErrorClass::Isolation,

      Self::InvalidQuantity(_)
      | Self::NegativeRemaining { .. }
      | Self::ExceedsInitial { .. }
      | Self::QuantityOverflow { .. }
      | Self::MissingExpiration(_)
      | Self::UnexpectedExpiration(_)
      | Self::InvalidThresholds { .. }
      | Self::SameLocation(_)
      | Self::DuplicateLocation(_)
      | Self::DuplicateProduct(_)
      | Self::TenantLimitExceeded { .. }
      | Self::LotBlocked(_)
      | Self::LotNotBlocked(_) => ErrorClass::Validation,

      Self::InsufficientStock { .. } => ErrorClass::BusinessState,

      Self::LockTimeout | Self::TransactionConflict(_) => ErrorClass::Concurrency,

      Self::LedgerChainBroken { .. } => ErrorClass::Integrity,

      Self::IllegalTransition { .. } => ErrorClass::Internal,
    }
  }

  /// Only concurrency failures are worth retrying; the core never retries on
  /// its own.
  pub fn is_retryable(&self) -> bool { self.class() == ErrorClass::Concurrency }

  /// The missing quantity carried by [`Error::InsufficientStock`].
  pub fn shortfall(&self) -> Option<i64> {
    match self {
      Self::InsufficientStock { shortfall, .. } => Some(*shortfall),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `base + delta`, or [`Error::QuantityOverflow`] when it does not fit.
pub fn add_quantity(base: i64, delta: i64) -> Result<i64> {
  base.checked_add(delta).ok_or(Error::QuantityOverflow { base, delta })
}
