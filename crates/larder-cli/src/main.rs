//! `larder`, the operator and batch-job front end for the Larder ledger.
//!
//! Every subcommand runs one logical operation against the configured SQLite
//! store and prints its result as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! larder tenant create "Rede Municipal"
//! larder --tenant <UUID> receive 1 10 24 --batch LT-0042 --expires 2024-03-01
//! larder --tenant <UUID> consume 1 10 6 --reason merenda
//! LARDER_STORE_PATH=/srv/larder.db larder --tenant <UUID> reconcile
//! ```

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use larder_core::{id::TenantId, tenant::TenantStatus};
use larder_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::LedgerConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "larder", author, version, about = "Tenant-scoped perishable inventory ledger")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "larder.toml")]
  config: PathBuf,

  /// Tenant every tenant-scoped command runs as.
  #[arg(short, long, global = true, env = "LARDER_TENANT")]
  tenant: Option<TenantId>,

  #[command(subcommand)]
  command: Command,
}

/// Free-form provenance recorded on movements.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct NoteArgs {
  #[arg(long)]
  pub reason:   Option<String>,
  /// External document reference (invoice, delivery note, count sheet).
  #[arg(long)]
  pub document: Option<String>,
  #[arg(long)]
  pub actor:    Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Manage tenants.
  #[command(subcommand)]
  Tenant(TenantCommand),

  /// Manage the tenant's locations.
  #[command(subcommand)]
  Location(LocationCommand),

  /// Manage the tenant's products.
  #[command(subcommand)]
  Product(ProductCommand),

  /// Record a receipt.
  Receive {
    location: i64,
    product:  i64,
    quantity: i64,
    #[arg(long, default_value = "")]
    batch:    String,
    /// Expiration date (YYYY-MM-DD); required for perishable products.
    #[arg(long)]
    expires:  Option<NaiveDate>,
    #[command(flatten)]
    note:     NoteArgs,
  },

  /// Withdraw stock across lots, soonest-expiring first.
  Consume {
    location: i64,
    product:  i64,
    quantity: i64,
    #[command(flatten)]
    note:     NoteArgs,
  },

  /// Apply a signed correction to one lot.
  Adjust {
    lot:   uuid::Uuid,
    #[arg(allow_negative_numbers = true)]
    delta: i64,
    #[command(flatten)]
    note:  NoteArgs,
  },

  /// Move stock between two locations.
  Transfer {
    from:     i64,
    to:       i64,
    product:  i64,
    quantity: i64,
    #[command(flatten)]
    note:     NoteArgs,
  },

  /// Withhold a lot from allocation and from the aggregate.
  Block {
    lot:  uuid::Uuid,
    #[command(flatten)]
    note: NoteArgs,
  },

  /// Return a blocked lot to circulation.
  Unblock {
    lot:  uuid::Uuid,
    #[command(flatten)]
    note: NoteArgs,
  },

  /// Show one lot.
  Lot { lot: uuid::Uuid },

  /// List allocatable lots in allocation order.
  Lots {
    location: i64,
    product:  i64,
    #[arg(long)]
    include_expired: bool,
  },

  /// Show the aggregate stock of a product at a location.
  Stock { location: i64, product: i64 },

  /// Set the minimum/maximum thresholds of an aggregate.
  Thresholds {
    location: i64,
    product:  i64,
    #[arg(long, default_value_t = 0)]
    min:      i64,
    #[arg(long)]
    max:      Option<i64>,
  },

  /// Print movement history, newest first.
  History {
    location: i64,
    product:  i64,
    #[arg(long)]
    from:     Option<DateTime<Utc>>,
    #[arg(long)]
    to:       Option<DateTime<Utc>>,
    /// Stop after this many records.
    #[arg(long)]
    limit:    Option<usize>,
  },

  /// Rebuild an aggregate by replaying its history.
  Reconstruct { location: i64, product: i64 },

  /// Flag active lots past their expiration date.
  Sweep,

  /// Compare every aggregate with its lots and its ledger.
  Reconcile,
}

#[derive(Subcommand, Debug)]
pub enum TenantCommand {
  Create {
    name: String,
    #[arg(long)]
    max_locations: Option<u32>,
    #[arg(long)]
    max_products:  Option<u32>,
  },
  Show { id: TenantId },
  Status { id: TenantId, status: TenantStatus },
}

#[derive(Subcommand, Debug)]
pub enum LocationCommand {
  Add { id: i64, name: String },
  List,
}

#[derive(Subcommand, Debug)]
pub enum ProductCommand {
  Add {
    id:   i64,
    name: String,
    #[arg(long, default_value = "un")]
    unit: String,
    /// Non-perishable products keep one implicit, non-expiring lot.
    #[arg(long)]
    non_perishable: bool,
  },
  Show { id: i64 },
  List,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs on stderr; stdout carries the JSON result.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = LedgerConfig::load(&cli.config)?;

  let store_path = config.store_path();
  let store = SqliteStore::open(&store_path, config.store_options())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let output = commands::run(&store, cli.tenant, cli.command).await?;
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn negative_adjustments_parse() {
    let lot = uuid::Uuid::new_v4();
    let cli = Cli::try_parse_from([
      "larder",
      "--tenant",
      &TenantId::new().to_string(),
      "adjust",
      &lot.to_string(),
      "-3",
      "--reason",
      "quebra",
    ])
    .unwrap();

    match cli.command {
      Command::Adjust { lot: parsed, delta, note } => {
        assert_eq!(parsed, lot);
        assert_eq!(delta, -3);
        assert_eq!(note.reason.as_deref(), Some("quebra"));
      }
      other => panic!("unexpected command {other:?}"),
    }
  }

  #[test]
  fn receipts_take_an_optional_expiration() {
    let cli = Cli::try_parse_from([
      "larder", "receive", "1", "10", "24", "--batch", "LT-7", "--expires", "2024-03-01",
    ])
    .unwrap();

    match cli.command {
      Command::Receive { quantity, expires, batch, .. } => {
        assert_eq!(quantity, 24);
        assert_eq!(batch, "LT-7");
        assert_eq!(expires, Some("2024-03-01".parse().unwrap()));
      }
      other => panic!("unexpected command {other:?}"),
    }
  }
}
