//! Subcommand dispatch. Each arm runs one logical operation and returns its
//! result as JSON.

use anyhow::Context as _;
use larder_core::{
  history,
  id::{LocationId, LotId, ProductId, TenantId},
  ledger::{self, with_tenant},
  lot::{AdjustLot, ReceiveStock},
  movement::MovementNote,
  stock::Thresholds,
  store::{ConsumeStock, InventoryLedger, TenantDirectory, TransferStock},
  tenant::{NewProduct, TenantLimits},
};
use larder_store_sqlite::SqliteStore;
use serde_json::{Value, json};

use crate::{Command, LocationCommand, NoteArgs, ProductCommand, TenantCommand};

impl From<NoteArgs> for MovementNote {
  fn from(args: NoteArgs) -> Self {
    Self { reason: args.reason, document: args.document, actor: args.actor }
  }
}

pub async fn run(
  store: &SqliteStore,
  tenant: Option<TenantId>,
  command: Command,
) -> anyhow::Result<Value> {
  match command {
    Command::Tenant(command) => run_tenant(store, command).await,
    command => {
      let tenant = tenant.context("no tenant given; pass --tenant or set LARDER_TENANT")?;
      run_scoped(store, tenant, command).await
    }
  }
}

async fn run_scoped(
  store: &SqliteStore,
  tenant: TenantId,
  command: Command,
) -> anyhow::Result<Value> {
  let value = match command {
    Command::Tenant(_) => unreachable!("tenant commands are dispatched by `run`"),

    Command::Location(LocationCommand::Add { id, name }) => {
      let location = with_tenant(store, tenant, |ledger| async move {
        ledger.add_location(LocationId(id), name).await
      })
      .await?;
      serde_json::to_value(location)?
    }
    Command::Location(LocationCommand::List) => {
      let locations =
        with_tenant(store, tenant, |ledger| async move { ledger.list_locations().await }).await?;
      serde_json::to_value(locations)?
    }

    Command::Product(ProductCommand::Add { id, name, unit, non_perishable }) => {
      let input =
        NewProduct { product_id: ProductId(id), name, unit, perishable: !non_perishable };
      let product =
        with_tenant(store, tenant, |ledger| async move { ledger.add_product(input).await })
          .await?;
      serde_json::to_value(product)?
    }
    Command::Product(ProductCommand::Show { id }) => {
      let product = with_tenant(store, tenant, |ledger| async move {
        ledger.get_product(ProductId(id)).await
      })
      .await?
      .with_context(|| format!("product {id} not found"))?;
      serde_json::to_value(product)?
    }
    Command::Product(ProductCommand::List) => {
      let products =
        with_tenant(store, tenant, |ledger| async move { ledger.list_products().await }).await?;
      serde_json::to_value(products)?
    }

    Command::Receive { location, product, quantity, batch, expires, note } => {
      let input = ReceiveStock {
        location_id: LocationId(location),
        product_id: ProductId(product),
        batch_label: batch,
        quantity,
        expires_on: expires,
        note: note.into(),
      };
      serde_json::to_value(ledger::receive_stock(store, tenant, input).await?)?
    }

    Command::Consume { location, product, quantity, note } => {
      let input = ConsumeStock {
        location_id: LocationId(location),
        product_id: ProductId(product),
        quantity,
        note: note.into(),
      };
      let consumption =
        with_tenant(store, tenant, |ledger| async move { ledger.consume(input).await }).await?;
      serde_json::to_value(consumption)?
    }

    Command::Adjust { lot, delta, note } => {
      let input = AdjustLot { lot_id: LotId::from_uuid(lot), delta, note: note.into() };
      let lot = with_tenant(store, tenant, |ledger| async move { ledger.adjust(input).await })
        .await?;
      serde_json::to_value(lot)?
    }

    Command::Transfer { from, to, product, quantity, note } => {
      let input = TransferStock {
        from: LocationId(from),
        to: LocationId(to),
        product_id: ProductId(product),
        quantity,
        note: note.into(),
      };
      let transfer =
        with_tenant(store, tenant, |ledger| async move { ledger.transfer(input).await }).await?;
      serde_json::to_value(transfer)?
    }

    Command::Block { lot, note } => {
      let lot = with_tenant(store, tenant, |ledger| async move {
        ledger.block_lot(LotId::from_uuid(lot), note.into()).await
      })
      .await?;
      serde_json::to_value(lot)?
    }
    Command::Unblock { lot, note } => {
      let lot = with_tenant(store, tenant, |ledger| async move {
        ledger.unblock_lot(LotId::from_uuid(lot), note.into()).await
      })
      .await?;
      serde_json::to_value(lot)?
    }

    Command::Lot { lot } => {
      let found = with_tenant(store, tenant, |ledger| async move {
        ledger.get_lot(LotId::from_uuid(lot)).await
      })
      .await?
      .with_context(|| format!("lot {lot} not found"))?;
      serde_json::to_value(found)?
    }

    Command::Lots { location, product, include_expired } => {
      let lots = ledger::list_lots(
        store,
        tenant,
        LocationId(location),
        ProductId(product),
        include_expired,
      )
      .await?;
      serde_json::to_value(lots)?
    }

    Command::Stock { location, product } => {
      let stock =
        ledger::get_aggregate(store, tenant, LocationId(location), ProductId(product)).await?;
      // No row yet means nothing was ever received.
      match stock {
        Some(stock) => serde_json::to_value(stock)?,
        None => json!({ "location_id": location, "product_id": product, "quantity": 0 }),
      }
    }

    Command::Thresholds { location, product, min, max } => {
      let thresholds = Thresholds { minimum: min, maximum: max };
      let stock = with_tenant(store, tenant, |ledger| async move {
        ledger.set_thresholds(LocationId(location), ProductId(product), thresholds).await
      })
      .await?;
      serde_json::to_value(stock)?
    }

    Command::History { location, product, from, to, limit } => {
      let mut cursor = ledger::get_history(
        store,
        tenant,
        LocationId(location),
        ProductId(product),
        from,
        to,
        store.options().history_page_size,
      )
      .await?;

      let mut records = Vec::new();
      while limit.is_none_or(|limit| records.len() < limit)
        && let Some(record) = cursor.next().await?
      {
        records.push(record);
      }
      serde_json::to_value(records)?
    }

    Command::Reconstruct { location, product } => {
      let (location, product) = (LocationId(location), ProductId(product));
      let (replayed, stored) = with_tenant(store, tenant, |ledger| async move {
        let replayed = history::reconstruct(&ledger, location, product).await?;
        let stored = ledger.aggregate(location, product).await?.map(|s| s.quantity);
        Ok((replayed, stored))
      })
      .await?;
      json!({
        "location_id": location,
        "product_id": product,
        "replayed": replayed,
        "stored": stored,
      })
    }

    Command::Sweep => {
      let flagged =
        with_tenant(store, tenant, |ledger| async move { ledger.sweep_expired().await }).await?;
      json!({ "flagged": flagged })
    }

    Command::Reconcile => {
      let report =
        with_tenant(store, tenant, |ledger| async move { ledger.reconcile().await }).await?;
      serde_json::to_value(report)?
    }
  };
  Ok(value)
}

async fn run_tenant(store: &SqliteStore, command: TenantCommand) -> anyhow::Result<Value> {
  let value = match command {
    TenantCommand::Create { name, max_locations, max_products } => {
      let tenant = store.create_tenant(name, TenantLimits { max_locations, max_products }).await?;
      serde_json::to_value(tenant)?
    }
    TenantCommand::Show { id } => {
      let tenant =
        store.get_tenant(id).await?.with_context(|| format!("tenant {id} not found"))?;
      serde_json::to_value(tenant)?
    }
    TenantCommand::Status { id, status } => {
      serde_json::to_value(store.set_tenant_status(id, status).await?)?
    }
  };
  Ok(value)
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn store_with_tenant() -> (SqliteStore, TenantId) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let created = run_tenant(&store, TenantCommand::Create {
      name:          "Rede Municipal".into(),
      max_locations: None,
      max_products:  None,
    })
    .await
    .unwrap();
    let tenant = serde_json::from_value(created["tenant_id"].clone()).unwrap();
    (store, tenant)
  }

  async fn exec(store: &SqliteStore, tenant: TenantId, command: Command) -> Value {
    run(store, Some(tenant), command).await.unwrap()
  }

  #[tokio::test]
  async fn tenant_scoped_commands_require_a_tenant() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let err = run(&store, None, Command::Sweep).await.unwrap_err();
    assert!(err.to_string().contains("no tenant given"));
  }

  #[tokio::test]
  async fn receive_then_consume_through_the_dispatcher() {
    let (store, tenant) = store_with_tenant().await;

    exec(&store, tenant, Command::Location(LocationCommand::Add { id: 1, name: "EM Centro".into() }))
      .await;
    exec(
      &store,
      tenant,
      Command::Product(ProductCommand::Add {
        id:             10,
        name:           "Arroz".into(),
        unit:           "kg".into(),
        non_perishable: true,
      }),
    )
    .await;

    exec(
      &store,
      tenant,
      Command::Receive {
        location: 1,
        product:  10,
        quantity: 12,
        batch:    String::new(),
        expires:  None,
        note:     NoteArgs::default(),
      },
    )
    .await;
    let consumed = exec(
      &store,
      tenant,
      Command::Consume { location: 1, product: 10, quantity: 5, note: NoteArgs::default() },
    )
    .await;
    assert_eq!(consumed["aggregate"]["quantity"], 7);

    let history = exec(
      &store,
      tenant,
      Command::History { location: 1, product: 10, from: None, to: None, limit: Some(1) },
    )
    .await;
    let records = history.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["kind"], "saida");

    let rebuilt = exec(&store, tenant, Command::Reconstruct { location: 1, product: 10 }).await;
    assert_eq!(rebuilt["replayed"], 7);
    assert_eq!(rebuilt["stored"], 7);
  }

  #[tokio::test]
  async fn stock_of_an_untouched_pair_is_zero() {
    let (store, tenant) = store_with_tenant().await;
    let stock = exec(&store, tenant, Command::Stock { location: 1, product: 10 }).await;
    assert_eq!(stock["quantity"], 0);
  }
}
