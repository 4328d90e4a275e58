//! Lazy, restartable access to a pair's movement history.

use std::collections::VecDeque;

use crate::{
  context,
  id::{LocationId, ProductId},
  movement::{HistoryQuery, MovementRecord, replay},
  store::InventoryLedger,
};

/// Default number of records fetched per round trip.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A newest-first cursor over the movement ledger.
///
/// Records are fetched a page at a time as [`History::next`] drains the
/// buffer, using the sequence of the last record seen as a keyset, so pages
/// stay stable while new records are appended. The cursor owns a session and
/// therefore stays bound to that session's tenant: outside any tenant scope
/// it binds its own for each fetch, inside another tenant's scope the fetch
/// fails.
pub struct History<L> {
  ledger:    L,
  query:     HistoryQuery,
  page_size: usize,
  buffer:    VecDeque<MovementRecord>,
  before:    Option<i64>,
  exhausted: bool,
}

impl<L: InventoryLedger> History<L> {
  pub fn new(ledger: L, query: HistoryQuery, page_size: usize) -> Self {
    Self {
      ledger,
      query,
      page_size: page_size.max(1),
      buffer: VecDeque::new(),
      before: None,
      exhausted: false,
    }
  }

  pub fn query(&self) -> &HistoryQuery { &self.query }

  /// The next older record, or `None` once the history is drained.
  pub async fn next(&mut self) -> Result<Option<MovementRecord>, L::Error> {
    if self.buffer.is_empty() && !self.exhausted {
      self.fill().await?;
    }
    Ok(self.buffer.pop_front())
  }

  /// Rewind to the newest record. Records appended since the cursor was
  /// created become visible.
  pub fn restart(&mut self) {
    self.buffer.clear();
    self.before = None;
    self.exhausted = false;
  }

  /// Drain the remaining records, newest first.
  pub async fn collect_all(mut self) -> Result<Vec<MovementRecord>, L::Error> {
    let mut out = Vec::new();
    while let Some(record) = self.next().await? {
      out.push(record);
    }
    Ok(out)
  }

  async fn fill(&mut self) -> Result<(), L::Error> {
    let fetch = self.ledger.history_page(self.query, self.before, self.page_size);
    let page = match context::current() {
      Some(_) => fetch.await?,
      None => context::scope(self.ledger.tenant_id(), fetch).await?,
    };

    if page.len() < self.page_size {
      self.exhausted = true;
    }
    if let Some(last) = page.last() {
      self.before = Some(last.sequence);
    }
    self.buffer.extend(page);
    Ok(())
  }
}

/// Rebuild a pair's aggregate quantity by replaying its whole history
/// oldest-first from zero.
pub async fn reconstruct<L>(
  ledger: &L,
  location: LocationId,
  product: ProductId,
) -> Result<i64, L::Error>
where
  L: InventoryLedger + Clone,
{
  let mut records =
    History::new(ledger.clone(), HistoryQuery::new(location, product), DEFAULT_PAGE_SIZE)
      .collect_all()
      .await?;
  records.reverse();
  Ok(replay(&records)?)
}
