//! Time source for expiration checks and record timestamps.

use std::fmt::Debug;

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock: Debug + Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// The calendar day expirations are compared against.
  fn today(&self) -> NaiveDate { self.now().date_naive() }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock pinned to one instant. Used by tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
  /// Midnight UTC on `date`.
  pub fn on(date: NaiveDate) -> Self { Self(date.and_time(chrono::NaiveTime::MIN).and_utc()) }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> { self.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fixed_clock_reports_its_date() {
    let day: NaiveDate = "2024-01-05".parse().unwrap();
    assert_eq!(FixedClock::on(day).today(), day);
  }
}
