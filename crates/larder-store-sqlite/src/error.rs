//! Error type for `larder-store-sqlite`.

use larder_core::ErrorClass;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Core(#[from] larder_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value in database: {value:?}")]
  Decode { column: &'static str, value: String },
}

impl Error {
  pub fn class(&self) -> ErrorClass {
    match self {
      Self::Core(e) => e.class(),
      _ => ErrorClass::Internal,
    }
  }

  pub fn is_retryable(&self) -> bool { self.class() == ErrorClass::Concurrency }

  /// The core error, when this is one.
  pub fn as_core(&self) -> Option<&larder_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

fn is_busy(err: &rusqlite::Error) -> bool {
  matches!(
    err.sqlite_error_code(),
    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
  )
}

// SQLite reports an exhausted busy timeout as BUSY/LOCKED; both mean another
// writer held the lock for longer than the configured bound.
impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    if is_busy(&err) {
      Self::Core(larder_core::Error::LockTimeout)
    } else {
      Self::Sqlite(err)
    }
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Rusqlite(inner) => inner.into(),
      other => Self::Database(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
