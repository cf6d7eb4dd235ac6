//! Error type for `marks-store-sqlite`.

use marks_core::store::{StoreError, StoreErrorKind};
use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] marks_core::Error),

  #[error("database error: {0}")]
  Database(#[source] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A foreign key rejected the write: the user or post does not exist.
  #[error("referenced user or post does not exist")]
  Referential,

  /// A UNIQUE or PRIMARY KEY constraint rejected the write.
  #[error("unique constraint violated: {0}")]
  Conflict(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      failure,
      message,
    )) = &e
    {
      let text = message.clone().unwrap_or_else(|| failure.to_string());
      match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Error::Referential,
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
          return Error::Conflict(text);
        }
        // Primary result code only; fall back to SQLite's message prefix.
        _ if failure.code == rusqlite::ErrorCode::ConstraintViolation => {
          if text.starts_with("FOREIGN KEY") {
            return Error::Referential;
          }
          if text.starts_with("UNIQUE") {
            return Error::Conflict(text);
          }
        }
        _ => {}
      }
    }
    Error::Database(e)
  }
}

impl StoreError for Error {
  fn kind(&self) -> StoreErrorKind {
    match self {
      Error::Referential => StoreErrorKind::Referential,
      Error::Conflict(_) => StoreErrorKind::Conflict,
      _ => StoreErrorKind::Other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
