//! Error types for `marks-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// No authenticated identity was supplied with the request.
  #[error("not authenticated")]
  Unauthenticated,

  #[error("post not found: {0}")]
  PostNotFound(Uuid),

  #[error("invalid mark type: {0:?}")]
  InvalidType(String),

  /// A referenced user or post row is missing at write time.
  #[error("referential integrity violation: {0}")]
  Referential(String),

  /// A uniqueness constraint rejected the write.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
