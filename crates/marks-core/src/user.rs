//! Users and the authenticated identity passed to the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
  pub user_id:       Uuid,
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::MarkStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub password_hash: String,
}

/// A user whose credentials have been verified for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub user_id:  Uuid,
  pub username: String,
}

impl From<&User> for Identity {
  fn from(user: &User) -> Self {
    Self { user_id: user.user_id, username: user.username.clone() }
  }
}
