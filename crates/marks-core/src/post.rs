//! Posts: the pre-existing entities that marks point at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mark::MarkCounts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub post_id:    Uuid,
  pub title:      String,
  pub body:       String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::MarkStore::add_post`].
#[derive(Debug, Clone)]
pub struct NewPost {
  pub title: String,
  pub body:  String,
}

impl NewPost {
  pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
    Self { title: title.into(), body: body.into() }
  }
}

/// A post together with its current mark counts, the read model behind the
/// listing pages. Never stored, always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
  #[serde(flatten)]
  pub post:   Post,
  pub counts: MarkCounts,
}
