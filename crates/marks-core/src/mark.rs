//! Mark types: the reaction label, the stored mark row and per-post counts.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── MarkType ────────────────────────────────────────────────────────────────

/// Labels offered by the stock reaction picker plus the three dedicated
/// entry points.
pub const DEFAULT_VOCABULARY: &[&str] = &[
  "like", "love", "haha", "wow", "sad", "angry", "favorite", "bookmark",
];

/// The label naming a reaction kind, e.g. `"like"` or `"bookmark"`.
///
/// Any non-empty string is a valid label at the storage level; a fixed
/// vocabulary is a policy of [`crate::service::TypePolicy`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarkType(String);

impl MarkType {
  pub const LIKE: &'static str = "like";
  pub const FAVORITE: &'static str = "favorite";
  pub const BOOKMARK: &'static str = "bookmark";

  /// Validate and wrap a label. Surrounding whitespace is trimmed; a blank
  /// label is rejected.
  pub fn new(raw: impl AsRef<str>) -> Result<Self> {
    let trimmed = raw.as_ref().trim();
    if trimmed.is_empty() {
      return Err(Error::InvalidType(raw.as_ref().to_owned()));
    }
    Ok(Self(trimmed.to_owned()))
  }

  pub fn like() -> Self { Self(Self::LIKE.to_owned()) }

  pub fn favorite() -> Self { Self(Self::FAVORITE.to_owned()) }

  pub fn bookmark() -> Self { Self(Self::BOOKMARK.to_owned()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for MarkType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for MarkType {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl From<MarkType> for String {
  fn from(value: MarkType) -> Self { value.0 }
}

// ─── Mark ────────────────────────────────────────────────────────────────────

/// One user's reaction of one type on one post.
///
/// Only `post_id` and `updated_at` ever change after creation; the row is
/// removed only when its post or user is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
  pub mark_id:    Uuid,
  pub user_id:    Uuid,
  pub post_id:    Uuid,
  pub mark_type:  MarkType,
  pub created_at: DateTime<Utc>,
  /// Refreshed on every re-mark; never moves backwards.
  pub updated_at: DateTime<Utc>,
}

// ─── UpsertKey ───────────────────────────────────────────────────────────────

/// The field set used to find an existing mark during an upsert.
///
/// The table's unique constraint is always `(user_id, post_id, mark_type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertKey {
  /// Look up by `(user_id, mark_type)` and move the match to the new post.
  ///
  /// A user holds at most one mark of each type overall, on the post they
  /// most recently marked with it.
  #[default]
  UserType,
  /// Look up by `(user_id, post_id, mark_type)`; one mark of each type per
  /// post.
  UserPostType,
}

// ─── MarkCounts ──────────────────────────────────────────────────────────────

/// Number of marks on one post, keyed by type. Types with no marks are
/// absent and read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkCounts(BTreeMap<String, u64>);

impl MarkCounts {
  pub fn get(&self, mark_type: &str) -> u64 {
    self.0.get(mark_type).copied().unwrap_or(0)
  }

  pub fn likes(&self) -> u64 { self.get(MarkType::LIKE) }

  pub fn favorites(&self) -> u64 { self.get(MarkType::FAVORITE) }

  pub fn bookmarks(&self) -> u64 { self.get(MarkType::BOOKMARK) }

  pub fn total(&self) -> u64 { self.0.values().sum() }
}

impl FromIterator<(String, u64)> for MarkCounts {
  fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
    let mut counts = BTreeMap::new();
    for (mark_type, n) in iter {
      *counts.entry(mark_type).or_insert(0) += n;
    }
    Self(counts)
  }
}
