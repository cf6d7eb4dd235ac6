//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (UTC, microsecond
//! precision) so that lexicographic order matches chronological order. UUIDs
//! are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use marks_core::{
  mark::{Mark, MarkType},
  post::Post,
  user::User,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the columns keep, so a value handed
/// back to the caller equals the one read back later.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawMark::from_row`].
pub const MARK_COLUMNS: &str =
  "mark_id, user_id, post_id, mark_type, created_at, updated_at";

/// Raw strings read directly from a `marks` row.
pub struct RawMark {
  pub mark_id:    String,
  pub user_id:    String,
  pub post_id:    String,
  pub mark_type:  String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawMark {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      mark_id:    row.get(0)?,
      user_id:    row.get(1)?,
      post_id:    row.get(2)?,
      mark_type:  row.get(3)?,
      created_at: row.get(4)?,
      updated_at: row.get(5)?,
    })
  }

  pub fn into_mark(self) -> Result<Mark> {
    Ok(Mark {
      mark_id:    decode_uuid(&self.mark_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      post_id:    decode_uuid(&self.post_id)?,
      mark_type:  MarkType::new(&self.mark_type)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `posts` row.
pub struct RawPost {
  pub post_id:    String,
  pub title:      String,
  pub body:       String,
  pub created_at: String,
}

impl RawPost {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post_id:    row.get(0)?,
      title:      row.get(1)?,
      body:       row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      post_id:    decode_uuid(&self.post_id)?,
      title:      self.title,
      body:       self.body,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub username:      String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      username:      row.get(1)?,
      password_hash: row.get(2)?,
      created_at:    row.get(3)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:       decode_uuid(&self.user_id)?,
      username:      self.username,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}
