//! [`SqliteStore`], the SQLite implementation of [`MarkStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use marks_core::{
  mark::{Mark, MarkCounts, MarkType, UpsertKey},
  post::{NewPost, Post},
  store::MarkStore,
  user::{NewUser, User},
};

use crate::{
  Result,
  encode::{MARK_COLUMNS, RawMark, RawPost, RawUser, encode_dt, encode_uuid, now},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A mark store backed by a single SQLite file.
///
/// Clones share the same background connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  upsert_key: UpsertKey,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, upsert_key: UpsertKey::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, upsert_key: UpsertKey::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Choose the lookup key used by [`MarkStore::upsert_mark`].
  pub fn with_upsert_key(mut self, key: UpsertKey) -> Self {
    self.upsert_key = key;
    self
  }

  pub fn upsert_key(&self) -> UpsertKey { self.upsert_key }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("mark store schema ready");
    Ok(())
  }

  /// Run a `SELECT {MARK_COLUMNS} … WHERE <col> = ?1` style query.
  async fn query_marks(&self, sql: String, id: Uuid) -> Result<Vec<Mark>> {
    let id_str = encode_uuid(id);

    let raws: Vec<RawMark> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawMark::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMark::into_mark).collect()
  }
}

// ─── MarkStore impl ──────────────────────────────────────────────────────────

impl MarkStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:       Uuid::new_v4(),
      username:      input.username,
      password_hash: input.password_hash,
      created_at:    now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let name     = user.username.clone();
    let hash     = user.password_hash.clone();
    let at_str   = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, username, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, hash, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, username, password_hash, created_at
             FROM users WHERE user_id = ?1",
            rusqlite::params![id_str],
            RawUser::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
    let name = username.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, username, password_hash, created_at
             FROM users WHERE username = ?1",
            rusqlite::params![name],
            RawUser::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn delete_user(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM users WHERE user_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn add_post(&self, input: NewPost) -> Result<Post> {
    let post = Post {
      post_id:    Uuid::new_v4(),
      title:      input.title,
      body:       input.body,
      created_at: now(),
    };

    let id_str = encode_uuid(post.post_id);
    let title  = post.title.clone();
    let body   = post.body.clone();
    let at_str = encode_dt(post.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (post_id, title, body, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, title, body, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(post)
  }

  async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT post_id, title, body, created_at FROM posts WHERE post_id = ?1",
            rusqlite::params![id_str],
            RawPost::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn list_posts(&self) -> Result<Vec<Post>> {
    let raws: Vec<RawPost> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT post_id, title, body, created_at FROM posts
           ORDER BY created_at, rowid",
        )?;
        let rows = stmt
          .query_map([], RawPost::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn delete_post(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM posts WHERE post_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  // ── Marks ─────────────────────────────────────────────────────────────────

  async fn upsert_mark(
    &self,
    user_id:   Uuid,
    post_id:   Uuid,
    mark_type: MarkType,
  ) -> Result<Mark> {
    let new_id_str  = encode_uuid(Uuid::new_v4());
    let user_id_str = encode_uuid(user_id);
    let post_id_str = encode_uuid(post_id);
    let type_str    = String::from(mark_type);
    let now_str     = encode_dt(now());
    let key         = self.upsert_key;

    let raw: RawMark = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front, so the lookup and the write
        // below cannot interleave with another writer.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw = match key {
          UpsertKey::UserPostType => tx.query_row(
            &format!(
              "INSERT INTO marks ({MARK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
               ON CONFLICT (user_id, post_id, mark_type)
               DO UPDATE SET updated_at = MAX(marks.updated_at, excluded.updated_at)
               RETURNING {MARK_COLUMNS}"
            ),
            rusqlite::params![new_id_str, user_id_str, post_id_str, type_str, now_str],
            RawMark::from_row,
          )?,

          UpsertKey::UserType => {
            // Several rows can match if some were written under
            // `UserPostType`; prefer the one already on this post so the move
            // cannot collide with the unique constraint.
            let existing: Option<String> = tx
              .query_row(
                "SELECT mark_id FROM marks
                 WHERE user_id = ?1 AND mark_type = ?2
                 ORDER BY post_id = ?3 DESC, updated_at DESC, mark_id
                 LIMIT 1",
                rusqlite::params![user_id_str, type_str, post_id_str],
                |row| row.get(0),
              )
              .optional()?;

            match existing {
              Some(mark_id) => tx.query_row(
                &format!(
                  "UPDATE marks
                   SET post_id = ?2, updated_at = MAX(updated_at, ?3)
                   WHERE mark_id = ?1
                   RETURNING {MARK_COLUMNS}"
                ),
                rusqlite::params![mark_id, post_id_str, now_str],
                RawMark::from_row,
              )?,
              None => tx.query_row(
                &format!(
                  "INSERT INTO marks ({MARK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                   RETURNING {MARK_COLUMNS}"
                ),
                rusqlite::params![new_id_str, user_id_str, post_id_str, type_str, now_str],
                RawMark::from_row,
              )?,
            }
          }
        };

        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_mark()
  }

  async fn count_by_type(&self, post_id: Uuid, mark_type: &str) -> Result<u64> {
    let post_id_str = encode_uuid(post_id);
    let type_str    = mark_type.to_owned();

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM marks WHERE post_id = ?1 AND mark_type = ?2",
          rusqlite::params![post_id_str, type_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(n as u64)
  }

  async fn counts_for_post(&self, post_id: Uuid) -> Result<MarkCounts> {
    let post_id_str = encode_uuid(post_id);

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT mark_type, COUNT(*) FROM marks WHERE post_id = ?1 GROUP BY mark_type",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![post_id_str], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(rows.into_iter().map(|(t, n)| (t, n as u64)).collect())
  }

  async fn marks_for_post(&self, post_id: Uuid) -> Result<Vec<Mark>> {
    self
      .query_marks(
        format!(
          "SELECT {MARK_COLUMNS} FROM marks WHERE post_id = ?1 ORDER BY created_at, rowid"
        ),
        post_id,
      )
      .await
  }

  async fn marks_for_user(&self, user_id: Uuid) -> Result<Vec<Mark>> {
    self
      .query_marks(
        format!(
          "SELECT {MARK_COLUMNS} FROM marks WHERE user_id = ?1 ORDER BY created_at, rowid"
        ),
        user_id,
      )
      .await
  }
}
