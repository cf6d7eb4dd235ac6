//! The `MarkStore` trait and its error classification.
//!
//! The trait is implemented by storage backends (e.g. `marks-store-sqlite`).
//! Higher layers ([`crate::service`], `marks-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  mark::{Mark, MarkCounts, MarkType},
  post::{NewPost, Post},
  user::{NewUser, User},
};

// ─── Error classification ────────────────────────────────────────────────────

/// The broad category of a backend failure, as far as callers need to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// A foreign key target (user or post) does not exist.
  Referential,
  /// A uniqueness constraint rejected the write.
  Conflict,
  Other,
}

/// Backend errors that can say which [`StoreErrorKind`] they belong to.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> StoreErrorKind;
}

/// Convert a backend error into the core taxonomy, keeping the source for
/// uncategorised failures.
pub fn classify<E: StoreError>(e: E) -> crate::Error {
  match e.kind() {
    StoreErrorKind::Referential => crate::Error::Referential(e.to_string()),
    StoreErrorKind::Conflict => crate::Error::Conflict(e.to_string()),
    StoreErrorKind::Other => crate::Error::Store(Box::new(e)),
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a mark store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait MarkStore: Send + Sync {
  type Error: StoreError;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create a user. Fails with a conflict if the username is taken.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_user_by_name<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Delete a user and, by cascade, all of their marks. Returns `false` if
  /// no such user existed.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  fn add_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Retrieve a post by UUID. Returns `None` if not found.
  fn get_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// All posts, oldest first.
  fn list_posts(
    &self,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  /// Delete a post and, by cascade, all of its marks. Returns `false` if no
  /// such post existed.
  fn delete_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Marks ─────────────────────────────────────────────────────────────

  /// Create the mark for the backend's lookup key, or move and touch the
  /// existing one. Runs as a single atomic write.
  ///
  /// Fails with a referential error if `user_id` or `post_id` does not exist
  /// and with a conflict if the unique constraint rejects the write.
  fn upsert_mark(
    &self,
    user_id: Uuid,
    post_id: Uuid,
    mark_type: MarkType,
  ) -> impl Future<Output = Result<Mark, Self::Error>> + Send + '_;

  /// Number of marks of `mark_type` on `post_id`. Always a fresh count.
  fn count_by_type<'a>(
    &'a self,
    post_id: Uuid,
    mark_type: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Counts for every type present on `post_id`.
  fn counts_for_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<MarkCounts, Self::Error>> + Send + '_;

  fn marks_for_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Mark>, Self::Error>> + Send + '_;

  fn marks_for_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Mark>, Self::Error>> + Send + '_;
}
