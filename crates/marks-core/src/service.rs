//! [`ReactionService`]: the "mark a post" operation exposed to callers.
//!
//! The service is stateless: every call takes the acting [`Identity`]
//! explicitly, resolves the post, validates the type and delegates the write
//! to the [`MarkStore`].

use std::{collections::BTreeSet, sync::Arc};

use uuid::Uuid;

use crate::{
  Error, Result,
  mark::{DEFAULT_VOCABULARY, Mark, MarkType},
  post::{Post, PostSummary},
  store::{MarkStore, classify},
  user::Identity,
};

// ─── Type policy ─────────────────────────────────────────────────────────────

/// Which labels the generic react entry point accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypePolicy {
  /// Any non-blank label.
  #[default]
  Open,
  /// Only the listed labels.
  AllowList(BTreeSet<String>),
}

impl TypePolicy {
  pub fn allow_list<I, T>(types: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    Self::AllowList(
      types
        .into_iter()
        .map(|t| t.into().trim().to_owned())
        .collect(),
    )
  }

  /// Allow-list of [`DEFAULT_VOCABULARY`].
  pub fn default_vocabulary() -> Self {
    Self::allow_list(DEFAULT_VOCABULARY.iter().copied())
  }

  /// Validate a caller-supplied label against this policy.
  pub fn check(&self, raw: &str) -> Result<MarkType> {
    let mark_type = MarkType::new(raw)?;
    match self {
      Self::Open => Ok(mark_type),
      Self::AllowList(allowed) if allowed.contains(mark_type.as_str()) => {
        Ok(mark_type)
      }
      Self::AllowList(_) => Err(Error::InvalidType(raw.to_owned())),
    }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct ReactionService<S> {
  store:  Arc<S>,
  policy: TypePolicy,
}

impl<S> Clone for ReactionService<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), policy: self.policy.clone() }
  }
}

impl<S: MarkStore> ReactionService<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, policy: TypePolicy::default() }
  }

  pub fn with_policy(mut self, policy: TypePolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Mark `post_id` with a caller-supplied label (the generic react entry
  /// point). The label is checked against the configured [`TypePolicy`].
  pub async fn mark_post(
    &self,
    actor: Option<&Identity>,
    post_id: Uuid,
    mark_type: &str,
  ) -> Result<Mark> {
    let actor = actor.ok_or(Error::Unauthenticated)?;
    let mark_type = self.policy.check(mark_type)?;
    self.mark_as(actor, post_id, mark_type).await
  }

  pub async fn like(&self, actor: Option<&Identity>, post_id: Uuid) -> Result<Mark> {
    let actor = actor.ok_or(Error::Unauthenticated)?;
    self.mark_as(actor, post_id, MarkType::like()).await
  }

  pub async fn favorite(&self, actor: Option<&Identity>, post_id: Uuid) -> Result<Mark> {
    let actor = actor.ok_or(Error::Unauthenticated)?;
    self.mark_as(actor, post_id, MarkType::favorite()).await
  }

  pub async fn bookmark(&self, actor: Option<&Identity>, post_id: Uuid) -> Result<Mark> {
    let actor = actor.ok_or(Error::Unauthenticated)?;
    self.mark_as(actor, post_id, MarkType::bookmark()).await
  }

  async fn mark_as(
    &self,
    actor: &Identity,
    post_id: Uuid,
    mark_type: MarkType,
  ) -> Result<Mark> {
    self.require_post(post_id).await?;

    let first = self
      .store
      .upsert_mark(actor.user_id, post_id, mark_type.clone())
      .await
      .map_err(classify);

    // A unique-constraint race is retried once as a fresh upsert, which now
    // finds the winner's row and touches it.
    let mark = match first {
      Err(Error::Conflict(reason)) => {
        tracing::warn!(
          user = %actor.user_id,
          post = %post_id,
          mark_type = %mark_type,
          %reason,
          "mark upsert conflicted; retrying"
        );
        self
          .store
          .upsert_mark(actor.user_id, post_id, mark_type)
          .await
          .map_err(classify)?
      }
      other => other?,
    };

    tracing::debug!(
      user = %mark.user_id,
      post = %mark.post_id,
      mark_type = %mark.mark_type,
      mark = %mark.mark_id,
      "post marked"
    );
    Ok(mark)
  }

  async fn require_post(&self, post_id: Uuid) -> Result<Post> {
    self
      .store
      .get_post(post_id)
      .await
      .map_err(classify)?
      .ok_or(Error::PostNotFound(post_id))
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Number of `mark_type` marks on an existing post.
  pub async fn count_by_type(&self, post_id: Uuid, mark_type: &str) -> Result<u64> {
    self.require_post(post_id).await?;
    self
      .store
      .count_by_type(post_id, mark_type)
      .await
      .map_err(classify)
  }

  /// The post plus its per-type counts.
  pub async fn post_summary(&self, post_id: Uuid) -> Result<PostSummary> {
    let post = self.require_post(post_id).await?;
    let counts = self
      .store
      .counts_for_post(post_id)
      .await
      .map_err(classify)?;
    Ok(PostSummary { post, counts })
  }

  /// Every post with its counts, oldest first.
  pub async fn list_summaries(&self) -> Result<Vec<PostSummary>> {
    let posts = self.store.list_posts().await.map_err(classify)?;
    let mut summaries = Vec::with_capacity(posts.len());
    for post in posts {
      let counts = self
        .store
        .counts_for_post(post.post_id)
        .await
        .map_err(classify)?;
      summaries.push(PostSummary { post, counts });
    }
    Ok(summaries)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use chrono::Utc;

  use super::*;
  use crate::{
    mark::MarkCounts,
    post::NewPost,
    store::{StoreError, StoreErrorKind},
    user::{NewUser, User},
  };

  // A minimal in-memory store keyed on (user, type), enough to exercise the
  // service's validation and retry paths.

  #[derive(Debug, thiserror::Error)]
  enum FakeError {
    #[error("simulated unique violation")]
    Conflict,
    #[error("simulated missing reference")]
    Missing,
  }

  impl StoreError for FakeError {
    fn kind(&self) -> StoreErrorKind {
      match self {
        FakeError::Conflict => StoreErrorKind::Conflict,
        FakeError::Missing => StoreErrorKind::Referential,
      }
    }
  }

  #[derive(Default)]
  struct FakeStore {
    posts:           Mutex<Vec<Post>>,
    marks:           Mutex<Vec<Mark>>,
    conflicts_left:  Mutex<u32>,
    upsert_attempts: Mutex<u32>,
  }

  impl FakeStore {
    fn with_post() -> (Self, Uuid) {
      let store = Self::default();
      let post_id = Uuid::new_v4();
      store.posts.lock().unwrap().push(Post {
        post_id,
        title:      "Hello".into(),
        body:       "World".into(),
        created_at: Utc::now(),
      });
      (store, post_id)
    }

    fn mark_count(&self) -> usize { self.marks.lock().unwrap().len() }
  }

  impl MarkStore for FakeStore {
    type Error = FakeError;

    async fn add_user(&self, _: NewUser) -> Result<User, FakeError> { unimplemented!() }
    async fn get_user(&self, _: Uuid) -> Result<Option<User>, FakeError> { unimplemented!() }
    async fn find_user_by_name(&self, _: &str) -> Result<Option<User>, FakeError> { unimplemented!() }
    async fn delete_user(&self, _: Uuid) -> Result<bool, FakeError> { unimplemented!() }
    async fn add_post(&self, _: NewPost) -> Result<Post, FakeError> { unimplemented!() }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, FakeError> {
      Ok(self.posts.lock().unwrap().iter().find(|p| p.post_id == id).cloned())
    }

    async fn list_posts(&self) -> Result<Vec<Post>, FakeError> {
      Ok(self.posts.lock().unwrap().clone())
    }

    async fn delete_post(&self, _: Uuid) -> Result<bool, FakeError> { unimplemented!() }

    async fn upsert_mark(
      &self,
      user_id: Uuid,
      post_id: Uuid,
      mark_type: MarkType,
    ) -> Result<Mark, FakeError> {
      *self.upsert_attempts.lock().unwrap() += 1;
      {
        let mut left = self.conflicts_left.lock().unwrap();
        if *left > 0 {
          *left -= 1;
          return Err(FakeError::Conflict);
        }
      }
      if !self.posts.lock().unwrap().iter().any(|p| p.post_id == post_id) {
        return Err(FakeError::Missing);
      }

      let now = Utc::now();
      let mut marks = self.marks.lock().unwrap();
      if let Some(m) = marks
        .iter_mut()
        .find(|m| m.user_id == user_id && m.mark_type == mark_type)
      {
        m.post_id = post_id;
        m.updated_at = now;
        return Ok(m.clone());
      }
      let mark = Mark {
        mark_id: Uuid::new_v4(),
        user_id,
        post_id,
        mark_type,
        created_at: now,
        updated_at: now,
      };
      marks.push(mark.clone());
      Ok(mark)
    }

    async fn count_by_type(&self, post_id: Uuid, mark_type: &str) -> Result<u64, FakeError> {
      Ok(
        self
          .marks
          .lock()
          .unwrap()
          .iter()
          .filter(|m| m.post_id == post_id && m.mark_type.as_str() == mark_type)
          .count() as u64,
      )
    }

    async fn counts_for_post(&self, post_id: Uuid) -> Result<MarkCounts, FakeError> {
      Ok(
        self
          .marks
          .lock()
          .unwrap()
          .iter()
          .filter(|m| m.post_id == post_id)
          .map(|m| (m.mark_type.to_string(), 1))
          .collect(),
      )
    }

    async fn marks_for_post(&self, _: Uuid) -> Result<Vec<Mark>, FakeError> { unimplemented!() }
    async fn marks_for_user(&self, _: Uuid) -> Result<Vec<Mark>, FakeError> { unimplemented!() }
  }

  fn identity() -> Identity {
    Identity { user_id: Uuid::new_v4(), username: "alice".into() }
  }

  #[tokio::test]
  async fn unauthenticated_call_writes_nothing() {
    let (store, post_id) = FakeStore::with_post();
    let service = ReactionService::new(Arc::new(store));

    let err = service.mark_post(None, post_id, "like").await.unwrap_err();
    assert!(matches!(err, Error::Unauthenticated));
    let err = service.bookmark(None, post_id).await.unwrap_err();
    assert!(matches!(err, Error::Unauthenticated));
    assert_eq!(service.store().mark_count(), 0);
  }

  #[tokio::test]
  async fn unknown_post_is_not_found_and_writes_nothing() {
    let (store, _) = FakeStore::with_post();
    let service = ReactionService::new(Arc::new(store));
    let missing = Uuid::new_v4();

    let err = service
      .like(Some(&identity()), missing)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::PostNotFound(id) if id == missing));
    assert_eq!(service.store().mark_count(), 0);
    assert_eq!(*service.store().upsert_attempts.lock().unwrap(), 0);
  }

  #[tokio::test]
  async fn blank_type_is_rejected() {
    let (store, post_id) = FakeStore::with_post();
    let service = ReactionService::new(Arc::new(store));

    let err = service
      .mark_post(Some(&identity()), post_id, "  ")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidType(_)));
    assert_eq!(service.store().mark_count(), 0);
  }

  #[tokio::test]
  async fn open_policy_accepts_any_label() {
    let (store, post_id) = FakeStore::with_post();
    let service = ReactionService::new(Arc::new(store));

    let mark = service
      .mark_post(Some(&identity()), post_id, "likee")
      .await
      .unwrap();
    assert_eq!(mark.mark_type.as_str(), "likee");
  }

  #[tokio::test]
  async fn allow_list_rejects_unlisted_labels() {
    let (store, post_id) = FakeStore::with_post();
    let service = ReactionService::new(Arc::new(store))
      .with_policy(TypePolicy::default_vocabulary());
    let me = identity();

    assert!(service.mark_post(Some(&me), post_id, "haha").await.is_ok());
    let err = service
      .mark_post(Some(&me), post_id, "likee")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidType(t) if t == "likee"));
    assert_eq!(service.store().mark_count(), 1);
  }

  #[tokio::test]
  async fn dedicated_entry_points_use_fixed_types() {
    let (store, post_id) = FakeStore::with_post();
    let service = ReactionService::new(Arc::new(store));
    let me = identity();

    let like = service.like(Some(&me), post_id).await.unwrap();
    let fav = service.favorite(Some(&me), post_id).await.unwrap();
    let bm = service.bookmark(Some(&me), post_id).await.unwrap();
    assert_eq!(like.mark_type, MarkType::like());
    assert_eq!(fav.mark_type, MarkType::favorite());
    assert_eq!(bm.mark_type, MarkType::bookmark());

    let summary = service.post_summary(post_id).await.unwrap();
    assert_eq!(summary.counts.likes(), 1);
    assert_eq!(summary.counts.favorites(), 1);
    assert_eq!(summary.counts.bookmarks(), 1);
  }

  #[tokio::test]
  async fn conflict_is_retried_once() {
    let (store, post_id) = FakeStore::with_post();
    *store.conflicts_left.lock().unwrap() = 1;
    let service = ReactionService::new(Arc::new(store));

    let mark = service.like(Some(&identity()), post_id).await.unwrap();
    assert_eq!(mark.post_id, post_id);
    assert_eq!(*service.store().upsert_attempts.lock().unwrap(), 2);
  }

  #[tokio::test]
  async fn repeated_conflict_surfaces() {
    let (store, post_id) = FakeStore::with_post();
    *store.conflicts_left.lock().unwrap() = 2;
    let service = ReactionService::new(Arc::new(store));

    let err = service.like(Some(&identity()), post_id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(service.store().mark_count(), 0);
  }

  #[tokio::test]
  async fn count_for_missing_post_is_not_found() {
    let (store, _) = FakeStore::with_post();
    let service = ReactionService::new(Arc::new(store));
    let err = service
      .count_by_type(Uuid::new_v4(), "like")
      .await
      .unwrap_err();
    assert!(matches!(err, Error::PostNotFound(_)));
  }

  #[test]
  fn allow_list_trims_entries() {
    let policy = TypePolicy::allow_list([" wow "]);
    assert_eq!(policy.check("wow").unwrap().as_str(), "wow");
    assert!(policy.check("sad").is_err());
  }
}
