//! HTTP surface for post marks.
//!
//! Exposes an axum [`Router`] backed by any [`MarkStore`] through a
//! [`ReactionService`]. Every route requires HTTP Basic credentials checked
//! against the store's users; TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(marks_api::api_router(ApiState::new(service)))
//! ```

pub mod auth;
pub mod error;
pub mod marks;
pub mod posts;

use std::sync::Arc;

use axum::{
  Router, middleware,
  routing::{get, post},
};
use marks_core::{service::ReactionService, store::MarkStore};

pub use error::ApiError;

/// Where mark entry points redirect when the request carries no usable
/// `Referer`.
pub const DEFAULT_FALLBACK_REDIRECT: &str = "/posts";

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct ApiState<S> {
  pub service:           ReactionService<S>,
  pub fallback_redirect: Arc<str>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      service:           self.service.clone(),
      fallback_redirect: Arc::clone(&self.fallback_redirect),
    }
  }
}

impl<S: MarkStore> ApiState<S> {
  pub fn new(service: ReactionService<S>) -> Self {
    Self { service, fallback_redirect: Arc::from(DEFAULT_FALLBACK_REDIRECT) }
  }

  pub fn with_fallback_redirect(mut self, path: impl Into<Arc<str>>) -> Self {
    self.fallback_redirect = path.into();
    self
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised router for `state`.
///
/// The returned `Router<()>` can be merged or nested into any parent router
/// regardless of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: MarkStore + 'static,
{
  Router::new()
    // Reads
    .route("/posts", get(posts::list::<S>))
    .route("/posts/{id}", get(posts::get_one::<S>))
    .route("/posts/{id}/counts/{mark_type}", get(posts::count::<S>))
    // Marks
    .route("/posts/{id}/like", post(marks::like::<S>))
    .route("/posts/{id}/favorite", post(marks::favorite::<S>))
    .route("/posts/{id}/bookmark", post(marks::bookmark::<S>))
    .route("/posts/{id}/react", post(marks::react::<S>))
    .route_layer(middleware::from_fn_with_state(
      state.clone(),
      auth::require_identity,
    ))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use marks_core::{
    post::{NewPost, Post},
    service::TypePolicy,
    user::{NewUser, User},
  };
  use marks_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  struct Fixture {
    store: Arc<SqliteStore>,
    alice: User,
    post:  Post,
  }

  async fn fixture() -> Fixture {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();
    let alice = store
      .add_user(NewUser { username: "alice".into(), password_hash: hash })
      .await
      .unwrap();
    let post = store.add_post(NewPost::new("Hello", "World")).await.unwrap();
    Fixture { store, alice, post }
  }

  fn app(f: &Fixture, policy: TypePolicy) -> Router {
    let service = ReactionService::new(Arc::clone(&f.store)).with_policy(policy);
    api_router(ApiState::new(service))
  }

  fn auth_header() -> String {
    format!("Basic {}", B64.encode("alice:secret"))
  }

  async fn send(
    app:     Router,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, String)>,
    body:    &str,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    app.oneshot(req).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  // ── Dedicated entry points ───────────────────────────────────────────────────

  #[tokio::test]
  async fn like_redirects_back_and_counts() {
    let f = fixture().await;
    let uri = format!("/posts/{}/like", f.post.post_id);

    for _ in 0..2 {
      let resp = send(
        app(&f, TypePolicy::Open),
        "POST",
        &uri,
        vec![
          (header::AUTHORIZATION, auth_header()),
          (header::REFERER, "/posts?sort=new".into()),
        ],
        "",
      )
      .await;
      assert_eq!(resp.status(), StatusCode::SEE_OTHER);
      assert_eq!(resp.headers()[header::LOCATION], "/posts?sort=new");
    }

    assert_eq!(f.store.count_by_type(f.post.post_id, "like").await.unwrap(), 1);
  }

  #[tokio::test]
  async fn favorite_and_bookmark_use_fallback_location() {
    let f = fixture().await;
    for action in ["favorite", "bookmark"] {
      let resp = send(
        app(&f, TypePolicy::Open),
        "POST",
        &format!("/posts/{}/{action}", f.post.post_id),
        vec![(header::AUTHORIZATION, auth_header())],
        "",
      )
      .await;
      assert_eq!(resp.status(), StatusCode::SEE_OTHER);
      assert_eq!(resp.headers()[header::LOCATION], DEFAULT_FALLBACK_REDIRECT);
    }

    let counts = f.store.counts_for_post(f.post.post_id).await.unwrap();
    assert_eq!(counts.favorites(), 1);
    assert_eq!(counts.bookmarks(), 1);
  }

  #[tokio::test]
  async fn unauthenticated_mark_returns_401_and_writes_nothing() {
    let f = fixture().await;
    let uri = format!("/posts/{}/like", f.post.post_id);

    let anonymous = send(app(&f, TypePolicy::Open), "POST", &uri, vec![], "").await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert!(anonymous.headers().contains_key(header::WWW_AUTHENTICATE));

    let bad_password = send(
      app(&f, TypePolicy::Open),
      "POST",
      &uri,
      vec![(header::AUTHORIZATION, format!("Basic {}", B64.encode("alice:nope")))],
      "",
    )
    .await;
    assert_eq!(bad_password.status(), StatusCode::UNAUTHORIZED);

    assert!(f.store.marks_for_post(f.post.post_id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn anonymous_request_is_401_before_body_or_path_parsing() {
    let f = fixture().await;

    let react = send(
      app(&f, TypePolicy::Open),
      "POST",
      &format!("/posts/{}/react", f.post.post_id),
      vec![],
      "",
    )
    .await;
    assert_eq!(react.status(), StatusCode::UNAUTHORIZED);
    assert!(react.headers().contains_key(header::WWW_AUTHENTICATE));

    let bad_id = send(
      app(&f, TypePolicy::Open),
      "POST",
      "/posts/not-a-uuid/like",
      vec![],
      "",
    )
    .await;
    assert_eq!(bad_id.status(), StatusCode::UNAUTHORIZED);

    let bad_read =
      send(app(&f, TypePolicy::Open), "GET", "/posts/not-a-uuid", vec![], "").await;
    assert_eq!(bad_read.status(), StatusCode::UNAUTHORIZED);

    assert!(f.store.marks_for_post(f.post.post_id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn authenticated_malformed_id_is_400() {
    let f = fixture().await;
    let resp = send(
      app(&f, TypePolicy::Open),
      "POST",
      "/posts/not-a-uuid/like",
      vec![(header::AUTHORIZATION, auth_header())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn marking_missing_post_returns_404() {
    let f = fixture().await;
    let resp = send(
      app(&f, TypePolicy::Open),
      "POST",
      &format!("/posts/{}/bookmark", Uuid::new_v4()),
      vec![(header::AUTHORIZATION, auth_header())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(f.store.marks_for_user(f.alice.user_id).await.unwrap().is_empty());
  }

  // ── Generic react ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn react_with_form_type() {
    let f = fixture().await;
    let resp = send(
      app(&f, TypePolicy::default_vocabulary()),
      "POST",
      &format!("/posts/{}/react", f.post.post_id),
      vec![
        (header::AUTHORIZATION, auth_header()),
        (header::CONTENT_TYPE, "application/x-www-form-urlencoded".into()),
      ],
      "type=love",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(f.store.count_by_type(f.post.post_id, "love").await.unwrap(), 1);
  }

  #[tokio::test]
  async fn react_without_type_is_400() {
    let f = fixture().await;
    let resp = send(
      app(&f, TypePolicy::Open),
      "POST",
      &format!("/posts/{}/react", f.post.post_id),
      vec![
        (header::AUTHORIZATION, auth_header()),
        (header::CONTENT_TYPE, "application/x-www-form-urlencoded".into()),
      ],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn react_outside_allow_list_is_400() {
    let f = fixture().await;
    let resp = send(
      app(&f, TypePolicy::default_vocabulary()),
      "POST",
      &format!("/posts/{}/react", f.post.post_id),
      vec![
        (header::AUTHORIZATION, auth_header()),
        (header::CONTENT_TYPE, "application/x-www-form-urlencoded".into()),
      ],
      "type=likee",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(f.store.marks_for_post(f.post.post_id).await.unwrap().is_empty());
  }

  // ── Reads ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn post_listing_includes_counts() {
    let f = fixture().await;
    send(
      app(&f, TypePolicy::Open),
      "POST",
      &format!("/posts/{}/like", f.post.post_id),
      vec![(header::AUTHORIZATION, auth_header())],
      "",
    )
    .await;

    let resp = send(
      app(&f, TypePolicy::Open),
      "GET",
      "/posts",
      vec![(header::AUTHORIZATION, auth_header())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body[0]["post_id"], f.post.post_id.to_string());
    assert_eq!(body[0]["title"], "Hello");
    assert_eq!(body[0]["counts"]["like"], 1);

    let resp = send(
      app(&f, TypePolicy::Open),
      "GET",
      &format!("/posts/{}/counts/like", f.post.post_id),
      vec![(header::AUTHORIZATION, auth_header())],
      "",
    )
    .await;
    let body = json_body(resp).await;
    assert_eq!(body["type"], "like");
    assert_eq!(body["count"], 1);
  }

  #[tokio::test]
  async fn reads_require_authentication() {
    let f = fixture().await;
    let resp = send(app(&f, TypePolicy::Open), "GET", "/posts", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn get_missing_post_returns_404() {
    let f = fixture().await;
    let resp = send(
      app(&f, TypePolicy::Open),
      "GET",
      &format!("/posts/{}", Uuid::new_v4()),
      vec![(header::AUTHORIZATION, auth_header())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = json_body(resp).await;
    assert!(body["error"].as_str().unwrap().contains("not found"));
  }
}
