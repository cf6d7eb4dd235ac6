//! Handlers for the mark entry points.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/posts/{id}/like` | |
//! | `POST` | `/posts/{id}/favorite` | |
//! | `POST` | `/posts/{id}/bookmark` | |
//! | `POST` | `/posts/{id}/react` | Form body: `type=<label>` |
//!
//! Every entry point answers `303 See Other` back to the page the request
//! came from; there is no response body.

use axum::{
  Extension, Form,
  extract::{Path, State},
  http::{HeaderMap, Uri, header},
  response::Redirect,
};
use marks_core::{store::MarkStore, user::Identity};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── Return location ─────────────────────────────────────────────────────────

/// Where to send the caller after a mark: the `Referer` if it points back
/// into this site, otherwise `fallback`.
pub fn return_location(headers: &HeaderMap, fallback: &str) -> String {
  let Some(referer) = headers
    .get(header::REFERER)
    .and_then(|v| v.to_str().ok())
  else {
    return fallback.to_owned();
  };

  let Ok(uri) = referer.parse::<Uri>() else {
    return fallback.to_owned();
  };

  let same_site = match uri.authority() {
    None => true,
    Some(authority) => headers
      .get(header::HOST)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|host| host.eq_ignore_ascii_case(authority.as_str())),
  };

  match uri.path_and_query() {
    Some(pq) if same_site && is_local_path(pq.as_str()) => pq.as_str().to_owned(),
    _ => fallback.to_owned(),
  }
}

/// A path browsers resolve against this origin: rooted, not
/// protocol-relative, and free of backslashes (which browsers read as `/`).
fn is_local_path(path: &str) -> bool {
  path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

fn back<S>(state: &ApiState<S>, headers: &HeaderMap) -> Redirect {
  Redirect::to(&return_location(headers, &state.fallback_redirect))
}

// ─── Dedicated entry points ──────────────────────────────────────────────────

/// `POST /posts/{id}/like`
pub async fn like<S>(
  State(state): State<ApiState<S>>,
  Extension(actor): Extension<Identity>,
  Path(post_id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Redirect, ApiError>
where
  S: MarkStore + 'static,
{
  state.service.like(Some(&actor), post_id).await?;
  Ok(back(&state, &headers))
}

/// `POST /posts/{id}/favorite`
pub async fn favorite<S>(
  State(state): State<ApiState<S>>,
  Extension(actor): Extension<Identity>,
  Path(post_id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Redirect, ApiError>
where
  S: MarkStore + 'static,
{
  state.service.favorite(Some(&actor), post_id).await?;
  Ok(back(&state, &headers))
}

/// `POST /posts/{id}/bookmark`
pub async fn bookmark<S>(
  State(state): State<ApiState<S>>,
  Extension(actor): Extension<Identity>,
  Path(post_id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Redirect, ApiError>
where
  S: MarkStore + 'static,
{
  state.service.bookmark(Some(&actor), post_id).await?;
  Ok(back(&state, &headers))
}

// ─── Generic react ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReactForm {
  #[serde(rename = "type")]
  pub mark_type: Option<String>,
}

/// `POST /posts/{id}/react` with form body `type=<label>`.
///
/// A missing `type` field is treated like a blank one and rejected by the
/// service.
pub async fn react<S>(
  State(state): State<ApiState<S>>,
  Extension(actor): Extension<Identity>,
  Path(post_id): Path<Uuid>,
  headers: HeaderMap,
  Form(form): Form<ReactForm>,
) -> Result<Redirect, ApiError>
where
  S: MarkStore + 'static,
{
  let mark_type = form.mark_type.unwrap_or_default();
  state
    .service
    .mark_post(Some(&actor), post_id, &mark_type)
    .await?;
  Ok(back(&state, &headers))
}
