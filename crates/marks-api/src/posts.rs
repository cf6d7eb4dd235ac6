//! Read-only handlers for `/posts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/posts` | Every post with its per-type mark counts |
//! | `GET`  | `/posts/{id}` | 404 if not found |
//! | `GET`  | `/posts/{id}/counts/{type}` | `{"type": "...", "count": n}` |

use axum::{
  Json,
  extract::{Path, State},
};
use marks_core::{post::PostSummary, store::MarkStore};
use serde::Serialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /posts`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<PostSummary>>, ApiError>
where
  S: MarkStore + 'static,
{
  Ok(Json(state.service.list_summaries().await?))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /posts/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(post_id): Path<Uuid>,
) -> Result<Json<PostSummary>, ApiError>
where
  S: MarkStore + 'static,
{
  Ok(Json(state.service.post_summary(post_id).await?))
}

// ─── Count ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CountBody {
  #[serde(rename = "type")]
  pub mark_type: String,
  pub count:     u64,
}

/// `GET /posts/{id}/counts/{type}`
pub async fn count<S>(
  State(state): State<ApiState<S>>,
  Path((post_id, mark_type)): Path<(Uuid, String)>,
) -> Result<Json<CountBody>, ApiError>
where
  S: MarkStore + 'static,
{
  let count = state.service.count_by_type(post_id, &mark_type).await?;
  Ok(Json(CountBody { mark_type, count }))
}
