//! HTTP Basic-auth identity resolution.
//!
//! [`require_identity`] runs as a route layer in front of every handler, so
//! anonymous callers get `401` before any path or body is parsed. Handlers
//! then read the verified [`Identity`] from the request extensions.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::{FromRequestParts, Request};
use axum::http::{HeaderMap, header, request::Parts};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use marks_core::{
  store::{MarkStore, classify},
  user::Identity,
};

use crate::{ApiState, error::ApiError};

/// The verified identity of the caller, or `None` for anonymous requests and
/// requests with bad credentials.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Identity>);

/// Split an `Authorization: Basic …` header into `(username, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())?;

  let encoded = header_val.strip_prefix("Basic ")?;
  let decoded = B64.decode(encoded.trim()).ok()?;
  let creds   = String::from_utf8(decoded).ok()?;

  let (username, password) = creds.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// Check the request's Basic credentials against the stored argon2 hash.
///
/// Only store failures are errors; unknown users and wrong passwords resolve
/// to `None`.
pub async fn resolve_identity<S>(
  headers: &HeaderMap,
  store: &S,
) -> Result<Option<Identity>, ApiError>
where
  S: MarkStore,
{
  let Some((username, password)) = basic_credentials(headers) else {
    return Ok(None);
  };

  let Some(user) = store
    .find_user_by_name(&username)
    .await
    .map_err(|e| ApiError::from(classify(e)))?
  else {
    tracing::debug!(%username, "unknown user");
    return Ok(None);
  };

  let Ok(parsed_hash) = PasswordHash::new(&user.password_hash) else {
    tracing::warn!(%username, "stored password hash is not a PHC string");
    return Ok(None);
  };

  if Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .is_err()
  {
    tracing::debug!(%username, "password mismatch");
    return Ok(None);
  }

  Ok(Some(Identity::from(&user)))
}

impl<S> FromRequestParts<ApiState<S>> for MaybeIdentity
where
  S: MarkStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    let identity = resolve_identity(&parts.headers, state.service.store().as_ref()).await?;
    Ok(MaybeIdentity(identity))
  }
}

/// Middleware: reject anonymous requests, otherwise stash the [`Identity`]
/// for the handler's `Extension<Identity>` extractor.
pub async fn require_identity(
  MaybeIdentity(actor): MaybeIdentity,
  mut request: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let identity = actor.ok_or(ApiError::Unauthenticated)?;
  request.extensions_mut().insert(identity);
  Ok(next.run(request).await)
}
