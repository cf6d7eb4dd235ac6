//! Wiring for the `marks-server` binary: configuration, store opening and
//! the top-level router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::Router;
use config::{Config, ConfigBuilder, builder::DefaultState};
use marks_api::{ApiState, DEFAULT_FALLBACK_REDIRECT, api_router};
use marks_core::{mark::UpsertKey, service::{ReactionService, TypePolicy}};
use marks_store_sqlite::SqliteStore;
use rand_core::OsRng;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered with
/// `MARKS_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:              String,
  #[serde(default = "default_port")]
  pub port:              u16,
  #[serde(default = "default_store_path")]
  pub store_path:        PathBuf,
  /// Lookup key for mark upserts; see [`UpsertKey`].
  #[serde(default)]
  pub upsert_key:        UpsertKey,
  /// Labels accepted by the react entry point. Empty means any label.
  #[serde(default)]
  pub allowed_types:     Vec<String>,
  #[serde(default = "default_fallback_redirect")]
  pub fallback_redirect: String,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("marks.db") }

fn default_fallback_redirect() -> String { DEFAULT_FALLBACK_REDIRECT.to_string() }

impl ServerConfig {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::from_builder(
      Config::builder().add_source(config::File::from(path).required(false)),
    )
  }

  fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    builder
      .add_source(
        config::Environment::with_prefix("MARKS")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("allowed_types"),
      )
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn type_policy(&self) -> TypePolicy {
    if self.allowed_types.is_empty() {
      TypePolicy::Open
    } else {
      TypePolicy::allow_list(self.allowed_types.iter().cloned())
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Wiring ───────────────────────────────────────────────────────────────────

/// Open the SQLite store named by the configuration.
pub async fn open_store(cfg: &ServerConfig) -> anyhow::Result<SqliteStore> {
  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  Ok(store.with_upsert_key(cfg.upsert_key))
}

/// Build the full application router with request tracing.
pub fn app(cfg: &ServerConfig, store: Arc<SqliteStore>) -> Router {
  let service = ReactionService::new(store).with_policy(cfg.type_policy());
  let state = ApiState::new(service)
    .with_fallback_redirect(cfg.fallback_redirect.as_str());
  api_router(state).layer(TraceLayer::new_for_http())
}

/// Produce the argon2 PHC string stored in `users.password_hash`.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string(),
  )
}
