//! SQL schema for the mark store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,     -- argon2 PHC string
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    post_id    TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- One row per (user, post, type). The upsert lookup may be narrower than
-- this constraint; see `UpsertKey`.
CREATE TABLE IF NOT EXISTS marks (
    mark_id    TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    post_id    TEXT NOT NULL REFERENCES posts(post_id) ON DELETE CASCADE,
    mark_type  TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,      -- touched on every re-mark
    UNIQUE (user_id, post_id, mark_type)
);

CREATE INDEX IF NOT EXISTS marks_post_type_idx ON marks(post_id, mark_type);
CREATE INDEX IF NOT EXISTS marks_user_type_idx ON marks(user_id, mark_type);

PRAGMA user_version = 1;
";
