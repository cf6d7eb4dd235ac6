//! Core types and trait definitions for post marks.
//!
//! A mark is one user's reaction of one type (like, favorite, bookmark, or any
//! other label) on a post. This crate is free of HTTP and database
//! dependencies; storage backends implement [`store::MarkStore`] and callers
//! go through [`service::ReactionService`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod mark;
pub mod post;
pub mod service;
pub mod store;
pub mod user;

pub use error::{Error, Result};
