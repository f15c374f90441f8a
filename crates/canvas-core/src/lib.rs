//! Core types and trait definitions for the canvas record store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the resource data model, payload validation, the permission resolution
//! algorithm and the [`store::RecordStore`] abstraction that backends
//! implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod activity;
pub mod error;
pub mod resource;
pub mod store;
pub mod user;

pub use error::{Classify, Error, ErrorClass, Result};

/// Identifier of a [`user::User`].
pub type UserId = String;

/// Identifier of a [`resource::Resource`]. Unique within its kind.
pub type ResourceId = String;
