//! JSON REST API for the canvas record store.
//!
//! Exposes an axum [`Router`] backed by any [`canvas_core::store::RecordStore`].
//! Every request names its caller in the `x-user-id` header; authenticating
//! that id is the job of whatever sits in front of this router. All
//! permission decisions are taken by the store.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", canvas_api::api_router(store.clone()))
//! ```

pub mod acl;
pub mod activity;
pub mod caller;
pub mod error;
pub mod resources;
pub mod search;
pub mod users;

use std::sync::Arc;

use axum::{Router, routing::get};
use canvas_core::store::RecordStore;

pub use caller::Caller;
pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RecordStore + 'static,
{
  Router::new()
    // Users
    .route("/users", axum::routing::post(users::create::<S>))
    .route("/users/{id}", get(users::get_one::<S>))
    // Resources
    .route(
      "/resources/{kind}",
      get(resources::list::<S>).post(resources::save::<S>),
    )
    .route(
      "/resources/{kind}/{id}",
      get(resources::get_one::<S>).delete(resources::delete_one::<S>),
    )
    .route(
      "/resources/{kind}/{id}/acl",
      get(acl::list::<S>).put(acl::replace::<S>),
    )
    // Audit log
    .route("/activity", get(activity::recent::<S>))
    // Search
    .route("/search", get(search::handler::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;
