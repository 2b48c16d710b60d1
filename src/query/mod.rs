//! Query and mutation hooks on top of [`leptos_query`].
//!
//! The app talks to the query client only through this module. It adds what
//! the client itself does not do:
//! - Query descriptors with per-query retry, suspense and throw on error
//!   settings, resolved against client wide defaults.
//! - Parallel subscriptions ([`use_queries`]), infinite queries and mutations.
//! - Server side prefetching into a [`PrefetchCache`], which is dehydrated into
//!   a serializable snapshot and hydrated back into the client by a
//!   [`HydrationBoundary`].

mod config;
mod error;
mod hydration;
mod infinite;
mod key;
mod mutation;
mod retry;
mod use_query;

pub use config::*;
pub use error::*;
pub use hydration::*;
pub use infinite::*;
pub use key::*;
pub use mutation::*;
pub use retry::*;
pub use use_query::*;

/// Requirements for values stored in the query cache.
///
/// Values cross the server/client boundary inside a dehydrated snapshot, so
/// they must be serializable.
pub trait CacheValue:
    std::fmt::Debug + Clone + serde::Serialize + serde::de::DeserializeOwned + 'static
{
}

impl<V> CacheValue for V where
    V: std::fmt::Debug + Clone + serde::Serialize + serde::de::DeserializeOwned + 'static
{
}
