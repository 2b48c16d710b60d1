use std::time::Duration;

use leptos::*;
use leptos_query::{provide_query_client_with_options, DefaultQueryOptions, ResourceOption};

use super::{HydrationStore, RetryPolicy};

const DEFAULT_STALE_TIME: Duration = Duration::from_secs(10);
const DEFAULT_GC_TIME: Duration = Duration::from_secs(60 * 5);

/// Defaults applied to every query hook under the client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryDefaults {
    /// Retry policy around producers.
    pub retry: RetryPolicy,
    /// Render errors into the nearest `ErrorBoundary` instead of only exposing them as values.
    pub throw_on_error: bool,
    /// Read query data through a resource, so loading shows the nearest `Suspense` fallback.
    pub suspense: bool,
    /// Time before fresh data is considered stale.
    pub stale_time: Option<Duration>,
    /// Time before an inactive entry is evicted.
    pub gc_time: Option<Duration>,
    /// Which resource type queries use.
    pub resource_option: ResourceOption,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            throw_on_error: false,
            suspense: false,
            stale_time: Some(DEFAULT_STALE_TIME),
            gc_time: Some(DEFAULT_GC_TIME),
            resource_option: ResourceOption::default(),
        }
    }
}

impl QueryDefaults {
    /// The options handed to the underlying query client.
    pub fn client_options(&self) -> DefaultQueryOptions {
        DefaultQueryOptions {
            stale_time: self.stale_time,
            gc_time: self.gc_time,
            refetch_interval: None,
            resource_option: self.resource_option,
        }
    }
}

/// Defaults applied to every mutation hook under the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationDefaults {
    /// Retry policy around mutation producers.
    pub retry: RetryPolicy,
    /// Render errors into the nearest `ErrorBoundary`.
    pub throw_on_error: bool,
}

impl Default for MutationDefaults {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::none(),
            throw_on_error: false,
        }
    }
}

/// Client wide configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryClientConfig {
    /// Query defaults.
    pub queries: QueryDefaults,
    /// Mutation defaults.
    pub mutations: MutationDefaults,
}

impl QueryClientConfig {
    /// Set the number of query retries.
    pub fn set_query_retry(mut self, retries: u32) -> Self {
        self.queries.retry = RetryPolicy { retries, ..self.queries.retry };
        self
    }

    /// Set whether query errors render into error boundaries.
    pub fn set_query_throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.queries.throw_on_error = throw_on_error;
        self
    }

    /// Set whether queries suspend.
    pub fn set_suspense(mut self, suspense: bool) -> Self {
        self.queries.suspense = suspense;
        self
    }

    /// Set the stale time.
    pub fn set_stale_time(mut self, stale_time: Option<Duration>) -> Self {
        self.queries.stale_time = stale_time;
        self
    }

    /// Set the eviction time.
    pub fn set_gc_time(mut self, gc_time: Option<Duration>) -> Self {
        self.queries.gc_time = gc_time;
        self
    }

    /// Set the number of mutation retries.
    pub fn set_mutation_retry(mut self, retries: u32) -> Self {
        self.mutations.retry = RetryPolicy { retries, ..self.mutations.retry };
        self
    }

    /// Set whether mutation errors render into error boundaries.
    pub fn set_mutation_throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.mutations.throw_on_error = throw_on_error;
        self
    }
}

/// Provides the query client, its configuration and the hydration store to the current scope.
///
/// Call once at the root of the app. The root component runs once per
/// rendering session, so every descendant shares the same client.
pub fn provide_query_client_with_config(config: QueryClientConfig) {
    if use_context::<QueryClientConfig>().is_some() {
        logging::debug_warn!("A query client is already provided. Shadowing it for this subtree.");
    }
    provide_query_client_with_options(config.queries.client_options());
    provide_context(config);
    provide_context(HydrationStore::default());
}

/// The configuration of the nearest client, or the defaults when none is provided.
pub fn use_query_config() -> QueryClientConfig {
    use_context::<QueryClientConfig>().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use leptos_query::{use_query_client, QueryOptions};

    #[test]
    fn defaults_match_library_defaults() {
        let config = QueryClientConfig::default();
        assert_eq!(config.queries.retry.retries, 3);
        assert!(!config.queries.throw_on_error);
        assert!(!config.queries.suspense);
        assert_eq!(config.queries.stale_time, Some(Duration::from_secs(10)));
        assert_eq!(config.queries.gc_time, Some(Duration::from_secs(300)));
        assert_eq!(config.mutations.retry, RetryPolicy::none());
    }

    #[test]
    fn builders_only_touch_their_field() {
        let config = QueryClientConfig::default()
            .set_query_retry(0)
            .set_suspense(true)
            .set_query_throw_on_error(true)
            .set_mutation_throw_on_error(true);

        assert_eq!(config.queries.retry.retries, 0);
        assert_eq!(
            config.queries.retry.base_delay,
            RetryPolicy::default().base_delay
        );
        assert!(config.queries.suspense);
        assert!(config.queries.throw_on_error);
        assert!(config.mutations.throw_on_error);
        assert_eq!(config.queries.stale_time, QueryDefaults::default().stale_time);
    }

    #[test]
    fn provided_config_reaches_descendants() {
        let _ = create_runtime();

        let config = QueryClientConfig::default()
            .set_stale_time(Some(Duration::from_secs(1)))
            .set_gc_time(Some(Duration::from_secs(2)))
            .set_query_retry(0);
        provide_query_client_with_config(config);

        assert_eq!(use_query_config(), config);
        assert!(use_context::<HydrationStore>().is_some());
        assert_eq!(use_query_client().size().get_untracked(), 0);

        // Query options pick up the client wide windows.
        let options: QueryOptions<u32> = QueryOptions::default();
        assert_eq!(options.stale_time, Some(Duration::from_secs(1)));
        assert_eq!(options.gc_time, Some(Duration::from_secs(2)));
    }

    #[test]
    fn falls_back_to_defaults_without_provider() {
        let _ = create_runtime();
        assert_eq!(use_query_config(), QueryClientConfig::default());
    }
}
