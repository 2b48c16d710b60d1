use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;

use leptos::*;
use leptos_query::{QueryOptions, QueryResult, QueryState};

use super::{
    hydrate_on_key, use_query_config, CacheValue, QueryError, QueryKey, QueryResponse,
    RetryPolicy,
};

pub(crate) type BoxedResponse<T> = Pin<Box<dyn Future<Output = QueryResponse<T>>>>;
type Producer<T> = Rc<dyn Fn(QueryKey) -> BoxedResponse<T>>;

/// Where a query is in its lifecycle, as seen by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Not executed yet.
    Idle,
    /// First fetch in flight, no data yet.
    Loading,
    /// Latest fetch resolved.
    Success,
    /// Latest fetch rejected.
    Error,
}

impl QueryStatus {
    pub(crate) fn of<T>(state: &QueryState<QueryResponse<T>>) -> Self {
        match state {
            QueryState::Created => QueryStatus::Idle,
            QueryState::Loading => QueryStatus::Loading,
            QueryState::Fetching(data) | QueryState::Loaded(data) | QueryState::Invalid(data) => {
                if data.data.is_ok() {
                    QueryStatus::Success
                } else {
                    QueryStatus::Error
                }
            }
        }
    }
}

/// Per-descriptor overrides of the client wide [`QueryDefaults`](super::QueryDefaults).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryOverrides {
    pub retry: Option<RetryPolicy>,
    pub throw_on_error: Option<bool>,
    pub suspense: Option<bool>,
    pub stale_time: Option<Duration>,
    pub gc_time: Option<Duration>,
}

impl QueryOverrides {
    pub(crate) fn options<V>(&self) -> QueryOptions<V> {
        let mut options = QueryOptions::default();
        if let Some(stale_time) = self.stale_time {
            options = options.set_stale_time(Some(stale_time));
        }
        if let Some(gc_time) = self.gc_time {
            options = options.set_gc_time(Some(gc_time));
        }
        options
    }
}

/// Creates a [`QueryDescriptor`] from a producer.
///
/// The producer receives the query key and must read every input it needs
/// from it.
///
/// ```
/// use query_boundary::query::{create_query, QueryDescriptor, QueryKey};
///
/// fn double_query() -> QueryDescriptor<i64> {
///     create_query(|key: QueryKey| async move { key.int_at(1).map(|value| value * 2) })
/// }
/// ```
pub fn create_query<T, Fu>(producer: impl Fn(QueryKey) -> Fu + 'static) -> QueryDescriptor<T>
where
    T: CacheValue,
    Fu: Future<Output = QueryResponse<T>> + 'static,
{
    let producer: Producer<T> = Rc::new(move |key| Box::pin(producer(key)) as BoxedResponse<T>);
    QueryDescriptor {
        producer,
        overrides: QueryOverrides::default(),
    }
}

/// A producer plus its options. Hooks subscribe a component to it under a key.
#[derive(Clone)]
pub struct QueryDescriptor<T> {
    producer: Producer<T>,
    overrides: QueryOverrides,
}

impl<T> QueryDescriptor<T>
where
    T: CacheValue,
{
    /// Set the number of retries.
    pub fn set_retry(self, retries: u32) -> Self {
        let policy = self.overrides.retry.unwrap_or_default();
        self.set_retry_policy(RetryPolicy { retries, ..policy })
    }

    /// Set the retry policy.
    pub fn set_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.overrides.retry = Some(retry);
        self
    }

    /// Set whether errors render into the nearest `ErrorBoundary`.
    pub fn set_throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.overrides.throw_on_error = Some(throw_on_error);
        self
    }

    /// Set whether data is read through `Suspense`.
    pub fn set_suspense(mut self, suspense: bool) -> Self {
        self.overrides.suspense = Some(suspense);
        self
    }

    /// Set the stale time.
    pub fn set_stale_time(mut self, stale_time: Duration) -> Self {
        self.overrides.stale_time = Some(stale_time);
        self
    }

    /// Set the eviction time.
    pub fn set_gc_time(mut self, gc_time: Duration) -> Self {
        self.overrides.gc_time = Some(gc_time);
        self
    }

    /// The overrides applied on top of the client defaults.
    pub fn overrides(&self) -> &QueryOverrides {
        &self.overrides
    }

    /// Runs the producer for `key` under `retry`, outside of any cache.
    pub async fn fetch(&self, key: QueryKey, retry: RetryPolicy) -> QueryResponse<T> {
        let producer = self.producer.clone();
        retry.run(|| producer(key.clone())).await
    }

    /// Subscribes to the query identified by `key`.
    pub fn use_query(&self, key: impl Fn() -> QueryKey + 'static) -> UseQuery<T> {
        self.use_query_select(key, |value| value)
    }

    /// Subscribes to the query identified by `key`, transforming resolved data with `select`.
    ///
    /// Loading participates in `Suspense` when the client (or this
    /// descriptor) enables suspense, and errors reach the nearest
    /// `ErrorBoundary` through [`UseQuery::view_data`] when throw on error
    /// is enabled.
    pub fn use_query_select<U>(
        &self,
        key: impl Fn() -> QueryKey + 'static,
        select: impl Fn(T) -> U + 'static,
    ) -> UseQuery<U>
    where
        U: Clone + 'static,
    {
        let defaults = use_query_config().queries;
        let suspense = self.overrides.suspense.unwrap_or(defaults.suspense);
        let throw_on_error = self
            .overrides
            .throw_on_error
            .unwrap_or(defaults.throw_on_error);
        self.subscribe(key, select, suspense, throw_on_error)
    }

    /// Subscribes to the query identified by `key`, always suspending and always throwing.
    ///
    /// Must be rendered inside a `Suspense` and an `ErrorBoundary`, e.g. a
    /// [`QueryBoundary`](crate::components::query_boundary::QueryBoundary).
    pub fn use_suspense_query(&self, key: impl Fn() -> QueryKey + 'static) -> SuspenseQuery<T> {
        let query = self.subscribe(key, |value| value, true, true);
        SuspenseQuery {
            data: query.view_data(),
            status: query.status,
            refetch: query.refetch,
        }
    }

    pub(crate) fn fetcher(
        &self,
        retry: RetryPolicy,
    ) -> impl Fn(QueryKey) -> BoxedResponse<T> + Clone + 'static {
        let producer = self.producer.clone();
        move |key: QueryKey| {
            let producer = producer.clone();
            Box::pin(async move { retry.run(|| producer(key.clone())).await }) as BoxedResponse<T>
        }
    }

    fn subscribe<U>(
        &self,
        key: impl Fn() -> QueryKey + 'static,
        select: impl Fn(T) -> U + 'static,
        suspense: bool,
        throw_on_error: bool,
    ) -> UseQuery<U>
    where
        U: Clone + 'static,
    {
        let retry = self
            .overrides
            .retry
            .unwrap_or(use_query_config().queries.retry);
        let key: Rc<dyn Fn() -> QueryKey> = Rc::new(key);

        hydrate_on_key::<T>({
            let key = key.clone();
            move || key()
        });

        let QueryResult {
            data,
            state,
            refetch,
            ..
        } = leptos_query::use_query(
            move || key(),
            self.fetcher(retry),
            self.overrides.options(),
        );

        let response: Signal<Option<QueryResponse<T>>> = if suspense {
            data
        } else {
            Signal::derive(move || state.with(|state| state.data().cloned()))
        };

        let selected = Signal::derive(move || response.get().map(|response| response.map(&select)));

        UseQuery::from_parts(
            selected,
            state,
            Callback::new(move |_: ()| refetch()),
            throw_on_error,
        )
    }
}

/// A component's subscription to a query.
pub struct UseQuery<T: 'static> {
    /// Resolved data, `None` while loading or after a failure.
    pub data: Signal<Option<T>>,
    /// The latest failure, if the latest fetch rejected.
    pub error: Signal<Option<QueryError>>,
    /// Lifecycle status.
    pub status: Signal<QueryStatus>,
    /// Whether any fetch is in flight.
    pub is_fetching: Signal<bool>,
    /// Re-runs the producer.
    pub refetch: Callback<()>,
    response: Signal<Option<QueryResponse<T>>>,
    throw_on_error: bool,
}

impl<T: 'static> Clone for UseQuery<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for UseQuery<T> {}

impl<T> UseQuery<T>
where
    T: Clone + 'static,
{
    pub(crate) fn from_parts<V>(
        response: Signal<Option<QueryResponse<T>>>,
        state: Signal<QueryState<QueryResponse<V>>>,
        refetch: Callback<()>,
        throw_on_error: bool,
    ) -> Self
    where
        V: 'static,
    {
        Self {
            data: Signal::derive(move || response.get().and_then(Result::ok)),
            error: Signal::derive(move || {
                state.with(|state| state.data().and_then(|data| data.as_ref().err().cloned()))
            }),
            status: Signal::derive(move || state.with(QueryStatus::of)),
            is_fetching: Signal::derive(move || {
                state.with(|state| matches!(state, QueryState::Loading | QueryState::Fetching(_)))
            }),
            refetch,
            response,
            throw_on_error,
        }
    }

    /// The value to render.
    ///
    /// With throw on error enabled a failure comes through as `Err`, which the
    /// nearest `ErrorBoundary` catches. Otherwise failures are swallowed here
    /// and only visible through [`error`](Self::error) and [`status`](Self::status).
    pub fn view_data(&self) -> Signal<Option<QueryResponse<T>>> {
        let response = self.response;
        if self.throw_on_error {
            response
        } else {
            Signal::derive(move || response.get().and_then(Result::ok).map(Ok))
        }
    }
}

/// A suspending subscription. Loading shows the nearest `Suspense` fallback and
/// failures render into the nearest `ErrorBoundary`, so inside the boundary
/// the data is always resolved.
pub struct SuspenseQuery<T: 'static> {
    /// Read inside `Suspense`.
    pub data: Signal<Option<QueryResponse<T>>>,
    /// Lifecycle status.
    pub status: Signal<QueryStatus>,
    /// Re-runs the producer.
    pub refetch: Callback<()>,
}

impl<T: 'static> Clone for SuspenseQuery<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for SuspenseQuery<T> {}

/// Subscribes to several queries at once. Each resolves or fails on its own.
pub fn use_queries<T>(
    queries: impl IntoIterator<Item = (QueryDescriptor<T>, QueryKey)>,
) -> Vec<UseQuery<T>>
where
    T: CacheValue,
{
    queries
        .into_iter()
        .map(|(descriptor, key)| descriptor.use_query(move || key.clone()))
        .collect()
}

/// Suspending variant of [`use_queries`].
pub fn use_suspense_queries<T>(
    queries: impl IntoIterator<Item = (QueryDescriptor<T>, QueryKey)>,
) -> Vec<SuspenseQuery<T>>
where
    T: CacheValue,
{
    queries
        .into_iter()
        .map(|(descriptor, key)| descriptor.use_suspense_query(move || key.clone()))
        .collect()
}
