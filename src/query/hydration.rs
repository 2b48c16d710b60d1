use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::rc::Rc;

use leptos::*;
use leptos_query::QueryClient;
use serde::{Deserialize, Serialize};

use super::{
    CacheValue, InfiniteData, InfiniteQueryDescriptor, QueryDescriptor, QueryKey, QueryResponse,
    RetryPolicy,
};

/// A single prefetched query inside a [`DehydratedState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DehydratedQuery {
    /// Key the data was fetched under.
    pub key: QueryKey,
    /// The serialized value.
    pub data: String,
}

/// Serializable snapshot of prefetched queries, sent from server to client.
///
/// Only queries that resolved successfully are part of the snapshot. Failed
/// prefetches are left out, and the client fetches them again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DehydratedState {
    pub queries: Vec<DehydratedQuery>,
}

impl DehydratedState {
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Serialized data for `key`, if it was prefetched.
    pub fn get(&self, key: &QueryKey) -> Option<&str> {
        self.queries
            .iter()
            .find(|query| &query.key == key)
            .map(|query| query.data.as_str())
    }
}

/// Pending dehydrated entries, waiting for a hook to claim them.
///
/// Entries are only decoded once a hook asks for them, because only the hook
/// knows the value type of its key.
#[derive(Clone, Default)]
pub struct HydrationStore(Rc<RefCell<HashMap<QueryKey, String>>>);

impl HydrationStore {
    /// Adds the entries of `state`, replacing pending entries with the same key.
    pub fn merge(&self, state: DehydratedState) {
        let mut pending = self.0.borrow_mut();
        for DehydratedQuery { key, data } in state.queries {
            pending.insert(key, data);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Removes and returns the pending entry for `key`.
    pub fn take(&self, key: &QueryKey) -> Option<String> {
        self.0.borrow_mut().remove(key)
    }

    /// Seeds `client` with the pending entry for `key`.
    ///
    /// Data the client already holds is never overwritten. Returns whether the
    /// client was seeded.
    pub fn hydrate<T>(&self, client: &QueryClient, key: &QueryKey) -> bool
    where
        T: CacheValue,
    {
        let Some(raw) = self.take(key) else {
            return false;
        };

        let has_data = client
            .peek_query_state::<QueryKey, QueryResponse<T>>(key)
            .is_some_and(|state| state.data().is_some());
        if has_data {
            return false;
        }

        match T::de(&raw) {
            Ok(value) => {
                client.set_query_data::<QueryKey, QueryResponse<T>>(key.clone(), Ok(value));
                true
            }
            Err(error) => {
                logging::debug_warn!("Dropping dehydrated data for {key}: {error}");
                false
            }
        }
    }
}

/// Seeds the client from the hydration store whenever `key` changes.
pub(crate) fn hydrate_on_key<T>(key: impl Fn() -> QueryKey + 'static)
where
    T: CacheValue,
{
    let (Some(store), Some(client)) = (
        use_context::<HydrationStore>(),
        use_context::<QueryClient>(),
    ) else {
        return;
    };
    if store.is_empty() {
        return;
    }

    create_isomorphic_effect(move |_| {
        let key = key();
        untrack(|| store.hydrate::<T>(&client, &key));
    });
}

/// A request scoped cache used to prefetch queries while a page is loaded.
///
/// Every page load creates its own cache, so nothing leaks between requests.
/// Once the prefetches finish, [`dehydrate`](Self::dehydrate) produces the
/// snapshot that travels with the page.
///
/// Prefetches are not retried unless the descriptor sets its own retry policy.
#[derive(Clone, Default)]
pub struct PrefetchCache {
    entries: Rc<RefCell<BTreeMap<QueryKey, String>>>,
}

impl PrefetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the query and stores its data under `key`.
    ///
    /// Returns whether the query resolved. Failures are logged and left out
    /// of the cache.
    pub async fn prefetch_query<T>(&self, descriptor: &QueryDescriptor<T>, key: QueryKey) -> bool
    where
        T: CacheValue,
    {
        let retry = descriptor.overrides().retry.unwrap_or(RetryPolicy::none());
        let response = descriptor.fetch(key.clone(), retry).await;
        self.store(key, response)
    }

    /// Prefetches several queries concurrently. Returns how many resolved.
    pub async fn prefetch_queries<T>(
        &self,
        queries: impl IntoIterator<Item = (QueryDescriptor<T>, QueryKey)>,
    ) -> usize
    where
        T: CacheValue,
    {
        let queries = queries.into_iter().collect::<Vec<_>>();
        let prefetches = queries
            .iter()
            .map(|(descriptor, key)| self.prefetch_query(descriptor, key.clone()));
        futures::future::join_all(prefetches)
            .await
            .into_iter()
            .filter(|resolved| *resolved)
            .count()
    }

    /// Fetches the first page of an infinite query and stores it under `key`.
    pub async fn prefetch_infinite_query<T, P>(
        &self,
        descriptor: &InfiniteQueryDescriptor<T, P>,
        key: QueryKey,
    ) -> bool
    where
        T: CacheValue,
        P: CacheValue,
    {
        let retry = descriptor.retry().unwrap_or(RetryPolicy::none());
        let response = descriptor.fetch_first_page(key.clone(), retry).await;
        self.store(key, response)
    }

    /// Decodes the data stored under `key`.
    pub fn get_query_data<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: CacheValue,
    {
        let entries = self.entries.borrow();
        let raw = entries.get(key)?;
        T::de(raw).ok()
    }

    /// Decodes the pages stored under `key` by an infinite prefetch.
    pub fn get_infinite_query_data<T, P>(&self, key: &QueryKey) -> Option<InfiniteData<T, P>>
    where
        T: CacheValue,
        P: CacheValue,
    {
        self.get_query_data(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Snapshot of every resolved prefetch, ordered by key.
    pub fn dehydrate(&self) -> DehydratedState {
        let queries = self
            .entries
            .borrow()
            .iter()
            .map(|(key, data)| DehydratedQuery {
                key: key.clone(),
                data: data.clone(),
            })
            .collect();
        DehydratedState { queries }
    }

    fn store<V>(&self, key: QueryKey, response: QueryResponse<V>) -> bool
    where
        V: CacheValue,
    {
        let encoded = response.and_then(|value| value.ser().map_err(Into::into));
        match encoded {
            Ok(data) => {
                self.entries.borrow_mut().insert(key, data);
                true
            }
            Err(error) => {
                logging::debug_warn!("Prefetching {key} failed: {error}");
                false
            }
        }
    }
}

/// Props produced by a page's loader and handed to the page's components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProps {
    pub dehydrated_state: DehydratedState,
}

/// Loads a page's props before the page renders.
///
/// `load` receives a fresh [`PrefetchCache`] and may prefetch into it. On the
/// server the resource blocks the response until `load` finishes, so the
/// dehydrated state is part of the first render and is serialized into the
/// page for the client.
pub fn create_page_props<F, Fu>(load: F) -> Resource<(), PageProps>
where
    F: Fn(PrefetchCache) -> Fu + 'static,
    Fu: Future<Output = ()> + 'static,
{
    create_blocking_resource(
        || (),
        move |_| {
            let cache = PrefetchCache::new();
            let prefetch = load(cache.clone());
            async move {
                prefetch.await;
                PageProps {
                    dehydrated_state: cache.dehydrate(),
                }
            }
        },
    )
}

/// Seeds the query client with `state` before rendering `children`.
///
/// Hooks inside the boundary pick up the prefetched data for their key
/// instead of fetching it again.
#[component]
pub fn HydrationBoundary(
    /// Snapshot produced by a page loader.
    #[prop(optional)]
    state: Option<DehydratedState>,
    children: Children,
) -> impl IntoView {
    if let Some(state) = state {
        match use_context::<HydrationStore>() {
            Some(store) => store.merge(state),
            None => logging::debug_warn!(
                "HydrationBoundary rendered without a query client. Ignoring dehydrated state."
            ),
        }
    }

    children()
}
