use std::future::Future;
use std::rc::Rc;

use leptos::*;
use leptos_query::{use_query_client, QueryResult, QueryState};
use serde::{Deserialize, Serialize};

use super::use_query::BoxedResponse;
use super::{
    hydrate_on_key, use_query_config, CacheValue, QueryError, QueryKey, QueryOverrides,
    QueryResponse, QueryStatus, RetryPolicy, UseQuery,
};

type PageProducer<T, P> = Rc<dyn Fn(QueryKey, P) -> BoxedResponse<T>>;
type NextPageParam<T, P> = Rc<dyn Fn(&T, &[T]) -> Option<P>>;

/// The pages of an infinite query, with the param each page was fetched with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfiniteData<T, P> {
    pub pages: Vec<T>,
    pub page_params: Vec<P>,
}

impl<T, P> InfiniteData<T, P> {
    fn first(page: T, param: P) -> Self {
        InfiniteData {
            pages: vec![page],
            page_params: vec![param],
        }
    }

    /// The most recently fetched page.
    pub fn last_page(&self) -> Option<&T> {
        self.pages.last()
    }
}

/// Creates an [`InfiniteQueryDescriptor`].
///
/// `producer` fetches one page for a key and page param. The first page is
/// fetched with `initial_page_param`. Every following page is fetched with the
/// param `get_next_page_param` derives from the last page and all pages so
/// far. `None` means there are no more pages.
pub fn create_infinite_query<T, P, Fu>(
    producer: impl Fn(QueryKey, P) -> Fu + 'static,
    initial_page_param: P,
    get_next_page_param: impl Fn(&T, &[T]) -> Option<P> + 'static,
) -> InfiniteQueryDescriptor<T, P>
where
    T: CacheValue,
    P: CacheValue,
    Fu: Future<Output = QueryResponse<T>> + 'static,
{
    let producer: PageProducer<T, P> =
        Rc::new(move |key, param| Box::pin(producer(key, param)) as BoxedResponse<T>);
    InfiniteQueryDescriptor {
        producer,
        initial_page_param,
        get_next_page_param: Rc::new(get_next_page_param),
        overrides: QueryOverrides::default(),
    }
}

/// A paged producer plus its options.
pub struct InfiniteQueryDescriptor<T, P> {
    producer: PageProducer<T, P>,
    initial_page_param: P,
    get_next_page_param: NextPageParam<T, P>,
    overrides: QueryOverrides,
}

impl<T, P: Clone> Clone for InfiniteQueryDescriptor<T, P> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            initial_page_param: self.initial_page_param.clone(),
            get_next_page_param: self.get_next_page_param.clone(),
            overrides: self.overrides,
        }
    }
}

impl<T, P> InfiniteQueryDescriptor<T, P>
where
    T: CacheValue,
    P: CacheValue,
{
    /// Set the number of retries for every page fetch.
    pub fn set_retry(mut self, retries: u32) -> Self {
        let policy = self.overrides.retry.unwrap_or_default();
        self.overrides.retry = Some(RetryPolicy { retries, ..policy });
        self
    }

    /// The retry policy set on this descriptor, if any.
    pub fn retry(&self) -> Option<RetryPolicy> {
        self.overrides.retry
    }

    /// The param for the page after the last one in `data`.
    pub fn next_page_param(&self, data: &InfiniteData<T, P>) -> Option<P> {
        let last = data.last_page()?;
        (self.get_next_page_param)(last, &data.pages)
    }

    async fn fetch_page(&self, key: QueryKey, param: P, retry: RetryPolicy) -> QueryResponse<T> {
        let producer = self.producer.clone();
        retry.run(|| producer(key.clone(), param.clone())).await
    }

    /// Fetches the first page only.
    pub async fn fetch_first_page(
        &self,
        key: QueryKey,
        retry: RetryPolicy,
    ) -> QueryResponse<InfiniteData<T, P>> {
        let param = self.initial_page_param.clone();
        let page = self.fetch_page(key, param.clone(), retry).await?;
        Ok(InfiniteData::first(page, param))
    }

    /// Fetches the page after the last one in `data`.
    ///
    /// Resolves to `None` without calling the producer when there is no next page.
    pub async fn fetch_next_page(
        &self,
        key: QueryKey,
        data: &InfiniteData<T, P>,
        retry: RetryPolicy,
    ) -> QueryResponse<Option<InfiniteData<T, P>>> {
        let Some(param) = self.next_page_param(data) else {
            return Ok(None);
        };
        let page = self.fetch_page(key, param.clone(), retry).await?;

        let mut data = data.clone();
        data.pages.push(page);
        data.page_params.push(param);
        Ok(Some(data))
    }

    /// Re-fetches up to `page_count` pages from the start, following the param chain.
    pub async fn refetch_pages(
        &self,
        key: QueryKey,
        page_count: usize,
        retry: RetryPolicy,
    ) -> QueryResponse<InfiniteData<T, P>> {
        let mut data = self.fetch_first_page(key.clone(), retry).await?;
        while data.pages.len() < page_count {
            match self.fetch_next_page(key.clone(), &data, retry).await? {
                Some(next) => data = next,
                None => break,
            }
        }
        Ok(data)
    }

    /// Subscribes to the infinite query identified by `key`.
    pub fn use_infinite_query(
        &self,
        key: impl Fn() -> QueryKey + 'static,
    ) -> UseInfiniteQuery<T, P> {
        let defaults = use_query_config().queries;
        let suspense = self.overrides.suspense.unwrap_or(defaults.suspense);
        let throw_on_error = self
            .overrides
            .throw_on_error
            .unwrap_or(defaults.throw_on_error);
        self.subscribe(key, suspense, throw_on_error)
    }

    /// Suspending variant of [`use_infinite_query`](Self::use_infinite_query).
    pub fn use_suspense_infinite_query(
        &self,
        key: impl Fn() -> QueryKey + 'static,
    ) -> SuspenseInfiniteQuery<T, P> {
        let query = self.subscribe(key, true, true);
        SuspenseInfiniteQuery {
            data: query.view_data(),
            status: query.status,
            has_next_page: query.has_next_page,
            is_fetching_next_page: query.is_fetching_next_page,
            fetch_next_page: query.fetch_next_page,
            refetch: query.refetch,
        }
    }

    fn subscribe(
        &self,
        key: impl Fn() -> QueryKey + 'static,
        suspense: bool,
        throw_on_error: bool,
    ) -> UseInfiniteQuery<T, P> {
        let retry = self
            .overrides
            .retry
            .unwrap_or(use_query_config().queries.retry);
        let key: Rc<dyn Fn() -> QueryKey> = Rc::new(key);

        hydrate_on_key::<InfiniteData<T, P>>({
            let key = key.clone();
            move || key()
        });

        // Refetches reload every page loaded so far.
        let fetcher = {
            let descriptor = self.clone();
            let client = use_query_client();
            move |key: QueryKey| {
                let descriptor = descriptor.clone();
                let page_count = client
                    .peek_query_state::<QueryKey, QueryResponse<InfiniteData<T, P>>>(&key)
                    .and_then(|state| {
                        state
                            .data()
                            .and_then(|data| data.as_ref().ok().map(|data| data.pages.len()))
                    })
                    .unwrap_or(1);
                async move { descriptor.refetch_pages(key, page_count, retry).await }
            }
        };

        let QueryResult {
            data,
            state,
            refetch,
            ..
        } = leptos_query::use_query(
            {
                let key = key.clone();
                move || key()
            },
            fetcher,
            self.overrides.options(),
        );

        let response: Signal<Option<QueryResponse<InfiniteData<T, P>>>> = if suspense {
            data
        } else {
            Signal::derive(move || state.with(|state| state.data().cloned()))
        };

        let has_next_page = {
            let descriptor = self.clone();
            Signal::derive(move || {
                state.with(|state| match state.data() {
                    Some(Ok(data)) => descriptor.next_page_param(data).is_some(),
                    _ => false,
                })
            })
        };

        let is_fetching_next_page = RwSignal::new(false);
        let fetch_next_page_error = RwSignal::new(None::<QueryError>);
        let owner = Owner::current();

        let fetch_next_page = {
            let descriptor = self.clone();
            Callback::new(move |_: ()| {
                if is_fetching_next_page.get_untracked() {
                    return;
                }
                // A refetch in flight reloads every page, so wait for it.
                let Some(current) = state.with_untracked(settled_pages) else {
                    return;
                };
                let key = untrack(|| key());
                let descriptor = descriptor.clone();

                is_fetching_next_page.set(true);
                fetch_next_page_error.set(None);
                spawn_local(async move {
                    let result = descriptor.fetch_next_page(key.clone(), &current, retry).await;
                    let apply = move || match result {
                        Ok(Some(data)) => {
                            let client = use_query_client();
                            let state = client
                                .peek_query_state::<QueryKey, QueryResponse<InfiniteData<T, P>>>(
                                    &key,
                                );
                            match state.and_then(|state| append_page(&state, data)) {
                                Some(data) => client
                                    .set_query_data::<QueryKey, QueryResponse<InfiniteData<T, P>>>(
                                        key,
                                        Ok(data),
                                    ),
                                None => logging::debug_warn!(
                                    "Dropping the next page of {key}. Its pages changed while it was fetched."
                                ),
                            }
                        }
                        Ok(None) => {}
                        Err(error) => {
                            logging::debug_warn!("Fetching the next page of {key} failed: {error}");
                            fetch_next_page_error.set(Some(error));
                        }
                    };
                    match owner {
                        Some(owner) => with_owner(owner, apply),
                        None => apply(),
                    }
                    is_fetching_next_page.set(false);
                });
            })
        };

        let query = UseQuery::from_parts(
            response,
            state,
            Callback::new(move |_: ()| refetch()),
            throw_on_error,
        );

        UseInfiniteQuery {
            data: query.data,
            error: Signal::derive(move || {
                fetch_next_page_error
                    .get()
                    .or_else(|| query.error.get())
            }),
            status: query.status,
            is_fetching: query.is_fetching,
            refetch: query.refetch,
            has_next_page,
            is_fetching_next_page: is_fetching_next_page.into(),
            fetch_next_page,
            query,
        }
    }
}

/// The loaded pages, unless a fetch is in flight or the last one failed.
fn settled_pages<T, P>(
    state: &QueryState<QueryResponse<InfiniteData<T, P>>>,
) -> Option<InfiniteData<T, P>>
where
    T: Clone,
    P: Clone,
{
    match state {
        QueryState::Loaded(data) | QueryState::Invalid(data) => data.data.as_ref().ok().cloned(),
        _ => None,
    }
}

/// `next` if it extends exactly the pages `state` settled on.
fn append_page<T, P>(
    state: &QueryState<QueryResponse<InfiniteData<T, P>>>,
    next: InfiniteData<T, P>,
) -> Option<InfiniteData<T, P>>
where
    T: Clone,
    P: Clone,
{
    let current = settled_pages(state)?;
    (current.pages.len() + 1 == next.pages.len()).then_some(next)
}

/// A component's subscription to an infinite query.
pub struct UseInfiniteQuery<T: 'static, P: 'static> {
    /// All pages fetched so far.
    pub data: Signal<Option<InfiniteData<T, P>>>,
    /// The latest failure, either of the query or of the last next page fetch.
    pub error: Signal<Option<QueryError>>,
    pub status: Signal<QueryStatus>,
    pub is_fetching: Signal<bool>,
    /// Re-fetches every loaded page.
    pub refetch: Callback<()>,
    /// Whether the last page yields a next page param.
    pub has_next_page: Signal<bool>,
    pub is_fetching_next_page: Signal<bool>,
    /// Appends the next page. Does nothing without a next page or while any fetch is in flight.
    pub fetch_next_page: Callback<()>,
    query: UseQuery<InfiniteData<T, P>>,
}

impl<T: 'static, P: 'static> Clone for UseInfiniteQuery<T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static, P: 'static> Copy for UseInfiniteQuery<T, P> {}

impl<T, P> UseInfiniteQuery<T, P>
where
    T: Clone + 'static,
    P: Clone + 'static,
{
    /// See [`UseQuery::view_data`].
    pub fn view_data(&self) -> Signal<Option<QueryResponse<InfiniteData<T, P>>>> {
        self.query.view_data()
    }
}

/// Suspending subscription to an infinite query.
pub struct SuspenseInfiniteQuery<T: 'static, P: 'static> {
    /// Read inside `Suspense`.
    pub data: Signal<Option<QueryResponse<InfiniteData<T, P>>>>,
    pub status: Signal<QueryStatus>,
    pub has_next_page: Signal<bool>,
    pub is_fetching_next_page: Signal<bool>,
    pub fetch_next_page: Callback<()>,
    pub refetch: Callback<()>,
}

impl<T: 'static, P: 'static> Clone for SuspenseInfiniteQuery<T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static, P: 'static> Copy for SuspenseInfiniteQuery<T, P> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::PrefetchCache;
    use crate::query_key;
    use leptos_query::QueryData;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Page {
        items: Vec<u32>,
        next: Option<u32>,
    }

    const LAST_ITEM: u32 = 6;

    fn paged_query(seen: Rc<RefCell<Vec<u32>>>) -> InfiniteQueryDescriptor<Page, u32> {
        create_infinite_query(
            move |_key: QueryKey, cursor: u32| {
                seen.borrow_mut().push(cursor);
                async move {
                    let end = (cursor + 2).min(LAST_ITEM);
                    Ok(Page {
                        items: (cursor..end).collect(),
                        next: (end < LAST_ITEM).then_some(end),
                    })
                }
            },
            0,
            |last: &Page, _pages: &[Page]| last.next,
        )
    }

    #[test]
    fn next_page_uses_param_derived_from_last_page() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let descriptor = paged_query(seen.clone());
        let key = query_key!["items"];

        futures::executor::block_on(async {
            let first = descriptor
                .fetch_first_page(key.clone(), RetryPolicy::none())
                .await
                .expect("first page");
            assert_eq!(first.page_params, vec![0]);

            let expected = descriptor.next_page_param(&first);
            assert_eq!(expected, Some(2));

            let second = descriptor
                .fetch_next_page(key.clone(), &first, RetryPolicy::none())
                .await
                .expect("second page")
                .expect("has second page");
            assert_eq!(second.page_params, vec![0, 2]);
            assert_eq!(second.pages[1].items, vec![2, 3]);
        });

        assert_eq!(*seen.borrow(), vec![0, 2]);
    }

    #[test]
    fn exhausted_query_does_not_call_producer() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let descriptor = paged_query(seen.clone());
        let key = query_key!["items"];

        let all = futures::executor::block_on(descriptor.refetch_pages(
            key.clone(),
            usize::MAX,
            RetryPolicy::none(),
        ))
        .expect("all pages");
        assert_eq!(all.page_params, vec![0, 2, 4]);
        assert_eq!(descriptor.next_page_param(&all), None);
        seen.borrow_mut().clear();

        let next = futures::executor::block_on(descriptor.fetch_next_page(
            key,
            &all,
            RetryPolicy::none(),
        ));
        assert_eq!(next, Ok(None));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn refetch_reloads_loaded_pages_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let descriptor = paged_query(seen.clone());

        let data = futures::executor::block_on(descriptor.refetch_pages(
            query_key!["items"],
            2,
            RetryPolicy::none(),
        ))
        .expect("two pages");

        assert_eq!(data.pages.len(), 2);
        assert_eq!(*seen.borrow(), vec![0, 2]);
    }

    #[test]
    fn failing_page_fails_the_fetch() {
        let descriptor: InfiniteQueryDescriptor<Page, u32> = create_infinite_query(
            |key: QueryKey, cursor: u32| async move {
                Err(QueryError::Request(format!("{key} at {cursor}")))
            },
            0,
            |last: &Page, _: &[Page]| last.next,
        );

        let result = futures::executor::block_on(
            descriptor.fetch_first_page(query_key!["items"], RetryPolicy::none()),
        );
        assert_eq!(
            result,
            Err(QueryError::Request(r#"["items"] at 0"#.to_string()))
        );
    }

    #[test]
    fn first_page_can_be_prefetched() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let descriptor = paged_query(seen);
        let cache = PrefetchCache::new();
        let key = query_key!["items"];

        let resolved =
            futures::executor::block_on(cache.prefetch_infinite_query(&descriptor, key.clone()));

        assert!(resolved);
        let data = cache
            .get_infinite_query_data::<Page, u32>(&key)
            .expect("prefetched pages");
        assert_eq!(data.pages.len(), 1);
        assert_eq!(data.pages[0].items, vec![0, 1]);
    }

    fn two_pages() -> (InfiniteData<Page, u32>, InfiniteData<Page, u32>) {
        let first = InfiniteData::first(
            Page {
                items: vec![0, 1],
                next: Some(2),
            },
            0,
        );
        let mut second = first.clone();
        second.pages.push(Page {
            items: vec![2, 3],
            next: Some(4),
        });
        second.page_params.push(2);
        (first, second)
    }

    #[test]
    fn next_page_extends_settled_pages() {
        let (first, second) = two_pages();
        let loaded = QueryState::Loaded(QueryData::now(Ok(first)));

        assert_eq!(append_page(&loaded, second.clone()), Some(second));
    }

    #[test]
    fn next_page_is_dropped_while_refetching() {
        let (first, second) = two_pages();
        let refetching = QueryState::Fetching(QueryData::now(Ok(first)));

        assert_eq!(append_page(&refetching, second), None);
    }

    #[test]
    fn next_page_is_dropped_once_pages_changed() {
        let (_, second) = two_pages();
        // A refetch settled on two pages while the third was fetched after the first one.
        let reloaded = QueryState::Loaded(QueryData::now(Ok(second.clone())));

        assert_eq!(append_page(&reloaded, second), None);
    }

    #[cfg(feature = "ssr")]
    mod hook {
        use super::*;
        use crate::query::{provide_query_client_with_config, QueryClientConfig};
        use std::time::Duration;

        async fn settle() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        #[tokio::test]
        async fn fetch_next_page_appends_the_derived_page() {
            tokio::task::LocalSet::new()
                .run_until(async {
                    let _ = create_runtime();
                    provide_query_client_with_config(QueryClientConfig::default().set_query_retry(0));
                    let seen = Rc::new(RefCell::new(Vec::new()));
                    let items = paged_query(seen.clone()).use_infinite_query(|| query_key!["items"]);
                    settle().await;

                    let first = items.data.get_untracked().expect("first page");
                    assert_eq!(first.page_params, vec![0]);
                    assert!(items.has_next_page.get_untracked());

                    items.fetch_next_page.call(());
                    assert!(items.is_fetching_next_page.get_untracked());
                    settle().await;

                    let data = items.data.get_untracked().expect("two pages");
                    assert_eq!(data.page_params, vec![0, 2]);
                    assert_eq!(data.pages[1].items, vec![2, 3]);
                    assert_eq!(*seen.borrow(), vec![0, 2]);
                    assert!(!items.is_fetching_next_page.get_untracked());
                    assert_eq!(items.status.get_untracked(), QueryStatus::Success);
                })
                .await;
        }

        #[tokio::test]
        async fn exhausted_hook_ignores_fetch_next_page() {
            tokio::task::LocalSet::new()
                .run_until(async {
                    let _ = create_runtime();
                    provide_query_client_with_config(QueryClientConfig::default().set_query_retry(0));
                    let seen = Rc::new(RefCell::new(Vec::new()));
                    let items = paged_query(seen.clone()).use_infinite_query(|| query_key!["items"]);
                    settle().await;

                    for _ in 0..2 {
                        items.fetch_next_page.call(());
                        settle().await;
                    }
                    assert!(!items.has_next_page.get_untracked());
                    assert_eq!(*seen.borrow(), vec![0, 2, 4]);

                    items.fetch_next_page.call(());
                    settle().await;
                    assert_eq!(*seen.borrow(), vec![0, 2, 4]);
                    assert_eq!(items.error.get_untracked(), None);
                })
                .await;
        }
    }
}
