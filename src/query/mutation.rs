use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, Shared};
use leptos::*;

use super::use_query::BoxedResponse;
use super::{use_query_config, QueryError, QueryResponse, RetryPolicy};

type MutationProducer<V, T> = Rc<dyn Fn(V) -> BoxedResponse<T>>;
type OnSuccess<V, T> = Rc<dyn Fn(&T, &V)>;
type OnError<V> = Rc<dyn Fn(&QueryError, &V)>;
type OnSettled<V, T> = Rc<dyn Fn(&QueryResponse<T>, &V)>;

/// Creates a [`MutationDescriptor`] from a producer taking the mutation variables.
pub fn create_mutation<V, T, Fu>(producer: impl Fn(V) -> Fu + 'static) -> MutationDescriptor<V, T>
where
    V: Clone + 'static,
    T: Clone + 'static,
    Fu: Future<Output = QueryResponse<T>> + 'static,
{
    let producer: MutationProducer<V, T> =
        Rc::new(move |variables| Box::pin(producer(variables)) as BoxedResponse<T>);
    MutationDescriptor {
        producer,
        on_success: None,
        on_error: None,
        on_settled: None,
        throw_on_error: None,
    }
}

/// A side effecting producer plus its lifecycle callbacks.
///
/// Callbacks run after the producer settles: `on_success` or `on_error`
/// first, then `on_settled`.
pub struct MutationDescriptor<V, T> {
    producer: MutationProducer<V, T>,
    on_success: Option<OnSuccess<V, T>>,
    on_error: Option<OnError<V>>,
    on_settled: Option<OnSettled<V, T>>,
    throw_on_error: Option<bool>,
}

impl<V, T> Clone for MutationDescriptor<V, T> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_settled: self.on_settled.clone(),
            throw_on_error: self.throw_on_error,
        }
    }
}

impl<V, T> MutationDescriptor<V, T>
where
    V: Clone + 'static,
    T: Clone + 'static,
{
    pub fn on_success(mut self, on_success: impl Fn(&T, &V) + 'static) -> Self {
        self.on_success = Some(Rc::new(on_success));
        self
    }

    pub fn on_error(mut self, on_error: impl Fn(&QueryError, &V) + 'static) -> Self {
        self.on_error = Some(Rc::new(on_error));
        self
    }

    pub fn on_settled(mut self, on_settled: impl Fn(&QueryResponse<T>, &V) + 'static) -> Self {
        self.on_settled = Some(Rc::new(on_settled));
        self
    }

    /// Overrides the client wide `mutations.throw_on_error` for this mutation.
    pub fn set_throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.throw_on_error = Some(throw_on_error);
        self
    }

    /// Runs the producer under `retry`, then the callbacks.
    pub async fn execute(&self, variables: V, retry: RetryPolicy) -> QueryResponse<T> {
        let result = self.run_producer(&variables, retry).await;
        self.settle(&result, &variables);
        result
    }

    async fn run_producer(&self, variables: &V, retry: RetryPolicy) -> QueryResponse<T> {
        let producer = self.producer.clone();
        retry.run(|| producer(variables.clone())).await
    }

    fn settle(&self, result: &QueryResponse<T>, variables: &V) {
        match result {
            Ok(data) => {
                if let Some(on_success) = &self.on_success {
                    on_success(data, variables);
                }
            }
            Err(error) => {
                if let Some(on_error) = &self.on_error {
                    on_error(error, variables);
                }
            }
        }
        if let Some(on_settled) = &self.on_settled {
            on_settled(result, variables);
        }
    }

    /// Creates a mutation hook bound to the current component.
    ///
    /// Calls are dispatched through an [`Action`], which tracks whether a call
    /// is pending along with the variables and result of the latest one.
    pub fn use_mutation(&self) -> UseMutation<V, T> {
        let defaults = use_query_config().mutations;
        let action = create_action(|call: &MutationCall<V, T>| {
            let variables = call.variables.clone();
            let response = call.response.clone();
            async move { (variables, response.await) }
        });
        UseMutation {
            descriptor: store_value(self.clone()),
            action,
            retry: defaults.retry,
            throw_on_error: self.throw_on_error.unwrap_or(defaults.throw_on_error),
            owner: Owner::current(),
        }
    }
}

/// A dispatched call. The hook's action and `mutate_async` await the same response.
struct MutationCall<V, T> {
    variables: V,
    response: Shared<BoxedResponse<T>>,
}

/// Where a mutation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// Not triggered yet, or reset.
    Idle,
    Pending,
    Success,
    Error,
}

/// A component's handle on a mutation.
///
/// State follows the call that settled last. Callbacks run for every call.
pub struct UseMutation<V: 'static, T: 'static> {
    descriptor: StoredValue<MutationDescriptor<V, T>>,
    action: Action<MutationCall<V, T>, (V, QueryResponse<T>)>,
    retry: RetryPolicy,
    throw_on_error: bool,
    owner: Option<Owner>,
}

impl<V: 'static, T: 'static> Clone for UseMutation<V, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: 'static, T: 'static> Copy for UseMutation<V, T> {}

impl<V, T> UseMutation<V, T>
where
    V: Clone + 'static,
    T: Clone + 'static,
{
    /// Triggers the mutation in the background.
    pub fn mutate(&self, variables: V) {
        self.action.dispatch(self.call(variables));
    }

    /// Triggers the mutation and resolves to its result.
    pub fn mutate_async(&self, variables: V) -> impl Future<Output = QueryResponse<T>> + 'static {
        let call = self.call(variables);
        let response = call.response.clone();
        self.action.dispatch(call);
        response
    }

    fn call(&self, variables: V) -> MutationCall<V, T> {
        let descriptor = self.descriptor.get_value();
        let (retry, owner) = (self.retry, self.owner);
        let response = {
            let variables = variables.clone();
            async move {
                let result = descriptor.run_producer(&variables, retry).await;
                let settle = || descriptor.settle(&result, &variables);
                match owner {
                    Some(owner) => with_owner(owner, settle),
                    None => settle(),
                }
                result
            }
        };
        MutationCall {
            variables,
            response: (Box::pin(response) as BoxedResponse<T>).shared(),
        }
    }

    /// Clears the settled result and variables.
    pub fn reset(&self) {
        self.action.value().set(None);
        self.action.input().set(None);
    }

    pub fn status(&self) -> Signal<MutationStatus> {
        let action = self.action;
        Signal::derive(move || {
            if action.pending().get() {
                return MutationStatus::Pending;
            }
            action.value().with(|value| match value {
                None => MutationStatus::Idle,
                Some((_, Ok(_))) => MutationStatus::Success,
                Some((_, Err(_))) => MutationStatus::Error,
            })
        })
    }

    pub fn is_pending(&self) -> Signal<bool> {
        self.action.pending().into()
    }

    /// Data of the latest successful call.
    pub fn data(&self) -> Signal<Option<T>> {
        let action = self.action;
        Signal::derive(move || {
            action
                .value()
                .with(|value| value.as_ref().and_then(|(_, result)| result.clone().ok()))
        })
    }

    pub fn error(&self) -> Signal<Option<QueryError>> {
        let action = self.action;
        Signal::derive(move || {
            action
                .value()
                .with(|value| value.as_ref().and_then(|(_, result)| result.clone().err()))
        })
    }

    /// Variables of the call in flight, else of the latest settled call.
    pub fn variables(&self) -> Signal<Option<V>> {
        let action = self.action;
        Signal::derive(move || {
            action
                .input()
                .with(|call| call.as_ref().map(|call| call.variables.clone()))
                .or_else(|| {
                    action
                        .value()
                        .with(|value| value.as_ref().map(|(variables, _)| variables.clone()))
                })
        })
    }

    /// The value to render. Failures come through as `Err` only with throw on error enabled.
    pub fn view_data(&self) -> Signal<Option<QueryResponse<T>>> {
        let (action, throw_on_error) = (self.action, self.throw_on_error);
        Signal::derive(move || {
            action.value().with(|value| match value {
                Some((_, Ok(data))) => Some(Ok(data.clone())),
                Some((_, Err(error))) if throw_on_error => Some(Err(error.clone())),
                _ => None,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logged_mutation(log: Log, fail: bool) -> MutationDescriptor<String, usize> {
        let success_log = log.clone();
        let error_log = log.clone();
        let settled_log = log;
        create_mutation(move |label: String| async move {
            if fail {
                Err(QueryError::Request(format!("cannot submit {label}")))
            } else {
                Ok(label.len())
            }
        })
        .on_success(move |len, label| {
            success_log
                .borrow_mut()
                .push(format!("success {label} {len}"))
        })
        .on_error(move |error, label| error_log.borrow_mut().push(format!("error {label} {error}")))
        .on_settled(move |result, label| {
            settled_log
                .borrow_mut()
                .push(format!("settled {label} {}", result.is_ok()))
        })
    }

    #[test]
    fn success_runs_success_then_settled() {
        let log = Log::default();
        let descriptor = logged_mutation(log.clone(), false);

        let result =
            futures::executor::block_on(descriptor.execute("abc".to_string(), RetryPolicy::none()));

        assert_eq!(result, Ok(3));
        assert_eq!(
            *log.borrow(),
            vec!["success abc 3".to_string(), "settled abc true".to_string()]
        );
    }

    #[test]
    fn failure_runs_error_then_settled() {
        let log = Log::default();
        let descriptor = logged_mutation(log.clone(), true);

        let result =
            futures::executor::block_on(descriptor.execute("abc".to_string(), RetryPolicy::none()));

        assert!(result.is_err());
        assert_eq!(
            *log.borrow(),
            vec![
                "error abc request failed: cannot submit abc".to_string(),
                "settled abc false".to_string()
            ]
        );
    }

    #[cfg(feature = "ssr")]
    mod hook {
        use super::*;
        use crate::query::{provide_query_client_with_config, QueryClientConfig};
        use std::time::Duration;

        async fn run_local<F: Future<Output = ()>>(test: F) {
            tokio::task::LocalSet::new().run_until(test).await
        }

        // Lets the action's spawned task record the settled call.
        async fn settle() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        #[tokio::test]
        async fn hook_tracks_latest_call() {
            run_local(async {
                let _ = create_runtime();
                provide_query_client_with_config(QueryClientConfig::default());
                let log = Log::default();
                let mutation = logged_mutation(log.clone(), false).use_mutation();

                assert_eq!(mutation.status().get_untracked(), MutationStatus::Idle);

                let result = mutation.mutate_async("hello".to_string()).await;
                settle().await;

                assert_eq!(result, Ok(5));
                assert_eq!(mutation.status().get_untracked(), MutationStatus::Success);
                assert_eq!(mutation.data().get_untracked(), Some(5));
                assert_eq!(mutation.variables().get_untracked(), Some("hello".to_string()));
                assert!(!mutation.is_pending().get_untracked());
                // The producer and callbacks ran once, shared by the action and the awaited call.
                assert_eq!(log.borrow().len(), 2);

                mutation.reset();
                assert_eq!(mutation.status().get_untracked(), MutationStatus::Idle);
                assert_eq!(mutation.data().get_untracked(), None);
                assert_eq!(mutation.variables().get_untracked(), None);
            })
            .await;
        }

        #[tokio::test]
        async fn pending_until_the_producer_settles() {
            run_local(async {
                let _ = create_runtime();
                provide_query_client_with_config(QueryClientConfig::default());
                let mutation = create_mutation(|label: String| async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<_, QueryError>(label.len())
                })
                .use_mutation();

                mutation.mutate("slow".to_string());
                assert_eq!(mutation.status().get_untracked(), MutationStatus::Pending);
                assert!(mutation.is_pending().get_untracked());
                assert_eq!(mutation.variables().get_untracked(), Some("slow".to_string()));

                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(mutation.status().get_untracked(), MutationStatus::Success);
                assert_eq!(mutation.data().get_untracked(), Some(4));
            })
            .await;
        }

        #[tokio::test]
        async fn hook_exposes_failures() {
            run_local(async {
                let _ = create_runtime();
                provide_query_client_with_config(QueryClientConfig::default());
                let thrown = logged_mutation(Log::default(), true)
                    .set_throw_on_error(true)
                    .use_mutation();
                let swallowed = logged_mutation(Log::default(), true).use_mutation();

                let _ = thrown.mutate_async("x".to_string()).await;
                let _ = swallowed.mutate_async("x".to_string()).await;
                settle().await;

                assert_eq!(thrown.status().get_untracked(), MutationStatus::Error);
                assert!(thrown.error().get_untracked().is_some());
                assert!(matches!(thrown.view_data().get_untracked(), Some(Err(_))));

                assert_eq!(swallowed.status().get_untracked(), MutationStatus::Error);
                assert!(swallowed.error().get_untracked().is_some());
                assert_eq!(swallowed.view_data().get_untracked(), None);
            })
            .await;
        }

        #[tokio::test]
        async fn client_default_decides_throwing() {
            run_local(async {
                let _ = create_runtime();
                provide_query_client_with_config(
                    QueryClientConfig::default().set_mutation_throw_on_error(true),
                );
                let inherited = logged_mutation(Log::default(), true).use_mutation();
                let overridden = logged_mutation(Log::default(), true)
                    .set_throw_on_error(false)
                    .use_mutation();

                inherited.mutate("x".to_string());
                overridden.mutate("x".to_string());
                settle().await;

                assert!(matches!(inherited.view_data().get_untracked(), Some(Err(_))));
                assert_eq!(overridden.view_data().get_untracked(), None);
            })
            .await;
        }
    }
}
