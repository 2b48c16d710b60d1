use crate::{
    error_template::{AppError, ErrorTemplate},
    pages::{errors::ErrorsPage, home::HomePage},
    query::{provide_query_client_with_config, QueryClientConfig},
};
use leptos::*;
use leptos_meta::*;
use leptos_query_devtools::LeptosQueryDevtools;
use leptos_router::*;

/// Client configuration shared by every page.
///
/// Failures are not retried and render into the nearest error boundary, and
/// queries suspend while loading.
pub fn query_client_config() -> QueryClientConfig {
    QueryClientConfig::default()
        .set_query_retry(0)
        .set_suspense(true)
        .set_query_throw_on_error(true)
        .set_mutation_retry(0)
        .set_mutation_throw_on_error(true)
}

#[component]
pub fn App() -> impl IntoView {
    // Provides context that manages stylesheets, titles, meta tags, etc.
    provide_meta_context();
    // One query client per rendering session.
    provide_query_client_with_config(query_client_config());

    view! {
        <Stylesheet id="leptos" href="/pkg/query-boundary.css"/>
        <Title text="Query Boundary"/>
        <LeptosQueryDevtools/>
        <Router fallback=|| {
            let mut outside_errors = Errors::default();
            outside_errors.insert_with_default_key(AppError::NotFound);
            view! { <ErrorTemplate outside_errors/> }.into_view()
        }>
            <nav>
                <A href="/">"Home"</A>
                <A href="/errors">"Errors"</A>
            </nav>
            <main>
                <Routes>
                    <Route path="" view=HomePage/>
                    <Route path="errors" view=ErrorsPage/>
                </Routes>
            </main>
        </Router>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{use_query_config, RetryPolicy};

    #[test]
    fn app_client_never_retries_and_always_throws() {
        let config = query_client_config();
        assert_eq!(config.queries.retry.retries, 0);
        assert!(config.queries.suspense);
        assert!(config.queries.throw_on_error);
        assert_eq!(config.mutations.retry, RetryPolicy::none());
        assert!(config.mutations.throw_on_error);
    }

    #[test]
    fn app_config_is_provided_to_descendants() {
        let _ = create_runtime();
        provide_query_client_with_config(query_client_config());
        assert_eq!(use_query_config(), query_client_config());
    }
}
