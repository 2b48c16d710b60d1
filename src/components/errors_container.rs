use leptos::*;

use crate::api::get_failure;
use crate::components::home_container::number_query;
use crate::components::query_boundary::QueryBoundary;
use crate::query::{create_query, QueryDescriptor, QueryError, QueryKey};
use crate::query_key;

/// Fails with the reason stored at index 1 of its key.
pub fn failure_query() -> QueryDescriptor<i32> {
    create_query(|key: QueryKey| async move {
        let reason = key.str_at(1)?.to_string();
        Ok::<_, QueryError>(get_failure(reason).await?)
    })
}

/// Shows both ways a failing query can surface.
#[component]
pub fn ErrorsContainer() -> impl IntoView {
    view! {
        <div class="errors">
            <section>
                <h2>"Thrown into the boundary"</h2>
                <QueryBoundary error_fallback=|| {
                    view! { <p class="error">"Error,,, the query failed and the boundary caught it."</p> }
                }>
                    <ThrownFailure/>
                </QueryBoundary>
            </section>
            <section>
                <h2>"Exposed as a value"</h2>
                <QueryBoundary>
                    <FailureAsValue/>
                </QueryBoundary>
            </section>
        </div>
    }
}

#[component]
fn ThrownFailure() -> impl IntoView {
    let failure = failure_query().use_query(|| query_key!["failure", "thrown"]);

    view! { <p>{move || failure.view_data().get()}</p> }
}

#[component]
fn FailureAsValue() -> impl IntoView {
    let failure = failure_query()
        .set_throw_on_error(false)
        .use_query(|| query_key!["failure", "value"]);
    let number = number_query().use_query(|| query_key!["queryKey", 7]);

    view! {
        <p>
            // Suspends until the failure arrives. Renders nothing itself.
            {move || failure.view_data().get().map(|_| ())}
            "Failing query: " {move || format!("{:?}", failure.status.get())} " "
            {move || failure.error.get().map(|error| error.to_string())}
        </p>
        <p>
            "Independent query: " {move || number.view_data().get()}
        </p>
    }
}
