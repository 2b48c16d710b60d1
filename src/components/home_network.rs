use leptos::*;

use super::query_boundary::QueryBoundary;

/// Loading and error boundary for the home page's data consumers.
#[component]
pub fn HomeNetwork(children: ChildrenFn) -> impl IntoView {
    view! { <QueryBoundary>{children()}</QueryBoundary> }
}
