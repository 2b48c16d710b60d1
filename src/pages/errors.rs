use leptos::*;

use crate::components::errors_container::ErrorsContainer;

#[component]
pub fn ErrorsPage() -> impl IntoView {
    view! {
        <h1>"Errors"</h1>
        <ErrorsContainer/>
    }
}
