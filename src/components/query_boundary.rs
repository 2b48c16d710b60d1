use leptos::*;

const DEFAULT_LOADING: &str = "Loading,,,";
const DEFAULT_ERROR: &str = "Error,,,";

/// An `ErrorBoundary` around a `Suspense`.
///
/// While any resource read inside `children` is pending the loading fallback
/// renders. Once a descendant renders an `Err`, the error fallback replaces
/// the whole subtree until the error is gone.
#[component]
pub fn QueryBoundary(
    /// Rendered while descendants are loading. Defaults to `"Loading,,,"`.
    #[prop(optional, into)]
    loading_fallback: Option<ViewFn>,
    /// Rendered once a descendant fails. Defaults to `"Error,,,"`.
    #[prop(optional, into)]
    error_fallback: Option<ViewFn>,
    children: ChildrenFn,
) -> impl IntoView {
    let loading_fallback = loading_fallback.unwrap_or_else(|| ViewFn::from(|| DEFAULT_LOADING));
    let error_fallback = error_fallback.unwrap_or_else(|| ViewFn::from(|| DEFAULT_ERROR));

    view! {
        <ErrorBoundary fallback=move |_| error_fallback.run()>
            <Suspense fallback=loading_fallback.clone()>{children()}</Suspense>
        </ErrorBoundary>
    }
}
