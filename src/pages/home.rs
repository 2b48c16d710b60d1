use leptos::*;

use crate::components::home_container::{number_key, number_query, HomeContainer};
use crate::components::home_network::HomeNetwork;
use crate::query::{create_page_props, HydrationBoundary, PrefetchCache};

/// The index page.
///
/// Its loader prefetches the home container's main query on the server, so the
/// first render already shows the number and the client does not request it again.
#[component]
pub fn HomePage() -> impl IntoView {
    let props = create_page_props(|cache: PrefetchCache| async move {
        if !cache.prefetch_query(&number_query(), number_key(1)).await {
            logging::warn!("Home page renders without prefetched data.");
        }
    });

    view! {
        <Suspense fallback=|| "Loading,,,">
            {move || {
                props
                    .get()
                    .map(|props| {
                        view! {
                            <HydrationBoundary state=props.dehydrated_state>
                                <HomeNetwork>
                                    <HomeContainer/>
                                </HomeNetwork>
                            </HydrationBoundary>
                        }
                    })
            }}
        </Suspense>
    }
}
