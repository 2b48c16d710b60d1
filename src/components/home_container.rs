use leptos::*;

use crate::api::{get_items_page, get_number, submit_variables, ItemsPage, Submission};
use crate::query::{
    create_infinite_query, create_mutation, create_query, use_queries, use_suspense_queries,
    InfiniteData, InfiniteQueryDescriptor, MutationDescriptor, QueryDescriptor, QueryError,
    QueryKey,
};
use crate::query_key;

/// Resolves to the number stored at index 1 of its key.
pub fn number_query() -> QueryDescriptor<i32> {
    create_query(|key: QueryKey| async move {
        let value = key.int_at(1)?;
        let value = i32::try_from(value).map_err(|_| QueryError::InvalidKey {
            key: key.to_string(),
            index: 1,
        })?;
        Ok::<_, QueryError>(get_number(value).await?)
    })
}

pub fn number_key(value: i32) -> QueryKey {
    query_key!["queryKey", value]
}

/// Pages through the item list, one cursor at a time.
///
/// Page reads are idempotent, so a failed page is retried once.
pub fn items_query() -> InfiniteQueryDescriptor<ItemsPage, u32> {
    create_infinite_query(
        |_key: QueryKey, cursor: u32| async move {
            Ok::<_, QueryError>(get_items_page(cursor).await?)
        },
        0,
        |last: &ItemsPage, _pages: &[ItemsPage]| last.next_cursor,
    )
    .set_retry(1)
}

pub fn items_key() -> QueryKey {
    query_key!["infinityQueryKey"]
}

pub fn suspense_items_key() -> QueryKey {
    query_key!["suspenseInfinityQueryKey"]
}

/// Rejected submissions are shown next to the form instead of replacing the page.
fn submit_mutation() -> MutationDescriptor<String, Submission> {
    let submit = |label: String| async move { Ok::<_, QueryError>(submit_variables(label).await?) };
    create_mutation(submit)
        .set_throw_on_error(false)
        .on_success(|submission: &Submission, _label: &String| {
            logging::log!("Submitted {submission:?}");
        })
        .on_error(|error: &QueryError, label: &String| {
            logging::warn!("Submitting {label:?} failed: {error}");
        })
        .on_settled(|_result, label: &String| {
            logging::log!("Submission of {label:?} settled");
        })
}

/// Demonstrates every kind of data dependency the query layer offers.
#[component]
pub fn HomeContainer() -> impl IntoView {
    // Single query, with the resolved value transformed before it reaches the view.
    let number = number_query().use_query_select(|| number_key(1), |value| value * 10);

    let parallel = use_queries([
        (number_query(), query_key!["queryKey2", 2]),
        (number_query(), query_key!["queryKey3", 3]),
    ]);

    let suspense_number = number_query().use_suspense_query(|| query_key!["suspenseQueryKey1", 1]);
    let suspense_numbers = use_suspense_queries([(
        number_query(),
        query_key!["suspenseQueryKey2", 2],
    )]);

    let items = items_query().use_infinite_query(items_key);
    let suspense_items = items_query().use_suspense_infinite_query(suspense_items_key);

    view! {
        <div class="home">
            <p>"Home,,,"</p>

            <section>
                <h2>"Query"</h2>
                <p>"Status: " {move || format!("{:?}", number.status.get())}</p>
                {move || {
                    number
                        .view_data()
                        .get()
                        .map(|value| value.map(|value| view! { <p>"Selected: " {value}</p> }))
                }}
            </section>

            <section>
                <h2>"Parallel queries"</h2>
                <ul>
                    {parallel
                        .into_iter()
                        .map(|query| {
                            view! {
                                <li>
                                    {move || {
                                        query.view_data().get().map(|value| value.map(|value| value.to_string()))
                                    }}
                                </li>
                            }
                        })
                        .collect_view()}
                </ul>
            </section>

            <section>
                <h2>"Suspense queries"</h2>
                <p>
                    {move || suspense_number.data.get()} " "
                    {move || format!("{:?}", suspense_number.status.get())}
                </p>
                <ul>
                    {suspense_numbers
                        .into_iter()
                        .map(|query| view! { <li>{move || query.data.get()}</li> })
                        .collect_view()}
                </ul>
            </section>

            <section>
                <h2>"Infinite query"</h2>
                <p>"Status: " {move || format!("{:?}", items.status.get())}</p>
                {move || {
                    items.view_data().get().map(|data| data.map(|data| view! { <ItemList data/> }))
                }}
                <button
                    class="button"
                    disabled=move || !items.has_next_page.get() || items.is_fetching_next_page.get()
                    on:click=move |_| items.fetch_next_page.call(())
                >
                    "Load more"
                </button>
                {move || items.error.get().map(|error| view! { <p class="error">{error.to_string()}</p> })}
            </section>

            <section>
                <h2>"Suspense infinite query"</h2>
                {move || {
                    suspense_items.data.get().map(|data| data.map(|data| view! { <ItemList data/> }))
                }}
                <button
                    class="button"
                    disabled=move || {
                        !suspense_items.has_next_page.get()
                            || suspense_items.is_fetching_next_page.get()
                    }
                    on:click=move |_| suspense_items.fetch_next_page.call(())
                >
                    "Load more"
                </button>
            </section>

            <Submit/>
        </div>
    }
}

#[component]
fn ItemList(data: InfiniteData<ItemsPage, u32>) -> impl IntoView {
    view! {
        <ul>
            {data
                .pages
                .into_iter()
                .flat_map(|page| page.items)
                .map(|item| view! { <li>{item.id} ": " {item.label}</li> })
                .collect_view()}
        </ul>
    }
}

#[component]
fn Submit() -> impl IntoView {
    let mutation = submit_mutation().use_mutation();
    let label = create_rw_signal(String::new());
    let submitted = mutation.view_data();
    let status = mutation.status();
    let pending = mutation.is_pending();

    let submit_and_log = move |_| {
        let response = mutation.mutate_async(label.get_untracked());
        spawn_local(async move {
            match response.await {
                Ok(submission) => logging::log!("Awaited submission {}", submission.id),
                Err(error) => logging::warn!("Awaited submission failed: {error}"),
            }
        });
    };

    view! {
        <section>
            <h2>"Mutation"</h2>
            <input
                type="text"
                prop:value=label
                on:input=move |ev| label.set(event_target_value(&ev))
            />
            <button
                class="button"
                disabled=move || pending.get()
                on:click=move |_| mutation.mutate(label.get_untracked())
            >
                "Submit"
            </button>
            <button class="button" disabled=move || pending.get() on:click=submit_and_log>
                "Submit and wait"
            </button>
            <button class="button" on:click=move |_| mutation.reset()>
                "Reset"
            </button>
            <p>"Status: " {move || format!("{:?}", status.get())}</p>
            {move || {
                submitted
                    .get()
                    .map(|submission| {
                        submission
                            .map(|submission| {
                                view! { <p>"Stored #" {submission.id} ": " {submission.label}</p> }
                            })
                    })
            }}
            {move || {
                mutation.error().get().map(|error| view! { <p class="error">{error.to_string()}</p> })
            }}
        </section>
    }
}
