use leptos::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub label: String,
}

/// One page of items, with the cursor of the page after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsPage {
    pub items: Vec<Item>,
    pub next_cursor: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: u32,
    pub label: String,
}

pub const PAGE_SIZE: u32 = 5;
pub const TOTAL_ITEMS: u32 = 12;

/// Builds the page of items starting at `cursor`.
pub fn items_page(cursor: u32) -> ItemsPage {
    let end = cursor.saturating_add(PAGE_SIZE).min(TOTAL_ITEMS);
    let items = (cursor..end)
        .map(|id| Item {
            id,
            label: format!("Item {id}"),
        })
        .collect();
    let next_cursor = (end < TOTAL_ITEMS).then_some(end);
    ItemsPage { items, next_cursor }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "ssr")] {
        use std::{sync::RwLock, time::Duration};

        static SUBMISSIONS: RwLock<Vec<Submission>> = RwLock::new(vec![]);

        const LATENCY: Duration = Duration::from_millis(500);

        fn storage_error<E: std::fmt::Display>(error: E) -> ServerFnError {
            ServerFnError::ServerError(format!("submission storage unavailable: {error}"))
        }
    }
}

#[server(GetNumber, "/api")]
pub async fn get_number(value: i32) -> Result<i32, ServerFnError> {
    logging::log!("Fetching number: {value}");
    tokio::time::sleep(LATENCY).await;
    Ok(value)
}

#[server(GetItemsPage, "/api")]
pub async fn get_items_page(cursor: u32) -> Result<ItemsPage, ServerFnError> {
    logging::log!("Fetching items from cursor: {cursor}");
    tokio::time::sleep(LATENCY).await;
    if cursor >= TOTAL_ITEMS {
        return Err(ServerFnError::Args(format!("cursor {cursor} is out of range")));
    }
    Ok(items_page(cursor))
}

#[server(SubmitVariables, "/api")]
pub async fn submit_variables(label: String) -> Result<Submission, ServerFnError> {
    tokio::time::sleep(LATENCY).await;
    let label = label.trim().to_string();
    if label.is_empty() {
        return Err(ServerFnError::Args("label must not be empty".into()));
    }

    let mut submissions = SUBMISSIONS.write().map_err(storage_error)?;
    let id = submissions.last().map(|s| s.id + 1).unwrap_or(0);
    let submission = Submission { id, label };
    submissions.push(submission.clone());
    logging::log!("Stored submission: {submission:?}");

    Ok(submission)
}

/// Always fails. Drives the error fallback of the boundary.
#[server(GetFailure, "/api")]
pub async fn get_failure(reason: String) -> Result<i32, ServerFnError> {
    tokio::time::sleep(LATENCY).await;
    Err(ServerFnError::ServerError(reason))
}
