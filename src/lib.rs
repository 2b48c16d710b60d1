//! Server rendered Leptos app demonstrating queries, mutations, infinite
//! queries and suspense boundaries on top of `leptos_query`, with server side
//! prefetching and client side hydration.

pub mod api;
pub mod app;
pub mod components;
pub mod error_template;
#[cfg(feature = "ssr")]
pub mod fileserv;
pub mod pages;
pub mod query;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;
    _ = console_log::init_with_level(log::Level::Debug);
    console_error_panic_hook::set_once();
    leptos::mount_to_body(App);
}
