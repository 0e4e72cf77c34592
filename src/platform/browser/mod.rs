//! Bindings to the real browser, available with the `wasm-web` feature on `wasm32`.
//!
//! [`tracker_from_window`] builds a [`Tracker`](crate::analytics::Tracker) over a document
//! connected to the live page: injected scripts load for real and page clicks reach the
//! tracker's listeners.
//!
//! Elsewhere the tracker is driven through [`GtagRegistry`](crate::analytics::GtagRegistry)
//! and [`MemoryCookieJar`](crate::analytics::MemoryCookieJar).

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
mod bridge;
#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
mod web;

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub use bridge::{connect_document, tracker_from_window};
#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
pub use web::{page_from_window, DocumentCookieStore, WindowGtag};
