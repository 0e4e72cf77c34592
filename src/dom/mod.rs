//! DOM helpers: readiness hooks, delegated listeners, debounce and element/script injection.

mod api;
mod debounce;
mod document;
pub mod error;
mod events;
mod selector;

pub use api::{
    attach_script, attach_to_body, attach_to_head, create_element, on, on_delegated, on_direct,
    on_doc_ready, on_win_loaded, AttributeValue, OnArgument,
};
pub use debounce::{debounce, DebounceOptions, Debounced, DEFAULT_DEBOUNCE_DELAY};
pub use document::{ConnectObserver, Document, Element, Node, ReadyState};
pub use events::{Event, EventHandler, EventTarget, ListenerId};
pub use selector::SelectorList;
