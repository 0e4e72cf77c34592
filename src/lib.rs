//! # utx-web-sdk
//!
//! Front-end helpers for web properties:
//!
//! * [`dom`]: readiness hooks, document-level (optionally delegated) listeners, debounce, and
//!   element/script injection over a thread-safe document model.
//! * [`analytics`]: a consent-gated GA4 tracker that enriches every event with client,
//!   session, user and campaign dimensions.
//! * [`platform`]: runtime, environment-configuration and browser bindings.
//!
//! ```
//! use std::sync::Arc;
//! use utx_web_sdk::analytics::{GtagRegistry, Page, Tracker, TrackerConfig};
//! use utx_web_sdk::dom::Document;
//!
//! let registry = Arc::new(GtagRegistry::new());
//! let page = Page::parse("https://example.com/?utm_source=newsletter").unwrap();
//! let tracker = Tracker::new(Document::new(), page, registry.clone());
//! tracker.setup(TrackerConfig::new("G-XXXXXXX")).unwrap();
//! assert!(registry.snapshot().installed);
//! ```

pub mod analytics;
pub mod dom;
pub mod platform;

#[cfg(test)]
pub mod test_support;
