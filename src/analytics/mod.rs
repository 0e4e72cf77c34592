//! Consent-gated GA4 analytics.
//!
//! A [`Tracker`] is bound to a [`Document`](crate::dom::Document), a [`Page`] and a
//! [`TagManager`]. After [`Tracker::setup`] it waits for the window to load, resolves the
//! visitor's geo data, pushes consent defaults when needed and then loads `gtag.js`, emits
//! the first `page_view` and starts tracking clicks.

mod api;
mod click;
mod config;
pub mod constants;
pub mod error;
mod geo;
mod gtag;
mod page;
mod payload;
mod utm;

pub use api::{Tracker, TrackerState};
pub use config::TrackerConfig;
pub use error::{AnalyticsError, AnalyticsErrorCode, AnalyticsResult};
pub use geo::GeoData;
pub use gtag::{ConsentMode, EventParams, GtagCommand, GtagRegistry, GtagState, TagManager};
pub use page::{CookieStore, MemoryCookieJar, Page};
pub use payload::EventPayload;
