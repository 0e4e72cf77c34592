//! Sets up a tracker against an in-memory tag manager and records a landing-page view.
//! Configuration is read from `UTX_*` variables, falling back to a demo measurement id.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use utx_web_sdk::analytics::{CookieStore, GtagRegistry, Page, Tracker, TrackerConfig};
use utx_web_sdk::dom::Document;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = TrackerConfig::from_env();
    if config.ga4_gtag_id.is_empty() {
        config.ga4_gtag_id = "G-DEMO123".into();
    }

    let registry = Arc::new(GtagRegistry::new());
    registry.set_field("client_id", "1234567890.1700000000");
    let page = Page::parse("https://www.example.com/landing?utm_source=newsletter&utm_medium=email")?;
    let tracker = Tracker::new(Document::new(), page, registry.clone());
    tracker.setup(config)?;

    tracker.track_page_view(None).await?;
    tracker
        .track_event(
            "x_signup",
            Some(BTreeMap::from([("plan".to_string(), Value::from("pro"))])),
        )
        .await?;

    for (name, params) in registry.snapshot().events() {
        println!("{name}: {}", serde_json::to_string_pretty(&params)?);
    }
    println!("touch cookie: {:?}", tracker.page().cookies().get("utx_touch"));

    Ok(())
}
