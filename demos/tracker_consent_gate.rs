//! Runs the full bootstrap: geo lookup, consent decision and initialization.
//!
//! Requires network access to the geo endpoint (`UTX_GEO_ENDPOINT` overrides it). Visitors
//! outside the tracked country get denied consent defaults; with `UTX_GDPR_CONSENT_SCRIPT_ID`
//! set the demo simulates the consent script finishing its load.

use std::sync::Arc;
use std::time::Duration;

use utx_web_sdk::analytics::{GtagRegistry, Page, Tracker, TrackerConfig, TrackerState};
use utx_web_sdk::dom::{Document, ReadyState};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = TrackerConfig::from_env();
    if config.ga4_gtag_id.is_empty() {
        config.ga4_gtag_id = "G-DEMO123".into();
    }

    let registry = Arc::new(GtagRegistry::new());
    let page = Page::parse("https://www.example.com/")?.with_do_not_track(false);
    let tracker = Tracker::new(Document::new(), page, registry.clone());
    tracker.setup(config)?;
    tracker.document().advance_ready_state(ReadyState::Complete);

    // Give the geo lookup a few seconds to settle the consent decision.
    for _ in 0..250 {
        if tracker.state() != TrackerState::Configured {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    if tracker.state() == TrackerState::ConsentPending {
        if let Some(consent_script) = tracker.document().query_selector("script[src]")? {
            println!("consent script attached: {:?}", consent_script.attribute("src"));
            consent_script.dispatch_event("load");
        }
    }

    let outcome = tokio::time::timeout(Duration::from_secs(10), tracker.initialized()).await;
    match outcome.map_err(|_| "timed out waiting for the tracker")? {
        Ok(()) => println!("initialized; geo = {:?}", tracker.geo_data().await?),
        Err(err) => println!("bootstrap failed: {err}"),
    }
    for command in registry.snapshot().commands {
        println!("{:?}", command.to_arguments());
    }
    Ok(())
}
