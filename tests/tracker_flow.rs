#![cfg(not(target_arch = "wasm32"))]

use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::Value;
use utx_web_sdk::analytics::{
    CookieStore, GtagCommand, GtagRegistry, MemoryCookieJar, Page, Tracker, TrackerConfig,
    TrackerState,
};
use utx_web_sdk::dom::{Document, ReadyState};

const GEO_PATH: &str = "/api/ip-geo/v1";

async fn geo_server(country: &str) -> MockServer {
    let server = MockServer::start_async().await;
    let body = format!(r#"{{"country":"{country}","region":"Somewhere"}}"#);
    server
        .mock_async(|when, then| {
            when.method(GET).path(GEO_PATH);
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        })
        .await;
    server
}

fn tracker(url: &str, dnt: bool) -> (Tracker, Arc<GtagRegistry>, Arc<MemoryCookieJar>) {
    let registry = Arc::new(GtagRegistry::new());
    let jar = Arc::new(MemoryCookieJar::new());
    let page = Page::new(url.parse().unwrap(), jar.clone()).with_do_not_track(dnt);
    let tracker = Tracker::new(Document::new(), page, registry.clone());
    (tracker, registry, jar)
}

fn config(server: &MockServer) -> TrackerConfig {
    TrackerConfig::new("G-FLOW").with_geo_endpoint(server.url(GEO_PATH))
}

fn load(tracker: &Tracker) {
    tracker.document().advance_ready_state(ReadyState::Interactive);
    tracker.document().advance_ready_state(ReadyState::Complete);
}

fn script_srcs(tracker: &Tracker) -> Vec<String> {
    tracker
        .document()
        .query_selector_all("script")
        .unwrap()
        .into_iter()
        .filter_map(|script| script.attribute("src"))
        .collect()
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test(flavor = "current_thread")]
async fn landing_page_in_tracked_country_initializes_immediately() {
    let server = geo_server("US").await;
    let (tracker, registry, jar) = tracker("https://example.com/welcome?utm_source=test", false);

    tracker.setup(config(&server)).unwrap();
    assert_eq!(tracker.state(), TrackerState::Configured);
    load(&tracker);
    tracker.initialized().await.unwrap();
    assert_eq!(tracker.state(), TrackerState::Initialized);

    let state = registry.snapshot();
    assert!(state.consent_defaults().is_none());
    assert!(matches!(state.commands.first(), Some(GtagCommand::Js(_))));
    let ga_config = state.config_for("G-FLOW").unwrap();
    assert_eq!(ga_config["ads_data_redaction"], true);
    assert_eq!(ga_config["send_page_view"], false);
    assert_eq!(ga_config["allow_google_signals"], false);
    assert_eq!(ga_config["url_passthrough"], false);

    let events = state.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "page_view");
    assert_eq!(events[0].1["x_utm_source"], "test");
    assert_eq!(events[0].1["x_hostname"], "example.com");

    assert!(jar.get("utx_touch").unwrap().contains("\"utm_source\":\"test\""));
    assert_eq!(
        script_srcs(&tracker),
        vec!["https://www.googletagmanager.com/gtag/js?id=G-FLOW".to_string()]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn delegated_clicks_are_tracked_after_initialization() {
    let server = geo_server("us").await;
    let (tracker, registry, _) = tracker("https://example.com/", false);
    let document = tracker.document().clone();

    let link = document.create_element("a");
    link.set_attribute("href", "/pricing");
    link.set_attribute("class", "nav click-id=pricing");
    let label = document.create_element("span");
    label.append_text("See pricing");
    link.append_child(&label).unwrap();
    document.body().append_child(&link).unwrap();

    tracker.setup(config(&server)).unwrap();
    load(&tracker);
    tracker.initialized().await.unwrap();

    label.click();
    wait_until(|| registry.snapshot().events().len() == 2).await;

    let (name, params) = registry.snapshot().events().pop().unwrap();
    assert_eq!(name, "x_click");
    assert_eq!(params["x_id"], "pricing");
    assert_eq!(params["x_sub_id"], "/pricing");
    assert_eq!(params["x_value"], "See pricing");
    assert_eq!(params["x_sub_value"], "a");
}

#[tokio::test(flavor = "current_thread")]
async fn outside_tracked_country_without_consent_script_denies_then_initializes() {
    let server = geo_server("FR").await;
    let (tracker, registry, _) = tracker("https://example.com/", false);

    tracker.setup(config(&server)).unwrap();
    load(&tracker);
    tracker.initialized().await.unwrap();

    let state = registry.snapshot();
    let defaults = state.consent_defaults().unwrap();
    for category in [
        "ad_storage",
        "ad_user_data",
        "ad_personalization",
        "analytics_storage",
        "functionality_storage",
        "personalization_storage",
        "security_storage",
    ] {
        assert_eq!(defaults[category], "denied", "{category}");
    }
    assert_eq!(defaults["wait_for_update"], 500);
    assert!(state.config_for("G-FLOW").is_some());
    assert_eq!(state.events().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn consent_script_gates_initialization() {
    let server = geo_server("DE").await;
    let (tracker, registry, _) = tracker("https://example.com/", false);

    tracker
        .setup(config(&server).with_gdpr_consent_script_id("abc123"))
        .unwrap();
    load(&tracker);
    wait_until(|| tracker.state() == TrackerState::ConsentPending).await;

    let state = registry.snapshot();
    assert!(state.consent_defaults().is_some());
    assert!(state.config_for("G-FLOW").is_none());
    assert!(state.events().is_empty());

    let consent_script = tracker
        .document()
        .query_selector("script[src]")
        .unwrap()
        .unwrap();
    assert_eq!(
        consent_script.attribute("src").as_deref(),
        Some("https://cdn.cookie-script.com/s/abc123.js")
    );
    assert!(consent_script.has_attribute("async"));

    consent_script.dispatch_event("load");
    tracker.initialized().await.unwrap();
    assert_eq!(tracker.state(), TrackerState::Initialized);
    assert!(registry.snapshot().config_for("G-FLOW").is_some());
    assert_eq!(registry.snapshot().events().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn do_not_track_and_policy_pages_require_consent() {
    let server = geo_server("US").await;

    let (dnt_tracker, dnt_registry, _) = tracker("https://example.com/", true);
    dnt_tracker.setup(config(&server)).unwrap();
    load(&dnt_tracker);
    dnt_tracker.initialized().await.unwrap();
    assert!(dnt_registry.snapshot().consent_defaults().is_some());

    let (policy_tracker, policy_registry, _) =
        tracker("https://example.com/legal/privacy-policy", false);
    policy_tracker.setup(config(&server)).unwrap();
    load(&policy_tracker);
    policy_tracker.initialized().await.unwrap();
    assert!(policy_registry.snapshot().consent_defaults().is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn geo_failure_is_reported_by_initialized() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(GEO_PATH);
            then.status(500).body("boom");
        })
        .await;
    let (tracker, registry, _) = tracker("https://example.com/", false);

    tracker.setup(config(&server)).unwrap();
    load(&tracker);
    let err = tracker.initialized().await.unwrap_err();
    assert_eq!(err.code_str(), "analytics/network");
    assert_eq!(tracker.state(), TrackerState::Configured);
    assert!(registry.snapshot().events().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn setup_after_load_bootstraps_right_away() {
    let server = geo_server("US").await;
    let (tracker, registry, _) = tracker("https://example.com/", false);
    load(&tracker);

    tracker.setup(config(&server)).unwrap();
    tracker.initialized().await.unwrap();
    assert_eq!(registry.snapshot().events()[0].0, "page_view");

    let props = [("plan".to_string(), Value::from("pro"))].into_iter().collect();
    assert!(tracker.track_event("x_upgrade", Some(props)).await.unwrap());
    assert_eq!(registry.snapshot().events()[1].1["plan"], "pro");
}

#[tokio::test(flavor = "current_thread")]
async fn long_campaign_values_are_clipped_instead_of_breaking_tracking() {
    let server = geo_server("US").await;
    let campaign = "c".repeat(120);
    let (tracker, registry, jar) = tracker(
        &format!("https://example.com/?utm_source=test&utm_campaign={campaign}"),
        false,
    );

    tracker.setup(config(&server)).unwrap();
    load(&tracker);
    tracker.initialized().await.unwrap();
    assert_eq!(tracker.state(), TrackerState::Initialized);
    assert_eq!(tracker.document().listener_count(), 1);

    let events = registry.snapshot().events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1["x_utm_campaign"], "c".repeat(100));
    assert!(!jar.get("utx_touch").unwrap().contains(&campaign));

    assert!(tracker.track_event("x_later", None).await.unwrap());
    assert_eq!(registry.snapshot().events().len(), 2);
}
