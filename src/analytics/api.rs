use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Value};

use crate::analytics::click::click_params;
use crate::analytics::config::TrackerConfig;
use crate::analytics::constants::{
    CLICK_EVENT, CLICK_SELECTOR, CONSENT_CATEGORIES, CONSENT_SCRIPT_URL, GTAG_SCRIPT_URL,
    MAX_LOCAL_USER_ID_LENGTH, PAGE_VIEW_EVENT, USER_ID_COOKIE,
};
use crate::analytics::error::{already_set_up, internal_error, not_set_up, AnalyticsResult};
use crate::analytics::geo::{GeoClient, GeoData};
use crate::analytics::gtag::{ConsentMode, EventParams, GtagCommand, TagManager};
use crate::analytics::page::Page;
use crate::analytics::payload::{validate_event_name, EventPayload};
use crate::analytics::utm::{persist_touch, utm_x_query_var_dimensions};
use crate::dom::{
    attach_script, on_delegated, on_win_loaded, AttributeValue, Document, Element, ListenerId,
};
use crate::platform::runtime::spawn_detached;

// Unreserved URL characters stay readable in script URLs.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Lifecycle of a [`Tracker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Configured,
    /// Waiting for the consent script to load before initializing.
    ConsentPending,
    Initializing,
    Initialized,
}

enum Bootstrap {
    Initialized,
    AwaitingConsent,
}

/// Consent-gated GA4 tracker bound to one document and page.
///
/// Construct it once per page load, call [`setup`](Self::setup), then use the `track_*`
/// methods. Clones share the same state.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    document: Document,
    page: Page,
    gtag: Arc<dyn TagManager>,
    config: OnceLock<TrackerConfig>,
    geo: OnceLock<GeoClient>,
    state: Mutex<TrackerState>,
    outcome: Mutex<Option<AnalyticsResult<()>>>,
    ready_tx: Mutex<Option<async_channel::Sender<()>>>,
    ready_rx: async_channel::Receiver<()>,
    click_listener: Mutex<Option<ListenerId>>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("page", &self.inner.page)
            .field("state", &self.state())
            .field(
                "measurement_id",
                &self.inner.config.get().map(|config| config.ga4_gtag_id.as_str()),
            )
            .finish()
    }
}

impl Tracker {
    pub fn new(document: Document, page: Page, gtag: Arc<dyn TagManager>) -> Self {
        let (ready_tx, ready_rx) = async_channel::bounded(1);
        Self {
            inner: Arc::new(TrackerInner {
                document,
                page,
                gtag,
                config: OnceLock::new(),
                geo: OnceLock::new(),
                state: Mutex::new(TrackerState::Uninitialized),
                outcome: Mutex::new(None),
                ready_tx: Mutex::new(Some(ready_tx)),
                ready_rx,
                click_listener: Mutex::new(None),
            }),
        }
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn page(&self) -> &Page {
        &self.inner.page
    }

    pub fn state(&self) -> TrackerState {
        *self.inner.state.lock().unwrap()
    }

    fn set_state(&self, state: TrackerState) {
        *self.inner.state.lock().unwrap() = state;
    }

    /// The configuration passed to [`setup`](Self::setup).
    pub fn config(&self) -> AnalyticsResult<&TrackerConfig> {
        self.inner.config.get().ok_or_else(not_set_up)
    }

    /// Validates and stores `config`, installs the tag-manager queue and schedules the
    /// bootstrap for when the window has loaded.
    ///
    /// A missing user id falls back to the `utx_user_id` cookie. Fails with
    /// `analytics/already-set-up` on the second call.
    pub fn setup(&self, config: TrackerConfig) -> AnalyticsResult<()> {
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state != TrackerState::Uninitialized {
                return Err(already_set_up());
            }
            config.validate()?;

            let mut config = config;
            if config.user_id_hash.is_empty() {
                if let Some(cookie_id) = self.inner.page.cookies().get(USER_ID_COOKIE) {
                    if cookie_id.chars().count() <= MAX_LOCAL_USER_ID_LENGTH {
                        config.user_id_hash = cookie_id;
                    } else {
                        log::warn!("ignoring `{USER_ID_COOKIE}` cookie longer than {MAX_LOCAL_USER_ID_LENGTH} characters");
                    }
                }
            }

            let geo = GeoClient::new(config.geo_endpoint.clone())?;
            if self.inner.geo.set(geo).is_err() || self.inner.config.set(config).is_err() {
                return Err(already_set_up());
            }
            *state = TrackerState::Configured;
        }

        self.inner.gtag.install();
        if let Ok(config) = self.config() {
            if config.debug {
                log::info!(
                    "analytics configured for `{}` on {}",
                    config.ga4_gtag_id,
                    self.inner.page.url()
                );
            }
        }

        let tracker = self.clone();
        on_win_loaded(&self.inner.document, move || {
            spawn_detached(async move { tracker.run_bootstrap().await });
        });
        Ok(())
    }

    /// Resolves once the background bootstrap has finished, with its outcome.
    ///
    /// While consent is pending this keeps waiting until the consent script loads.
    pub async fn initialized(&self) -> AnalyticsResult<()> {
        self.config()?;
        if let Some(outcome) = self.outcome() {
            return outcome;
        }
        // The sender is closed, never used, once an outcome is recorded.
        let _ = self.inner.ready_rx.recv().await;
        self.outcome()
            .unwrap_or_else(|| Err(internal_error("tracker bootstrap ended without an outcome")))
    }

    fn outcome(&self) -> Option<AnalyticsResult<()>> {
        self.inner.outcome.lock().unwrap().clone()
    }

    fn complete(&self, outcome: AnalyticsResult<()>) {
        {
            let mut slot = self.inner.outcome.lock().unwrap();
            if slot.is_some() {
                return;
            }
            if let Err(err) = &outcome {
                log::warn!("analytics bootstrap failed: {err}");
            }
            *slot = Some(outcome);
        }
        if let Some(sender) = self.inner.ready_tx.lock().unwrap().take() {
            sender.close();
        }
    }

    async fn run_bootstrap(&self) {
        match self.load_then_initialize().await {
            Ok(Bootstrap::Initialized) => self.complete(Ok(())),
            Ok(Bootstrap::AwaitingConsent) => {}
            Err(err) => self.complete(Err(err)),
        }
    }

    /// Decides whether consent is required and initializes now or once consent is given.
    ///
    /// Consent is required outside the tracked country, with do-not-track enabled, or on a
    /// privacy/cookie policy page. All categories are then denied by default; with a consent
    /// script configured, initialization waits for that script to load.
    async fn load_then_initialize(&self) -> AnalyticsResult<Bootstrap> {
        let config = self.config()?.clone();
        let geo = self.geo_data().await?;

        let outside = !geo.is_in_country(&config.tracked_country);
        let dnt = self.user_has_do_not_track_header();
        let policy_page = self.inner.page.is_policy_page();
        if outside || dnt || policy_page {
            log::debug!(
                "consent required (outside tracked country: {outside}, do-not-track: {dnt}, policy page: {policy_page})"
            );
            let mut params: EventParams = CONSENT_CATEGORIES
                .iter()
                .map(|category| (category.to_string(), Value::from("denied")))
                .collect();
            params.insert(
                "wait_for_update".to_string(),
                Value::from(config.consent_wait_for_update.as_millis() as u64),
            );
            self.inner.gtag.push(GtagCommand::Consent {
                mode: ConsentMode::Default,
                params,
            });

            if let Some(script_id) = &config.gdpr_consent_script_id {
                self.set_state(TrackerState::ConsentPending);
                let src = format!(
                    "{CONSENT_SCRIPT_URL}/{}.js",
                    utf8_percent_encode(script_id, URL_COMPONENT)
                );
                let tracker = self.clone();
                attach_script(
                    &self.inner.document,
                    &src,
                    [(
                        "onload",
                        AttributeValue::handler(move |_event| {
                            let tracker = tracker.clone();
                            spawn_detached(async move {
                                let outcome = tracker.initialize().await;
                                tracker.complete(outcome);
                            });
                        }),
                    )],
                )?;
                return Ok(Bootstrap::AwaitingConsent);
            }
        }

        self.initialize().await?;
        Ok(Bootstrap::Initialized)
    }

    async fn initialize(&self) -> AnalyticsResult<()> {
        let config = self.config()?.clone();
        {
            let mut state = self.inner.state.lock().unwrap();
            if matches!(*state, TrackerState::Initializing | TrackerState::Initialized) {
                return Ok(());
            }
            *state = TrackerState::Initializing;
        }

        self.inner.gtag.push(GtagCommand::Js(Utc::now()));
        let mut params = EventParams::from([
            ("ads_data_redaction".to_string(), Value::Bool(true)),
            ("send_page_view".to_string(), Value::Bool(false)),
            ("allow_google_signals".to_string(), Value::Bool(false)),
            ("url_passthrough".to_string(), Value::Bool(false)),
        ]);
        if config.debug {
            params.insert("debug_mode".to_string(), Value::Bool(true));
        }
        self.inner.gtag.push(GtagCommand::Config {
            target: config.ga4_gtag_id.clone(),
            params,
        });

        let src = format!(
            "{GTAG_SCRIPT_URL}?id={}",
            utf8_percent_encode(&config.ga4_gtag_id, URL_COMPONENT)
        );
        attach_script(
            &self.inner.document,
            &src,
            Vec::<(String, AttributeValue)>::new(),
        )?;

        let tracker = self.clone();
        let listener = on_delegated(&self.inner.document, "click", CLICK_SELECTOR, move |event| {
            let Some(element) = event.current_target().cloned() else {
                return;
            };
            let tracker = tracker.clone();
            spawn_detached(async move {
                if let Err(err) = tracker.track_click(&element, None).await {
                    log::warn!("failed to track click: {err}");
                }
            });
        })?;
        *self.inner.click_listener.lock().unwrap() = Some(listener);
        self.set_state(TrackerState::Initialized);

        // A rejected page view does not undo the bootstrap.
        if let Err(err) = self.track_page_view(None).await {
            log::warn!("failed to track initial page view: {err}");
        }
        log::debug!("analytics initialized for `{}`", config.ga4_gtag_id);
        Ok(())
    }

    /// The configured user-id hash (possibly empty).
    pub async fn user_id(&self) -> AnalyticsResult<String> {
        Ok(self.config()?.user_id_hash.clone())
    }

    /// The GA4 client id reported by the tag manager, or an empty string.
    pub async fn client_id(&self) -> AnalyticsResult<String> {
        self.tag_field("client_id").await
    }

    /// The GA4 session id reported by the tag manager, or an empty string.
    pub async fn session_id(&self) -> AnalyticsResult<String> {
        self.tag_field("session_id").await
    }

    async fn tag_field(&self, field: &str) -> AnalyticsResult<String> {
        let config = self.config()?;
        Ok(self
            .inner
            .gtag
            .get(&config.ga4_gtag_id, field)
            .await
            .unwrap_or_default())
    }

    /// Geo data for the visitor, fetched on first use and cached afterwards.
    pub async fn geo_data(&self) -> AnalyticsResult<GeoData> {
        self.inner.geo.get().ok_or_else(not_set_up)?.get().await
    }

    pub fn user_has_do_not_track_header(&self) -> bool {
        self.inner.page.do_not_track()
    }

    /// Stores the campaign touch when the URL carries `utm_source`, then emits `page_view`.
    pub async fn track_page_view(&self, props: Option<EventParams>) -> AnalyticsResult<bool> {
        self.config()?;
        persist_touch(&self.inner.page)?;
        self.track_event(PAGE_VIEW_EVENT, props).await
    }

    /// Emits `x_click` describing `element`, merged with `props`.
    pub async fn track_click(
        &self,
        element: &Element,
        props: Option<EventParams>,
    ) -> AnalyticsResult<bool> {
        self.config()?;
        let mut params = click_params(element).into_params();
        if let Some(props) = props {
            params.extend(props);
        }
        self.track_event(CLICK_EVENT, Some(params)).await
    }

    /// Assembles, validates and submits an event.
    ///
    /// Parameters are layered as ids, user block, context, campaign dimensions and finally
    /// `props`; later layers overwrite earlier keys.
    pub async fn track_event(&self, name: &str, props: Option<EventParams>) -> AnalyticsResult<bool> {
        let config = self.config()?;
        validate_event_name(name)?;

        let (user_id, client_id, session_id) =
            futures::join!(self.user_id(), self.client_id(), self.session_id());
        let (user_id, client_id, session_id) = (user_id?, client_id?, session_id?);

        let mut payload = EventPayload::new();
        payload.insert("x_client_id", client_id);
        payload.insert("x_session_id", session_id);
        if !user_id.is_empty() {
            payload.insert("user_id", user_id.clone());
            payload.insert("user_properties", json!({ "x_user_id": user_id }));
        }
        payload.insert("x_context", config.context.clone());
        payload.insert("x_sub_context", config.sub_context.clone());
        payload.insert("x_hostname", self.inner.page.hostname());
        payload.extend(utm_x_query_var_dimensions(&self.inner.page));
        if config.debug {
            payload.insert("debug_mode", true);
        }
        if let Some(props) = props {
            payload.extend(props);
        }
        payload.validate()?;

        if config.debug {
            log::info!("gtag event `{name}`: {payload:?}");
        }
        self.inner.gtag.push(GtagCommand::Event {
            name: name.to_string(),
            params: payload.into_params(),
        });
        Ok(true)
    }
}
