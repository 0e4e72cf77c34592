use std::time::Duration;

use crate::analytics::constants::{
    CONSENT_WAIT_FOR_UPDATE, DEFAULT_CONTEXT, DEFAULT_GEO_ENDPOINT, DEFAULT_SUB_CONTEXT,
    DEFAULT_TRACKED_COUNTRY, MAX_LOCAL_USER_ID_LENGTH,
};
use crate::analytics::error::{invalid_argument, missing_measurement_id, AnalyticsResult};
use crate::platform::environment::{config_value, parse_flag};

/// Tracker configuration. Handed to [`Tracker::setup`](crate::analytics::Tracker::setup) once
/// and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    pub debug: bool,
    pub ga4_gtag_id: String,
    pub gdpr_consent_script_id: Option<String>,
    pub context: String,
    pub sub_context: String,
    pub user_id_hash: String,
    pub geo_endpoint: String,
    pub tracked_country: String,
    pub consent_wait_for_update: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            ga4_gtag_id: String::new(),
            gdpr_consent_script_id: None,
            context: DEFAULT_CONTEXT.to_string(),
            sub_context: DEFAULT_SUB_CONTEXT.to_string(),
            user_id_hash: String::new(),
            geo_endpoint: DEFAULT_GEO_ENDPOINT.to_string(),
            tracked_country: DEFAULT_TRACKED_COUNTRY.to_string(),
            consent_wait_for_update: CONSENT_WAIT_FOR_UPDATE,
        }
    }
}

impl TrackerConfig {
    pub fn new(ga4_gtag_id: impl Into<String>) -> Self {
        Self {
            ga4_gtag_id: ga4_gtag_id.into(),
            ..Default::default()
        }
    }

    /// Builds a configuration from `UTX_*` environment variables and the `UTX_CONFIG` blob
    /// (see [`crate::platform::environment`]). Missing values keep their defaults; the GA4 id
    /// is only checked at setup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(debug) = config_value("debug", "UTX_DEBUG") {
            config.debug = parse_flag(&debug);
        }
        if let Some(id) = config_value("ga4GtagId", "UTX_GA4_GTAG_ID") {
            config.ga4_gtag_id = id;
        }
        config.gdpr_consent_script_id =
            config_value("gdprConsentScriptId", "UTX_GDPR_CONSENT_SCRIPT_ID");
        if let Some(context) = config_value("context", "UTX_CONTEXT") {
            config.context = context;
        }
        if let Some(sub_context) = config_value("subContext", "UTX_SUB_CONTEXT") {
            config.sub_context = sub_context;
        }
        if let Some(user_id) = config_value("userId", "UTX_USER_ID") {
            config.user_id_hash = user_id;
        }
        if let Some(endpoint) = config_value("geoEndpoint", "UTX_GEO_ENDPOINT") {
            config.geo_endpoint = endpoint;
        }
        if let Some(country) = config_value("trackedCountry", "UTX_TRACKED_COUNTRY") {
            config.tracked_country = country;
        }
        config
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_gdpr_consent_script_id(mut self, id: impl Into<String>) -> Self {
        self.gdpr_consent_script_id = Some(id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_sub_context(mut self, sub_context: impl Into<String>) -> Self {
        self.sub_context = sub_context.into();
        self
    }

    pub fn with_user_id_hash(mut self, user_id_hash: impl Into<String>) -> Self {
        self.user_id_hash = user_id_hash.into();
        self
    }

    pub fn with_geo_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.geo_endpoint = endpoint.into();
        self
    }

    pub fn with_tracked_country(mut self, country: impl Into<String>) -> Self {
        self.tracked_country = country.into();
        self
    }

    pub fn with_consent_wait_for_update(mut self, wait: Duration) -> Self {
        self.consent_wait_for_update = wait;
        self
    }

    pub(crate) fn validate(&self) -> AnalyticsResult<()> {
        if self.ga4_gtag_id.trim().is_empty() {
            return Err(missing_measurement_id(
                "a GA4 measurement id (`ga4_gtag_id`) is required",
            ));
        }
        if self.user_id_hash.chars().count() > MAX_LOCAL_USER_ID_LENGTH {
            return Err(invalid_argument(format!(
                "user id must be at most {MAX_LOCAL_USER_ID_LENGTH} characters"
            )));
        }
        if self
            .gdpr_consent_script_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(invalid_argument("GDPR consent script id must not be blank"));
        }
        Ok(())
    }
}
