use std::time::Duration;

pub const DEFAULT_CONTEXT: &str = "web";
pub const DEFAULT_SUB_CONTEXT: &str = "site";
pub const DEFAULT_TRACKED_COUNTRY: &str = "US";
pub const DEFAULT_GEO_ENDPOINT: &str = "https://wobots.com/api/ip-geo/v1";
pub const CONSENT_WAIT_FOR_UPDATE: Duration = Duration::from_millis(500);

pub const GTAG_SCRIPT_URL: &str = "https://www.googletagmanager.com/gtag/js";
pub const CONSENT_SCRIPT_URL: &str = "https://cdn.cookie-script.com/s";

pub const TOUCH_COOKIE: &str = "utx_touch";
pub const USER_ID_COOKIE: &str = "utx_user_id";

pub const PAGE_VIEW_EVENT: &str = "page_view";
pub const CLICK_EVENT: &str = "x_click";

pub const CLICK_SELECTOR: &str = "a, button, input[type=button], input[type=submit]";
pub const CLICK_ID_TOKEN_PREFIX: &str = "click-id=";

/// Query parameters re-emitted as `x_`-prefixed dimensions.
pub const UTM_X_QUERY_VARS: [&str; 6] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
];

/// Consent categories denied by default when consent is required.
pub const CONSENT_CATEGORIES: [&str; 7] = [
    "ad_storage",
    "ad_user_data",
    "ad_personalization",
    "analytics_storage",
    "functionality_storage",
    "personalization_storage",
    "security_storage",
];

// GA4 collection limits.
pub const MAX_EVENT_NAME_LENGTH: usize = 40;
pub const MAX_EVENT_PARAMETERS: usize = 25;
pub const MAX_PARAMETER_KEY_LENGTH: usize = 40;
pub const MAX_PARAMETER_VALUE_LENGTH: usize = 100;
pub const MAX_LOCAL_USER_ID_LENGTH: usize = 36;
pub const MAX_USER_ID_LENGTH: usize = 256;
