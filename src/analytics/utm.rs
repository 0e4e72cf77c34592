//! Campaign attribution: the `utx_touch` snapshot cookie and `x_utm_*` dimensions.

use std::collections::BTreeMap;

use crate::analytics::constants::{MAX_PARAMETER_VALUE_LENGTH, TOUCH_COOKIE, UTM_X_QUERY_VARS};
use crate::analytics::error::{internal_error, AnalyticsResult};
use crate::analytics::page::Page;
use crate::analytics::payload::clip;

fn is_campaign_param(key: &str) -> bool {
    key.starts_with("utm_") || key.starts_with("utx_")
}

/// Persists the `utm_*`/`utx_*` query parameters as the `utx_touch` cookie when the URL
/// carries a `utm_source`. Returns whether a snapshot was written.
pub(crate) fn persist_touch(page: &Page) -> AnalyticsResult<bool> {
    if page.query_param("utm_source").is_none() {
        return Ok(false);
    }
    let snapshot: BTreeMap<String, String> = page
        .query_params()
        .into_iter()
        .filter(|(key, _)| is_campaign_param(key))
        .map(|(key, value)| (key, clip(&value, MAX_PARAMETER_VALUE_LENGTH)))
        .collect();
    let json = serde_json::to_string(&snapshot)
        .map_err(|err| internal_error(format!("failed to encode touch snapshot: {err}")))?;
    page.cookies().set(TOUCH_COOKIE, &json);
    log::debug!("stored campaign touch {json}");
    Ok(true)
}

/// The last persisted touch snapshot. Unreadable cookies are treated as absent.
pub(crate) fn stored_touch(page: &Page) -> Option<BTreeMap<String, String>> {
    let raw = page.cookies().get(TOUCH_COOKIE)?;
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            log::warn!("ignoring malformed `{TOUCH_COOKIE}` cookie: {err}");
            None
        }
    }
}

/// The fixed UTM parameters present for this page view.
///
/// Read from the URL when it carries a `utm_source`, otherwise from the stored touch so
/// later pages in the session keep the campaign that brought the visitor in.
pub(crate) fn utm_x_query_vars(page: &Page) -> Vec<(String, String)> {
    if page.query_param("utm_source").is_some() {
        UTM_X_QUERY_VARS
            .iter()
            .filter_map(|name| page.query_param(name).map(|value| (name.to_string(), value)))
            .collect()
    } else {
        let Some(touch) = stored_touch(page) else {
            return Vec::new();
        };
        UTM_X_QUERY_VARS
            .iter()
            .filter_map(|name| touch.get(*name).map(|value| (name.to_string(), value.clone())))
            .collect()
    }
}

/// [`utm_x_query_vars`] re-keyed with an `x_` prefix and clipped to the GA4 value limit.
pub(crate) fn utm_x_query_var_dimensions(page: &Page) -> Vec<(String, String)> {
    utm_x_query_vars(page)
        .into_iter()
        .map(|(name, value)| (format!("x_{name}"), clip(&value, MAX_PARAMETER_VALUE_LENGTH)))
        .collect()
}
