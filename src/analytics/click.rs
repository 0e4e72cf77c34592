use crate::analytics::constants::{CLICK_ID_TOKEN_PREFIX, MAX_PARAMETER_VALUE_LENGTH};
use crate::analytics::payload::{clip, EventPayload};
use crate::dom::Element;

/// Event parameters describing a clicked element.
///
/// * `x_id`: the `id` attribute, else a `click-id=<value>` token from `class`
/// * `x_sub_id`: the `href` attribute
/// * `x_value`: `title`, else the normalized inner text, else the `value` attribute
/// * `x_sub_value`: the lower-cased tag name
///
/// Missing or empty sources are left out; values are clipped to the GA4 value limit.
pub(crate) fn click_params(element: &Element) -> EventPayload {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let id = non_empty(element.id()).or_else(|| {
        element
            .class_list()
            .into_iter()
            .find_map(|token| token.strip_prefix(CLICK_ID_TOKEN_PREFIX).map(str::to_string))
            .filter(|token| !token.is_empty())
    });
    let sub_id = non_empty(element.attribute("href"));
    let value = non_empty(element.attribute("title"))
        .map(|title| title.trim().to_string())
        .or_else(|| non_empty(Some(element.inner_text())))
        .or_else(|| non_empty(element.attribute("value")));
    let sub_value = element.tag_name().to_lowercase();

    let mut payload = EventPayload::new();
    for (key, value) in [
        ("x_id", id),
        ("x_sub_id", sub_id),
        ("x_value", value),
        ("x_sub_value", Some(sub_value)),
    ] {
        if let Some(value) = value {
            payload.insert(key, clip(&value, MAX_PARAMETER_VALUE_LENGTH));
        }
    }
    payload
}
