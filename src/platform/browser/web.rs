use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{select, Either};
use js_sys::{Array, Function, Reflect};
use url::Url;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlDocument;

use crate::analytics::error::{internal_error, invalid_argument, AnalyticsResult};
use crate::analytics::{CookieStore, GtagCommand, Page, TagManager};
use crate::platform::runtime::sleep;

const GET_TIMEOUT: Duration = Duration::from_secs(2);

/// [`TagManager`] backed by `window.gtag` and the `dataLayer` queue.
#[derive(Clone, Debug)]
pub struct WindowGtag {
    data_layer: String,
}

impl Default for WindowGtag {
    fn default() -> Self {
        Self::new("dataLayer")
    }
}

impl WindowGtag {
    pub fn new(data_layer: impl Into<String>) -> Self {
        Self {
            data_layer: data_layer.into(),
        }
    }

    fn gtag_function(&self) -> Option<Function> {
        let window = web_sys::window()?;
        Reflect::get(&window, &JsValue::from_str("gtag"))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }

    fn call(&self, args: Array) {
        let Some(gtag) = self.gtag_function() else {
            log::warn!("`window.gtag` is missing; dropping command");
            return;
        };
        if let Err(err) = gtag.apply(&JsValue::NULL, &args) {
            log::warn!("gtag call failed: {err:?}");
        }
    }
}

fn json_to_js(value: &serde_json::Value) -> JsValue {
    match value {
        serde_json::Value::String(text) => JsValue::from_str(text),
        other => js_sys::JSON::parse(&other.to_string()).unwrap_or(JsValue::UNDEFINED),
    }
}

#[async_trait(?Send)]
impl TagManager for WindowGtag {
    fn install(&self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let layer_key = JsValue::from_str(&self.data_layer);
        let existing = Reflect::get(&window, &layer_key).unwrap_or(JsValue::UNDEFINED);
        if existing.is_undefined() || existing.is_null() {
            let _ = Reflect::set(&window, &layer_key, &Array::new());
        }
        if self.gtag_function().is_none() {
            let body = format!("window[{:?}].push(arguments);", self.data_layer);
            let gtag = Function::new_no_args(&body);
            let _ = Reflect::set(&window, &JsValue::from_str("gtag"), &gtag);
        }
    }

    fn is_installed(&self) -> bool {
        self.gtag_function().is_some()
    }

    fn push(&self, command: GtagCommand) {
        let args = Array::new();
        match &command {
            // gtag expects a Date object here, not an ISO string.
            GtagCommand::Js(at) => {
                args.push(&JsValue::from_str("js"));
                let millis = JsValue::from_f64(at.timestamp_millis() as f64);
                args.push(&js_sys::Date::new(&millis));
            }
            other => {
                for argument in other.to_arguments() {
                    args.push(&json_to_js(&argument));
                }
            }
        }
        self.call(args);
    }

    async fn get(&self, target: &str, field: &str) -> Option<String> {
        let (sender, receiver) = async_channel::bounded::<Option<String>>(1);
        let callback = Closure::once_into_js(move |value: JsValue| {
            let value = value
                .as_string()
                .or_else(|| value.as_f64().map(|number| number.to_string()));
            let _ = sender.try_send(value);
        });

        let args = Array::new();
        args.push(&JsValue::from_str("get"));
        args.push(&JsValue::from_str(target));
        args.push(&JsValue::from_str(field));
        args.push(&callback);
        self.call(args);

        // The callback only fires once gtag.js has loaded.
        let received = Box::pin(receiver.recv());
        let timeout = Box::pin(sleep(GET_TIMEOUT));
        match select(received, timeout).await {
            Either::Left((Ok(value), _)) => value,
            Either::Left((Err(_), _)) => None,
            Either::Right(_) => {
                log::debug!("gtag('get', {target}, {field}) timed out");
                None
            }
        }
    }
}

/// [`CookieStore`] over `document.cookie`. Cookies are written for `/` with `SameSite=Lax`
/// and live for the browser session.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentCookieStore;

impl DocumentCookieStore {
    fn document() -> Option<HtmlDocument> {
        web_sys::window()?.document()?.dyn_into::<HtmlDocument>().ok()
    }
}

impl CookieStore for DocumentCookieStore {
    fn get_raw(&self, name: &str) -> Option<String> {
        let cookies = Self::document()?.cookie().ok()?;
        cookies.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }

    fn set_raw(&self, name: &str, value: &str) {
        let Some(document) = Self::document() else {
            return;
        };
        let cookie = format!("{name}={value}; path=/; SameSite=Lax");
        if let Err(err) = document.set_cookie(&cookie) {
            log::warn!("failed to set cookie `{name}`: {err:?}");
        }
    }
}

/// Builds a [`Page`] from `window.location`, `navigator.doNotTrack` and `document.cookie`.
pub fn page_from_window() -> AnalyticsResult<Page> {
    let window = web_sys::window().ok_or_else(|| internal_error("no global `window`"))?;
    let href = window
        .location()
        .href()
        .map_err(|err| internal_error(format!("failed to read `location.href`: {err:?}")))?;
    let url = Url::parse(&href)
        .map_err(|err| invalid_argument(format!("invalid page URL `{href}`: {err}")))?;
    let do_not_track = window.navigator().do_not_track() == "1";
    Ok(Page::new(url, Arc::new(DocumentCookieStore)).with_do_not_track(do_not_track))
}
