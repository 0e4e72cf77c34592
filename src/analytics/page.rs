use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::analytics::error::{invalid_argument, AnalyticsResult};

// Characters that cannot appear raw in a cookie value.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// Read/write access to the page's cookies. Values are stored percent-encoded.
pub trait CookieStore: Send + Sync {
    fn get_raw(&self, name: &str) -> Option<String>;
    fn set_raw(&self, name: &str, value: &str);

    fn get(&self, name: &str) -> Option<String> {
        let raw = self.get_raw(name)?;
        Some(percent_decode_str(&raw).decode_utf8_lossy().into_owned())
    }

    fn set(&self, name: &str, value: &str) {
        let encoded = utf8_percent_encode(value, COOKIE_VALUE).to_string();
        self.set_raw(name, &encoded);
    }
}

/// In-memory cookie jar.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<BTreeMap<String, String>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw (encoded) cookie pairs, sorted by name.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.cookies
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl CookieStore for MemoryCookieJar {
    fn get_raw(&self, name: &str) -> Option<String> {
        self.cookies.lock().unwrap().get(name).cloned()
    }

    fn set_raw(&self, name: &str, value: &str) {
        self.cookies
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }
}

/// What the tracker knows about the page it runs on.
#[derive(Clone)]
pub struct Page {
    url: Url,
    do_not_track: bool,
    cookies: Arc<dyn CookieStore>,
}

impl Page {
    pub fn new(url: Url, cookies: Arc<dyn CookieStore>) -> Self {
        Self {
            url,
            do_not_track: false,
            cookies,
        }
    }

    /// Convenience constructor backed by a fresh [`MemoryCookieJar`].
    pub fn parse(url: &str) -> AnalyticsResult<Self> {
        let url = Url::parse(url).map_err(|err| invalid_argument(format!("invalid page URL `{url}`: {err}")))?;
        Ok(Self::new(url, Arc::new(MemoryCookieJar::new())))
    }

    pub fn with_do_not_track(mut self, enabled: bool) -> Self {
        self.do_not_track = enabled;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn pathname(&self) -> &str {
        self.url.path()
    }

    pub fn do_not_track(&self) -> bool {
        self.do_not_track
    }

    pub fn cookies(&self) -> &Arc<dyn CookieStore> {
        &self.cookies
    }

    /// First value of the query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// All query parameters in URL order; repeated keys keep their first value.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::new();
        for (key, value) in self.url.query_pairs() {
            if !params.iter().any(|(existing, _)| *existing == key) {
                params.push((key.into_owned(), value.into_owned()));
            }
        }
        params
    }

    /// Whether the page is a privacy or cookie policy, where consent is always requested.
    pub fn is_policy_page(&self) -> bool {
        let path = self.pathname().to_ascii_lowercase();
        path.contains("privacy") || path.contains("cookie-policy")
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.url.as_str())
            .field("do_not_track", &self.do_not_track)
            .finish()
    }
}
