use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::analytics::error::{internal_error, network_error, AnalyticsResult};

/// IP geolocation record returned by the geo endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoData {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub colo: Option<String>,
    #[serde(default)]
    pub continent: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub longitude: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub postal_code: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub metro_code: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl GeoData {
    /// Case-insensitive comparison against an ISO country code.
    pub fn is_in_country(&self, country: &str) -> bool {
        self.country
            .as_deref()
            .is_some_and(|code| code.eq_ignore_ascii_case(country))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

/// Fetches geo data once and serves the cached record afterwards. Concurrent first calls
/// wait on the same fetch instead of issuing their own.
pub(crate) struct GeoClient {
    endpoint: String,
    client: Client,
    cache: async_lock::Mutex<Option<GeoData>>,
}

impl GeoClient {
    pub(crate) fn new(endpoint: impl Into<String>) -> AnalyticsResult<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: build_http_client()?,
            cache: async_lock::Mutex::new(None),
        })
    }

    pub(crate) async fn get(&self) -> AnalyticsResult<GeoData> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.clone());
        }
        let fetched = fetch_geo_data(&self.client, &self.endpoint).await?;
        *cache = Some(fetched.clone());
        Ok(fetched)
    }
}

fn build_http_client() -> AnalyticsResult<Client> {
    Client::builder()
        .build()
        .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))
}

async fn fetch_geo_data(client: &Client, endpoint: &str) -> AnalyticsResult<GeoData> {
    log::debug!("fetching geo data from {endpoint}");
    let response = client
        .get(endpoint)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|err| network_error(format!("failed to fetch geo data: {err}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unavailable response body>".to_string());
        return Err(network_error(format!(
            "geo data request failed with status {status}: {body}"
        )));
    }

    response
        .json::<GeoData>()
        .await
        .map_err(|err| network_error(format!("invalid geo data response: {err}")))
}
