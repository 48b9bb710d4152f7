use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::NetworkConfig;
use crate::export::ExportKind;
use crate::models::{
    AirQualityReading, AirQualityStats, AirQualityTrend, Envelope, ErrorBody, Location, OneOrMany,
    Page, StatsPeriod, WeatherReading, WeatherStats, WeatherTrend,
};

fn historical_path(kind: ExportKind) -> &'static str {
    match kind {
        ExportKind::Weather => "/weather/historical",
        ExportKind::AirQuality => "/air-quality/historical",
    }
}

/// A single failed fetch. Display renders the human-readable message only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Timeout or transport failure; no response was received.
    #[error("{message}")]
    Network { message: String },

    /// The service answered with a non-success status.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// A success status whose body did not have the expected shape.
    #[error("{message}")]
    Decode { message: String },
}

impl FetchError {
    pub fn message(&self) -> &str {
        match self {
            FetchError::Network { message }
            | FetchError::Remote { message, .. }
            | FetchError::Decode { message } => message,
        }
    }
}

/// Filters for the paginated historical endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub location_id: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            location_id: None,
            start: None,
            end: None,
            page: 1,
            per_page: 20,
        }
    }
}

/// Query string under construction. Absent filters are never sent, so "no
/// filter" stays distinct from an empty filter value.
#[derive(Debug, Default)]
struct Query(Vec<(&'static str, String)>);

impl Query {
    fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.0.push((key, value.to_string()));
        self
    }

    fn optional(self, key: &'static str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    fn location(self, location_id: Option<&str>) -> Self {
        self.optional("location_id", location_id)
    }

    fn history(self, q: &HistoryQuery) -> Self {
        self.param("page", q.page)
            .param("per_page", q.per_page)
            .location(q.location_id.as_deref())
            .optional("start", q.start.map(|d| d.format("%Y-%m-%d")))
            .optional("end", q.end.map(|d| d.format("%Y-%m-%d")))
    }
}

/// Message for a non-success response: the body's `message` if present,
/// otherwise a generic status line.
pub fn remote_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with status code {status}"))
}

/// Client for the weather and air-quality REST API.
///
/// Every call resolves with data or fails with exactly one [`FetchError`].
/// There are no retries; polling callers re-invoke on their own schedule.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a new API client for the service at `origin`.
    ///
    /// `/api` is appended unless the origin already ends with it.
    pub fn new(origin: &str, network_config: &NetworkConfig) -> Result<Self> {
        let origin = origin.trim_end_matches('/');
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            anyhow::bail!("API URL must start with http:// or https://, got: {origin}");
        }
        let base_url = if origin.ends_with("/api") {
            origin.to_string()
        } else {
            format!("{origin}/api")
        };

        let request_timeout = Duration::from_secs(network_config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, err: &reqwest::Error) -> FetchError {
        let message = if err.is_timeout() {
            format!(
                "timeout of {}ms exceeded",
                self.request_timeout.as_millis()
            )
        } else {
            format!("Network error: {err}")
        };
        FetchError::Network { message }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query,
    ) -> std::result::Result<Envelope<T>, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .query(&query.0)
            .send()
            .await
            .map_err(|e| {
                let err = self.transport_error(&e);
                tracing::warn!("GET {} failed: {}", path, err);
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = remote_message(status.as_u16(), &body);
            tracing::warn!("GET {} returned {}: {}", path, status, message);
            return Err(FetchError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&e))?;
        let envelope = serde_json::from_slice::<Envelope<T>>(&bytes).map_err(|e| {
            tracing::warn!("GET {} returned an unexpected body: {}", path, e);
            FetchError::Decode {
                message: format!("Invalid response from {path}: {e}"),
            }
        })?;

        tracing::debug!(
            "GET {} ok in {}ms",
            path,
            started.elapsed().as_millis()
        );
        Ok(envelope)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query,
    ) -> std::result::Result<Vec<T>, FetchError> {
        let envelope = self.get::<Option<OneOrMany<T>>>(path, query).await?;
        Ok(envelope.data.map(OneOrMany::into_vec).unwrap_or_default())
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query,
    ) -> std::result::Result<Page<T>, FetchError> {
        let envelope = self.get::<Option<Vec<T>>>(path, query).await?;
        Ok(Page {
            data: envelope.data.unwrap_or_default(),
            pagination: envelope.pagination,
        })
    }

    pub async fn locations(&self) -> std::result::Result<Vec<Location>, FetchError> {
        self.get_list("/locations", Query::default()).await
    }

    /// Latest reading for one location, or for every location when `None`.
    pub async fn current_weather(
        &self,
        location_id: Option<&str>,
    ) -> std::result::Result<Vec<WeatherReading>, FetchError> {
        self.get_list("/weather/current", Query::default().location(location_id))
            .await
    }

    pub async fn weather_historical(
        &self,
        query: &HistoryQuery,
    ) -> std::result::Result<Page<WeatherReading>, FetchError> {
        self.get_page(
            historical_path(ExportKind::Weather),
            Query::default().history(query),
        )
        .await
    }

    /// Historical rows exactly as the service sent them.
    ///
    /// Exports write these so timestamps keep their offset and integers stay
    /// integers.
    pub async fn historical_raw(
        &self,
        kind: ExportKind,
        query: &HistoryQuery,
    ) -> std::result::Result<Page<Value>, FetchError> {
        self.get_page(historical_path(kind), Query::default().history(query))
            .await
    }

    pub async fn weather_stats(
        &self,
        location_id: Option<&str>,
        period: StatsPeriod,
    ) -> std::result::Result<Vec<WeatherStats>, FetchError> {
        let query = Query::default()
            .param("period", period)
            .location(location_id);
        self.get_list("/weather/stats", query).await
    }

    pub async fn weather_trends(
        &self,
        location_id: Option<&str>,
        days: u32,
    ) -> std::result::Result<Vec<WeatherTrend>, FetchError> {
        let query = Query::default().param("days", days).location(location_id);
        self.get_list("/weather/trends", query).await
    }

    pub async fn current_air_quality(
        &self,
        location_id: Option<&str>,
    ) -> std::result::Result<Vec<AirQualityReading>, FetchError> {
        self.get_list("/air-quality/current", Query::default().location(location_id))
            .await
    }

    pub async fn air_quality_historical(
        &self,
        query: &HistoryQuery,
    ) -> std::result::Result<Page<AirQualityReading>, FetchError> {
        self.get_page(
            historical_path(ExportKind::AirQuality),
            Query::default().history(query),
        )
        .await
    }

    pub async fn air_quality_stats(
        &self,
        location_id: Option<&str>,
        period: StatsPeriod,
    ) -> std::result::Result<Vec<AirQualityStats>, FetchError> {
        let query = Query::default()
            .param("period", period)
            .location(location_id);
        self.get_list("/air-quality/stats", query).await
    }

    pub async fn air_quality_trends(
        &self,
        location_id: Option<&str>,
        days: u32,
    ) -> std::result::Result<Vec<AirQualityTrend>, FetchError> {
        let query = Query::default().param("days", days).location(location_id);
        self.get_list("/air-quality/trends", query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Error Message Tests ====================

    #[test]
    fn test_remote_message_from_body() {
        let body = r#"{"status": "error", "message": "No data for location 'X'", "data": null}"#;
        assert_eq!(remote_message(404, body), "No data for location 'X'");
    }

    #[test]
    fn test_remote_message_falls_back_to_status() {
        assert_eq!(remote_message(500, ""), "Request failed with status code 500");
        assert_eq!(
            remote_message(502, "<html>bad gateway</html>"),
            "Request failed with status code 502"
        );
        assert_eq!(
            remote_message(500, r#"{"message": ""}"#),
            "Request failed with status code 500"
        );
    }

    #[test]
    fn test_fetch_error_display_is_message() {
        let err = FetchError::Remote {
            status: 429,
            message: "Rate limit exceeded".into(),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded");
        assert_eq!(err.message(), "Rate limit exceeded");
    }

    // ==================== Query Construction Tests ====================

    #[test]
    fn test_query_omits_absent_params() {
        let q = Query::default().location(None).param("days", 7);
        assert_eq!(q.0, vec![("days", "7".to_string())]);
    }

    #[test]
    fn test_query_keeps_empty_string_filter() {
        let q = Query::default().location(Some(""));
        assert_eq!(q.0, vec![("location_id", String::new())]);
    }

    #[test]
    fn test_history_query_params() {
        let hq = HistoryQuery {
            location_id: Some("LOC001".into()),
            start: NaiveDate::from_ymd_opt(2025, 1, 1),
            end: None,
            page: 3,
            per_page: 50,
        };
        let q = Query::default().history(&hq);
        assert_eq!(
            q.0,
            vec![
                ("page", "3".to_string()),
                ("per_page", "50".to_string()),
                ("location_id", "LOC001".to_string()),
                ("start", "2025-01-01".to_string()),
            ]
        );
    }

    // ==================== Client Construction Tests ====================

    #[test]
    fn test_base_url_gets_api_prefix() {
        let client = ApiClient::new("http://localhost:5000/", &NetworkConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");

        let client = ApiClient::new("http://localhost:5000/api", &NetworkConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        assert!(ApiClient::new("localhost:5000", &NetworkConfig::default()).is_err());
    }
}
