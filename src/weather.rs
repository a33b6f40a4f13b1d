//! # Weather Client
//!
//! Historical weather lookups against a Dark Sky style forecast API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::WeatherConfig;
use crate::error::{Result, SurveyError};

/// Source of weather observations for a place and time
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the raw weather body for `(latitude, longitude)` at unix time `unix`
    async fn fetch(&self, latitude: f64, longitude: f64, unix: i64) -> Result<String>;
}

/// HTTP weather client
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    exclude: String,
}

impl WeatherClient {
    /// Build a client from the `[weather]` section
    ///
    /// # Errors
    ///
    /// Returns `Http` if the underlying client cannot be constructed
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            exclude: config.exclude.clone(),
        })
    }

    /// `{base}/forecast/{key}/{lat},{lon},{unix}`
    fn url(&self, latitude: f64, longitude: f64, unix: i64) -> String {
        format!(
            "{}/forecast/{}/{},{},{}",
            self.base_url, self.api_key, latitude, longitude, unix
        )
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch(&self, latitude: f64, longitude: f64, unix: i64) -> Result<String> {
        let url = self.url(latitude, longitude, unix);
        debug!("Fetching weather for ({}, {}) at {}", latitude, longitude, unix);

        let mut request = self.client.get(&url);
        if !self.exclude.is_empty() {
            request = request.query(&[("exclude", self.exclude.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SurveyError::Fetch(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SurveyError::Fetch(format!("weather API returned {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| SurveyError::Fetch(format!("unreadable body: {}", e.without_url())))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn config(base_url: String) -> WeatherConfig {
        WeatherConfig {
            base_url,
            api_key: "KEY".to_string(),
            exclude: "minutely,hourly,daily,flags".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_url_format() {
        let client = WeatherClient::new(&config("https://api.example.com/".to_string())).unwrap();
        assert_eq!(
            client.url(37.7749, -122.4194, 1717245000),
            "https://api.example.com/forecast/KEY/37.7749,-122.4194,1717245000"
        );
    }

    #[tokio::test]
    async fn test_fetch_returns_raw_body() {
        let server = MockServer::start_async().await;
        let body = r#"{"currently":{"summary":"Clear","temperature":61.2}}"#;
        let m = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/forecast/KEY/37.7749,-122.4194,1717245000")
                    .query_param("exclude", "minutely,hourly,daily,flags");
                then.status(200).body(body);
            })
            .await;

        let client = WeatherClient::new(&config(server.base_url())).unwrap();
        let result = client.fetch(37.7749, -122.4194, 1717245000).await;

        m.assert_async().await;
        assert_eq!(result.unwrap(), body);
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_failure() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/forecast/KEY/");
                then.status(403).body("daily usage limit exceeded");
            })
            .await;

        let client = WeatherClient::new(&config(server.base_url())).unwrap();
        let result = client.fetch(1.0, 2.0, 3).await;

        m.assert_async().await;
        assert!(matches!(result, Err(SurveyError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_failure() {
        // Nothing listens on port 9 of localhost
        let client = WeatherClient::new(&config("http://127.0.0.1:9".to_string())).unwrap();
        let result = client.fetch(1.0, 2.0, 3).await;
        assert!(matches!(result, Err(SurveyError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_fetch_error_does_not_leak_api_key() {
        let mut config = config("http://127.0.0.1:9".to_string());
        config.api_key = "SECRETKEY123".to_string();
        let client = WeatherClient::new(&config).unwrap();

        let err = client.fetch(1.0, 2.0, 3).await.unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, SurveyError::Fetch(_)));
        assert!(!message.contains("SECRETKEY123"), "key leaked: {}", message);
    }
}
