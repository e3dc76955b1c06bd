use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Url};
use tracing::{debug, instrument, trace, warn};

use crate::{
    config::Config,
    error::{WeatherError, truncate_body},
    model::{Units, WeatherSnapshot},
};

/// HTTP client for the current-weather endpoint.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    endpoint: Url,
    api_key: String,
    units: Units,
}

impl WeatherClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        Self::with_http_client(Client::new(), base_url, api_key)
    }

    pub fn with_http_client(
        http: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            http,
            endpoint: weather_endpoint(base_url)?,
            api_key: api_key.into(),
            units: Units::default(),
        })
    }

    /// Build a client from the stored configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key()?;

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self::with_http_client(http, &config.base_url, api_key)?.with_units(config.units))
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch current weather for `city_name` using the client's default units.
    pub async fn fetch(&self, city_name: &str) -> Result<WeatherSnapshot, WeatherError> {
        self.fetch_with_units(city_name, self.units).await
    }

    /// Issues exactly one GET; no retries.
    #[instrument(skip(self, units), fields(units = %units))]
    pub async fn fetch_with_units(
        &self,
        city_name: &str,
        units: Units,
    ) -> Result<WeatherSnapshot, WeatherError> {
        debug!(url = %self.endpoint, "Requesting current weather");

        let res = self
            .http
            .get(self.endpoint.clone())
            .query(&[
                ("q", city_name),
                ("appid", self.api_key.as_str()),
                ("units", units.as_str()),
            ])
            .send()
            .await
            .map_err(WeatherError::Network)?;

        let status = res.status();

        if !status.is_success() {
            // The status decides the failure; an unreadable body is not a network error here.
            let body = res.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate_body(&body), "Weather request failed");
            return Err(WeatherError::http_status(status.as_u16(), body));
        }

        let body = res.text().await.map_err(WeatherError::Network)?;
        trace!(status = status.as_u16(), body = %truncate_body(&body), "Weather response received");

        serde_json::from_str(&body).map_err(|err| {
            warn!(error = %err, "Weather response did not decode");
            WeatherError::Decode(err)
        })
    }
}

/// Resolves `{base_url}/weather`, tolerating a base without a trailing slash.
fn weather_endpoint(base_url: &str) -> Result<Url> {
    let mut base =
        Url::parse(base_url).with_context(|| format!("Invalid weather base URL: {base_url}"))?;

    if base.cannot_be_a_base() {
        return Err(anyhow!("Weather base URL cannot hold a path: {base_url}"));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join("weather")
        .with_context(|| format!("Failed to resolve weather endpoint from {base_url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_weather_path() {
        let url = weather_endpoint("https://api.openweathermap.org/data/2.5/").unwrap();
        assert_eq!(url.as_str(), "https://api.openweathermap.org/data/2.5/weather");
    }

    #[test]
    fn endpoint_tolerates_missing_trailing_slash() {
        let url = weather_endpoint("https://api.openweathermap.org/data/2.5").unwrap();
        assert_eq!(url.as_str(), "https://api.openweathermap.org/data/2.5/weather");

        let url = weather_endpoint("http://127.0.0.1:8080").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/weather");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(weather_endpoint("not a url").is_err());
        assert!(weather_endpoint("mailto:someone@example.com").is_err());
    }

    #[test]
    fn from_config_requires_api_key() {
        let err = WeatherClient::from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn from_config_uses_configured_units() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());
        cfg.units = Units::Imperial;
        cfg.timeout_secs = Some(3);

        let client = WeatherClient::from_config(&cfg).unwrap();
        assert_eq!(client.units(), Units::Imperial);
        assert!(client.endpoint().as_str().ends_with("/data/2.5/weather"));
    }
}
