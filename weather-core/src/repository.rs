use async_trait::async_trait;
use std::fmt::Debug;
use tracing::debug;

use crate::{client::WeatherClient, error::WeatherError, model::WeatherSnapshot};

/// Source of weather snapshots for the query state layer.
///
/// Each call resolves to exactly one result.
#[async_trait]
pub trait WeatherRepository: Send + Sync + Debug {
    async fn city_weather(&self, city_name: &str) -> Result<WeatherSnapshot, WeatherError>;
}

/// Repository backed by [`WeatherClient`]. Fetches run on a spawned Tokio task
/// so the caller's thread is never the one driving the HTTP call.
#[derive(Debug, Clone)]
pub struct DefaultWeatherRepository {
    client: WeatherClient,
}

impl DefaultWeatherRepository {
    pub fn new(client: WeatherClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WeatherRepository for DefaultWeatherRepository {
    async fn city_weather(&self, city_name: &str) -> Result<WeatherSnapshot, WeatherError> {
        let client = self.client.clone();
        let city = city_name.to_owned();

        debug!(city = %city, "Dispatching weather fetch");
        tokio::spawn(async move { client.fetch(&city).await }).await?
    }
}
