use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Measurement system requested from the weather service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial, Units::Standard]
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    pub fn wind_speed_unit(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }

    /// Temperature at or above which a reading is shown as warm (25 °C).
    pub fn warm_threshold(&self) -> f64 {
        match self {
            Units::Metric => 25.0,
            Units::Imperial => 77.0,
            Units::Standard => 298.15,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial, standard."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(rename = "lon", default, deserialize_with = "null_as_default")]
    pub longitude: f64,
    #[serde(rename = "lat", default, deserialize_with = "null_as_default")]
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeatherCondition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    /// Short group name, e.g. "Clear" or "Rain".
    #[serde(rename = "main", default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "icon", default, deserialize_with = "null_as_default")]
    pub icon_key: String,
}

/// Temperatures are expressed in whatever [`Units`] the request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurements {
    #[serde(rename = "temp")]
    pub temperature: f64,
    pub feels_like: f64,
    #[serde(rename = "pressure", default, deserialize_with = "null_as_default")]
    pub pressure_hpa: i64,
    #[serde(rename = "humidity", default, deserialize_with = "null_as_default")]
    pub humidity_pct: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temp_min: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temp_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Wind {
    #[serde(rename = "speed", default, deserialize_with = "null_as_default")]
    pub speed_mps: f64,
    #[serde(rename = "deg", default, deserialize_with = "null_as_default")]
    pub direction_deg: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CloudCover {
    #[serde(rename = "all", default, deserialize_with = "null_as_default")]
    pub coverage_pct: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(rename = "country", default, deserialize_with = "null_as_default")]
    pub country_code: String,
    #[serde(rename = "sunrise", default, deserialize_with = "null_as_default")]
    pub sunrise_epoch_sec: i64,
    #[serde(rename = "sunset", default, deserialize_with = "null_as_default")]
    pub sunset_epoch_sec: i64,
}

/// One decoded current-weather observation for a city.
///
/// Only `main.temp`, `main.feels_like` and `name` are required on the wire;
/// everything else falls back to an explicit default so a decoded snapshot
/// never carries holes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    #[serde(rename = "coord", default, deserialize_with = "null_as_default")]
    pub coordinates: Coordinates,
    #[serde(rename = "weather", default, deserialize_with = "null_as_default")]
    pub conditions: Vec<WeatherCondition>,
    /// Data source label reported by the service, e.g. "stations".
    #[serde(default, deserialize_with = "null_as_default")]
    pub base: String,
    #[serde(rename = "main")]
    pub measurements: Measurements,
    #[serde(rename = "visibility", default, deserialize_with = "null_as_default")]
    pub visibility_m: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub wind: Wind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clouds: CloudCover,
    #[serde(rename = "dt", default, deserialize_with = "null_as_default")]
    pub observed_at_epoch_sec: i64,
    #[serde(rename = "sys", default, deserialize_with = "null_as_default")]
    pub system: SystemInfo,
    #[serde(rename = "id", default, deserialize_with = "null_as_default")]
    pub city_id: i64,
    #[serde(rename = "name")]
    pub city_name: String,
    #[serde(rename = "cod", default, deserialize_with = "null_as_default")]
    pub response_status_code: i64,
}

impl WeatherSnapshot {
    /// The condition shown to users. Additional entries are ignored.
    pub fn primary_condition(&self) -> Option<&WeatherCondition> {
        self.conditions.first()
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.observed_at_epoch_sec)
    }

    pub fn sunrise(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.system.sunrise_epoch_sec)
    }

    pub fn sunset(&self) -> Option<DateTime<Utc>> {
        unix_to_utc(self.system.sunset_epoch_sec)
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    if ts == 0 {
        return None;
    }
    DateTime::from_timestamp(ts, 0)
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
