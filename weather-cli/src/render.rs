use std::fmt::Write;

use chrono::{DateTime, Utc};
use weather_core::{ErrorCategory, QueryStatus, Units, WeatherSnapshot};

/// Fixed user-facing message for each failure category.
pub fn error_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Redirect => "The weather service moved. Please try again later.",
        ErrorCategory::NotFound => "City not found. Check the spelling and try again.",
        ErrorCategory::ClientError => {
            "The weather service rejected the request. Check your API key and input."
        }
        ErrorCategory::ServerError => "The weather service is having trouble. Please try again later.",
        ErrorCategory::Network => "Could not reach the weather service. Check your connection.",
        ErrorCategory::Unknown => "Something went wrong. Please try again.",
    }
}

pub fn render_status(status: &QueryStatus, units: Units) -> String {
    match status {
        QueryStatus::Loading => "Loading...".to_string(),
        QueryStatus::Success(snapshot) => render_snapshot(snapshot, units),
        QueryStatus::Failure(err) => error_message(err.category).to_string(),
    }
}

pub fn render_snapshot(snapshot: &WeatherSnapshot, units: Units) -> String {
    let m = &snapshot.measurements;
    let symbol = units.temperature_symbol();

    let (category, description) = snapshot
        .primary_condition()
        .map(|c| (c.category.as_str(), c.description.as_str()))
        .unwrap_or(("", ""));

    let marker = if m.temperature >= units.warm_threshold() {
        "☀"
    } else {
        "☁"
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", location_line(snapshot));
    let _ = writeln!(out, "{category}");
    let _ = writeln!(out, "{}{symbol} {marker}", m.temperature.round() as i64);
    let _ = writeln!(out, "Feels like {}{symbol}", m.feels_like.round() as i64);
    let _ = writeln!(out, "{description}");
    let _ = writeln!(
        out,
        "Humidity {}%  Pressure {} hPa  Clouds {}%",
        m.humidity_pct, m.pressure_hpa, snapshot.clouds.coverage_pct
    );
    let _ = writeln!(
        out,
        "Wind {:.1} {} from {}°",
        snapshot.wind.speed_mps,
        units.wind_speed_unit(),
        snapshot.wind.direction_deg
    );
    if let (Some(rise), Some(set)) = (snapshot.sunrise(), snapshot.sunset()) {
        let _ = writeln!(out, "Sunrise {}  Sunset {}", clock(rise), clock(set));
    }

    out.trim_end().to_string()
}

fn location_line(snapshot: &WeatherSnapshot) -> String {
    if snapshot.system.country_code.is_empty() {
        snapshot.city_name.clone()
    } else {
        format!("{}, {}", snapshot.city_name, snapshot.system.country_code)
    }
}

fn clock(ts: DateTime<Utc>) -> String {
    ts.format("%H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weather_core::{ClassifiedError, WeatherCondition};

    fn bangkok() -> WeatherSnapshot {
        let mut s = WeatherSnapshot {
            city_name: "Bangkok".into(),
            conditions: vec![WeatherCondition {
                id: 800,
                category: "Clear".into(),
                description: "clear sky".into(),
                icon_key: "01d".into(),
            }],
            ..Default::default()
        };
        s.system.country_code = "TH".into();
        s.measurements.temperature = 30.2;
        s.measurements.feels_like = 33.0;
        s
    }

    #[test]
    fn renders_rounded_temperatures_and_first_condition() {
        let text = render_snapshot(&bangkok(), Units::Metric);

        assert!(text.starts_with("Bangkok, TH"));
        assert!(text.contains("Clear"));
        assert!(text.contains("30°C ☀"));
        assert!(text.contains("Feels like 33°C"));
        assert!(text.contains("clear sky"));
        assert!(!text.contains("Sunrise"));
    }

    #[test]
    fn cool_reading_gets_cloud_marker() {
        let mut s = bangkok();
        s.measurements.temperature = 12.4;
        assert!(render_snapshot(&s, Units::Metric).contains("12°C ☁"));
    }

    #[test]
    fn missing_condition_renders_blank() {
        let mut s = bangkok();
        s.conditions.clear();
        let text = render_snapshot(&s, Units::Metric);
        assert!(!text.contains("Clear"));
        assert!(text.contains("Feels like"));
    }

    #[test]
    fn not_found_and_client_error_have_distinct_messages() {
        assert_ne!(
            error_message(ErrorCategory::NotFound),
            error_message(ErrorCategory::ClientError)
        );

        let status = QueryStatus::Failure(ClassifiedError {
            category: ErrorCategory::NotFound,
            raw_status_code: Some(404),
            message: String::new(),
        });
        assert_eq!(
            render_status(&status, Units::Metric),
            error_message(ErrorCategory::NotFound)
        );
    }
}
