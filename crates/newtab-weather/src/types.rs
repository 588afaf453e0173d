use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A geocoding hit: display label plus where it is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Current conditions as reported by the forecast endpoint.
/// Every field may be absent in a partial response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentConditions {
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub condition_code: Option<i32>,
}

/// Today's range from the daily forecast
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyRange {
    pub high_today: Option<f64>,
    pub low_today: Option<f64>,
}

/// Parsed forecast response
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForecastReport {
    pub current: CurrentConditions,
    pub daily: DailyRange,
}

/// The last successfully fetched weather, kept so a unit change can
/// re-render without another request. Replaced wholesale on each fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub location_label: String,
    pub current_temp_c: Option<f64>,
    pub wind_kmh: Option<f64>,
    pub condition_code: Option<i32>,
    pub daily_high_c: Option<f64>,
    pub daily_low_c: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn from_report(location_label: impl Into<String>, report: &ForecastReport) -> Self {
        Self {
            location_label: location_label.into(),
            current_temp_c: report.current.temperature,
            wind_kmh: report.current.wind_speed,
            condition_code: report.current.condition_code,
            daily_high_c: report.daily.high_today,
            daily_low_c: report.daily.low_today,
            fetched_at: Utc::now(),
        }
    }
}

/// Last location the dashboard rendered, as persisted under
/// `lastWeatherLocation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPreference {
    pub label: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(rename = "savedAt", with = "chrono::serde::ts_milliseconds")]
    pub saved_at: DateTime<Utc>,
}

impl LocationPreference {
    pub fn new(label: impl Into<String>, coords: Coordinates) -> Self {
        Self {
            label: label.into(),
            latitude: coords.latitude,
            longitude: coords.longitude,
            saved_at: Utc::now(),
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Short description for a WMO weather code.
/// See: https://open-meteo.com/en/docs#weathervariables
pub fn condition_text(code: i32) -> Cow<'static, str> {
    let text = match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        80 => "Rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        95 => "Thunderstorm",
        other => return Cow::Owned(format!("Weather code {}", other)),
    };
    Cow::Borrowed(text)
}
