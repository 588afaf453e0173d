//! Dashboard controller.
//!
//! Owns the fetch state machine (`Idle -> Loading -> Rendered | Error`), the
//! collapsed flag, the current unit and the last snapshot. Network,
//! geolocation, persistence and rendering are injected so the whole flow
//! runs without a terminal, a network or a disk.
//!
//! Each fetch-initiating action takes a sequence token. Results are applied
//! only while their token is still the latest one issued, so a slow
//! response can never overwrite a newer one.

use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;

use crate::location::{locate_with_timeout, Geolocator};
use crate::prefs::PreferenceStore;
use crate::provider::WeatherApi;
use crate::types::{condition_text, Coordinates, LocationPreference, WeatherSnapshot};
use crate::units::{format_temperature, TemperatureUnit};

pub const MY_LOCATION_LABEL: &str = "My Location";
pub const DEFAULT_AREA_LABEL: &str = "Your area";

pub const STATUS_LOADING: &str = "Loading weather...";
pub const STATUS_LOAD_FAILED: &str = "Could not load weather. Try again.";
pub const STATUS_LOCATING: &str = "Requesting location...";
pub const STATUS_EMPTY_SEARCH: &str = "Type a city name first.";
pub const STATUS_SEARCHING: &str = "Searching...";
pub const STATUS_NOT_FOUND: &str = "City not found. Try a different name.";
pub const STATUS_SEARCH_FAILED: &str = "City search failed. Try again.";

/// Where the dashboard is in its fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Rendered,
    Error,
}

/// Display-ready weather fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedWeather {
    pub location: String,
    pub temperature: String,
    pub wind: String,
    pub condition: String,
    pub high_low: String,
    pub updated: String,
}

impl RenderedWeather {
    pub fn from_snapshot(snapshot: &WeatherSnapshot, unit: TemperatureUnit) -> Self {
        let location = if snapshot.location_label.is_empty() {
            DEFAULT_AREA_LABEL.to_string()
        } else {
            snapshot.location_label.clone()
        };

        let wind = match snapshot.wind_kmh {
            Some(kmh) => format!("{} km/h", kmh),
            None => "- km/h".to_string(),
        };

        let condition = snapshot
            .condition_code
            .map(|code| condition_text(code).into_owned())
            .unwrap_or_else(|| "-".to_string());

        Self {
            location,
            temperature: format_temperature(snapshot.current_temp_c, unit),
            wind,
            condition,
            high_low: format!(
                "{}, {}",
                format_temperature(snapshot.daily_high_c, unit),
                format_temperature(snapshot.daily_low_c, unit)
            ),
            updated: snapshot
                .fetched_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
        }
    }
}

/// The UI surface the controller drives.
pub trait DashboardView: Send + Sync {
    /// Replace the status line. An empty message clears it.
    fn set_status(&self, message: &str);

    /// Fill and reveal the results grid.
    fn show_weather(&self, weather: &RenderedWeather);

    fn hide_weather(&self);

    /// Mark `unit` as the active unit button.
    fn set_active_unit(&self, unit: TemperatureUnit);

    /// Collapse or expand the panel body. The header stays visible.
    fn set_collapsed(&self, collapsed: bool);
}

#[derive(Debug, Default)]
struct DashboardState {
    fetch: FetchState,
    unit: TemperatureUnit,
    collapsed: bool,
    snapshot: Option<WeatherSnapshot>,
    latest_request: u64,
}

pub struct Dashboard<A, G, V> {
    api: A,
    geolocator: G,
    view: V,
    prefs: PreferenceStore,
    geolocation_timeout: Duration,
    state: Mutex<DashboardState>,
}

impl<A, G, V> Dashboard<A, G, V>
where
    A: WeatherApi,
    G: Geolocator,
    V: DashboardView,
{
    pub fn new(
        api: A,
        geolocator: G,
        view: V,
        prefs: PreferenceStore,
        geolocation_timeout: Duration,
    ) -> Self {
        Self {
            api,
            geolocator,
            view,
            prefs,
            geolocation_timeout,
            state: Mutex::new(DashboardState::default()),
        }
    }

    pub fn fetch_state(&self) -> FetchState {
        self.state.lock().fetch
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.state.lock().unit
    }

    pub fn is_collapsed(&self) -> bool {
        self.state.lock().collapsed
    }

    pub fn snapshot(&self) -> Option<WeatherSnapshot> {
        self.state.lock().snapshot.clone()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.prefs
    }

    /// Apply the previous session's unit and collapsed state, then reload
    /// weather for the last location if there is one.
    pub async fn restore(&self) {
        let saved = self.prefs.load().await;

        {
            let mut state = self.state.lock();
            state.unit = saved.unit;
            state.collapsed = saved.collapsed;
        }
        self.view.set_active_unit(saved.unit);
        self.view.set_collapsed(saved.collapsed);

        match saved.location {
            Some(location) => {
                tracing::info!("Restoring weather for {}", location.label);
                let token = self.begin_request();
                self.load_weather(token, &location.label, location.coordinates())
                    .await;
            }
            None => {
                self.view.hide_weather();
            }
        }
    }

    /// Weather for the current position. Never retries on denial.
    pub async fn use_my_location(&self) {
        let token = self.begin_request();
        self.view.set_status(STATUS_LOCATING);

        let position = locate_with_timeout(&self.geolocator, self.geolocation_timeout).await;
        if !self.is_current(token) {
            tracing::debug!("Dropping location result for superseded request {}", token);
            return;
        }

        match position {
            Ok(coords) => self.load_weather(token, MY_LOCATION_LABEL, coords).await,
            Err(e) => {
                tracing::warn!("Geolocation unavailable: {}", e);
                self.state.lock().fetch = FetchState::Error;
                self.view.set_status(e.user_message());
            }
        }
    }

    /// Geocode `input` and load weather for the first match.
    pub async fn search_city(&self, input: &str) {
        let name = input.trim();
        if name.is_empty() {
            self.view.set_status(STATUS_EMPTY_SEARCH);
            return;
        }

        let token = self.begin_request();
        self.state.lock().fetch = FetchState::Loading;
        self.view.hide_weather();
        self.view.set_status(STATUS_SEARCHING);

        let result = self.api.geocode(name).await;
        if !self.is_current(token) {
            tracing::debug!("Dropping geocode result for superseded request {}", token);
            return;
        }

        match result {
            Ok(Some(place)) => {
                self.load_weather(token, &place.label, place.coordinates())
                    .await
            }
            Ok(None) => {
                self.state.lock().fetch = FetchState::Idle;
                self.view.set_status(STATUS_NOT_FOUND);
            }
            Err(e) => {
                tracing::error!("City search for '{}' failed: {}", name, e);
                self.state.lock().fetch = FetchState::Error;
                self.view.set_status(STATUS_SEARCH_FAILED);
            }
        }
    }

    /// Switch units. Re-renders the cached snapshot, if any, and never
    /// refetches.
    pub fn set_unit(&self, unit: TemperatureUnit) {
        let rerender = {
            let mut state = self.state.lock();
            state.unit = unit;
            let weather = state
                .snapshot
                .as_ref()
                .map(|snapshot| RenderedWeather::from_snapshot(snapshot, unit));
            if weather.is_some() {
                state.fetch = FetchState::Rendered;
            }
            weather
        };

        self.view.set_active_unit(unit);
        if let Some(weather) = rerender {
            self.view.set_status("");
            self.view.show_weather(&weather);
        }
        self.prefs.save_unit(unit);
    }

    /// Flip the collapsed flag and return the new value.
    pub fn toggle_collapsed(&self) -> bool {
        let collapsed = {
            let mut state = self.state.lock();
            state.collapsed = !state.collapsed;
            state.collapsed
        };

        self.view.set_collapsed(collapsed);
        self.prefs.save_collapsed(collapsed);
        collapsed
    }

    async fn load_weather(&self, token: u64, label: &str, coords: Coordinates) {
        self.state.lock().fetch = FetchState::Loading;
        self.view.hide_weather();
        self.view.set_status(STATUS_LOADING);

        let result = self.api.forecast(coords).await;

        let rendered = {
            let mut state = self.state.lock();
            if state.latest_request != token {
                None
            } else {
                match result {
                    Ok(report) => {
                        let snapshot = WeatherSnapshot::from_report(label, &report);
                        let weather = RenderedWeather::from_snapshot(&snapshot, state.unit);
                        state.snapshot = Some(snapshot);
                        state.fetch = FetchState::Rendered;
                        Some(Ok(weather))
                    }
                    Err(e) => {
                        state.fetch = FetchState::Error;
                        Some(Err(e))
                    }
                }
            }
        };

        match rendered {
            None => {
                tracing::debug!("Dropping forecast for superseded request {}", token);
            }
            Some(Ok(weather)) => {
                tracing::info!("Rendered weather for {}", label);
                self.view.set_status("");
                self.view.show_weather(&weather);
                self.prefs
                    .save_location(&LocationPreference::new(label, coords));
            }
            Some(Err(e)) => {
                tracing::error!("Weather fetch for {} failed: {}", label, e);
                self.view.hide_weather();
                self.view.set_status(STATUS_LOAD_FAILED);
            }
        }
    }

    fn begin_request(&self) -> u64 {
        let mut state = self.state.lock();
        state.latest_request += 1;
        state.latest_request
    }

    fn is_current(&self, token: u64) -> bool {
        self.state.lock().latest_request == token
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::Utc;

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            location_label: "Reykjavik, Capital Region, Iceland".to_string(),
            current_temp_c: Some(-3.6),
            wind_kmh: Some(22.3),
            condition_code: Some(71),
            daily_high_c: Some(-1.2),
            daily_low_c: Some(-6.5),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_celsius() {
        let weather = RenderedWeather::from_snapshot(&snapshot(), TemperatureUnit::Celsius);
        assert_eq!(weather.location, "Reykjavik, Capital Region, Iceland");
        assert_eq!(weather.temperature, "-4°C");
        assert_eq!(weather.wind, "22.3 km/h");
        assert_eq!(weather.condition, "Slight snow");
        assert_eq!(weather.high_low, "-1°C, -7°C");
    }

    #[test]
    fn test_render_kelvin() {
        let weather = RenderedWeather::from_snapshot(&snapshot(), TemperatureUnit::Kelvin);
        assert_eq!(weather.temperature, "270 K");
        assert_eq!(weather.high_low, "272 K, 267 K");
    }

    #[test]
    fn test_render_missing_fields() {
        let empty = WeatherSnapshot {
            location_label: String::new(),
            current_temp_c: None,
            wind_kmh: None,
            condition_code: None,
            daily_high_c: None,
            daily_low_c: None,
            fetched_at: Utc::now(),
        };

        let weather = RenderedWeather::from_snapshot(&empty, TemperatureUnit::Fahrenheit);
        assert_eq!(weather.location, DEFAULT_AREA_LABEL);
        assert_eq!(weather.temperature, "-");
        assert_eq!(weather.wind, "- km/h");
        assert_eq!(weather.condition, "-");
        assert_eq!(weather.high_low, "-, -");
    }
}
