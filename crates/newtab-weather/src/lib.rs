//! Weather dashboard for newtab
//!
//! Provides current conditions via the Open-Meteo API, city search,
//! temperature unit conversion, persisted preferences and the dashboard
//! controller that ties them together.

pub mod dashboard;
pub mod geocode;
pub mod location;
pub mod prefs;
pub mod provider;
pub mod types;
pub mod units;

pub use dashboard::{Dashboard, DashboardView, FetchState, RenderedWeather};
pub use location::{ConfiguredGeolocator, Geolocator};
pub use prefs::{JsonFileBackend, KeyValueBackend, MemoryBackend, PreferenceStore, Preferences};
pub use provider::{OpenMeteoClient, WeatherApi};
pub use types::*;
pub use units::{format_temperature, to_fahrenheit, to_kelvin, TemperatureUnit};
