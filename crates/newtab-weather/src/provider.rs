//! Open-Meteo client: current conditions plus today's range, by coordinates.

use newtab_core::{NetworkError, ReqwestErrorExt, WeatherConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::types::{Coordinates, CurrentConditions, DailyRange, ForecastReport, Place};

const USER_AGENT: &str = concat!("newtab/", env!("CARGO_PKG_VERSION"));
const CURRENT_FIELDS: &str = "temperature_2m,wind_speed_10m,weather_code";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min";

/// The network seam used by the dashboard.
///
/// Any error is treated identically by callers: a generic status message
/// plus a log line with the detail.
pub trait WeatherApi: Send + Sync {
    /// Current conditions and today's high/low at `coords`.
    async fn forecast(&self, coords: Coordinates) -> Result<ForecastReport, NetworkError>;

    /// Resolve a free-text place name. `Ok(None)` when nothing matches.
    async fn geocode(&self, name: &str) -> Result<Option<Place>, NetworkError>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentBlock>,
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    weather_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
}

impl From<ForecastResponse> for ForecastReport {
    fn from(resp: ForecastResponse) -> Self {
        let current = resp
            .current
            .map(|c| CurrentConditions {
                temperature: c.temperature_2m,
                wind_speed: c.wind_speed_10m,
                condition_code: c.weather_code,
            })
            .unwrap_or_default();

        // First entry of each daily series is today
        let daily = resp
            .daily
            .map(|d| DailyRange {
                high_today: d.temperature_2m_max.first().copied().flatten(),
                low_today: d.temperature_2m_min.first().copied().flatten(),
            })
            .unwrap_or_default();

        Self { current, daily }
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    pub(crate) client: Client,
    forecast_url: String,
    pub(crate) geocoding_url: String,
}

impl OpenMeteoClient {
    /// Build a client for the configured endpoints. No request timeout is set.
    pub fn new(config: &WeatherConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ReqwestErrorExt::into_network_error)?;

        Ok(Self {
            client,
            forecast_url: config.forecast_url.clone(),
            geocoding_url: config.geocoding_url.clone(),
        })
    }

    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast(&self, coords: Coordinates) -> Result<ForecastReport, NetworkError> {
        let latitude = coords.latitude.to_string();
        let longitude = coords.longitude.to_string();

        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", CURRENT_FIELDS),
                ("daily", DAILY_FIELDS),
                ("timezone", "auto"),
            ])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        let body: ForecastResponse = handle_response(response).await?;
        Ok(body.into())
    }
}

impl WeatherApi for OpenMeteoClient {
    async fn forecast(&self, coords: Coordinates) -> Result<ForecastReport, NetworkError> {
        self.fetch_forecast(coords).await
    }

    async fn geocode(&self, name: &str) -> Result<Option<Place>, NetworkError> {
        self.search_place(name).await
    }
}

/// Map a non-success status to `ServerError`, then decode JSON.
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, NetworkError> {
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(NetworkError::ServerError {
            status: status.as_u16(),
            message: text,
        });
    }

    response
        .json()
        .await
        .map_err(|e| NetworkError::InvalidResponse(format!("JSON parse error: {}", e)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenMeteoClient {
        OpenMeteoClient::new(&WeatherConfig {
            forecast_url: format!("{}/v1/forecast", server.uri()),
            geocoding_url: format!("{}/v1/search", server.uri()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_forecast_sends_expected_query() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "48.85"))
            .and(query_param("longitude", "2.35"))
            .and(query_param("current", CURRENT_FIELDS))
            .and(query_param("daily", DAILY_FIELDS))
            .and(query_param("timezone", "auto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": {"temperature_2m": 18.3, "wind_speed_10m": 11.5, "weather_code": 2},
                "daily": {
                    "temperature_2m_max": [21.0, 23.4],
                    "temperature_2m_min": [12.1, 13.0]
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let report = client_for(&mock_server)
            .fetch_forecast(Coordinates::new(48.85, 2.35))
            .await
            .unwrap();

        assert_eq!(report.current.temperature, Some(18.3));
        assert_eq!(report.current.wind_speed, Some(11.5));
        assert_eq!(report.current.condition_code, Some(2));
        assert_eq!(report.daily.high_today, Some(21.0));
        assert_eq!(report.daily.low_today, Some(12.1));
    }

    #[tokio::test]
    async fn test_forecast_tolerates_missing_blocks() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current": {"temperature_2m": null},
                "daily": {"temperature_2m_max": []}
            })))
            .mount(&mock_server)
            .await;

        let report = client_for(&mock_server)
            .fetch_forecast(Coordinates::new(0.0, 0.0))
            .await
            .unwrap();

        assert_eq!(report, ForecastReport::default());
    }

    #[tokio::test]
    async fn test_forecast_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .fetch_forecast(Coordinates::new(1.0, 1.0))
            .await;

        assert!(matches!(
            result,
            Err(NetworkError::ServerError { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn test_forecast_bad_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .fetch_forecast(Coordinates::new(1.0, 1.0))
            .await;

        assert!(matches!(result, Err(NetworkError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = OpenMeteoClient::new(&WeatherConfig {
            forecast_url: "http://127.0.0.1:9/v1/forecast".to_string(),
            geocoding_url: "http://127.0.0.1:9/v1/search".to_string(),
        })
        .unwrap();

        let result = client.forecast(Coordinates::new(1.0, 1.0)).await;

        assert!(matches!(result, Err(NetworkError::ConnectionFailed(_))));
    }
}
