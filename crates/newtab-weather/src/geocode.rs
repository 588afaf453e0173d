//! Forward geocoding: turn a city name into coordinates.
//! Uses the Open-Meteo geocoding API - free, no API key required.

use newtab_core::{NetworkError, ReqwestErrorExt};
use serde::Deserialize;
use tracing::instrument;

use crate::provider::{handle_response, OpenMeteoClient};
use crate::types::Place;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<SearchResult>>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: Option<String>,
    /// First-level administrative area (state, region)
    admin1: Option<String>,
    country: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl SearchResult {
    fn into_place(self) -> Place {
        Place {
            label: place_label([
                self.name.as_deref(),
                self.admin1.as_deref(),
                self.country.as_deref(),
            ]),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Join the present, non-empty parts with ", " (e.g. "Paris, Ile-de-France, France").
pub fn place_label(parts: [Option<&str>; 3]) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

impl OpenMeteoClient {
    /// Look up `name`, taking the top-ranked match. No disambiguation.
    #[instrument(skip(self), level = "info")]
    pub async fn search_place(&self, name: &str) -> Result<Option<Place>, NetworkError> {
        let response = self
            .client
            .get(&self.geocoding_url)
            .query(&[
                ("name", name),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        let body: SearchResponse = handle_response(response).await?;

        let place = body
            .results
            .and_then(|results| results.into_iter().next())
            .map(SearchResult::into_place);

        match &place {
            Some(p) => tracing::info!("Geocoded '{}' to {}", name, p.label),
            None => tracing::info!("No geocoding match for '{}'", name),
        }

        Ok(place)
    }
}
