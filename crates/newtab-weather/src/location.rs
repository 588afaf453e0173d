//! Geolocation: where "My Location" is.

use std::time::Duration;

use newtab_core::{GeolocationConfig, LocationError};

use crate::types::Coordinates;

/// Source of the user's current position.
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Position taken from the `[geolocation]` config section.
///
/// A terminal has no permission prompt, so the config plays that role:
/// disabled means denied, no coordinates means the capability is missing.
#[derive(Debug, Clone)]
pub struct ConfiguredGeolocator {
    enabled: bool,
    position: Option<Coordinates>,
}

impl ConfiguredGeolocator {
    pub fn new(config: &GeolocationConfig) -> Self {
        Self {
            enabled: config.enabled,
            position: config
                .position()
                .map(|(lat, lon)| Coordinates::new(lat, lon)),
        }
    }
}

impl Geolocator for ConfiguredGeolocator {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        if !self.enabled {
            return Err(LocationError::PermissionDenied);
        }
        self.position.ok_or(LocationError::ServiceUnavailable)
    }
}

/// Ask `geolocator` for a position, giving up after `timeout`.
pub async fn locate_with_timeout<G: Geolocator>(
    geolocator: &G,
    timeout: Duration,
) -> Result<Coordinates, LocationError> {
    match tokio::time::timeout(timeout, geolocator.current_position()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Location request timed out after {:?}", timeout);
            Err(LocationError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    struct NeverAnswers;

    impl Geolocator for NeverAnswers {
        async fn current_position(&self) -> Result<Coordinates, LocationError> {
            std::future::pending().await
        }
    }

    fn config(enabled: bool, position: Option<(f64, f64)>) -> GeolocationConfig {
        GeolocationConfig {
            enabled,
            latitude: position.map(|p| p.0),
            longitude: position.map(|p| p.1),
            timeout_secs: 10,
        }
    }

    #[tokio::test]
    async fn test_configured_position() {
        let geo = ConfiguredGeolocator::new(&config(true, Some((59.91, 10.75))));
        let coords = geo.current_position().await.unwrap();
        assert_eq!(coords, Coordinates::new(59.91, 10.75));
    }

    #[tokio::test]
    async fn test_disabled_is_permission_denied() {
        let geo = ConfiguredGeolocator::new(&config(false, Some((59.91, 10.75))));
        assert_eq!(
            geo.current_position().await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_no_position_is_unavailable() {
        let geo = ConfiguredGeolocator::new(&config(true, None));
        assert_eq!(
            geo.current_position().await,
            Err(LocationError::ServiceUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_elapses() {
        let result = locate_with_timeout(&NeverAnswers, Duration::from_secs(10)).await;
        assert_eq!(result, Err(LocationError::Timeout));
    }
}
