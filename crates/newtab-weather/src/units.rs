//! Temperature conversion and display formatting.
//!
//! Everything is stored in Celsius; conversion happens only at render time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Temperature unit preference, persisted as "C" / "F" / "K"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "K")]
    Kelvin,
}

impl TemperatureUnit {
    pub const ALL: [TemperatureUnit; 3] = [Self::Celsius, Self::Fahrenheit, Self::Kelvin];

    /// Storage code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
            Self::Kelvin => "K",
        }
    }

    /// Suffix appended to a rounded value. Kelvin takes a space, not a degree sign.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Kelvin => " K",
        }
    }

    /// Convert a Celsius value into this unit
    pub fn convert_celsius(&self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => to_fahrenheit(celsius),
            Self::Kelvin => to_kelvin(celsius),
        }
    }

    /// Parse a storage code exactly ("C", "F" or "K")
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.code() == code)
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseUnitError(String);

impl fmt::Display for ParseUnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown temperature unit '{}' (expected C, F or K)", self.0)
    }
}

impl std::error::Error for ParseUnitError {}

impl FromStr for TemperatureUnit {
    type Err = ParseUnitError;

    /// Lenient parse for user input: "c", "F", "kelvin", ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(Self::Celsius),
            "f" | "fahrenheit" => Ok(Self::Fahrenheit),
            "k" | "kelvin" => Ok(Self::Kelvin),
            _ => Err(ParseUnitError(s.to_string())),
        }
    }
}

pub fn to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn to_kelvin(celsius: f64) -> f64 {
    celsius + 273.15
}

/// Format a Celsius reading for display in `unit`.
///
/// Missing or NaN readings render as "-". Rounding is half away from zero.
pub fn format_temperature(celsius: Option<f64>, unit: TemperatureUnit) -> String {
    match celsius {
        Some(c) if !c.is_nan() => {
            // Cast so that -0.4 prints as "0" rather than "-0"
            let rounded = unit.convert_celsius(c).round() as i64;
            format!("{}{}", rounded, unit.symbol())
        }
        _ => "-".to_string(),
    }
}
