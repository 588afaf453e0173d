//! Terminal rendering of the weather panel.
//!
//! The controller pushes state into `TerminalView`; the binary prints the
//! panel with `render` once each command has settled.

use std::io::{self, Write};

use newtab_weather::{DashboardView, RenderedWeather, TemperatureUnit};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct PanelState {
    status: String,
    weather: Option<RenderedWeather>,
    unit: TemperatureUnit,
    collapsed: bool,
}

#[derive(Debug, Default)]
pub struct TerminalView {
    panel: Mutex<PanelState>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print the panel. A collapsed panel prints only its header.
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let panel = self.panel.lock();

        let header = unit_selector(panel.unit);
        if panel.collapsed {
            writeln!(out, "Weather  {}  (collapsed)", header)?;
            return Ok(());
        }
        writeln!(out, "Weather  {}", header)?;

        if let Some(weather) = &panel.weather {
            writeln!(out, "  {}", weather.location)?;
            writeln!(out, "  {:<12}{}", "Temperature", weather.temperature)?;
            writeln!(out, "  {:<12}{}", "Condition", weather.condition)?;
            writeln!(out, "  {:<12}{}", "Wind", weather.wind)?;
            writeln!(out, "  {:<12}{}", "High, low", weather.high_low)?;
            writeln!(out, "  {:<12}{}", "Updated", weather.updated)?;
        }

        if !panel.status.is_empty() {
            writeln!(out, "  {}", panel.status)?;
        }

        Ok(())
    }
}

/// "[C] F K" with the active unit bracketed
fn unit_selector(active: TemperatureUnit) -> String {
    TemperatureUnit::ALL
        .iter()
        .map(|unit| {
            if *unit == active {
                format!("[{}]", unit.code())
            } else {
                unit.code().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl DashboardView for TerminalView {
    fn set_status(&self, message: &str) {
        self.panel.lock().status = message.to_string();
    }

    fn show_weather(&self, weather: &RenderedWeather) {
        self.panel.lock().weather = Some(weather.clone());
    }

    fn hide_weather(&self) {
        self.panel.lock().weather = None;
    }

    fn set_active_unit(&self, unit: TemperatureUnit) {
        self.panel.lock().unit = unit;
    }

    fn set_collapsed(&self, collapsed: bool) {
        self.panel.lock().collapsed = collapsed;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn rendered(view: &TerminalView) -> String {
        let mut out = Vec::new();
        view.render(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn weather() -> RenderedWeather {
        RenderedWeather {
            location: "Nairobi, Nairobi County, Kenya".to_string(),
            temperature: "24°C".to_string(),
            wind: "12.1 km/h".to_string(),
            condition: "Partly cloudy".to_string(),
            high_low: "27°C, 14°C".to_string(),
            updated: "2025-03-02 10:15".to_string(),
        }
    }

    #[test]
    fn test_unit_selector() {
        assert_eq!(unit_selector(TemperatureUnit::Celsius), "[C] F K");
        assert_eq!(unit_selector(TemperatureUnit::Kelvin), "C F [K]");
    }

    #[test]
    fn test_render_grid_and_status() {
        let view = TerminalView::new();
        view.show_weather(&weather());
        view.set_status("Searching...");

        let text = rendered(&view);
        assert!(text.starts_with("Weather  [C] F K\n"));
        assert!(text.contains("  Nairobi, Nairobi County, Kenya\n"));
        assert!(text.contains("Temperature 24°C"));
        assert!(text.contains("High, low   27°C, 14°C"));
        assert!(text.ends_with("  Searching...\n"));
    }

    #[test]
    fn test_collapsed_prints_header_only() {
        let view = TerminalView::new();
        view.show_weather(&weather());
        view.set_active_unit(TemperatureUnit::Fahrenheit);
        view.set_collapsed(true);

        assert_eq!(rendered(&view), "Weather  C [F] K  (collapsed)\n");
    }

    #[test]
    fn test_hidden_grid() {
        let view = TerminalView::new();
        view.show_weather(&weather());
        view.hide_weather();
        view.set_status("City not found. Try a different name.");

        assert_eq!(
            rendered(&view),
            "Weather  [C] F K\n  City not found. Try a different name.\n"
        );
    }
}
