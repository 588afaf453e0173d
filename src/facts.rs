//! Daily climate fact.

use chrono::{Datelike, NaiveDate};

pub const CLIMATE_FACTS: [&str; 8] = [
    "Earth's tilted axis causes the seasons, because sunlight hits different parts more directly at different times of year.",
    "Warm air can hold more water vapor than cold air, which affects humidity and precipitation.",
    "The ozone layer helps absorb much of the Sun's harmful ultraviolet (UV) radiation.",
    "Ocean currents move heat around the planet and can shape regional climates.",
    "Clouds can both cool Earth by reflecting sunlight and warm Earth by trapping heat.",
    "Drought is not just lack of rain, it also depends on temperature, evaporation, and soil moisture.",
    "Mountains can cause rain shadows, making one side wetter and the other side drier.",
    "Weather is short-term, climate is the long-term pattern of weather in a region.",
];

/// The fact shown on `date`. Rotates by day of year (Jan 1 is day 1).
pub fn fact_for(date: NaiveDate) -> &'static str {
    CLIMATE_FACTS[date.ordinal() as usize % CLIMATE_FACTS.len()]
}
