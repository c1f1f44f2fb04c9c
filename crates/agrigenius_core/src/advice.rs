//! crates/agrigenius_core/src/advice.rs
//!
//! Rule-based farm tips shown on the dashboard next to the live readings.

use crate::domain::SensorReading;

const HIGH_HUMIDITY: f64 = 75.0;
const LOW_MOISTURE: f64 = 30.0;
const HIGH_TEMPERATURE: f64 = 30.0;
const LOW_NITROGEN: f64 = 50.0;
const LOW_POTASSIUM: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tip {
    /// No reading has arrived yet.
    Waiting,
    HighHumidity,
    LowMoisture,
    HighTemperature,
    LowNitrogen,
    LowPotassium,
    /// Every rule passed.
    Optimal,
}

impl Tip {
    /// Translation key for the tip text.
    pub fn key(self) -> &'static str {
        match self {
            Tip::Waiting => "adviceWaiting",
            Tip::HighHumidity => "adviceHighHumidity",
            Tip::LowMoisture => "adviceLowMoisture",
            Tip::HighTemperature => "adviceHighTemp",
            Tip::LowNitrogen => "adviceLowNitro",
            Tip::LowPotassium => "adviceLowPotassium",
            Tip::Optimal => "adviceOptimal",
        }
    }
}

/// Evaluates the dashboard rules in display order.
pub fn assess(reading: Option<&SensorReading>) -> Vec<Tip> {
    let Some(r) = reading else {
        return vec![Tip::Waiting];
    };

    let mut tips = Vec::new();
    if r.humidity > HIGH_HUMIDITY {
        tips.push(Tip::HighHumidity);
    }
    if r.moisture < LOW_MOISTURE {
        tips.push(Tip::LowMoisture);
    }
    if r.temperature > HIGH_TEMPERATURE {
        tips.push(Tip::HighTemperature);
    }
    if r.nitrogen < LOW_NITROGEN {
        tips.push(Tip::LowNitrogen);
    }
    if r.potassium < LOW_POTASSIUM {
        tips.push(Tip::LowPotassium);
    }

    if tips.is_empty() {
        tips.push(Tip::Optimal);
    }
    tips
}
