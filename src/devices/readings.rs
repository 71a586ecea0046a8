use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decoder::MEASUREMENT_SLOTS;
use crate::mercury::protocol::MeasurementFamily;

/// One full poll of the meter.
///
/// Voltage and current slots 0..3 are phases A, B, C. The power families put
/// the total in slot 0 and phases A, B, C in slots 1..4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReadings {
    pub timestamp: DateTime<Utc>,
    pub voltage: [f32; MEASUREMENT_SLOTS],
    pub current: [f32; MEASUREMENT_SLOTS],
    pub power_real: [f32; MEASUREMENT_SLOTS],
    pub power_reactive: [f32; MEASUREMENT_SLOTS],
    pub power_apparent: [f32; MEASUREMENT_SLOTS],
    pub power_factor: [f32; MEASUREMENT_SLOTS],
    /// Forward active, reverse active, forward reactive, reverse reactive (Wh / varh).
    pub energy: Option<[u32; MEASUREMENT_SLOTS]>,
}

impl MeterReadings {
    pub fn values(&self, family: MeasurementFamily) -> &[f32; MEASUREMENT_SLOTS] {
        match family {
            MeasurementFamily::Voltage => &self.voltage,
            MeasurementFamily::Current => &self.current,
            MeasurementFamily::PowerReal => &self.power_real,
            MeasurementFamily::PowerReactive => &self.power_reactive,
            MeasurementFamily::PowerApparent => &self.power_apparent,
            MeasurementFamily::PowerFactor => &self.power_factor,
        }
    }

    /// Per-phase values A, B, C.
    pub fn phases(&self, family: MeasurementFamily) -> [f32; 3] {
        let v = self.values(family);
        match family {
            MeasurementFamily::Voltage | MeasurementFamily::Current => [v[0], v[1], v[2]],
            _ => [v[1], v[2], v[3]],
        }
    }

    /// Whole-meter value; voltage and current have none.
    pub fn total(&self, family: MeasurementFamily) -> Option<f32> {
        match family {
            MeasurementFamily::Voltage | MeasurementFamily::Current => None,
            _ => Some(self.values(family)[0]),
        }
    }

    pub fn energy_kwh(&self) -> Option<[f32; MEASUREMENT_SLOTS]> {
        self.energy.map(|e| e.map(|wh| wh as f32 / 1000.0))
    }
}
