use std::fmt::Write;

use crate::devices::MeterReadings;
use crate::mercury::protocol::MeasurementFamily;

pub trait DataFormatter {
    fn format(&self, readings: &MeterReadings) -> String;
}

/// Human-readable per-phase table.
pub struct TableFormatter;

impl DataFormatter for TableFormatter {
    fn format(&self, readings: &MeterReadings) -> String {
        let rows = [
            ("Voltage (V):", MeasurementFamily::Voltage),
            ("Current (A):", MeasurementFamily::Current),
            ("Power real (W):", MeasurementFamily::PowerReal),
            ("Power apparent (VA):", MeasurementFamily::PowerApparent),
            ("Power reactive (VAr):", MeasurementFamily::PowerReactive),
            ("Power factor:", MeasurementFamily::PowerFactor),
        ];

        let mut output = format!("{:31}A          B          C\n", "");
        for (label, family) in rows {
            let [a, b, c] = readings.phases(family);
            let precision = precision(family);
            let _ = writeln!(
                output,
                "{:<22}{:10.*} {:10.*} {:10.*}",
                label, precision, a, precision, b, precision, c
            );
        }

        output.push('\n');
        if let Some(total) = readings.total(MeasurementFamily::PowerApparent) {
            let _ = writeln!(output, "Total power consumption: {:.2} VA", total);
        }
        if let Some(total) = readings.total(MeasurementFamily::PowerFactor) {
            let _ = writeln!(output, "Total power factor: {:.3}", total);
        }

        if let Some(kwh) = readings.energy_kwh() {
            output.push('\n');
            let _ = writeln!(output, "Active forward: {:.2} kWh", kwh[0]);
            let _ = writeln!(output, "Active reverse: {:.2} kWh", kwh[1]);
            let _ = writeln!(output, "Reactive forward: {:.2} kWh", kwh[2]);
            let _ = writeln!(output, "Reactive reverse: {:.2} kWh", kwh[3]);
        }

        output
    }
}

/// `rrdtool update` style lines, one per family: `voltage N:a:b:c`.
pub struct RrdFormatter;

impl DataFormatter for RrdFormatter {
    fn format(&self, readings: &MeterReadings) -> String {
        let mut output = String::new();
        for family in MeasurementFamily::ALL {
            let _ = writeln!(output, "{} {}", family.name(), phase_values(readings, family));
        }
        output
    }
}

/// collectd exec plugin `PUTVAL` lines.
pub struct CollectdFormatter {
    pub host: String,
    pub plugin: String,
    pub interval: u64,
}

impl CollectdFormatter {
    pub fn new(host: &str, plugin: &str, interval: u64) -> Self {
        Self {
            host: host.to_string(),
            plugin: plugin.to_string(),
            interval,
        }
    }
}

impl DataFormatter for CollectdFormatter {
    fn format(&self, readings: &MeterReadings) -> String {
        let series = [
            ("voltage", MeasurementFamily::Voltage),
            ("current", MeasurementFamily::Current),
            ("pf", MeasurementFamily::PowerFactor),
            ("power-real", MeasurementFamily::PowerReal),
            ("power-reactive", MeasurementFamily::PowerReactive),
            ("power-apparent", MeasurementFamily::PowerApparent),
        ];

        let mut output = String::new();
        for (type_name, family) in series {
            let _ = writeln!(
                output,
                "PUTVAL {}/{}/{} interval={} {}",
                self.host,
                self.plugin,
                type_name,
                self.interval,
                phase_values(readings, family)
            );
        }
        output
    }
}

pub struct JsonFormatter;

impl DataFormatter for JsonFormatter {
    fn format(&self, readings: &MeterReadings) -> String {
        serde_json::to_string_pretty(readings).unwrap_or_default()
    }
}

fn precision(family: MeasurementFamily) -> usize {
    match family {
        MeasurementFamily::PowerFactor => 3,
        _ => 2,
    }
}

/// `N:a:b:c` with the phase values of `family`.
fn phase_values(readings: &MeterReadings, family: MeasurementFamily) -> String {
    let [a, b, c] = readings.phases(family);
    let p = precision(family);
    format!("N:{:.*}:{:.*}:{:.*}", p, a, p, b, p, c)
}
