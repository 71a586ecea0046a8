pub mod decoder;
pub mod meter;
pub mod readings;

pub use decoder::{decode_energy, decode_measurement, decode_registers, MEASUREMENT_SLOTS};
pub use meter::MeterClient;
pub use readings::MeterReadings;
