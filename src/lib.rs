//! Mercury electricity meter poller
//!
//! Talks to a Mercury three-phase meter over a serial line using its binary
//! request/response protocol, decodes the measurement registers and renders
//! them as a table, rrdtool update lines or collectd PUTVAL lines.

pub mod cli;
pub mod config;
pub mod devices;
pub mod mercury;
pub mod output;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use devices::{MeterClient, MeterReadings};
pub use mercury::{ByteChannel, MeasurementFamily, RetryPolicy, SerialChannel, TransactionEngine};
pub use output::{CollectdFormatter, DataFormatter, JsonFormatter, RrdFormatter, TableFormatter};
pub use services::PollService;
pub use utils::error::{MeterError, ResponseFault};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
