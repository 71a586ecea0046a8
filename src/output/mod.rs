pub mod formatters;

pub use formatters::{CollectdFormatter, DataFormatter, JsonFormatter, RrdFormatter, TableFormatter};
