pub mod commands;

pub use commands::{build_cli, run};
