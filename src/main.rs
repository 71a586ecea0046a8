use anyhow::{Context, Result};
use clap::ArgMatches;
use env_logger::Env;
use std::process;

use mercury_meter::cli::{build_cli, run};
use mercury_meter::Config;

fn main() {
    let matches = build_cli().get_matches();

    // stdout carries measurements for rrdtool/collectd, so logging stays quiet
    // unless asked for.
    let default_level = match matches.get_count("verbose") {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    if let Err(e) = try_main(&matches) {
        eprintln!("mercury error: {:#}", e);
        process::exit(1);
    }
}

fn try_main(matches: &ArgMatches) -> Result<()> {
    let config = Config::from_matches(matches).context("loading configuration")?;
    let port = config.serial_port.clone();

    run(config).with_context(|| format!("reading meter on {}", port))
}
