use clap::{value_parser, Arg, ArgAction, Command};
use log::info;

use crate::config::{Config, OutputFormat};
use crate::output::{
    CollectdFormatter, DataFormatter, JsonFormatter, RrdFormatter, TableFormatter,
};
use crate::services::PollService;
use crate::utils::error::MeterError;

pub fn build_cli() -> Command {
    Command::new("mercury-meter")
        .version(crate::VERSION)
        .about("Reads a Mercury electricity meter over a serial line")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PATH")
                .help("Serial device the meter is attached to [default: /dev/ttyACM0]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("rrd")
                .long("rrd")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["collectd", "json"])
                .help("Print rrdtool update lines and exit"),
        )
        .arg(
            Arg::new("collectd")
                .long("collectd")
                .action(ArgAction::SetTrue)
                .conflicts_with("json")
                .help("Print collectd PUTVAL lines forever"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print one reading as JSON and exit"),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64))
                .help("Polling interval in collectd mode"),
        )
        .arg(
            Arg::new("ignore-checksum")
                .long("ignore-checksum")
                .action(ArgAction::SetTrue)
                .help("Accept responses with a bad CRC (diagnostics only)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Log protocol traffic to stderr"),
        )
}

/// Execute the output mode selected in `config`. Returns only for the
/// one-shot modes; collectd mode polls until the process is killed.
pub fn run(config: Config) -> Result<(), MeterError> {
    let format = config.output.format;
    let service = PollService::new(config);

    match format {
        OutputFormat::Table => {
            info!("Reading meter once (table)");
            let readings = service.poll_once(true)?;
            print!("{}", TableFormatter.format(&readings));
        }
        OutputFormat::Json => {
            info!("Reading meter once (json)");
            let readings = service.poll_once(true)?;
            println!("{}", JsonFormatter.format(&readings));
        }
        OutputFormat::Rrd => {
            info!("Reading meter once (rrd)");
            let readings = service.poll_once(false)?;
            print!("{}", RrdFormatter.format(&readings));
        }
        OutputFormat::Collectd => {
            let output = &service.config().output;
            let formatter = CollectdFormatter::new(
                &output.collectd_host,
                &output.collectd_plugin,
                service.config().update_interval_seconds,
            );
            service.run_continuous(&formatter);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_output_modes_conflict() {
        assert!(build_cli()
            .try_get_matches_from(["mercury-meter", "--rrd", "--collectd"])
            .is_err());
        assert!(build_cli()
            .try_get_matches_from(["mercury-meter", "--collectd", "--json"])
            .is_err());
    }

    #[test]
    fn test_interval_must_be_numeric() {
        assert!(build_cli()
            .try_get_matches_from(["mercury-meter", "--interval", "soon"])
            .is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let matches = build_cli().try_get_matches_from(["mercury-meter", "-vv"]).unwrap();
        assert_eq!(matches.get_count("verbose"), 2);
    }

    #[test]
    fn test_run_reports_unopenable_port() {
        let config = Config {
            serial_port: "/nonexistent/ttyMERCURY".to_string(),
            ..Config::default()
        };

        match run(config) {
            Err(MeterError::ChannelError(msg)) => assert!(msg.contains("/nonexistent/ttyMERCURY")),
            other => panic!("expected ChannelError, got {:?}", other),
        }
    }
}
