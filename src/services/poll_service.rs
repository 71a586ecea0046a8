use log::{error, info};
use std::thread;

use crate::config::Config;
use crate::devices::{MeterClient, MeterReadings};
use crate::mercury::{ByteChannel, SerialChannel};
use crate::output::DataFormatter;
use crate::utils::error::MeterError;

/// Runs meter sessions: open the port, handshake, read, close.
pub struct PollService {
    config: Config,
}

impl PollService {
    pub fn new(config: Config) -> Self {
        info!("Polling meter on {} at {} baud", config.serial_port, config.baud_rate);
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn open_channel(&self) -> Result<SerialChannel, MeterError> {
        SerialChannel::open(
            &self.config.serial_port,
            self.config.baud_rate,
            self.config.response_timeout(),
            self.config.inter_byte_timeout(),
        )
    }

    /// One session over a freshly opened serial port.
    pub fn poll_once(&self, include_energy: bool) -> Result<MeterReadings, MeterError> {
        let channel = self.open_channel()?;
        self.poll_channel(channel, include_energy)
    }

    /// One session over an already opened channel. The channel is closed on
    /// every path out of here.
    pub fn poll_channel<C: ByteChannel>(
        &self,
        channel: C,
        include_energy: bool,
    ) -> Result<MeterReadings, MeterError> {
        let mut meter = MeterClient::open(channel, self.config.retry_policy())?;
        let readings = meter.read_all(include_energy)?;
        meter.close();
        Ok(readings)
    }

    /// Poll forever, printing each successful reading. Failed sessions are
    /// reported and the next one starts after the usual interval.
    pub fn run_continuous(&self, formatter: &dyn DataFormatter) -> ! {
        loop {
            match self.poll_once(false) {
                Ok(readings) => print!("{}", formatter.format(&readings)),
                Err(e) => {
                    error!("Polling {} failed", self.config.serial_port);
                    eprintln!("mercury error: {}", e);
                }
            }
            thread::sleep(self.config.update_interval());
        }
    }
}
