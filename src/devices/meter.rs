use chrono::Utc;
use log::{debug, info, warn};

use super::decoder::{decode_energy, decode_measurement, MEASUREMENT_SLOTS};
use super::readings::MeterReadings;
use crate::mercury::channel::ByteChannel;
use crate::mercury::protocol::{
    MeasurementFamily, CLOSE_CHANNEL_CMD, DEFAULT_DEVICE_ADDRESS, OPEN_CHANNEL_CMD, READ_ENERGY_CMD,
};
use crate::mercury::transaction::{RetryPolicy, TransactionEngine};
use crate::utils::error::MeterError;

/// A session with one meter.
///
/// `open` performs the channel-open handshake. The session ends with `close`,
/// or when the client is dropped; either way the close command is sent and the
/// channel released, and failures at that point are only logged.
pub struct MeterClient<C: ByteChannel> {
    engine: TransactionEngine<C>,
    address: u8,
    closed: bool,
}

impl<C: ByteChannel> MeterClient<C> {
    pub fn open(channel: C, policy: RetryPolicy) -> Result<Self, MeterError> {
        let mut client = Self {
            engine: TransactionEngine::new(channel, policy),
            address: DEFAULT_DEVICE_ADDRESS,
            closed: false,
        };

        info!("Opening channel to meter at address {}", client.address);
        // On failure `client` is dropped here, which still sends the close command.
        client.engine.execute(client.address, &OPEN_CHANNEL_CMD)?;
        debug!("Meter channel open");

        Ok(client)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn get_voltages(&mut self) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
        self.read_family(MeasurementFamily::Voltage)
    }

    pub fn get_currents(&mut self) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
        self.read_family(MeasurementFamily::Current)
    }

    pub fn get_powers_real(&mut self) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
        self.read_family(MeasurementFamily::PowerReal)
    }

    pub fn get_powers_reactive(&mut self) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
        self.read_family(MeasurementFamily::PowerReactive)
    }

    pub fn get_powers_apparent(&mut self) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
        self.read_family(MeasurementFamily::PowerApparent)
    }

    pub fn get_power_factors(&mut self) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
        self.read_family(MeasurementFamily::PowerFactor)
    }

    /// Cumulative energy counters: forward active, reverse active, forward
    /// reactive, reverse reactive. Registers the meter does not keep read 0.
    pub fn get_energy(&mut self) -> Result<[u32; MEASUREMENT_SLOTS], MeterError> {
        let payload = self.engine.execute(self.address, &READ_ENERGY_CMD)?;
        decode_energy(&payload)
    }

    pub fn read_family(
        &mut self,
        family: MeasurementFamily,
    ) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
        let payload = self.engine.execute(self.address, &family.command())?;
        let values = decode_measurement(family, &payload)?;
        debug!("{}: {:?}", family, values);
        Ok(values)
    }

    /// Read every measurement family, and the energy counters if asked to.
    pub fn read_all(&mut self, include_energy: bool) -> Result<MeterReadings, MeterError> {
        let voltage = self.get_voltages()?;
        let current = self.get_currents()?;
        let power_real = self.get_powers_real()?;
        let power_reactive = self.get_powers_reactive()?;
        let power_apparent = self.get_powers_apparent()?;
        let power_factor = self.get_power_factors()?;
        let energy = if include_energy {
            Some(self.get_energy()?)
        } else {
            None
        };

        Ok(MeterReadings {
            timestamp: Utc::now(),
            voltage,
            current,
            power_real,
            power_reactive,
            power_apparent,
            power_factor,
            energy,
        })
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.engine.execute(self.address, &CLOSE_CHANNEL_CMD) {
            warn!("Meter did not acknowledge channel close: {}", e);
        }
        if let Err(e) = self.engine.channel_mut().close() {
            warn!("Failed to release channel: {}", e);
        }
        info!("Meter channel closed");
    }
}

impl<C: ByteChannel> Drop for MeterClient<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
