use std::fmt;

use super::crc::append_crc;
use crate::utils::error::MeterError;

/// Hard ceiling for request and response frames.
pub const MAX_FRAME_LEN: usize = 32;
pub const CRC_LEN: usize = 2;
/// Room left for command bytes once the address byte and CRC are accounted for.
pub const MAX_COMMAND_LEN: usize = MAX_FRAME_LEN - 1 - CRC_LEN;
/// Address + one status/payload byte + CRC.
pub const MIN_RESPONSE_LEN: usize = 4;
pub const STATUS_RESPONSE_LEN: usize = 4;

pub const DEFAULT_DEVICE_ADDRESS: u8 = 0;

/// Resets the meter's communication state; must precede any read.
pub const OPEN_CHANNEL_CMD: [u8; 8] = [0x01; 8];
pub const CLOSE_CHANNEL_CMD: [u8; 1] = [0x02];
pub const READ_ENERGY_CMD: [u8; 3] = [0x05, 0x00, 0x00];
pub const ENERGY_PAYLOAD_LEN: usize = 16;

/// Instantaneous measurement groups, each read with one `08 16 xx` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementFamily {
    Voltage,
    Current,
    PowerReal,
    PowerReactive,
    PowerApparent,
    PowerFactor,
}

impl MeasurementFamily {
    pub const ALL: [MeasurementFamily; 6] = [
        MeasurementFamily::Voltage,
        MeasurementFamily::Current,
        MeasurementFamily::PowerReal,
        MeasurementFamily::PowerReactive,
        MeasurementFamily::PowerApparent,
        MeasurementFamily::PowerFactor,
    ];

    pub fn command(&self) -> [u8; 3] {
        let selector = match self {
            MeasurementFamily::Voltage => 0x11,
            MeasurementFamily::Current => 0x21,
            MeasurementFamily::PowerReal => 0x00,
            MeasurementFamily::PowerReactive => 0x04,
            MeasurementFamily::PowerApparent => 0x08,
            MeasurementFamily::PowerFactor => 0x30,
        };
        [0x08, 0x16, selector]
    }

    /// Mask applied to the most significant register byte. Power registers carry
    /// direction flags in its top two bits.
    pub fn mask(&self) -> u8 {
        match self {
            MeasurementFamily::Voltage | MeasurementFamily::Current => 0xFF,
            _ => 0x3F,
        }
    }

    pub fn divisor(&self) -> u32 {
        match self {
            MeasurementFamily::Current | MeasurementFamily::PowerFactor => 1000,
            _ => 100,
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            MeasurementFamily::Voltage | MeasurementFamily::Current => 9,
            _ => 12,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MeasurementFamily::Voltage => "voltage",
            MeasurementFamily::Current => "current",
            MeasurementFamily::PowerReal => "power-real",
            MeasurementFamily::PowerReactive => "power-reactive",
            MeasurementFamily::PowerApparent => "power-apparent",
            MeasurementFamily::PowerFactor => "power-factor",
        }
    }
}

impl fmt::Display for MeasurementFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frame `command` for `device_address`: address, command bytes, CRC high byte first.
pub fn build_request(device_address: u8, command: &[u8]) -> Result<Vec<u8>, MeterError> {
    if command.len() > MAX_COMMAND_LEN {
        return Err(MeterError::InvalidCommand {
            len: command.len(),
            max: MAX_COMMAND_LEN,
        });
    }

    let mut frame = Vec::with_capacity(MAX_FRAME_LEN);
    frame.push(device_address);
    frame.extend_from_slice(command);
    append_crc(&mut frame);

    Ok(frame)
}

/// Upper-case hex, one space between bytes: `00 08 16 11`.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}
