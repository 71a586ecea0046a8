//! Register decoding for measurement and energy payloads.
//!
//! Measurement registers are 3 bytes wide and sent as `[high, low, mid]`; the
//! high byte may carry flag bits that the family mask strips. Energy registers
//! are 4 bytes wide and sent as two little-endian 16-bit words, high word first.
//! Multi-byte values are assembled little-endian regardless of host.

use crate::mercury::protocol::{MeasurementFamily, ENERGY_PAYLOAD_LEN, MAX_FRAME_LEN};
use crate::utils::error::MeterError;

pub const MEASUREMENT_SLOTS: usize = 4;
pub const REGISTER_WIDTH: usize = 3;
pub const ENERGY_REGISTER_WIDTH: usize = 4;

/// Energy register value the meter reports for a register it does not keep.
pub const ENERGY_UNAVAILABLE: u32 = 0xFFFF_FFFF;

/// Raw 3-byte register at `slot` of `data`, high byte masked.
fn assemble_register(data: &[u8], slot: usize, mask: u8) -> u32 {
    let base = slot * REGISTER_WIDTH;
    u32::from_le_bytes([data[base + 1], data[base + 2], data[base] & mask, 0])
}

/// Raw 4-byte energy register at `slot` of `data`.
fn assemble_energy_register(data: &[u8], slot: usize) -> u32 {
    let base = slot * ENERGY_REGISTER_WIDTH;
    u32::from_le_bytes([data[base + 2], data[base + 3], data[base], data[base + 1]])
}

/// Decode the four slots of a measurement payload into physical units.
///
/// Voltage and current payloads are only 9 bytes long; their fourth slot is
/// read from zero padding and therefore always decodes to 0.0.
pub fn decode_measurement(
    family: MeasurementFamily,
    payload: &[u8],
) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
    let expected = family.payload_len();
    if payload.len() != expected {
        return Err(MeterError::DecodeError {
            what: family.name(),
            expected,
            received: payload.len(),
        });
    }

    decode_registers(payload, family.mask(), family.divisor())
}

/// Decode four 3-byte registers with an arbitrary high-byte mask and divisor.
/// Payloads shorter than four registers are zero padded.
pub fn decode_registers(
    payload: &[u8],
    mask: u8,
    divisor: u32,
) -> Result<[f32; MEASUREMENT_SLOTS], MeterError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(MeterError::DecodeError {
            what: "measurement registers",
            expected: MAX_FRAME_LEN,
            received: payload.len(),
        });
    }
    if divisor == 0 {
        return Err(MeterError::DecodeError {
            what: "register divisor",
            expected: 1,
            received: 0,
        });
    }

    let mut frame = [0u8; MAX_FRAME_LEN];
    frame[..payload.len()].copy_from_slice(payload);

    let divisor = divisor as f32;
    let mut values = [0f32; MEASUREMENT_SLOTS];
    for (slot, value) in values.iter_mut().enumerate() {
        *value = assemble_register(&frame, slot, mask) as f32 / divisor;
    }

    Ok(values)
}

/// Decode the cumulative energy registers (forward active, reverse active,
/// forward reactive, reverse reactive), unscaled.
pub fn decode_energy(payload: &[u8]) -> Result<[u32; MEASUREMENT_SLOTS], MeterError> {
    if payload.len() != ENERGY_PAYLOAD_LEN {
        return Err(MeterError::DecodeError {
            what: "energy registers",
            expected: ENERGY_PAYLOAD_LEN,
            received: payload.len(),
        });
    }

    let mut values = [0u32; MEASUREMENT_SLOTS];
    for (slot, value) in values.iter_mut().enumerate() {
        *value = match assemble_energy_register(payload, slot) {
            ENERGY_UNAVAILABLE => 0,
            raw => raw,
        };
    }

    Ok(values)
}
