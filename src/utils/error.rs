use thiserror::Error;

use crate::mercury::protocol::hex_dump;

/// Why a single attempt of a transaction was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseFault {
    #[error("invalid response")]
    InvalidResponse,

    #[error("invalid response checksum")]
    InvalidChecksum,

    #[error("invalid device address")]
    InvalidAddress,

    #[error("device returned error (status 0x{0:X})")]
    DeviceError(u8),

    #[error("channel i/o error: {0}")]
    Io(String),
}

#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Invalid command: {len} bytes exceeds the {max} byte limit")]
    InvalidCommand { len: usize, max: usize },

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error(
        "{fault} after {attempts} attempts\nREQUEST({}):\n{}\nRESPONSE({}):\n{}",
        .request.len(),
        hex_dump(.request),
        .response.len(),
        hex_dump(.response)
    )]
    TransactionError {
        fault: ResponseFault,
        attempts: u32,
        request: Vec<u8>,
        response: Vec<u8>,
    },

    #[error("Invalid response length for {what}. Expected {expected}, received {received} bytes")]
    DecodeError {
        what: &'static str,
        expected: usize,
        received: usize,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MeterError {
    /// The validation failure of the last attempt, if this is an exhausted transaction.
    pub fn fault(&self) -> Option<&ResponseFault> {
        match self {
            MeterError::TransactionError { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

impl From<serialport::Error> for MeterError {
    fn from(err: serialport::Error) -> Self {
        MeterError::ChannelError(err.to_string())
    }
}

impl From<toml::de::Error> for MeterError {
    fn from(err: toml::de::Error) -> Self {
        MeterError::ConfigError(format!("TOML error: {}", err))
    }
}
