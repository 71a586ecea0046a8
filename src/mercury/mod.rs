pub mod channel;
pub mod crc;
pub mod protocol;
pub mod transaction;

pub use channel::{ByteChannel, SerialChannel};
pub use crc::{append_crc, crc16_mercury, verify_crc};
pub use protocol::{
    build_request, hex_dump, MeasurementFamily, DEFAULT_DEVICE_ADDRESS, MAX_FRAME_LEN,
};
pub use transaction::{validate_response, RetryPolicy, TransactionEngine};
