use log::{debug, error};
use std::thread;
use std::time::Duration;

use super::channel::ByteChannel;
use super::crc::verify_crc;
use super::protocol::{
    build_request, hex_dump, CRC_LEN, MAX_FRAME_LEN, MIN_RESPONSE_LEN, STATUS_RESPONSE_LEN,
};
use crate::utils::error::{MeterError, ResponseFault};

pub const DEFAULT_MAX_RETRIES: u32 = 16;
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub max_retries: u32,
    /// Attempt `n` (counting from 0) is preceded by a sleep of `n * backoff_step`.
    pub backoff_step: Duration,
    /// Diagnostic mode: accept responses whose CRC does not match.
    pub ignore_checksum: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_step: DEFAULT_BACKOFF_STEP,
            ignore_checksum: false,
        }
    }
}

/// Frames requests, exchanges them over a `ByteChannel` and retries until a
/// response passes validation or the retry budget runs out.
pub struct TransactionEngine<C: ByteChannel> {
    channel: C,
    policy: RetryPolicy,
}

impl<C: ByteChannel> TransactionEngine<C> {
    pub fn new(channel: C, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Run one request/response exchange and return the response payload
    /// (address byte and CRC stripped).
    pub fn execute(&mut self, device_address: u8, command: &[u8]) -> Result<Vec<u8>, MeterError> {
        let request = build_request(device_address, command)?;

        let mut response = [0u8; MAX_FRAME_LEN];
        let mut response_len = 0;
        let mut last_fault = ResponseFault::InvalidResponse;
        let mut attempts = 0;

        while attempts < self.policy.max_retries {
            if attempts > 0 {
                thread::sleep(self.policy.backoff_step * attempts);
            }
            attempts += 1;

            debug!("TX [{}]", hex_dump(&request));

            match self.exchange(&request, &mut response) {
                Ok(n) => response_len = n,
                Err(e) => {
                    debug!("Attempt {}/{} failed: {}", attempts, self.policy.max_retries, e);
                    response_len = 0;
                    last_fault = ResponseFault::Io(e.to_string());
                    continue;
                }
            }

            debug!("RX [{}]", hex_dump(&response[..response_len]));

            let received = &response[..response_len];
            match validate_response(device_address, received, self.policy.ignore_checksum) {
                Ok(()) => {
                    return Ok(response[1..response_len - CRC_LEN].to_vec());
                }
                Err(fault) => {
                    debug!("Attempt {}/{} failed: {}", attempts, self.policy.max_retries, fault);
                    last_fault = fault;
                }
            }
        }

        error!(
            "Giving up on request [{}] after {} attempts: {}",
            hex_dump(&request),
            attempts,
            last_fault
        );

        Err(MeterError::TransactionError {
            fault: last_fault,
            attempts,
            request,
            response: response[..response_len].to_vec(),
        })
    }

    fn exchange(&mut self, request: &[u8], response: &mut [u8]) -> std::io::Result<usize> {
        let written = self.channel.write(request)?;
        if written != request.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, request.len()),
            ));
        }
        let n = self.channel.read(response)?;
        Ok(n.min(response.len()))
    }
}

/// Checks applied to every response, in order: length, checksum, address echo,
/// and for status-only replies the status nibble.
pub fn validate_response(
    device_address: u8,
    response: &[u8],
    ignore_checksum: bool,
) -> Result<(), ResponseFault> {
    if response.len() < MIN_RESPONSE_LEN {
        return Err(ResponseFault::InvalidResponse);
    }

    if !ignore_checksum && !verify_crc(response) {
        return Err(ResponseFault::InvalidChecksum);
    }

    if response[0] != device_address {
        return Err(ResponseFault::InvalidAddress);
    }

    if response.len() == STATUS_RESPONSE_LEN {
        let status = response[1] & 0x0F;
        if status != 0 {
            return Err(ResponseFault::DeviceError(status));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mercury::crc::append_crc;
    use std::io;

    /// Answers every request through a closure and records what was written.
    struct FnChannel<F: FnMut(&[u8]) -> io::Result<Vec<u8>>> {
        respond: F,
        pending: Vec<u8>,
        writes: Vec<Vec<u8>>,
    }

    impl<F: FnMut(&[u8]) -> io::Result<Vec<u8>>> FnChannel<F> {
        fn new(respond: F) -> Self {
            Self { respond, pending: Vec::new(), writes: Vec::new() }
        }
    }

    impl<F: FnMut(&[u8]) -> io::Result<Vec<u8>>> ByteChannel for FnChannel<F> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.to_vec());
            self.pending = (self.respond)(buf)?;
            Ok(buf.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.clear();
            Ok(n)
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy { backoff_step: Duration::ZERO, ..RetryPolicy::default() }
    }

    fn framed(bytes: &[u8]) -> Vec<u8> {
        let mut frame = bytes.to_vec();
        append_crc(&mut frame);
        frame
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 16);
        assert_eq!(policy.backoff_step, Duration::from_millis(50));
        assert!(!policy.ignore_checksum);
    }

    #[test]
    fn test_execute_returns_payload() {
        let channel = FnChannel::new(|_| Ok(framed(&[0x00, 0x11, 0x22, 0x33])));
        let mut engine = TransactionEngine::new(channel, no_wait());

        let payload = engine.execute(0, &[0x08, 0x16, 0x11]).unwrap();
        assert_eq!(payload, vec![0x11, 0x22, 0x33]);
        assert_eq!(engine.channel().writes.len(), 1);
        assert_eq!(engine.channel().writes[0], framed(&[0x00, 0x08, 0x16, 0x11]));
    }

    #[test]
    fn test_status_only_success() {
        let channel = FnChannel::new(|_| Ok(framed(&[0x00, 0x00])));
        let mut engine = TransactionEngine::new(channel, no_wait());

        let payload = engine.execute(0, &[0x02]).unwrap();
        assert_eq!(payload, vec![0x00]);
    }

    #[test]
    fn test_status_high_nibble_is_ignored() {
        let channel = FnChannel::new(|_| Ok(framed(&[0x00, 0xF0])));
        let mut engine = TransactionEngine::new(channel, no_wait());

        assert_eq!(engine.execute(0, &[0x02]).unwrap(), vec![0xF0]);
    }

    #[test]
    fn test_status_error_exhausts_retries() {
        let channel = FnChannel::new(|_| Ok(framed(&[0x00, 0x05])));
        let mut engine = TransactionEngine::new(channel, no_wait());

        let err = engine.execute(0, &[0x02]).unwrap_err();
        assert_eq!(err.fault(), Some(&ResponseFault::DeviceError(5)));
        assert_eq!(engine.channel().writes.len(), 16);
    }

    #[test]
    fn test_short_response_retries_exactly_max_times() {
        let channel = FnChannel::new(|_| Ok(vec![0x00, 0x01]));
        let mut engine = TransactionEngine::new(channel, no_wait());

        match engine.execute(0, &[0x08, 0x16, 0x11]) {
            Err(MeterError::TransactionError { fault, attempts, request, response }) => {
                assert_eq!(fault, ResponseFault::InvalidResponse);
                assert_eq!(attempts, 16);
                assert_eq!(request, framed(&[0x00, 0x08, 0x16, 0x11]));
                assert_eq!(response, vec![0x00, 0x01]);
            }
            other => panic!("expected TransactionError, got {:?}", other),
        }
        assert_eq!(engine.channel().writes.len(), 16);
    }

    #[test]
    fn test_custom_retry_bound() {
        let channel = FnChannel::new(|_| Ok(Vec::new()));
        let policy = RetryPolicy { max_retries: 3, ..no_wait() };
        let mut engine = TransactionEngine::new(channel, policy);

        assert!(engine.execute(0, &[0x02]).is_err());
        assert_eq!(engine.channel().writes.len(), 3);
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let mut calls = 0;
        let channel = FnChannel::new(move |_| {
            calls += 1;
            if calls < 4 {
                Ok(vec![0x00])
            } else {
                Ok(framed(&[0x00, 0x00]))
            }
        });
        let mut engine = TransactionEngine::new(channel, no_wait());

        assert!(engine.execute(0, &[0x02]).is_ok());
        assert_eq!(engine.channel().writes.len(), 4);
    }

    #[test]
    fn test_bad_checksum_reported() {
        let channel = FnChannel::new(|_| {
            let mut frame = framed(&[0x00, 0x11, 0x22, 0x33]);
            let last = frame.len() - 1;
            frame[last] ^= 0xFF;
            Ok(frame)
        });
        let mut engine = TransactionEngine::new(channel, no_wait());

        let err = engine.execute(0, &[0x08, 0x16, 0x11]).unwrap_err();
        assert_eq!(err.fault(), Some(&ResponseFault::InvalidChecksum));
    }

    #[test]
    fn test_ignore_checksum_accepts_bad_crc() {
        let channel = FnChannel::new(|_| Ok(vec![0x00, 0x11, 0x22, 0x33, 0xDE, 0xAD]));
        let policy = RetryPolicy { ignore_checksum: true, ..no_wait() };
        let mut engine = TransactionEngine::new(channel, policy);

        let payload = engine.execute(0, &[0x08, 0x16, 0x11]).unwrap();
        assert_eq!(payload, vec![0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_ignore_checksum_keeps_other_checks() {
        let channel = FnChannel::new(|_| Ok(vec![0x07, 0x11, 0xDE, 0xAD]));
        let policy = RetryPolicy { ignore_checksum: true, ..no_wait() };
        let mut engine = TransactionEngine::new(channel, policy);

        let err = engine.execute(0, &[0x02]).unwrap_err();
        assert_eq!(err.fault(), Some(&ResponseFault::InvalidAddress));
    }

    #[test]
    fn test_wrong_address_rejected() {
        let channel = FnChannel::new(|_| Ok(framed(&[0x01, 0x00])));
        let mut engine = TransactionEngine::new(channel, no_wait());

        let err = engine.execute(0, &[0x02]).unwrap_err();
        assert_eq!(err.fault(), Some(&ResponseFault::InvalidAddress));
    }

    #[test]
    fn test_io_errors_are_retried() {
        let mut calls = 0;
        let channel = FnChannel::new(move |_| {
            calls += 1;
            if calls == 1 {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "line dropped"))
            } else {
                Ok(framed(&[0x00, 0x00]))
            }
        });
        let mut engine = TransactionEngine::new(channel, no_wait());

        assert!(engine.execute(0, &[0x02]).is_ok());
        assert_eq!(engine.channel().writes.len(), 2);
    }

    #[test]
    fn test_long_command_is_not_sent() {
        let channel = FnChannel::new(|_| Ok(framed(&[0x00, 0x00])));
        let mut engine = TransactionEngine::new(channel, no_wait());

        let err = engine.execute(0, &[0u8; 30]).unwrap_err();
        assert!(matches!(err, MeterError::InvalidCommand { len: 30, max: 29 }));
        assert!(engine.channel().writes.is_empty());
    }

    #[test]
    fn test_validate_response_order() {
        // too short wins over everything else
        assert_eq!(
            validate_response(0, &[0x05, 0x01, 0x00], false),
            Err(ResponseFault::InvalidResponse)
        );
        // checksum is checked before the address
        assert_eq!(
            validate_response(0, &[0x05, 0x01, 0x00, 0x00], false),
            Err(ResponseFault::InvalidChecksum)
        );
        assert_eq!(
            validate_response(0, &framed(&[0x05, 0x01]), false),
            Err(ResponseFault::InvalidAddress)
        );
        assert_eq!(
            validate_response(0, &framed(&[0x00, 0x01]), false),
            Err(ResponseFault::DeviceError(1))
        );
        // nonzero low nibble only matters for status-only replies
        assert_eq!(validate_response(0, &framed(&[0x00, 0x01, 0x02]), false), Ok(()));
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let step = Duration::from_millis(25);
        let channel = FnChannel::new(|_| Ok(vec![0x00, 0x01]));
        let policy = RetryPolicy { max_retries: 4, backoff_step: step, ignore_checksum: false };
        let mut engine = TransactionEngine::new(channel, policy);

        let started = std::time::Instant::now();
        assert!(engine.execute(0, &[0x02]).is_err());
        let elapsed = started.elapsed();

        // no wait before the first attempt, then 1, 2 and 3 steps
        assert!(elapsed >= step * 6, "backoff too short: {:?}", elapsed);
        assert!(elapsed < step * 10, "backoff too long: {:?}", elapsed);
        assert_eq!(engine.channel().writes.len(), 4);
    }

    #[test]
    fn test_error_keeps_last_response_only() {
        let mut calls = 0;
        let channel = FnChannel::new(move |_| {
            calls += 1;
            if calls < 3 {
                Ok(vec![0x00, 0x11, 0x22, 0x33, 0xDE, 0xAD])
            } else {
                Ok(vec![0x00, 0x01])
            }
        });
        let policy = RetryPolicy { max_retries: 3, ..no_wait() };
        let mut engine = TransactionEngine::new(channel, policy);

        match engine.execute(0, &[0x08, 0x16, 0x11]) {
            Err(MeterError::TransactionError { fault, attempts, response, .. }) => {
                assert_eq!(fault, ResponseFault::InvalidResponse);
                assert_eq!(attempts, 3);
                assert_eq!(response, vec![0x00, 0x01]);
            }
            other => panic!("expected TransactionError, got {:?}", other),
        }
    }
}
