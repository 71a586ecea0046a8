use log::{debug, error, info};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::utils::error::MeterError;

/// Blocking, half-duplex byte transport to the meter.
///
/// `read` returns as soon as a response has been received or the idle timeout
/// elapsed; it does not have to fill `buf`. A timeout with nothing received is
/// `Ok(0)`, not an error.
pub trait ByteChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn close(&mut self) -> io::Result<()>;
}

/// `ByteChannel` over a serial port configured 8N1, no flow control.
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
    response_timeout: Duration,
    inter_byte_timeout: Duration,
}

impl SerialChannel {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        response_timeout: Duration,
        inter_byte_timeout: Duration,
    ) -> Result<Self, MeterError> {
        info!("Opening serial port {} at {} baud", port_name, baud_rate);

        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .timeout(response_timeout)
            .open()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", port_name, e);
                MeterError::ChannelError(format!("Unable to open {}: {}", port_name, e))
            })?;

        // Drop whatever a previous session left in the buffers.
        port.clear(serialport::ClearBuffer::All)?;

        Ok(Self {
            port: Some(port),
            port_name: port_name.to_string(),
            response_timeout,
            inter_byte_timeout,
        })
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
    }
}

impl ByteChannel for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let port = self.port_mut()?;
        port.write_all(buf)?;
        port.flush()?;
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let response_timeout = self.response_timeout;
        let inter_byte_timeout = self.inter_byte_timeout;
        let port = self.port_mut()?;

        // Wait up to the response timeout for the first bytes, then keep
        // collecting until the line has been idle for the inter-byte gap.
        port.set_timeout(response_timeout)?;
        let mut filled = 0;

        while filled < buf.len() {
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    port.set_timeout(inter_byte_timeout)?;
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e),
            }
        }

        Ok(filled)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            debug!("Closed serial port {}", self.port_name);
        }
        Ok(())
    }
}
