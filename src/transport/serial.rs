//! Serial port transport
//!
//! Implements [Transport] on top of the `serialport` crate. ELM327-class
//! adapters enumerate as USB CDC or FTDI serial devices, almost always at
//! 38400 baud, 8N1, no flow control.

use std::time::Duration;

use crate::transport::{Transport, TransportError, TransportResult};

/// Serial (USB) transport to an adapter
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SerialTransport {{ port: {}, baud: {}, open: {} }}",
            self.port_name,
            self.baud_rate,
            self.port.is_some()
        )
    }
}

impl SerialTransport {
    /// Creates a new serial transport. The port is not touched until
    /// [Transport::open] is called.
    pub fn new<T: Into<String>>(port_name: T, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            read_timeout,
            port: None,
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> TransportResult<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| TransportError::Open(format!("{}: {e}", self.port_name)))?;
        log::info!(
            "Connected to adapter on {} at {} baud",
            self.port_name,
            self.baud_rate
        );
        self.port = Some(port);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> TransportResult<()> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        port.write_all(bytes).map_err(TransportError::Write)
    }

    fn read_available(&mut self) -> TransportResult<Vec<u8>> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;
        let pending = port
            .bytes_to_read()
            .map_err(|e| TransportError::Read(std::io::Error::other(e)))?;
        if pending == 0 {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; pending as usize];
        let read = port.read(&mut buffer).map_err(TransportError::Read)?;
        buffer.truncate(read);
        Ok(buffer)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("Disconnected from {}", self.port_name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
