//! [`SerialLink`] over the `serialport` crate.

use crate::bms::DalyBms;
use crate::error::Result;
use crate::exchange::{ExchangeConfig, SerialLink, StdClock};
use std::io::{Read, Write};
use std::time::Duration;

/// Synchronous BMS client on a local serial port.
pub type DalyBMS = DalyBms<SerialPortLink, StdClock>;

#[derive(Debug)]
pub struct SerialPortLink {
    serial: Box<dyn serialport::SerialPort>,
}

impl SerialPortLink {
    /// Opens `port` with the BMS line settings, 9600 baud 8N1.
    pub fn open(port: &str) -> Result<Self> {
        let serial = serialport::new(port, 9600)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;
        Ok(Self { serial })
    }
}

impl SerialLink for SerialPortLink {
    fn flush(&mut self) -> std::io::Result<()> {
        // clear all incoming serial to avoid data collision
        loop {
            let pending = self.serial.bytes_to_read()?;
            if pending == 0 {
                break;
            }
            log::trace!("Got {} pending bytes", pending);
            let mut buf: Vec<u8> = vec![0; 64];
            match self.serial.read(buf.as_mut_slice()) {
                Ok(received) => log::trace!("Read {} pending bytes", received),
                Err(err) if err.kind() == std::io::ErrorKind::TimedOut => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.serial.write_all(bytes)
    }

    fn read(&mut self, size: usize, timeout: Duration) -> std::io::Result<Vec<u8>> {
        self.serial.set_timeout(timeout)?;
        let mut rx_buffer = vec![0; size];
        let mut received = 0;
        while received < size {
            match self.serial.read(&mut rx_buffer[received..]) {
                Ok(0) => break,
                Ok(n) => received += n,
                Err(err) if err.kind() == std::io::ErrorKind::TimedOut => break,
                Err(err) => return Err(err),
            }
        }
        rx_buffer.truncate(received);
        Ok(rx_buffer)
    }
}

impl DalyBMS {
    /// Opens `port` and creates a driver using `config`.
    pub fn open(port: &str, config: ExchangeConfig) -> Result<Self> {
        Ok(Self::new(SerialPortLink::open(port)?, StdClock, config))
    }
}
