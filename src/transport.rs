use crate::prelude::*;

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read};
use std::time::Duration;

/// Byte pipe to one inverter.
pub trait Transport {
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Reads until the line has been quiet for one read timeout.
    fn read_until_idle(&mut self) -> Result<Vec<u8>>;

    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        debug!("TX {}", Utils::hex_from_bytes(command));
        self.write(command)?;

        let response = self.read_until_idle()?;
        debug!("RX {}", Utils::hex_from_bytes(&response));

        Ok(response)
    }
}

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    /// Opens the port 8N1 at the configured speed.
    pub fn open(inverter: &config::Inverter) -> Result<Self> {
        let port = serialport::new(inverter.port(), inverter.baud_rate())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(inverter.read_timeout_ms()))
            .open()
            .map_err(|err| anyhow!("cannot open {}: {}", inverter.port(), err))?;

        info!(
            "opened {} at {} baud for inverter {}",
            inverter.port(),
            inverter.baud_rate(),
            inverter.name()
        );

        Ok(Self {
            port,
            path: inverter.port().to_string(),
        })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if let Err(err) = self.port.clear(ClearBuffer::Input) {
            warn!("{}: cannot discard stale input: {}", self.path, err);
        }

        self.port.write_all(data)?;
        self.port.flush()?;

        Ok(())
    }

    fn read_until_idle(&mut self) -> Result<Vec<u8>> {
        let mut r = Vec::new();
        let mut buf = [0u8; 64];

        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => r.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::TimedOut => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => bail!("{}: read failed: {}", self.path, err),
            }
        }

        Ok(r)
    }
}
