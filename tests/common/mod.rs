#![allow(dead_code)]

use solarstats::blackline::packet::Crc16;
use solarstats::inverter::RetryPolicy;
use solarstats::prelude::*;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

pub fn hex(s: &str) -> Vec<u8> {
    Utils::bytes_from_hex(s).unwrap()
}

pub struct Factory;
impl Factory {
    // {{{ BlackLine frames
    pub fn blackline_bus_query_response() -> Vec<u8> {
        hex("FF 03 02 00 02 10 51")
    }

    pub fn blackline_serial_response() -> Vec<u8> {
        hex("02 04 06 42 06 12 43 50 30 3B F9")
    }

    pub fn blackline_model_response() -> Vec<u8> {
        hex("02 04 04 00 1E 01 F7 E8 94")
    }

    /// Registers 0x0A..=0x28 of an inverter feeding about 1.2 kW into the grid.
    pub fn blackline_data_payload() -> Vec<u8> {
        hex(concat!(
            "09 98 00 00 00 34 00 00 09 1B 00 00 00 00 00 33 ",
            "00 00 00 00 13 89 00 00 2E 4C 00 49 00 00 6D 1F ",
            "00 00 01 9C 00 00 20 35 01 9C 01 FE 00 00 00 00 ",
            "00 03 00 00 00 00 00 00 00 00 00 00 00 01"
        ))
    }

    pub fn blackline_data_response() -> Vec<u8> {
        let payload = Self::blackline_data_payload();
        let mut r = vec![0x02, 0x04, payload.len() as u8];
        r.extend_from_slice(&payload);
        let crc = Crc16::calculate(&r);
        r.extend_from_slice(&crc);
        r
    }

    /// A data reply with `len` payload bytes announced as `byte_count`, sealed with a valid CRC.
    pub fn blackline_data_response_with(len: usize, byte_count: u8) -> Vec<u8> {
        let mut r = vec![0x02, 0x04, byte_count];
        r.extend_from_slice(&Self::blackline_data_payload()[..len]);
        let crc = Crc16::calculate(&r);
        r.extend_from_slice(&crc);
        r
    }

    pub fn corrupted(mut frame: Vec<u8>) -> Vec<u8> {
        if let Some(last) = frame.last_mut() {
            *last ^= 0x01;
        }
        frame
    }
    // }}}

    // {{{ Soladin frames
    pub fn soladin_probe_response() -> Vec<u8> {
        hex("00 00 11 00 C1 F3 00 00 C5")
    }

    pub fn soladin_firmware_response() -> Vec<u8> {
        hex(concat!(
            "00 00 11 00 B4 F3 00 00 00 00 00 00 00 E3 00 04 ",
            "01 34 06 00 00 00 00 00 00 00 00 00 00 00 DA"
        ))
    }

    pub fn soladin_stats_response() -> Vec<u8> {
        hex(concat!(
            "00 00 11 00 B6 F3 00 00 04 03 35 00 8A 13 F4 00 ",
            "00 00 24 00 90 0B 00 1F DB BC 01 00 00 00 FD"
        ))
    }

    pub fn soladin_max_power_response() -> Vec<u8> {
        hex(concat!(
            "00 00 11 00 B9 F3 00 00 20 00 00 00 1B 00 21 00 ",
            "22 00 00 00 E5 02 7E 48 36 00 00 00 00 00 1E"
        ))
    }

    pub fn soladin_history_response() -> Vec<u8> {
        hex("00 00 11 00 9A 54 05 04")
    }

    pub fn soladin_reset_max_response() -> Vec<u8> {
        hex("00 00 11 00 97 01 00 00 A9")
    }
    // }}}

    pub fn blackline_config(address: Option<&str>) -> config::Inverter {
        config::Inverter {
            enabled: true,
            id: 1,
            name: "BlackLine".to_string(),
            family: Family::BlackLine,
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: None,
            read_timeout_ms: None,
            address: address.map(hex),
            register_file: None,
        }
    }

    pub fn soladin_config(address: Option<&str>) -> config::Inverter {
        config::Inverter {
            enabled: true,
            id: 2,
            name: "Soladin".to_string(),
            family: Family::Soladin,
            port: "/dev/ttyUSB1".to_string(),
            baud_rate: None,
            read_timeout_ms: None,
            address: address.map(hex),
            register_file: None,
        }
    }

    pub fn retry_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        }
    }
}

/// Plays back canned responses, one per exchange, and keeps what was written.
pub struct MockTransport {
    responses: VecDeque<Vec<u8>>,
    sent: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl MockTransport {
    pub fn new(responses: Vec<Vec<u8>>) -> Self {
        Self {
            responses: responses.into(),
            sent: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }

    /// Handle on the sent frames that outlives the transport.
    pub fn sent_log(&self) -> Rc<RefCell<Vec<Vec<u8>>>> {
        self.sent.clone()
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.sent.borrow_mut().push(data.to_vec());
        Ok(())
    }

    fn read_until_idle(&mut self) -> Result<Vec<u8>> {
        Ok(self.responses.pop_front().unwrap_or_default())
    }
}
