use crate::prelude::*;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Slave address every BlackLine inverter answers on; used to discover the real one.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHold = 3,
    ReadInput = 4,
}

// {{{ Crc16
/// CRC-16 as used on the Modbus RTU line: reflected polynomial 0xA001, preset 0xFFFF.
pub struct Crc16;
impl Crc16 {
    /// Returns the two trailer bytes, low byte first.
    pub fn calculate(data: &[u8]) -> [u8; 2] {
        let mut crc: u16 = 0xFFFF;

        for &byte in data {
            crc ^= u16::from(byte);
            for _ in 0..8 {
                if crc & 0x0001 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }

        crc.to_le_bytes()
    }
} // }}}

// {{{ ReadRegisters
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadRegisters {
    pub slave: u8,
    pub function: FunctionCode,
    pub register: u16,
    pub count: u16,
}

impl ReadRegisters {
    pub fn new(slave: u8, function: FunctionCode, register: u16, count: u16) -> Self {
        Self {
            slave,
            function,
            register,
            count,
        }
    }

    /// Asks the bus who is out there; the answer carries the slave address.
    pub fn bus_query() -> Self {
        Self::new(BROADCAST_ADDRESS, FunctionCode::ReadHold, 0x3C, 1)
    }

    pub fn serial_number(slave: u8) -> Self {
        Self::new(slave, FunctionCode::ReadInput, 0x00, 3)
    }

    pub fn model_firmware(slave: u8) -> Self {
        Self::new(slave, FunctionCode::ReadInput, 0x2B, 2)
    }

    pub fn inverter_data(slave: u8) -> Self {
        Self::new(slave, FunctionCode::ReadInput, 0x0A, 0x1F)
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut r = Vec::with_capacity(8);

        r.push(self.slave);
        r.push(self.function.into());
        r.extend_from_slice(&self.register.to_be_bytes());
        r.extend_from_slice(&self.count.to_be_bytes());
        r.extend_from_slice(&Crc16::calculate(&r));

        r
    }
} // }}}

// {{{ Response
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub address: u8,
    pub function: u8,
    pub byte_count: u8,
    pub data: Vec<u8>,
}

impl Response {
    pub fn decode(input: &[u8]) -> Result<Self, CodecError> {
        let len = input.len();
        if len < 3 {
            return Err(CodecError::ShortResponse {
                expected: 3,
                actual: len,
            });
        }

        let (body, trailer) = input.split_at(len - 2);
        let expected = Crc16::calculate(body);
        if trailer != expected {
            return Err(CodecError::CrcMismatch {
                expected,
                actual: [trailer[0], trailer[1]],
            });
        }

        let data = input.get(3..len - 2).unwrap_or_default().to_vec();
        if data.len() != usize::from(input[2]) {
            debug!(
                "byte count {} does not match {} data bytes received",
                input[2],
                data.len()
            );
        }

        Ok(Self {
            address: input[0],
            function: input[1],
            byte_count: input[2],
            data,
        })
    }

    /// The function code echoed back. Exception replies set the high bit and are rejected.
    pub fn function_code(&self) -> Result<FunctionCode, CodecError> {
        FunctionCode::try_from(self.function).map_err(|_| CodecError::UnknownFunction(self.function))
    }

    /// Register `index` of the payload, counted from the first register requested.
    pub fn register(&self, index: usize) -> Option<u16> {
        let offset = index * 2;
        if offset + 2 > self.data.len() {
            return None;
        }
        Some(Utils::be_u16(&self.data, offset))
    }
} // }}}

pub struct StatusString;
impl StatusString {
    pub fn from_value(status: u64) -> String {
        match status {
            0 => "Inverter not running".to_string(),
            1 => "Inverter in operation".to_string(),
            n => format!("Unknown: {}", n),
        }
    }
}
