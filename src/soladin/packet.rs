use crate::prelude::*;

use nom_derive::{Nom, Parse};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

/// Two byte bus address, sent as-is on the wire.
pub type Address = [u8; 2];

/// Address of the polling side; the inverter's own address is learnt with a probe.
pub const MASTER_ADDRESS: Address = [0x00, 0x00];

pub const FRAME_LEN: usize = 9;

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    ResetMax = 0x97,
    History = 0x9A,
    Firmware = 0xB4,
    Stats = 0xB6,
    MaxPower = 0xB9,
    Probe = 0xC1,
}

impl Opcode {
    /// Full length of the reply, checksum included.
    pub fn response_length(&self) -> usize {
        match self {
            Self::Probe | Self::ResetMax => 9,
            Self::History => 8,
            Self::Firmware | Self::Stats | Self::MaxPower => 31,
        }
    }

    pub fn expected_response_length(opcode: u8) -> usize {
        Self::try_from(opcode)
            .map(|o| o.response_length())
            .unwrap_or(1)
    }
}

pub struct Checksum;
impl Checksum {
    /// Sum modulo 256 of every byte but the last, which is where the checksum lives.
    pub fn calculate(frame: &[u8]) -> u8 {
        match frame.split_last() {
            Some((_, body)) => body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)),
            None => 0,
        }
    }
}

// {{{ Command
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Command {
    pub destination: Address,
    pub source: Address,
    pub opcode: Opcode,
    pub filler: [u8; 3],
}

impl Command {
    pub fn new(destination: Address, source: Address, opcode: Opcode) -> Self {
        let filler = match opcode {
            Opcode::ResetMax => [0x01, 0x00, 0x00],
            _ => [0x00, 0x00, 0x00],
        };

        Self {
            destination,
            source,
            opcode,
            filler,
        }
    }

    /// History for `day` days ago; 0 is today, the inverter keeps ten days.
    pub fn history(destination: Address, source: Address, day: u8) -> Result<Self> {
        if day > 9 {
            bail!("history day must be between 0 and 9, got {}", day);
        }

        let mut command = Self::new(destination, source, Opcode::History);
        command.filler[0] = day;
        Ok(command)
    }

    pub fn bytes(&self) -> [u8; FRAME_LEN] {
        let mut r = [0; FRAME_LEN];

        r[0..2].copy_from_slice(&self.destination);
        r[2..4].copy_from_slice(&self.source);
        r[4] = self.opcode.into();
        r[5..8].copy_from_slice(&self.filler);
        r[8] = Checksum::calculate(&r);

        r
    }
} // }}}

// {{{ Response
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub destination: Address,
    pub source: Address,
    pub opcode: u8,
    pub data: Vec<u8>,
}

impl Response {
    pub fn decode(input: &[u8]) -> Result<Self, CodecError> {
        let len = input.len();
        if len < 5 {
            return Err(CodecError::ShortResponse {
                expected: 5,
                actual: len,
            });
        }

        let opcode = input[4];
        let expected_len = Opcode::expected_response_length(opcode);
        if len < expected_len {
            return Err(CodecError::ShortResponse {
                expected: expected_len,
                actual: len,
            });
        }

        let expected = Checksum::calculate(input);
        let actual = input[len - 1];
        if expected != actual {
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            destination: [input[0], input[1]],
            source: [input[2], input[3]],
            opcode,
            data: input.get(5..len - 1).unwrap_or_default().to_vec(),
        })
    }

    pub fn stats(&self) -> Result<Stats> {
        match Stats::parse(&self.data) {
            Ok((_, r)) => Ok(r),
            Err(_) => bail!("stats payload too short: {} bytes", self.data.len()),
        }
    }

    pub fn max_power(&self) -> Result<MaxPower> {
        match MaxPower::parse(&self.data) {
            Ok((_, r)) => Ok(r),
            Err(_) => bail!("max power payload too short: {} bytes", self.data.len()),
        }
    }

    pub fn history(&self) -> Result<History> {
        match History::parse(&self.data) {
            Ok((_, r)) => Ok(r),
            Err(_) => bail!("history payload too short: {} bytes", self.data.len()),
        }
    }

    pub fn firmware(&self) -> Result<Firmware> {
        match Firmware::parse(&self.data) {
            Ok((_, r)) => Ok(r),
            Err(_) => bail!("firmware payload too short: {} bytes", self.data.len()),
        }
    }
} // }}}

// {{{ payloads
#[derive(PartialEq, Clone, Debug, Serialize, Nom)]
#[nom(LittleEndian)]
pub struct Stats {
    #[nom(SkipBefore(1))]
    pub status: u16,
    #[nom(Parse = "Utils::le_u16_div10")]
    pub v_solar: f64,
    #[nom(Parse = "Utils::le_u16_div100")]
    pub i_solar: f64,
    #[nom(Parse = "Utils::le_u16_div100")]
    pub f_grid: f64,
    #[nom(Parse = "Utils::le_u16_div1")]
    pub v_grid: f64,

    #[nom(SkipBefore(2))]
    #[nom(Parse = "Utils::le_u16_div1")]
    pub p_output: f64,
    #[nom(Parse = "Utils::le_u24_div100")]
    pub e_total: f64,
    #[nom(Parse = "Utils::le_u8_div1")]
    pub temperature: f64,
    // operating minutes
    #[nom(Parse = "Utils::le_u24_div60")]
    pub h_total: f64,
}

#[derive(PartialEq, Clone, Debug, Serialize, Nom)]
#[nom(LittleEndian)]
pub struct MaxPower {
    #[nom(SkipBefore(19))]
    #[nom(Parse = "Utils::le_u16_div1")]
    pub p_max_today: f64,
}

#[derive(PartialEq, Clone, Debug, Serialize, Nom)]
#[nom(LittleEndian)]
pub struct History {
    #[nom(Parse = "Utils::le_u8_mul5")]
    pub minutes: f64,
    #[nom(Parse = "Utils::le_u8_div100")]
    pub e_day: f64,
}

#[derive(PartialEq, Clone, Debug, Serialize, Nom)]
#[nom(LittleEndian)]
pub struct Firmware {
    #[nom(SkipBefore(10))]
    pub id: u16,
    pub date: u16,
}

impl Firmware {
    pub fn version(&self) -> String {
        format!("{:04X}_{:04X}", self.id, self.date)
    }
}
// }}}

pub struct StatusString;
impl StatusString {
    pub fn from_value(status: u16) -> String {
        if status == 0 {
            return "Inverter in operation".to_string();
        }

        (0..12)
            .find(|&bit| status & (1u16 << bit) != 0)
            .map(|bit| Self::from_bit(bit).to_string())
            .unwrap_or_else(|| format!("Unknown: {}", status))
    }

    fn from_bit(bit: u16) -> &'static str {
        match bit {
            0 => "Solar input voltage too high",
            1 => "Solar input voltage too low",
            2 => "No input from mains",
            3 => "Mains voltage too high",
            4 => "Mains voltage too low",
            5 => "Mains frequency too high",
            6 => "Mains frequency too low",
            7 => "Temperature error",
            8 => "Hardware error",
            9 => "Starting up",
            10 => "Max solar output",
            _ => "Max output",
        }
    }
}
