use crate::prelude::*;

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Base register of the bulk inverter data read.
pub const BLACKLINE_BASE_REGISTER: u16 = 0x0A;

const BLACKLINE_REGISTERS: &[(u16, &str)] = &[
    (0x0A, "VoltsPV1"),
    (0x0B, "VoltsPV2"),
    (0x0C, "CurrentPV1"),
    (0x0D, "CurrentPV2"),
    (0x0E, "VoltsAC1"),
    (0x0F, "VoltsAC2"),
    (0x10, "VoltsAC3"),
    (0x11, "CurrentAC1"),
    (0x12, "CurrentAC2"),
    (0x13, "CurrentAC3"),
    (0x14, "FrequencyAC"),
    (0x15, "PowerAC"),
    (0x16, "PowerAC"),
    (0x17, "EnergyToday"),
    (0x18, "EnergyTotal"),
    (0x19, "EnergyTotal"),
    (0x1A, "MinToday"),
    (0x1B, "MinToday"),
    (0x1C, "HrsTotal"),
    (0x1D, "HrsTotal"),
    (0x1E, "Temperature"),
    (0x1F, "unknown"), // Iac-Shift
    (0x20, "blank"),
    (0x21, "blank"),
    (0x22, "unknown"), // DCI
    (0x23, "blank"),
    (0x24, "blank"),
    (0x25, "blank"),
    (0x26, "blank"),
    (0x27, "Status1"),
    (0x28, "Status2"),
];

const BLACKLINE_SCALES: &[(&str, f64)] = &[
    ("VoltsPV1", 10.0),
    ("VoltsPV2", 10.0),
    ("CurrentPV1", 10.0),
    ("CurrentPV2", 10.0),
    ("VoltsAC1", 10.0),
    ("VoltsAC2", 10.0),
    ("VoltsAC3", 10.0),
    ("CurrentAC1", 10.0),
    ("CurrentAC2", 10.0),
    ("CurrentAC3", 10.0),
    ("FrequencyAC", 100.0),
    ("PowerAC", 10.0),
    ("EnergyToday", 10.0),
    ("EnergyTotal", 10.0),
    ("MinToday", 1.0),
    ("HrsTotal", 1.0),
    ("Temperature", 10.0),
    ("Status1", 1.0),
    ("Status2", 1.0),
];

/// How the two halves of a quantity spread over consecutive registers are joined.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    /// high + low, matching the figures the inverters have always been logged with
    #[default]
    Sum,
    /// high << 16 | low
    Wide,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Register {
    pub number: u16,
    pub name: String,
}

// {{{ RegisterMap
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMap {
    base: u16,
    names: BTreeMap<u16, String>,
}

impl RegisterMap {
    pub fn new<I, S>(base: u16, registers: I) -> Self
    where
        I: IntoIterator<Item = (u16, S)>,
        S: Into<String>,
    {
        Self {
            base,
            names: registers
                .into_iter()
                .map(|(number, name)| (number, name.into()))
                .collect(),
        }
    }

    pub fn blackline() -> Self {
        Self::new(BLACKLINE_BASE_REGISTER, BLACKLINE_REGISTERS.iter().copied())
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn is_blank(name: &str) -> bool {
        name == "blank" || name == "unknown"
    }

    /// Quantity stored at `register`; `None` for blank, reserved or unmapped registers.
    pub fn name(&self, register: u16) -> Option<&str> {
        self.names
            .get(&register)
            .map(String::as_str)
            .filter(|name| !Self::is_blank(name))
    }

    /// Every quantity name in the map, once, in register order.
    pub fn quantities(&self) -> Vec<&str> {
        let mut r: Vec<&str> = Vec::new();
        for name in self.names.values().map(String::as_str) {
            if !Self::is_blank(name) && !r.contains(&name) {
                r.push(name);
            }
        }
        r
    }
} // }}}

// {{{ ScaleTable
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTable {
    divisors: HashMap<String, f64>,
}

impl ScaleTable {
    pub fn new(divisors: HashMap<String, f64>) -> Self {
        Self { divisors }
    }

    pub fn blackline() -> Self {
        Self::new(
            BLACKLINE_SCALES
                .iter()
                .map(|(name, divisor)| (name.to_string(), *divisor))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.divisors.get(name).copied()
    }
} // }}}

/// On-disk form of a register map, eg.
///
/// ```json
/// { "base_register": 10, "combine": "sum",
///   "registers": [{ "number": 10, "name": "VoltsPV1" }],
///   "scale_factors": { "VoltsPV1": 10 } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterFile {
    pub base_register: u16,
    #[serde(default)]
    pub combine: Combine,
    pub registers: Vec<Register>,
    pub scale_factors: HashMap<String, f64>,
}

// {{{ RegisterDecoder
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterDecoder {
    map: RegisterMap,
    scales: ScaleTable,
    combine: Combine,
}

impl RegisterDecoder {
    pub fn new(map: RegisterMap, scales: ScaleTable, combine: Combine) -> Result<Self> {
        Self::validate(&map, &scales)?;
        Ok(Self {
            map,
            scales,
            combine,
        })
    }

    pub fn blackline() -> Self {
        Self {
            map: RegisterMap::blackline(),
            scales: ScaleTable::blackline(),
            combine: Combine::default(),
        }
    }

    pub fn from_file(register_file: &str) -> Result<Self> {
        let content = std::fs::read_to_string(register_file)
            .map_err(|err| anyhow!("Error reading register file {}: {}", register_file, err))?;

        Self::from_json(&content)
            .map_err(|err| anyhow!("Error parsing register file {}: {}", register_file, err))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: RegisterFile = serde_json::from_str(content)?;

        let map = RegisterMap::new(
            file.base_register,
            file.registers.into_iter().map(|r| (r.number, r.name)),
        );

        Self::new(map, ScaleTable::new(file.scale_factors), file.combine)
    }

    /// Every named quantity needs exactly one positive divisor.
    pub fn validate(map: &RegisterMap, scales: &ScaleTable) -> Result<()> {
        for name in map.quantities() {
            match scales.get(name) {
                Some(divisor) if divisor > 0.0 => {}
                Some(divisor) => bail!("scale factor for {} must be positive, got {}", name, divisor),
                None => bail!("no scale factor for {}", name),
            }
        }

        Ok(())
    }

    pub fn with_combine(mut self, combine: Combine) -> Self {
        self.combine = combine;
        self
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    /// Decodes a register payload whose first word is the map's base register.
    ///
    /// Raw words are gathered per quantity first; a quantity seen on several registers
    /// has its halves joined (first seen is the high half) and is scaled once.
    /// Results come back in register order.
    pub fn decode(&self, data: &[u8]) -> Vec<(String, f64)> {
        let mut raw: Vec<(&str, u64)> = Vec::new();

        for (i, word) in data.chunks_exact(2).enumerate() {
            let register = self.map.base().wrapping_add(i as u16);
            let name = match self.map.name(register) {
                Some(name) => name,
                None => continue,
            };
            let value = u64::from(u16::from_be_bytes([word[0], word[1]]));

            match raw.iter_mut().find(|(n, _)| *n == name) {
                Some((_, acc)) => {
                    *acc = match self.combine {
                        Combine::Sum => *acc + value,
                        Combine::Wide => *acc << 16 | value,
                    }
                }
                None => raw.push((name, value)),
            }
        }

        if data.len() % 2 != 0 {
            debug!("ignoring trailing odd byte of register payload");
        }

        raw.into_iter()
            .filter_map(|(name, value)| {
                self.scales
                    .get(name)
                    .map(|divisor| (name.to_string(), value as f64 / divisor))
            })
            .collect()
    }
} // }}}
