use crate::prelude::*;

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;

/// One poll cycle's worth of decoded values for one inverter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    pub inverter_id: u32,
    pub name: String,
    pub success: bool,
    pub time: DateTime<Local>,
    pub values: BTreeMap<String, f64>,
    #[serde(rename = "statusText")]
    pub status_text: Option<String>,
    /// Response payloads as received, hex encoded
    pub raw: Vec<String>,
}

impl Reading {
    pub fn new(inverter_id: u32, name: &str) -> Self {
        Self {
            inverter_id,
            name: name.to_string(),
            success: false,
            time: Local::now(),
            values: BTreeMap::new(),
            status_text: None,
            raw: Vec::new(),
        }
    }

    pub fn set(&mut self, quantity: &str, value: f64) {
        self.values.insert(quantity.to_string(), value);
    }

    pub fn get(&self, quantity: &str) -> Option<f64> {
        self.values.get(quantity).copied()
    }

    pub fn push_raw(&mut self, data: &[u8]) {
        self.raw.push(Utils::hex_from_bytes(data));
    }
}

/// What an inverter says about itself during init.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Identity {
    pub inverter_id: u32,
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub rated_power: String,
    /// Bus address as hex, eg. `02` or `11 00`
    pub address: String,
}
