use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::HashSet;
use std::time::Duration;

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverters: Vec<Inverter>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    /// Optional path to append readings to, one JSON object per line
    pub datalog_file: Option<String>,
    /// Optional path to append identities found by `init` to
    pub identity_file: Option<String>,

    #[serde(default = "Config::default_retries")]
    pub retries: u32,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_retry_delay")]
    pub retry_delay: Duration,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    #[value(name = "blackline")]
    BlackLine,
    #[value(name = "soladin")]
    Soladin,
}

impl Family {
    /// Width of the bus address on the wire.
    pub fn address_len(&self) -> usize {
        match self {
            Self::BlackLine => 1,
            Self::Soladin => 2,
        }
    }
}

// Inverter {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub id: u32,
    pub name: String,
    pub family: Family,

    pub port: String,
    pub baud_rate: Option<u32>,
    pub read_timeout_ms: Option<u64>,

    #[serde(default, deserialize_with = "de_address")]
    pub address: Option<Vec<u8>>,

    pub register_file: Option<String>,
}
impl Inverter {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate.unwrap_or(9600)
    }

    pub fn read_timeout_ms(&self) -> u64 {
        self.read_timeout_ms.unwrap_or(500)
    }

    pub fn address(&self) -> Option<&[u8]> {
        self.address.as_deref()
    }

    pub fn register_file(&self) -> Option<&str> {
        self.register_file.as_deref()
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Logs the loaded configuration; call once logging is up.
    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!(
            "  Inverters: {} configured, {} enabled",
            self.inverters.len(),
            self.inverters.iter().filter(|i| i.enabled).count()
        );
        for (i, inv) in self.inverters.iter().enumerate() {
            info!("    Inverter[{}]:", i);
            info!("      Enabled: {}", inv.enabled);
            info!("      Id: {}", inv.id);
            info!("      Name: {}", inv.name);
            info!("      Family: {:?}", inv.family);
            info!("      Port: {}", inv.port);
            info!("      Baud Rate: {}", inv.baud_rate());
            info!("      Read Timeout: {}ms", inv.read_timeout_ms());
            info!(
                "      Address: {}",
                inv.address()
                    .map(Utils::hex_from_bytes)
                    .unwrap_or_else(|| "probe".to_string())
            );
            if let Some(file) = &inv.register_file {
                info!("      Register File: {}", file);
            }
        }

        info!("  Retries: {} every {}s", self.retries, self.retry_delay.as_secs());
        info!(
            "  Datalog File: {}",
            self.datalog_file.as_deref().unwrap_or("none")
        );
        info!(
            "  Identity File: {}",
            self.identity_file.as_deref().unwrap_or("none")
        );
        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        if self.inverters.is_empty() {
            bail!("config.rs:at least one inverter must be configured");
        }

        let mut ids = HashSet::new();
        for (i, inv) in self.inverters.iter().enumerate() {
            if !ids.insert(inv.id) {
                bail!("inverter[{}].id {} is used more than once", i, inv.id);
            }
            if inv.port.is_empty() {
                bail!("inverter[{}].port cannot be empty", i);
            }
            if inv.baud_rate() == 0 {
                bail!("inverter[{}].baud_rate cannot be 0", i);
            }
            if inv.read_timeout_ms() == 0 {
                bail!("inverter[{}].read_timeout_ms cannot be 0", i);
            }
            if let Some(address) = inv.address() {
                if address.len() != inv.family.address_len() {
                    bail!(
                        "inverter[{}].address must be {} byte(s) for {:?}, got {}",
                        i,
                        inv.family.address_len(),
                        inv.family,
                        Utils::hex_from_bytes(address)
                    );
                }
            }
            if inv.register_file.is_some() && inv.family != Family::BlackLine {
                bail!("inverter[{}].register_file only applies to blackline inverters", i);
            }
        }

        if self.retries == 0 {
            bail!("retries must be at least 1");
        }

        Ok(())
    }

    pub fn enabled_inverters(&self) -> Vec<Inverter> {
        self.inverters.iter().filter(|i| i.enabled()).cloned().collect()
    }

    pub fn loglevel(&self) -> &str {
        &self.loglevel
    }

    pub fn datalog_file(&self) -> Option<&str> {
        self.datalog_file.as_deref()
    }

    pub fn identity_file(&self) -> Option<&str> {
        self.identity_file.as_deref()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_retries() -> u32 {
        3
    }

    fn default_retry_delay() -> Duration {
        Duration::from_secs(5)
    }
}

fn de_address<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.trim().is_empty() {
        Ok(None)
    } else {
        Utils::bytes_from_hex(&s)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
