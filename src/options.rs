use crate::config::Family;

use clap::{Parser, Subcommand};

/// solarstats - polls BlackLine Solar and Soladin inverters over serial links
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    #[clap(subcommand)]
    pub command: Option<Action>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Action {
    /// Poll every enabled inverter once (the default)
    Poll,

    /// Probe bus addresses and record what each inverter reports about itself
    Init,

    /// Decode captured response frames without touching a serial port
    Decode {
        #[clap(long, value_enum)]
        family: Family,

        /// Frames as hex, eg. "02 04 06 ..."; for soladin: stats, then optionally
        /// max power and history
        #[clap(required = true)]
        frames: Vec<String>,
    },

    /// Clear the daily maximum power of every enabled Soladin
    ResetMax,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }

    pub fn action(&self) -> Action {
        self.command.clone().unwrap_or(Action::Poll)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
