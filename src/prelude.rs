pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};

pub use crate::config::{self, Config, Family};
pub use crate::error::CodecError;
pub use crate::options::Options;
pub use crate::reading::{Identity, Reading};
pub use crate::transport::Transport;
pub use crate::utils::Utils;

pub use std::convert::TryFrom;
pub use std::io::Write;
