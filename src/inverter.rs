use crate::prelude::*;

use crate::blackline::inverter::BlackLine;
use crate::register::RegisterDecoder;
use crate::soladin::inverter::Soladin;

use enum_dispatch::*;
use std::time::Duration;

/// What the poll loop needs from an inverter, whatever protocol it speaks.
#[enum_dispatch]
pub trait InverterCommon {
    fn config(&self) -> &config::Inverter;

    /// Bus address in use, as sent on the wire; `None` until configured or probed.
    fn bus_address(&self) -> Option<Vec<u8>>;

    /// Discovers the inverter's bus address and remembers it.
    fn query_bus_address(&mut self, transport: &mut dyn Transport) -> Result<Vec<u8>>;

    fn query_inverter_info(&mut self, transport: &mut dyn Transport) -> Result<Identity>;

    fn solar_data(&mut self, transport: &mut dyn Transport) -> Result<Reading>;
}

#[enum_dispatch(InverterCommon)]
#[derive(Clone, Debug)]
pub enum Inverter {
    BlackLine(BlackLine),
    Soladin(Soladin),
}

impl Inverter {
    pub fn from_config(config: &config::Inverter) -> Result<Self> {
        let inverter = match config.family() {
            Family::BlackLine => {
                let decoder = match config.register_file() {
                    Some(file) => RegisterDecoder::from_file(file)?,
                    None => RegisterDecoder::blackline(),
                };
                Self::BlackLine(BlackLine::new(config.clone(), decoder)?)
            }
            Family::Soladin => Self::Soladin(Soladin::new(config.clone())?),
        };

        Ok(inverter)
    }
}

// {{{ RetryPolicy
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.retries,
            delay: config.retry_delay,
        }
    }

    /// Runs `f` until it succeeds or the attempts are used up, sleeping in between.
    /// The last error is returned as-is.
    pub fn run<T, F>(&self, what: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut remaining = self.attempts.max(1);

        loop {
            let err = match f() {
                Ok(r) => return Ok(r),
                Err(err) => err,
            };
            remaining -= 1;

            let integrity = matches!(
                err.downcast_ref::<CodecError>(),
                Some(e) if e.is_integrity_failure()
            );

            if remaining == 0 {
                error!("{}: {}, giving up", what, err);
                return Err(err);
            }

            if integrity {
                error!("{}: CRC error: {}, retries left: {}", what, err, remaining);
            } else {
                warn!("{}: Message error: {}, retries left: {}", what, err, remaining);
            }
            std::thread::sleep(self.delay);
        }
    }
} // }}}

// {{{ Poller
pub struct Poller {
    retry: RetryPolicy,
}

impl Poller {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// One poll cycle. Never fails: an inverter that cannot be read yields an
    /// unsuccessful reading.
    pub fn poll(&self, inverter: &mut Inverter, transport: &mut dyn Transport) -> Reading {
        let id = inverter.config().id();
        let name = inverter.config().name().to_string();

        if inverter.bus_address().is_none() {
            let probed = self
                .retry
                .run(&name, || inverter.query_bus_address(&mut *transport));
            if probed.is_err() {
                return Reading::new(id, &name);
            }
        }

        match self.retry.run(&name, || inverter.solar_data(&mut *transport)) {
            Ok(reading) => {
                info!(
                    "{}: {}",
                    name,
                    reading.status_text.as_deref().unwrap_or("no status")
                );
                reading
            }
            Err(_) => Reading::new(id, &name),
        }
    }

    /// Probes the bus address afresh and asks the inverter who it is.
    pub fn identify(&self, inverter: &mut Inverter, transport: &mut dyn Transport) -> Result<Identity> {
        let name = inverter.config().name().to_string();

        let address = self
            .retry
            .run(&name, || inverter.query_bus_address(&mut *transport))?;
        info!("{}: bus address {}", name, Utils::hex_from_bytes(&address));

        self.retry
            .run(&name, || inverter.query_inverter_info(&mut *transport))
    }
} // }}}
