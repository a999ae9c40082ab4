pub mod blackline;
pub mod config;
pub mod datalog_writer;
pub mod error;
pub mod inverter;
pub mod options;
pub mod prelude;
pub mod reading;
pub mod register;
pub mod soladin;
pub mod transport;
pub mod utils;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::blackline::inverter::BlackLine;
use crate::datalog_writer::DatalogWriter;
use crate::inverter::{Inverter, InverterCommon, Poller, RetryPolicy};
use crate::options::Action;
use crate::prelude::*;
use crate::register::RegisterDecoder;
use crate::soladin::inverter::Soladin;
use crate::transport::SerialTransport;

/// Opens the byte pipe for one configured inverter.
pub type Opener<'a> = dyn FnMut(&config::Inverter) -> Result<Box<dyn Transport>> + 'a;

pub fn init_logging(loglevel: &str) {
    if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(loglevel))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

pub fn app(options: Options) -> Result<()> {
    if let Action::Decode { family, frames } = options.action() {
        init_logging("info");
        let reading = decode(family, &frames)?;
        println!("{}", serde_json::to_string_pretty(&reading)?);
        return Ok(());
    }

    let config = Config::new(options.config_file.clone())?;
    init_logging(config.loglevel());
    info!(
        "solarstats {} starting with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );
    config.log_summary();

    let mut open = |inverter: &config::Inverter| -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(inverter)?))
    };

    match options.action() {
        Action::Init => init(&config, &mut open).map(|_| ()),
        Action::ResetMax => reset_max(&config, &mut open),
        _ => {
            let readings = poll(&config, &mut open)?;
            let ok = readings.iter().filter(|r| r.success).count();
            info!("{} of {} inverters read successfully", ok, readings.len());
            Ok(())
        }
    }
}

/// Polls every enabled inverter once, one after the other, and stores the readings.
pub fn poll(config: &Config, open: &mut Opener) -> Result<Vec<Reading>> {
    let poller = Poller::new(RetryPolicy::from_config(config));
    let mut writer = config.datalog_file().map(DatalogWriter::new).transpose()?;
    let mut readings = Vec::new();

    for inverter_config in config.enabled_inverters() {
        let reading = match Inverter::from_config(&inverter_config).and_then(|inverter| {
            open(&inverter_config).map(|transport| (inverter, transport))
        }) {
            Ok((mut inverter, mut transport)) => poller.poll(&mut inverter, transport.as_mut()),
            Err(err) => {
                error!("{}: {}", inverter_config.name(), err);
                Reading::new(inverter_config.id(), inverter_config.name())
            }
        };

        if !reading.success {
            warn!("{}: poll failed", inverter_config.name());
        }
        if let Some(writer) = writer.as_mut() {
            writer.write_reading(&reading)?;
        }
        readings.push(reading);
    }

    Ok(readings)
}

/// Discovers bus addresses and records each inverter's identity.
pub fn init(config: &Config, open: &mut Opener) -> Result<Vec<Identity>> {
    let poller = Poller::new(RetryPolicy::from_config(config));
    let mut writer = config.identity_file().map(DatalogWriter::new).transpose()?;
    let mut identities = Vec::new();

    for inverter_config in config.enabled_inverters() {
        let identity = Inverter::from_config(&inverter_config).and_then(|mut inverter| {
            let mut transport = open(&inverter_config)?;
            poller.identify(&mut inverter, transport.as_mut())
        });

        match identity {
            Ok(identity) => {
                info!(
                    "{}: {} {} serial '{}' firmware {} at address {}",
                    inverter_config.name(),
                    identity.manufacturer,
                    identity.model,
                    identity.serial,
                    identity.firmware,
                    identity.address
                );
                if let Some(writer) = writer.as_mut() {
                    writer.write_identity(&identity)?;
                }
                identities.push(identity);
            }
            Err(err) => error!("{}: init failed: {}", inverter_config.name(), err),
        }
    }

    Ok(identities)
}

pub fn reset_max(config: &Config, open: &mut Opener) -> Result<()> {
    let retry = RetryPolicy::from_config(config);

    for inverter_config in config.enabled_inverters() {
        if inverter_config.family() != Family::Soladin {
            debug!("{}: no maximum power to reset", inverter_config.name());
            continue;
        }
        let mut inverter = Soladin::new(inverter_config.clone())?;

        let mut transport = open(&inverter_config)?;
        if inverter.bus_address().is_none() {
            retry.run(inverter_config.name(), || {
                inverter.query_bus_address(transport.as_mut())
            })?;
        }
        retry.run(inverter_config.name(), || {
            inverter.reset_max_power(transport.as_mut())
        })?;
    }

    Ok(())
}

/// Decodes captured response frames into a reading.
pub fn decode(family: Family, frames: &[String]) -> Result<Reading> {
    let frames = frames
        .iter()
        .map(|f| Utils::bytes_from_hex(f))
        .collect::<Result<Vec<_>, _>>()?;

    let first = match frames.first() {
        Some(first) => first,
        None => bail!("no frames to decode"),
    };

    let inverter_config = config::Inverter {
        enabled: true,
        id: 0,
        name: "decode".to_string(),
        family,
        port: String::new(),
        baud_rate: None,
        read_timeout_ms: None,
        address: None,
        register_file: None,
    };

    match family {
        Family::BlackLine => {
            if frames.len() > 1 {
                warn!("only the first frame is decoded for blackline");
            }
            let inverter = BlackLine::new(inverter_config, RegisterDecoder::blackline())?;
            let response = blackline::packet::Response::decode(first)?;
            let mut reading = Reading::new(0, "decode");
            inverter.decode_data(&response.data, &mut reading);
            Ok(reading)
        }
        Family::Soladin => {
            let inverter = Soladin::new(inverter_config)?;
            let stats = soladin::packet::Response::decode(first)?.stats()?;
            let max_power = match frames.get(1) {
                Some(f) => Some(soladin::packet::Response::decode(f)?.max_power()?),
                None => None,
            };
            let history = match frames.get(2) {
                Some(f) => Some(soladin::packet::Response::decode(f)?.history()?),
                None => None,
            };
            Ok(inverter.decode(&stats, max_power.as_ref(), history.as_ref()))
        }
    }
}
