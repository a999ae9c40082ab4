use crate::prelude::*;

use crate::inverter::InverterCommon;
use crate::soladin::packet::{
    Address, Command, History, MaxPower, Opcode, Response, Stats, StatusString, MASTER_ADDRESS,
};

/// Mastervolt Soladin 600.
#[derive(Clone, Debug)]
pub struct Soladin {
    config: config::Inverter,
    address: Option<Address>,
}

impl Soladin {
    pub fn new(config: config::Inverter) -> Result<Self> {
        let address = match config.address() {
            Some(&[lo, hi]) => Some([lo, hi]),
            Some(other) => bail!(
                "{}: bus address must be two bytes, got {}",
                config.name(),
                Utils::hex_from_bytes(other)
            ),
            None => None,
        };

        Ok(Self { config, address })
    }

    fn address(&self) -> Result<Address> {
        self.address
            .ok_or_else(|| anyhow!("{}: bus address unknown", self.config.name()))
    }

    fn request(&self, transport: &mut dyn Transport, command: Command) -> Result<Response> {
        let raw = transport.exchange(&command.bytes())?;
        let response = Response::decode(&raw)?;

        if response.opcode != u8::from(command.opcode) {
            bail!(
                "{}: sent opcode {:02X}, answer carries {:02X}",
                self.config.name(),
                u8::from(command.opcode),
                response.opcode
            );
        }

        Ok(response)
    }

    fn command(&self, opcode: Opcode) -> Result<Command> {
        Ok(Command::new(self.address()?, MASTER_ADDRESS, opcode))
    }

    /// Builds a reading from the decoded payloads; max power and history are optional.
    pub fn decode(
        &self,
        stats: &Stats,
        max_power: Option<&MaxPower>,
        history: Option<&History>,
    ) -> Reading {
        let mut reading = Reading::new(self.config.id(), self.config.name());

        reading.set("VoltsPV1", stats.v_solar);
        reading.set("CurrentPV1", stats.i_solar);
        reading.set("VoltsAC1", stats.v_grid);
        reading.set("FrequencyAC", stats.f_grid);
        reading.set("PowerAC", stats.p_output);
        reading.set("Temperature", stats.temperature);
        reading.set("EnergyTotal", stats.e_total);
        reading.set("HrsTotal", Utils::round(stats.h_total, 2));
        reading.set("Status1", 0.0);
        reading.set("Status2", f64::from(stats.status));

        if let Some(max_power) = max_power {
            reading.set("MaxPowerToday", max_power.p_max_today);
        }
        if let Some(history) = history {
            reading.set("EnergyToday", history.e_day);
            reading.set("MinToday", history.minutes);
        }

        reading.status_text = Some(StatusString::from_value(stats.status));
        reading.success = true;

        reading
    }

    /// Reads the stored history of `day` days ago (0 = today).
    pub fn history(&self, transport: &mut dyn Transport, day: u8) -> Result<History> {
        let command = Command::history(self.address()?, MASTER_ADDRESS, day)?;
        self.request(transport, command)?.history()
    }

    /// Clears the inverter's daily maximum power.
    pub fn reset_max_power(&self, transport: &mut dyn Transport) -> Result<()> {
        warn!(
            "{}: reset-max filler 01 00 00 has not been confirmed on every firmware",
            self.config.name()
        );
        self.request(transport, self.command(Opcode::ResetMax)?)?;
        info!("{}: maximum power reset", self.config.name());
        Ok(())
    }
}

impl InverterCommon for Soladin {
    fn config(&self) -> &config::Inverter {
        &self.config
    }

    fn bus_address(&self) -> Option<Vec<u8>> {
        self.address.map(|a| a.to_vec())
    }

    fn query_bus_address(&mut self, transport: &mut dyn Transport) -> Result<Vec<u8>> {
        let probe = Command::new(MASTER_ADDRESS, MASTER_ADDRESS, Opcode::Probe);
        let response = self.request(transport, probe)?;

        debug!(
            "{}: slave address {}",
            self.config.name(),
            Utils::hex_from_bytes(&response.source)
        );

        self.address = Some(response.source);
        Ok(response.source.to_vec())
    }

    fn query_inverter_info(&mut self, transport: &mut dyn Transport) -> Result<Identity> {
        let address = self.address()?;
        let firmware = self
            .request(transport, self.command(Opcode::Firmware)?)?
            .firmware()?;

        Ok(Identity {
            inverter_id: self.config.id(),
            manufacturer: "Soladin".to_string(),
            model: "600".to_string(),
            serial: String::new(),
            firmware: firmware.version(),
            rated_power: "600W".to_string(),
            address: Utils::hex_from_bytes(&address),
        })
    }

    fn solar_data(&mut self, transport: &mut dyn Transport) -> Result<Reading> {
        let stats_response = self.request(transport, self.command(Opcode::Stats)?)?;
        let stats = stats_response.stats()?;

        let max_power_response = self.request(transport, self.command(Opcode::MaxPower)?)?;
        let max_power = max_power_response.max_power()?;

        let history_response = self.request(transport, self.command(Opcode::History)?)?;
        let history = history_response.history()?;

        let mut reading = self.decode(&stats, Some(&max_power), Some(&history));
        reading.push_raw(&stats_response.data);
        reading.push_raw(&max_power_response.data);
        reading.push_raw(&history_response.data);

        Ok(reading)
    }
}
