use crate::prelude::*;

use crate::blackline::packet::{ReadRegisters, Response, StatusString};
use crate::inverter::InverterCommon;
use crate::register::RegisterDecoder;

/// BlackLine Solar 3000, Modbus RTU style framing.
#[derive(Clone, Debug)]
pub struct BlackLine {
    config: config::Inverter,
    address: Option<u8>,
    decoder: RegisterDecoder,
}

impl BlackLine {
    pub fn new(config: config::Inverter, decoder: RegisterDecoder) -> Result<Self> {
        let address = match config.address() {
            Some([address]) => Some(*address),
            Some(other) => bail!(
                "{}: bus address must be a single byte, got {}",
                config.name(),
                Utils::hex_from_bytes(other)
            ),
            None => None,
        };

        Ok(Self {
            config,
            address,
            decoder,
        })
    }

    fn address(&self) -> Result<u8> {
        self.address
            .ok_or_else(|| anyhow!("{}: bus address unknown", self.config.name()))
    }

    fn request(&self, transport: &mut dyn Transport, command: ReadRegisters) -> Result<Response> {
        let raw = transport.exchange(&command.bytes())?;
        let response = Response::decode(&raw)?;

        let function = response.function_code()?;
        if function != command.function {
            bail!(
                "{}: asked with {:?}, answered with {:?}",
                self.config.name(),
                command.function,
                function
            );
        }

        let received = response.data.len();
        if received != usize::from(response.byte_count)
            || received != usize::from(command.count) * 2
        {
            bail!(
                "{}: asked for {} registers, answer carries {} bytes (byte count {})",
                self.config.name(),
                command.count,
                received,
                response.byte_count
            );
        }

        Ok(response)
    }

    /// Fills `reading` from the payload of an inverter data response.
    pub fn decode_data(&self, data: &[u8], reading: &mut Reading) {
        for (name, value) in self.decoder.decode(data) {
            reading.set(&name, value);
        }

        reading.status_text = reading
            .get("Status2")
            .map(|status| StatusString::from_value(status as u64));
        reading.push_raw(data);
        reading.success = true;
    }

    pub fn identity(&self, serial: &Response, model: &Response) -> Result<Identity> {
        let (rating, firmware) = match (model.register(0), model.register(1)) {
            (Some(rating), Some(firmware)) => (rating, firmware),
            _ => bail!(
                "{}: model/firmware response carries {} bytes, need 4",
                self.config.name(),
                model.data.len()
            ),
        };
        let kw = f64::from(rating) / 10.0;

        Ok(Identity {
            inverter_id: self.config.id(),
            manufacturer: "KLNE".to_string(),
            model: format!("{:.1}kW", kw),
            serial: Utils::hex_from_bytes(&serial.data).replace(' ', ""),
            firmware: format!("{:.2}", f64::from(firmware) / 100.0),
            rated_power: format!("{}W", Utils::round(kw * 1000.0, 0)),
            address: self.address.map(|a| format!("{:02X}", a)).unwrap_or_default(),
        })
    }
}

impl InverterCommon for BlackLine {
    fn config(&self) -> &config::Inverter {
        &self.config
    }

    fn bus_address(&self) -> Option<Vec<u8>> {
        self.address.map(|a| vec![a])
    }

    fn query_bus_address(&mut self, transport: &mut dyn Transport) -> Result<Vec<u8>> {
        let response = self.request(transport, ReadRegisters::bus_query())?;

        let address = match response.data.get(1) {
            Some(address) => *address,
            None => bail!("{}: bus query answer carries no address", self.config.name()),
        };
        debug!("{}: slave address {:02X}", self.config.name(), address);

        self.address = Some(address);
        Ok(vec![address])
    }

    fn query_inverter_info(&mut self, transport: &mut dyn Transport) -> Result<Identity> {
        let address = self.address()?;

        let serial = self.request(transport, ReadRegisters::serial_number(address))?;
        let model = self.request(transport, ReadRegisters::model_firmware(address))?;

        self.identity(&serial, &model)
    }

    fn solar_data(&mut self, transport: &mut dyn Transport) -> Result<Reading> {
        let address = self.address()?;
        let response = self.request(transport, ReadRegisters::inverter_data(address))?;

        let mut reading = Reading::new(self.config.id(), self.config.name());
        self.decode_data(&response.data, &mut reading);

        Ok(reading)
    }
}

