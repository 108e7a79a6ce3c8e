//! The BMS driver: one method per device command.
//!
//! Read methods return `None` or an empty collection when the device did not
//! answer after all retries, the caller is expected to try again later.

use crate::error::Result;
use crate::exchange::{Clock, Exchange, ExchangeConfig, Request, SerialLink};
use crate::frame::Payload;
use crate::protocol::*;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct DalyBms<L, C> {
    exchange: Exchange<L, C>,
    profile: DeviceProfile,
}

impl<L: SerialLink, C: Clock> DalyBms<L, C> {
    pub fn new(link: L, clock: C, config: ExchangeConfig) -> Self {
        Self {
            exchange: Exchange::new(link, clock, config),
            profile: DeviceProfile::default(),
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        self.exchange.config()
    }

    pub fn config_mut(&mut self) -> &mut ExchangeConfig {
        self.exchange.config_mut()
    }

    /// Cell and sensor counts from the last status reply.
    pub fn device_profile(&self) -> DeviceProfile {
        self.profile
    }

    /// Installs known counts so per-cell commands work without a status query.
    pub fn set_device_profile(&mut self, profile: DeviceProfile) {
        self.profile = profile;
    }

    pub fn into_exchange(self) -> Exchange<L, C> {
        self.exchange
    }

    fn request_single<T: std::fmt::Debug>(
        &mut self,
        command: Command,
        decode: impl FnOnce(&Payload) -> Result<T>,
    ) -> Result<Option<T>> {
        let payloads = self.exchange.exchange(&Request::new(command.id()))?;
        let Some(payload) = payloads.first() else {
            return Ok(None);
        };
        let result = decode(payload)?;
        log::debug!("{command:?}: {result:?}");
        Ok(Some(result))
    }

    fn request_frames(&mut self, command: Command, count: u8, per_frame: usize) -> Result<Vec<Payload>> {
        let max_responses = n_frames(count, per_frame);
        if max_responses == 0 {
            log::warn!("{command:?} requested with a count of zero, get_status() has to be called first");
        }
        self.exchange
            .exchange(&Request::new(command.id()).with_max_responses(max_responses))
    }

    fn acknowledge(&mut self, command: Command, extra: &[u8]) -> Result<bool> {
        let payloads = self
            .exchange
            .exchange(&Request::new(command.id()).with_extra(extra))?;
        let acknowledged = !payloads.is_empty();
        log::debug!("{command:?} acknowledged={acknowledged}");
        Ok(acknowledged)
    }

    pub fn get_soc(&mut self) -> Result<Option<Soc>> {
        self.request_single(Command::Soc, Soc::decode)
    }

    pub fn get_cell_voltage_range(&mut self) -> Result<Option<CellVoltageRange>> {
        self.request_single(Command::CellVoltageRange, CellVoltageRange::decode)
    }

    pub fn get_temperature_range(&mut self) -> Result<Option<TemperatureRange>> {
        self.request_single(Command::TemperatureRange, TemperatureRange::decode)
    }

    pub fn get_mosfet_status(&mut self) -> Result<Option<MosfetStatus>> {
        self.request_single(Command::MosfetStatus, MosfetStatus::decode)
    }

    /// Also stores cell and sensor counts for the per-cell commands.
    pub fn get_status(&mut self) -> Result<Option<Status>> {
        let status = self.request_single(Command::Status, Status::decode)?;
        if let Some(status) = &status {
            self.profile = DeviceProfile::from(status);
        }
        Ok(status)
    }

    /// Millivolts per cell, keyed from cell 1.
    pub fn get_cell_voltages(&mut self) -> Result<BTreeMap<u8, u16>> {
        let n_cells = self.profile.cells;
        let payloads = self.request_frames(Command::CellVoltages, n_cells, VOLTAGES_PER_FRAME)?;
        decode_cell_voltages(&payloads, n_cells)
    }

    /// °C per sensor, keyed from sensor 1.
    pub fn get_cell_temperatures(&mut self) -> Result<BTreeMap<u8, i16>> {
        let n_sensors = self.profile.temperature_sensors;
        let payloads =
            self.request_frames(Command::CellTemperatures, n_sensors, TEMPERATURES_PER_FRAME)?;
        decode_cell_temperatures(&payloads, n_sensors)
    }

    pub fn get_balancing_status(&mut self) -> Result<BTreeMap<u8, bool>> {
        Ok(self
            .request_single(Command::CellBalanceState, decode_balancing_status)?
            .unwrap_or_default())
    }

    pub fn get_errors(&mut self) -> Result<Vec<ErrorCode>> {
        Ok(self
            .request_single(Command::Errors, |payload| Ok(ErrorCode::decode(payload)))?
            .unwrap_or_default())
    }

    /// Returns whether the device acknowledged the command.
    pub fn set_discharge_mosfet(&mut self, enable: bool) -> Result<bool> {
        self.acknowledge(Command::SetDischargeMosfet, &mosfet_payload(enable))
    }

    /// Returns whether the device acknowledged the command.
    pub fn set_charge_mosfet(&mut self, enable: bool) -> Result<bool> {
        self.acknowledge(Command::SetChargeMosfet, &mosfet_payload(enable))
    }

    /// Values outside 0 to 100 % are clamped.
    pub fn set_soc(&mut self, soc_percent: f32) -> Result<bool> {
        self.acknowledge(Command::SetSoc, &set_soc_payload(soc_percent))
    }

    /// Resets the BMS to factory settings.
    pub fn reset(&mut self) -> Result<bool> {
        self.acknowledge(Command::BmsReset, &[])
    }

    /// Sends an arbitrary command given as hex and returns the raw reply payloads.
    ///
    /// Malformed hex is refused with [`crate::Error::InvalidHex`] before anything is sent.
    pub fn raw(&mut self, command: &str, extra: &str, max_responses: usize) -> Result<Vec<Payload>> {
        let request = Request::from_hex(command, extra)?.with_max_responses(max_responses);
        self.exchange.exchange(&request)
    }
}
