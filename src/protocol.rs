use crate::error::Result;
use crate::fields::{decode_fields, FieldKind, FieldReader};
use crate::frame::{Payload, INVALID_SEQUENCE};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Soc,
    CellVoltageRange,
    TemperatureRange,
    MosfetStatus,
    Status,
    CellVoltages,
    CellTemperatures,
    CellBalanceState,
    Errors,
    SetDischargeMosfet,
    SetChargeMosfet,
    SetSoc,
    BmsReset,
}

impl Command {
    pub const fn id(self) -> u8 {
        match self {
            Command::Soc => 0x90,
            Command::CellVoltageRange => 0x91,
            Command::TemperatureRange => 0x92,
            Command::MosfetStatus => 0x93,
            Command::Status => 0x94,
            Command::CellVoltages => 0x95,
            Command::CellTemperatures => 0x96,
            Command::CellBalanceState => 0x97,
            Command::Errors => 0x98,
            Command::SetDischargeMosfet => 0xd9,
            Command::SetChargeMosfet => 0xda,
            Command::SetSoc => 0x21,
            Command::BmsReset => 0x00,
        }
    }
}

// The current measurement is given with a 30000 unit offset
const CURRENT_OFFSET: i64 = 30000;
// An offset of 40 is added by the BMS to avoid having to deal with negative numbers
const TEMPERATURE_OFFSET: i16 = 40;

pub const VOLTAGES_PER_FRAME: usize = 3;
pub const TEMPERATURES_PER_FRAME: usize = 7;
pub const BALANCING_CELLS: u8 = 48;

macro_rules! read_bit {
    ($byte:expr,$position:expr) => {
        ($byte >> $position) & 1 != 0
    };
}

/// Reply frames needed for `count` items at `per_frame` items each.
pub fn n_frames(count: u8, per_frame: usize) -> usize {
    usize::from(count).div_ceil(per_frame)
}

const SOC_SCHEMA: [FieldKind; 4] = [FieldKind::U16; 4];

/// Raw state of charge as sent by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Soc {
    /// 0.1 V units
    pub total_voltage: u16,
    /// 0.1 A units, negative=charging, positive=discharging
    pub current: i32,
    /// 0.1 % units
    pub soc_percent: u16,
}

impl Soc {
    pub fn decode(payload: &Payload) -> Result<Self> {
        let f = decode_fields(payload.bytes(), &SOC_SCHEMA)?;
        Ok(Self {
            total_voltage: f[0] as u16,
            current: (f[2] - CURRENT_OFFSET) as i32,
            soc_percent: f[3] as u16,
        })
    }

    pub fn total_voltage_volts(&self) -> f32 {
        f32::from(self.total_voltage) / 10.0
    }

    pub fn current_amps(&self) -> f32 {
        self.current as f32 / 10.0
    }

    pub fn percent(&self) -> f32 {
        f32::from(self.soc_percent) / 10.0
    }
}

const CELL_VOLTAGE_RANGE_SCHEMA: [FieldKind; 4] =
    [FieldKind::I16, FieldKind::U8, FieldKind::I16, FieldKind::U8];

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellVoltageRange {
    pub highest_voltage: f32,
    pub highest_cell: u8,
    pub lowest_voltage: f32,
    pub lowest_cell: u8,
}

impl CellVoltageRange {
    pub fn decode(payload: &Payload) -> Result<Self> {
        let f = decode_fields(payload.bytes(), &CELL_VOLTAGE_RANGE_SCHEMA)?;
        Ok(Self {
            highest_voltage: f[0] as f32 / 1000.0,
            highest_cell: f[1] as u8,
            lowest_voltage: f[2] as f32 / 1000.0,
            lowest_cell: f[3] as u8,
        })
    }
}

const TEMPERATURE_RANGE_SCHEMA: [FieldKind; 4] = [FieldKind::I8; 4];

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemperatureRange {
    pub highest_temperature: i16,
    pub highest_sensor: u8,
    pub lowest_temperature: i16,
    pub lowest_sensor: u8,
}

impl TemperatureRange {
    pub fn decode(payload: &Payload) -> Result<Self> {
        let f = decode_fields(payload.bytes(), &TEMPERATURE_RANGE_SCHEMA)?;
        Ok(Self {
            highest_temperature: f[0] as i16 - TEMPERATURE_OFFSET,
            highest_sensor: f[1] as u8,
            lowest_temperature: f[2] as i16 - TEMPERATURE_OFFSET,
            lowest_sensor: f[3] as u8,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MosfetMode {
    Stationary,
    Charging,
    Discharging,
}

const MOSFET_STATUS_SCHEMA: [FieldKind; 5] = [
    FieldKind::I8,
    FieldKind::Bool,
    FieldKind::Bool,
    FieldKind::U8,
    FieldKind::I32,
];

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MosfetStatus {
    /// Raw mode byte, see [`MosfetStatus::mode`]
    pub bms_state: i8,
    pub charging_mosfet: bool,
    pub discharging_mosfet: bool,
    pub bms_life: u8,
    pub capacity_ah: f32,
}

impl MosfetStatus {
    pub fn decode(payload: &Payload) -> Result<Self> {
        let f = decode_fields(payload.bytes(), &MOSFET_STATUS_SCHEMA)?;
        Ok(Self {
            bms_state: f[0] as i8,
            charging_mosfet: f[1] != 0,
            discharging_mosfet: f[2] != 0,
            bms_life: f[3] as u8,
            capacity_ah: f[4] as f32 / 1000.0,
        })
    }

    /// `None` for state values the device documentation does not name.
    pub fn mode(&self) -> Option<MosfetMode> {
        match self.bms_state {
            0 => Some(MosfetMode::Stationary),
            1 => Some(MosfetMode::Charging),
            2 => Some(MosfetMode::Discharging),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IoState {
    pub di1: bool,
    pub di2: bool,
    pub di3: bool,
    pub di4: bool,
    pub do1: bool,
    pub do2: bool,
    pub do3: bool,
    pub do4: bool,
}

impl From<u8> for IoState {
    fn from(byte: u8) -> Self {
        Self {
            di1: read_bit!(byte, 0),
            di2: read_bit!(byte, 1),
            di3: read_bit!(byte, 2),
            di4: read_bit!(byte, 3),
            do1: read_bit!(byte, 4),
            do2: read_bit!(byte, 5),
            do3: read_bit!(byte, 6),
            do4: read_bit!(byte, 7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Status {
    pub cells: u8,
    pub temperature_sensors: u8,
    pub charger_running: bool,
    pub load_running: bool,
    pub states: IoState,
    pub cycles: u16,
}

impl Status {
    pub fn decode(payload: &Payload) -> Result<Self> {
        let mut reader = FieldReader::new(payload.bytes());
        Ok(Self {
            cells: reader.read_u8()?,
            temperature_sensors: reader.read_u8()?,
            charger_running: reader.read_bool()?,
            load_running: reader.read_bool()?,
            states: IoState::from(reader.read_u8()?),
            cycles: reader.read_u16()?,
        })
    }
}

/// Cell and sensor counts the per-cell commands depend on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceProfile {
    pub cells: u8,
    pub temperature_sensors: u8,
}

impl From<&Status> for DeviceProfile {
    fn from(status: &Status) -> Self {
        Self {
            cells: status.cells,
            temperature_sensors: status.temperature_sensors,
        }
    }
}

/// Collects items spread over several reply frames, keyed by running id from 1.
///
/// Padding frames are skipped. Items beyond `count` or beyond the end of a
/// payload are not read.
fn reassemble<T>(
    payloads: &[Payload],
    count: u8,
    per_frame: usize,
    kind: FieldKind,
    mut convert: impl FnMut(i64) -> T,
) -> Result<BTreeMap<u8, T>> {
    let mut result = BTreeMap::new();
    let mut item: u16 = 1;
    for payload in payloads {
        if payload.sequence() == INVALID_SEQUENCE {
            log::trace!("Skipping padding frame {payload:?}");
            continue;
        }
        let mut reader = FieldReader::at(payload.bytes(), 1);
        for _ in 0..per_frame {
            if reader.remaining() < kind.width() || item > u16::from(count) {
                break;
            }
            result.insert(item as u8, convert(reader.read(kind)?));
            item += 1;
        }
    }
    Ok(result)
}

/// Cell voltages in millivolts.
pub fn decode_cell_voltages(payloads: &[Payload], n_cells: u8) -> Result<BTreeMap<u8, u16>> {
    let result = reassemble(payloads, n_cells, VOLTAGES_PER_FRAME, FieldKind::U16, |mv| {
        mv as u16
    })?;
    for (cell, mv) in &result {
        log::trace!("cell #{} mV={}", cell, mv);
    }
    Ok(result)
}

/// Sensor temperatures in °C.
///
/// The raw byte is unsigned, so the range is -40 to 215 °C. The min/max
/// reply of [`TemperatureRange`] is signed instead.
pub fn decode_cell_temperatures(payloads: &[Payload], n_sensors: u8) -> Result<BTreeMap<u8, i16>> {
    let result = reassemble(payloads, n_sensors, TEMPERATURES_PER_FRAME, FieldKind::U8, |raw| {
        raw as i16 - TEMPERATURE_OFFSET
    })?;
    for (sensor, temperature) in &result {
        log::trace!("sensor #{} °C={}", sensor, temperature);
    }
    Ok(result)
}

const BALANCING_SCHEMA: [FieldKind; 6] = [FieldKind::U8; 6];

/// Balancing flag of cells 1 to 48.
///
/// The six bytes form one 48 bit big-endian number whose bit 0 is cell 1.
pub fn decode_balancing_status(payload: &Payload) -> Result<BTreeMap<u8, bool>> {
    let bits = decode_fields(payload.bytes(), &BALANCING_SCHEMA)?
        .into_iter()
        .fold(0u64, |acc, byte| (acc << 8) | byte as u64);
    Ok((0..BALANCING_CELLS)
        .map(|i| (i + 1, read_bit!(bits, i)))
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorCode {
    CellVoltHighLevel1,
    CellVoltHighLevel2,
    CellVoltLowLevel1,
    CellVoltLowLevel2,
    SumVoltHighLevel1,
    SumVoltHighLevel2,
    SumVoltLowLevel1,
    SumVoltLowLevel2,
    ChargeTempHighLevel1,
    ChargeTempHighLevel2,
    ChargeTempLowLevel1,
    ChargeTempLowLevel2,
    DischargeTempHighLevel1,
    DischargeTempHighLevel2,
    DischargeTempLowLevel1,
    DischargeTempLowLevel2,
    ChargeOvercurrentLevel1,
    ChargeOvercurrentLevel2,
    DischargeOvercurrentLevel1,
    DischargeOvercurrentLevel2,
    SocHighLevel1,
    SocHighLevel2,
    SocLowLevel1,
    SocLowLevel2,
    DiffVoltLevel1,
    DiffVoltLevel2,
    DiffTempLevel1,
    DiffTempLevel2,
    ChargeMosTempHighAlarm,
    DischargeMosTempHighAlarm,
    ChargeMosTempSensorErr,
    DischargeMosTempSensorErr,
    ChargeMosAdhesionErr,
    DischargeMosAdhesionErr,
    ChargeMosOpenCircuitErr,
    DischargeMosOpenCircuitErr,
    AfeCollectChipErr,
    VoltageCollectDropped,
    CellTempSensorErr,
    EepromErr,
    RtcErr,
    PrechargeFailure,
    CommunicationFailure,
    InternalCommunicationFailure,
    CurrentModuleFault,
    SumVoltageDetectFault,
    ShortCircuitProtectFault,
    LowVoltForbiddenChargeFault,
    Reserved,
    FaultCode,
}

use ErrorCode::*;

/// Row `i` names the bits of payload byte `i`, LSB first.
const ERROR_TABLE: [&[ErrorCode]; 8] = [
    &[
        CellVoltHighLevel1,
        CellVoltHighLevel2,
        CellVoltLowLevel1,
        CellVoltLowLevel2,
        SumVoltHighLevel1,
        SumVoltHighLevel2,
        SumVoltLowLevel1,
        SumVoltLowLevel2,
    ],
    &[
        ChargeTempHighLevel1,
        ChargeTempHighLevel2,
        ChargeTempLowLevel1,
        ChargeTempLowLevel2,
        DischargeTempHighLevel1,
        DischargeTempHighLevel2,
        DischargeTempLowLevel1,
        DischargeTempLowLevel2,
    ],
    &[
        ChargeOvercurrentLevel1,
        ChargeOvercurrentLevel2,
        DischargeOvercurrentLevel1,
        DischargeOvercurrentLevel2,
        SocHighLevel1,
        SocHighLevel2,
        SocLowLevel1,
        SocLowLevel2,
    ],
    &[
        DiffVoltLevel1,
        DiffVoltLevel2,
        DiffTempLevel1,
        DiffTempLevel2,
        Reserved,
        Reserved,
        Reserved,
        Reserved,
    ],
    &[
        ChargeMosTempHighAlarm,
        DischargeMosTempHighAlarm,
        ChargeMosTempSensorErr,
        DischargeMosTempSensorErr,
        ChargeMosAdhesionErr,
        DischargeMosAdhesionErr,
        ChargeMosOpenCircuitErr,
        DischargeMosOpenCircuitErr,
    ],
    &[
        AfeCollectChipErr,
        VoltageCollectDropped,
        CellTempSensorErr,
        EepromErr,
        RtcErr,
        PrechargeFailure,
        CommunicationFailure,
        InternalCommunicationFailure,
    ],
    &[
        CurrentModuleFault,
        SumVoltageDetectFault,
        ShortCircuitProtectFault,
        LowVoltForbiddenChargeFault,
        Reserved,
        Reserved,
        Reserved,
        Reserved,
    ],
    &[FaultCode],
];

impl ErrorCode {
    pub fn decode(payload: &Payload) -> Vec<Self> {
        let mut result = Vec::new();
        for (byte, row) in payload.bytes().iter().zip(ERROR_TABLE.iter()) {
            for (position, code) in row.iter().enumerate() {
                if read_bit!(*byte, position) {
                    result.push(*code);
                }
            }
        }
        result
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            CellVoltHighLevel1 => "Cell volt high level 1",
            CellVoltHighLevel2 => "Cell volt high level 2",
            CellVoltLowLevel1 => "Cell volt low level 1",
            CellVoltLowLevel2 => "Cell volt low level 2",
            SumVoltHighLevel1 => "Sum volt high level 1",
            SumVoltHighLevel2 => "Sum volt high level 2",
            SumVoltLowLevel1 => "Sum volt low level 1",
            SumVoltLowLevel2 => "Sum volt low level 2",
            ChargeTempHighLevel1 => "Chg temp high level 1",
            ChargeTempHighLevel2 => "Chg temp high level 2",
            ChargeTempLowLevel1 => "Chg temp low level 1",
            ChargeTempLowLevel2 => "Chg temp low level 2",
            DischargeTempHighLevel1 => "Dischg temp high level 1",
            DischargeTempHighLevel2 => "Dischg temp high level 2",
            DischargeTempLowLevel1 => "Dischg temp low level 1",
            DischargeTempLowLevel2 => "Dischg temp low level 2",
            ChargeOvercurrentLevel1 => "Chg overcurrent level 1",
            ChargeOvercurrentLevel2 => "Chg overcurrent level 2",
            DischargeOvercurrentLevel1 => "Dischg overcurrent level 1",
            DischargeOvercurrentLevel2 => "Dischg overcurrent level 2",
            SocHighLevel1 => "SOC high level 1",
            SocHighLevel2 => "SOC high level 2",
            SocLowLevel1 => "SOC low level 1",
            SocLowLevel2 => "SOC low level 2",
            DiffVoltLevel1 => "Diff volt level 1",
            DiffVoltLevel2 => "Diff volt level 2",
            DiffTempLevel1 => "Diff temp level 1",
            DiffTempLevel2 => "Diff temp level 2",
            ChargeMosTempHighAlarm => "Chg MOS temp high alarm",
            DischargeMosTempHighAlarm => "Dischg MOS temp high alarm",
            ChargeMosTempSensorErr => "Chg MOS temp sensor err",
            DischargeMosTempSensorErr => "Dischg MOS temp sensor err",
            ChargeMosAdhesionErr => "Chg MOS adhesion err",
            DischargeMosAdhesionErr => "Dischg MOS adhesion err",
            ChargeMosOpenCircuitErr => "Chg MOS open circuit err",
            DischargeMosOpenCircuitErr => "Dischg MOS open circuit err",
            AfeCollectChipErr => "AFE collect chip err",
            VoltageCollectDropped => "Voltage collect dropped",
            CellTempSensorErr => "Cell temp sensor err",
            EepromErr => "EEPROM err",
            RtcErr => "RTC err",
            PrechargeFailure => "Precharge failure",
            CommunicationFailure => "Communication failure",
            InternalCommunicationFailure => "Internal communication failure",
            CurrentModuleFault => "Current module fault",
            SumVoltageDetectFault => "Sum voltage detect fault",
            ShortCircuitProtectFault => "Short circuit protect fault",
            LowVoltForbiddenChargeFault => "Low volt forbidden chg fault",
            Reserved => "Reserved",
            FaultCode => "Fault code",
        };
        f.write_str(text)
    }
}

/// Extra payload of the SOC write: the value in 0.1 % sits in the last two bytes.
pub fn set_soc_payload(soc_percent: f32) -> [u8; 8] {
    let value = {
        let val = (soc_percent * 10.0).round();
        if val > 1000.0 {
            1000
        } else if val < 0.0 {
            0
        } else {
            val as u16
        }
    }
    .to_be_bytes();
    let mut extra = [0; 8];
    extra[6] = value[0];
    extra[7] = value[1];
    extra
}

pub fn mosfet_payload(enable: bool) -> [u8; 1] {
    [u8::from(enable)]
}
