use anyhow::{bail, Context, Result};
use clap::Parser;
use dalybms_uart::{codec, serialport::DalyBMS};
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use serde::Serialize;
use std::{fmt::Debug, ops::Deref, panic};

mod commandline;

use commandline::{CliArgs, CliCommands};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

fn print_value<T: Debug + Serialize>(json: bool, label: &str, value: &T) -> Result<()> {
    if json {
        let mut map = serde_json::Map::new();
        map.insert(label.to_string(), serde_json::to_value(value)?);
        println!("{}", serde_json::Value::Object(map));
    } else {
        println!("{label}: {value:?}");
    }
    Ok(())
}

fn print_option<T: Debug + Serialize>(json: bool, label: &str, value: Option<T>) -> Result<()> {
    match value {
        Some(value) => print_value(json, label, &value),
        None if json => print_value(json, label, &serde_json::Value::Null),
        None => {
            println!("{label}: no data");
            Ok(())
        }
    }
}

macro_rules! print_status {
    ($bms:expr, $json:expr) => {
        print_option($json, "status", $bms.get_status().with_context(|| "Cannot get status")?)?
    };
}
macro_rules! print_soc {
    ($bms:expr, $json:expr) => {
        print_option($json, "soc", $bms.get_soc().with_context(|| "Cannot get SOC")?)?
    };
}
macro_rules! print_mosfet_status {
    ($bms:expr, $json:expr) => {
        print_option(
            $json,
            "mosfet",
            $bms.get_mosfet_status()
                .with_context(|| "Cannot get mosfet status")?,
        )?
    };
}
macro_rules! print_voltage_range {
    ($bms:expr, $json:expr) => {
        print_option(
            $json,
            "voltage_range",
            $bms.get_cell_voltage_range()
                .with_context(|| "Cannot get voltage range")?,
        )?
    };
}
macro_rules! print_temperature_range {
    ($bms:expr, $json:expr) => {
        print_option(
            $json,
            "temperature_range",
            $bms.get_temperature_range()
                .with_context(|| "Cannot get temperature range")?,
        )?
    };
}
macro_rules! print_cell_voltages {
    ($bms:expr, $json:expr) => {
        print_value(
            $json,
            "cell_voltages",
            &$bms
                .get_cell_voltages()
                .with_context(|| "Cannot get cell voltages")?,
        )?
    };
}
macro_rules! print_cell_temperatures {
    ($bms:expr, $json:expr) => {
        print_value(
            $json,
            "cell_temperatures",
            &$bms
                .get_cell_temperatures()
                .with_context(|| "Cannot get cell temperatures")?,
        )?
    };
}
macro_rules! print_balancing_status {
    ($bms:expr, $json:expr) => {
        print_value(
            $json,
            "balancing",
            &$bms
                .get_balancing_status()
                .with_context(|| "Cannot get balancing status")?,
        )?
    };
}
macro_rules! print_errors {
    ($bms:expr, $json:expr) => {{
        let errors = $bms.get_errors().with_context(|| "Cannot get errors")?;
        if $json {
            print_value($json, "errors", &errors)?
        } else {
            let names: Vec<String> = errors.iter().map(ToString::to_string).collect();
            println!("errors: {names:?}")
        }
    }};
}

fn ensure_acknowledged(acknowledged: bool, what: &str) -> Result<()> {
    if !acknowledged {
        bail!("BMS did not acknowledge {what}");
    }
    info!("BMS acknowledged {what}");
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let mut bms = DalyBMS::open(&args.device, args.exchange_config())
        .with_context(|| format!("Cannot open serial port '{}'", args.device))?;
    let json = args.json;

    match args.command {
        CliCommands::Status => print_status!(bms, json),
        CliCommands::Soc => print_soc!(bms, json),
        CliCommands::VoltageRange => print_voltage_range!(bms, json),
        CliCommands::TemperatureRange => print_temperature_range!(bms, json),
        CliCommands::Mosfet => print_mosfet_status!(bms, json),
        CliCommands::CellVoltages => {
            let _ = bms.get_status().with_context(|| "Cannot get status")?;
            print_cell_voltages!(bms, json);
        }
        CliCommands::CellTemperatures => {
            let _ = bms.get_status().with_context(|| "Cannot get status")?;
            print_cell_temperatures!(bms, json);
        }
        CliCommands::Balancing => print_balancing_status!(bms, json),
        CliCommands::Errors => print_errors!(bms, json),
        CliCommands::All => {
            print_status!(bms, json);
            print_soc!(bms, json);
            print_voltage_range!(bms, json);
            print_temperature_range!(bms, json);
            print_mosfet_status!(bms, json);
            print_cell_voltages!(bms, json);
            print_cell_temperatures!(bms, json);
            print_balancing_status!(bms, json);
            print_errors!(bms, json);
        }
        CliCommands::SetSoc { soc_percent } => ensure_acknowledged(
            bms.set_soc(soc_percent).with_context(|| "Cannot set SOC")?,
            "SOC",
        )?,
        CliCommands::SetChargeMosfet { enable } => ensure_acknowledged(
            bms.set_charge_mosfet(enable)
                .with_context(|| "Cannot set charge mosfet")?,
            "charge mosfet",
        )?,
        CliCommands::SetDischargeMosfet { enable } => ensure_acknowledged(
            bms.set_discharge_mosfet(enable)
                .with_context(|| "Cannot set discharge mosfet")?,
            "discharge mosfet",
        )?,
        CliCommands::Reset => ensure_acknowledged(
            bms.reset().with_context(|| "Cannot reset BMS")?,
            "reset",
        )?,
        CliCommands::Raw {
            command,
            extra,
            responses,
        } => {
            let payloads = bms
                .raw(&command, &extra, responses)
                .with_context(|| format!("Cannot send command '{command}'"))?;
            let frames: Vec<String> = payloads
                .iter()
                .map(|payload| codec::bytes_to_hex(payload.bytes()))
                .collect();
            print_value(json, "payloads", &frames)?;
        }
    }

    Ok(())
}
