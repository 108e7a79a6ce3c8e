use clap::{Parser, Subcommand};
use clap_num::maybe_hex;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use dalybms_uart::{codec, ExchangeConfig};
use std::time::Duration;

fn hex_command(s: &str) -> Result<String, String> {
    match codec::parse_hex(s).as_deref() {
        Some([_]) => Ok(s.to_string()),
        _ => Err(format!("'{s}' is not one byte of hex, e.g. \"90\"")),
    }
}

fn hex_payload(s: &str) -> Result<String, String> {
    codec::parse_hex(s)
        .map(|_| s.to_string())
        .ok_or_else(|| format!("'{s}' is not an even number of hex digits"))
}

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Show general BMS status: cell count, temperature sensors, charger/load status, cycles
    Status,
    /// Show total voltage, current, and State of Charge (SOC)
    Soc,
    /// Show MOSFET status: mode, charge/discharge state, capacity, and BMS cycles
    Mosfet,
    /// Show highest/lowest cell voltage and corresponding cell number
    VoltageRange,
    /// Show highest/lowest temperature and corresponding sensor number
    TemperatureRange,
    /// Show individual cell voltages in mV (fetches the BMS status first)
    CellVoltages,
    /// Show individual temperature sensor readings (fetches the BMS status first)
    CellTemperatures,
    /// Show cell balancing status
    Balancing,
    /// Show current BMS error codes
    Errors,
    /// Show all available BMS information by running all read commands
    All,
    /// Set State of Charge (SOC) in percent
    SetSoc {
        /// The desired SOC value as a percentage (e.g., 75.5 for 75.5%)
        soc_percent: f32,
    },
    /// Enable or disable the discharge MOSFET
    SetDischargeMosfet {
        /// Enable the discharge MOSFET. If this flag is not present, it will be disabled.
        #[clap(long, short, action)]
        enable: bool,
    },
    /// Enable or disable the charge MOSFET
    SetChargeMosfet {
        /// Enable the charge MOSFET. If this flag is not present, it will be disabled.
        #[clap(long, short, action)]
        enable: bool,
    },
    /// Reset the BMS to factory settings (Use with caution!)
    Reset,
    /// Send a command given as hex and print the raw reply payloads
    Raw {
        /// Command id as two hex characters (e.g., "90")
        #[clap(long, short, value_parser = hex_command)]
        command: String,
        /// Extra payload as hex (e.g., "01")
        #[clap(long, short, value_parser = hex_payload, default_value = "")]
        extra: String,
        /// Number of reply frames to collect
        #[clap(long, short, default_value = "1")]
        responses: usize,
    },
}

const fn about_text() -> &'static str {
    "daly bms uart command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Serial port device path (e.g., /dev/ttyUSB0 on Linux, COM1 on Windows)
    #[arg(short, long, default_value_t = default_device_name())]
    pub device: String,

    #[command(subcommand)]
    pub command: CliCommands,

    /// BMS bus address (e.g., "0x40" for the UART port)
    #[arg(long, value_parser = maybe_hex::<u8>, default_value = "0x40")]
    pub address: u8,

    /// Timeout for reading one reply frame (e.g., "100ms", "1s")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "100ms")]
    pub timeout: Duration,

    /// Delay between sending a command and reading the reply (e.g., "200ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "200ms")]
    pub delay: Duration,

    /// Delay before repeating a command that got no reply (e.g., "300ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "300ms")]
    pub backoff: Duration,

    /// Number of retries for unanswered commands
    #[arg(long, default_value = "3")]
    pub retries: u8,

    /// Number of discarded frames after which an attempt is given up
    #[arg(long, default_value = "16")]
    pub max_rejected: usize,

    /// Print results as JSON
    #[arg(long, action)]
    pub json: bool,
}

impl CliArgs {
    pub fn exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig::default()
            .with_address(self.address)
            .with_read_timeout(self.timeout)
            .with_inter_command_delay(self.delay)
            .with_retry_backoff(self.backoff)
            .with_retries(self.retries)
            .with_max_rejected_frames(self.max_rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_exchange_defaults() {
        let args = CliArgs::try_parse_from(["dalybms-uart", "soc"]).unwrap();
        assert_eq!(args.command, CliCommands::Soc);
        assert_eq!(args.exchange_config(), ExchangeConfig::default());
    }

    #[test]
    fn address_and_durations() {
        let args = CliArgs::try_parse_from([
            "dalybms-uart",
            "--address",
            "0x80",
            "--timeout",
            "1s",
            "--retries",
            "0",
            "--max-rejected",
            "4",
            "set-charge-mosfet",
            "--enable",
        ])
        .unwrap();
        let config = args.exchange_config();
        assert_eq!(config.address, 0x80);
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert_eq!(config.retries, 0);
        assert_eq!(config.max_rejected_frames, 4);
        assert_eq!(args.command, CliCommands::SetChargeMosfet { enable: true });
    }

    #[test]
    fn raw_command() {
        let args =
            CliArgs::try_parse_from(["dalybms-uart", "raw", "-c", "95", "-r", "6"]).unwrap();
        assert_eq!(
            args.command,
            CliCommands::Raw {
                command: "95".to_string(),
                extra: String::new(),
                responses: 6
            }
        );
    }

    #[test]
    fn raw_command_rejects_malformed_hex() {
        for command in ["g0", "9", "0x90", "9000"] {
            assert!(
                CliArgs::try_parse_from(["dalybms-uart", "raw", "-c", command]).is_err(),
                "command {command:?} was accepted"
            );
        }
        assert!(
            CliArgs::try_parse_from(["dalybms-uart", "raw", "-c", "d9", "-e", "1"]).is_err()
        );
    }
}
