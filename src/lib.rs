#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dalybms_uart
//!
//! Protocol engine for Daly BMS (Battery Management System) devices on their
//! UART/RS485 port.
//!
//! The engine only needs a [`SerialLink`] to move bytes and a [`Clock`] to
//! pace requests. On top of it [`DalyBms`] offers one method per device
//! command and keeps the cell and sensor counts learned from the status reply.
//!
//! ```no_run
//! # #[cfg(feature = "serialport")]
//! # fn main() -> Result<(), dalybms_uart::Error> {
//! use dalybms_uart::{serialport::DalyBMS, ExchangeConfig};
//!
//! let mut bms = DalyBMS::open("/dev/ttyUSB0", ExchangeConfig::default())?;
//! // Status first, it tells how many cells and sensors to expect
//! if let Some(status) = bms.get_status()? {
//!     println!("{} cells", status.cells);
//! }
//! println!("{:?}", bms.get_cell_voltages()?);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serialport"))]
//! # fn main() {}
//! ```
//!
//! ## Features
//!
//! - `serialport`: [`SerialLink`] implementation on top of the `serialport` crate.
//! - `serde`: `Serialize`/`Deserialize` for all measurement types.
//! - `bin-dependencies` (default): everything the `dalybms-uart` command-line tool needs.

/// The BMS driver.
pub mod bms;
/// Hex helpers and the frame checksum.
pub mod codec;
mod error;
/// Retrying request/response exchange.
pub mod exchange;
/// Positional big-endian field decoding.
pub mod fields;
/// Frame encoding and validation.
pub mod frame;
/// Commands and measurement decoding.
pub mod protocol;

#[cfg(test)]
mod mock;

pub use bms::DalyBms;
pub use error::{Error, Result};
pub use exchange::{Clock, Exchange, ExchangeConfig, Request, SerialLink, StdClock};

/// Serial port link for real hardware.
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
#[cfg(feature = "serialport")]
pub mod serialport;
