/// Errors surfaced by the protocol engine.
///
/// Line noise, wrong replies and device silence are never errors: they end in
/// an empty result. Only transport failures and bad caller input show up here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serial link failed to flush, write or read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A field schema asked for more bytes than the payload carries.
    #[error("Payload too short - needed={needed} available={available}")]
    PayloadTooShort { needed: usize, available: usize },
    /// A hex command or payload given by the caller is malformed.
    #[error("Invalid hex {field} '{value}'")]
    InvalidHex { field: &'static str, value: String },
    /// Opening or configuring the serial port failed.
    #[cfg(feature = "serialport")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
