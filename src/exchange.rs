//! Request/response exchange with retries.
//!
//! One attempt flushes the link, writes the request, waits for the device and
//! then collects validated replies until the expected number arrived or the
//! line goes silent. Attempts that collect nothing are repeated after a fixed
//! backoff. Running out of attempts is not an error, the caller just gets no
//! payloads.

use crate::codec::{bytes_to_hex, parse_hex};
use crate::error::{Error, Result};
use crate::frame::{self, Payload, FRAME_LENGTH};
use std::time::Duration;

/// Byte transport to the BMS. Implementations carry no protocol logic.
pub trait SerialLink {
    /// Discards unread input.
    fn flush(&mut self) -> std::io::Result<()>;
    /// Writes all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    /// Reads up to `size` bytes, returning fewer or none when `timeout` elapses.
    fn read(&mut self, size: usize, timeout: Duration) -> std::io::Result<Vec<u8>>;
}

/// Blocking pacing primitive.
pub trait Clock {
    fn sleep(&mut self, duration: Duration);
}

/// [`Clock`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdClock;

impl Clock for StdClock {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Address the BMS answers to on its UART port.
pub const HOST_ADDRESS: u8 = 0x40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    pub address: u8,
    /// Attempts made after a first attempt that received nothing.
    pub retries: u8,
    pub read_timeout: Duration,
    /// Time given to the device between request and first read.
    pub inter_command_delay: Duration,
    pub retry_backoff: Duration,
    /// Rejected frames tolerated in one attempt before it is given up.
    pub max_rejected_frames: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            address: HOST_ADDRESS,
            retries: 3,
            read_timeout: Duration::from_millis(100),
            inter_command_delay: Duration::from_millis(200),
            retry_backoff: Duration::from_millis(300),
            max_rejected_frames: 16,
        }
    }
}

impl ExchangeConfig {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_inter_command_delay(mut self, delay: Duration) -> Self {
        self.inter_command_delay = delay;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_rejected_frames(mut self, max_rejected_frames: usize) -> Self {
        self.max_rejected_frames = max_rejected_frames;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: u8,
    pub extra: Vec<u8>,
    pub max_responses: usize,
    /// Overrides [`ExchangeConfig::read_timeout`] for this request.
    pub read_timeout: Option<Duration>,
}

impl Request {
    pub fn new(command: u8) -> Self {
        Self {
            command,
            extra: Vec::new(),
            max_responses: 1,
            read_timeout: None,
        }
    }

    /// Request from a hex command id and hex extra payload, e.g. `("d9", "01")`.
    ///
    /// The command must be exactly one byte and both strings must be well
    /// formed hex, a typo never turns into command `0x00` (reset).
    pub fn from_hex(command: &str, extra: &str) -> Result<Self> {
        let command = match parse_hex(command).as_deref() {
            Some(&[id]) => id,
            _ => {
                return Err(Error::InvalidHex {
                    field: "command",
                    value: command.to_string(),
                })
            }
        };
        let extra = parse_hex(extra).ok_or_else(|| Error::InvalidHex {
            field: "extra payload",
            value: extra.to_string(),
        })?;
        Ok(Self::new(command).with_extra(&extra))
    }

    pub fn with_extra(mut self, extra: &[u8]) -> Self {
        self.extra = extra.to_vec();
        self
    }

    pub fn with_max_responses(mut self, max_responses: usize) -> Self {
        self.max_responses = max_responses;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }
}

/// Drives requests over an exclusively owned [`SerialLink`].
#[derive(Debug)]
pub struct Exchange<L, C> {
    link: L,
    clock: C,
    config: ExchangeConfig,
}

impl<L: SerialLink, C: Clock> Exchange<L, C> {
    pub fn new(link: L, clock: C, config: ExchangeConfig) -> Self {
        Self {
            link,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ExchangeConfig {
        &mut self.config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_parts(self) -> (L, C) {
        (self.link, self.clock)
    }

    /// Sends `request` and returns the validated reply payloads.
    ///
    /// An empty vector means the device did not answer in any attempt. Only
    /// transport failures are returned as errors.
    pub fn exchange(&mut self, request: &Request) -> Result<Vec<Payload>> {
        if request.max_responses == 0 {
            log::warn!(
                "Command {:02X} expects no reply frames, nothing sent",
                request.command
            );
            return Ok(Vec::new());
        }
        let attempts = u16::from(self.config.retries) + 1;
        for attempt in 1..=attempts {
            let payloads = self.attempt(request)?;
            if !payloads.is_empty() {
                return Ok(payloads);
            }
            log::warn!(
                "No data for command {:02X} on attempt {} of {}",
                request.command,
                attempt,
                attempts
            );
            if attempt < attempts {
                self.clock.sleep(self.config.retry_backoff);
            }
        }
        Ok(Vec::new())
    }

    fn attempt(&mut self, request: &Request) -> Result<Vec<Payload>> {
        let tx_buffer = frame::encode_request(self.config.address, request.command, &request.extra);
        log::trace!("write bytes: {}", bytes_to_hex(&tx_buffer));
        self.link.flush()?;
        self.link.write(&tx_buffer)?;
        self.clock.sleep(self.config.inter_command_delay);

        let timeout = request.read_timeout.unwrap_or(self.config.read_timeout);
        let mut payloads = Vec::new();
        let mut rejected = 0;
        while payloads.len() < request.max_responses {
            let rx_buffer = self.link.read(FRAME_LENGTH, timeout)?;
            if rx_buffer.is_empty() {
                log::trace!("read timed out");
                break;
            }
            log::trace!("receive_bytes: {}", bytes_to_hex(&rx_buffer));
            if rx_buffer.len() < FRAME_LENGTH {
                log::warn!(
                    "Incomplete frame - required={} received={}",
                    FRAME_LENGTH,
                    rx_buffer.len()
                );
                break;
            }
            match frame::validate_response(&rx_buffer, request.command) {
                Ok(payload) => payloads.push(payload),
                Err(rejection) => {
                    log::warn!("Frame discarded: {rejection}");
                    rejected += 1;
                    if rejected >= self.config.max_rejected_frames {
                        log::warn!("Too many discarded frames, giving up attempt");
                        break;
                    }
                }
            }
        }
        Ok(payloads)
    }
}
