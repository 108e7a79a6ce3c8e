//! Scripted link and clock for unit tests.

use crate::exchange::{Clock, SerialLink};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MockLink {
    reads: VecDeque<Vec<u8>>,
    pub writes: Vec<Vec<u8>>,
    pub flushes: usize,
    pub read_timeouts: Vec<Duration>,
    pub fail_writes: bool,
}

impl MockLink {
    /// Queues the bytes returned by the next read.
    pub fn push_read(&mut self, bytes: Vec<u8>) {
        self.reads.push_back(bytes);
    }

    /// Queues a read that times out. An exhausted queue also times out.
    pub fn push_silence(&mut self) {
        self.reads.push_back(Vec::new());
    }

    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }
}

impl SerialLink for MockLink {
    fn flush(&mut self) -> std::io::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if self.fail_writes {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "link closed",
            ));
        }
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, size: usize, timeout: Duration) -> std::io::Result<Vec<u8>> {
        self.read_timeouts.push(timeout);
        let mut bytes = self.reads.pop_front().unwrap_or_default();
        bytes.truncate(size);
        Ok(bytes)
    }
}

#[derive(Debug, Default)]
pub struct MockClock {
    pub sleeps: Vec<Duration>,
}

impl Clock for MockClock {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}
