use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::time::Duration;

use crate::transport::{ByteTransport, ReadStatus};

/// In-memory [`ByteTransport`].
///
/// Everything written is recorded in `tx`. Reads are served from `rx`; a read
/// that drains `rx` without meeting the terminator times out at once, since
/// nothing more will ever arrive.
#[derive(Debug)]
pub struct Loopback {
    pub tx: Vec<u8>,
    pub rx: VecDeque<u8>,
    /// Caps how many bytes a single `write` accepts, to simulate short writes.
    pub write_limit: Option<usize>,
    pub ready: bool,
    pub flushes: usize,
}

impl Loopback {
    pub fn new() -> Loopback {
        Loopback {
            tx: Vec::new(),
            rx: VecDeque::new(),
            write_limit: None,
            ready: true,
            flushes: 0,
        }
    }

    /// A transport whose input holds `data`.
    pub fn with_input(data: &[u8]) -> Loopback {
        let mut l = Loopback::new();
        l.feed(data);
        l
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }

    /// Moves everything written so far over to the input side.
    pub fn turn_around(&mut self) {
        let written = core::mem::take(&mut self.tx);
        self.feed(&written);
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Loopback::new()
    }
}

impl ByteTransport for Loopback {
    fn write(&mut self, bytes: &[u8]) -> usize {
        let n = self.write_limit.map_or(bytes.len(), |l| l.min(bytes.len()));
        self.tx.extend_from_slice(&bytes[..n]);
        n
    }

    fn read_until(
        &mut self,
        terminator: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> (usize, ReadStatus) {
        let mut n = 0;
        loop {
            let Some(&b) = self.rx.front() else {
                return (n, ReadStatus::TimedOut);
            };
            if b == terminator {
                self.rx.pop_front();
                return (n, ReadStatus::Terminated);
            }
            if n == buf.len() {
                return (n, ReadStatus::Overflow);
            }
            buf[n] = b;
            self.rx.pop_front();
            n += 1;
        }
    }

    fn has_pending(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn flush_now(&mut self) {
        self.flushes += 1;
    }

    fn purge_input(&mut self) {
        self.rx.clear();
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
