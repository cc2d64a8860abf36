use core::time::Duration;

/// How a [`ByteTransport::read_until`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The terminator was found and consumed. It is not stored in the buffer.
    Terminated,
    /// The timeout elapsed before a terminator arrived.
    TimedOut,
    /// The buffer filled up before a terminator arrived.
    Overflow,
}

/// The byte stream underneath a [`Framer`](crate::Framer).
///
/// Implemented by the environment: a serial port, a USB CDC endpoint, or an
/// in-memory double such as [`Loopback`](crate::Loopback).
pub trait ByteTransport {
    /// Writes as much of `bytes` as the transport accepts and returns how
    /// many were taken. Must not block without bound.
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Reads into `buf` until `terminator` is seen, `buf` is full, or
    /// `timeout` elapses, whichever comes first.
    ///
    /// Returns the number of bytes stored and why the read stopped. The
    /// implementation is responsible for returning within `timeout`.
    fn read_until(&mut self, terminator: u8, buf: &mut [u8], timeout: Duration)
    -> (usize, ReadStatus);

    /// True if received bytes are waiting to be read.
    fn has_pending(&mut self) -> bool;

    /// Pushes buffered output onto the wire.
    fn flush_now(&mut self);

    /// Discards everything received but not yet read.
    fn purge_input(&mut self);

    fn is_ready(&self) -> bool;
}

impl<T: ByteTransport + ?Sized> ByteTransport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> usize {
        (**self).write(bytes)
    }

    fn read_until(
        &mut self,
        terminator: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (usize, ReadStatus) {
        (**self).read_until(terminator, buf, timeout)
    }

    fn has_pending(&mut self) -> bool {
        (**self).has_pending()
    }

    fn flush_now(&mut self) {
        (**self).flush_now()
    }

    fn purge_input(&mut self) {
        (**self).purge_input()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Monotonic time source for the polling adapters.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> StdClock {
        StdClock {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        StdClock::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deadline arithmetic shared by the adapters.
///
/// Holds only the instant, so the owner stays free to borrow itself mutably
/// while the deadline is live.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Duration,
}

impl Deadline {
    pub(crate) fn after<C: Clock>(clock: &C, timeout: Duration) -> Self {
        Deadline {
            at: clock.now().saturating_add(timeout),
        }
    }

    pub(crate) fn passed<C: Clock>(&self, clock: &C) -> bool {
        clock.now() >= self.at
    }
}
