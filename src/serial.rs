use alloc::collections::VecDeque;
use core::time::Duration;

use embedded_hal_nb::serial::{Error, Read, Write};
use log::warn;

use crate::transport::{ByteTransport, Clock, Deadline, ReadStatus};

/// Default bound on a single [`ByteTransport::write`] or flush.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Bound on bytes pulled from the port by one `has_pending` or purge.
const BUFFER_PASS: usize = 64;

/// Moves bytes from the front of `backlog` into `buf[*n..]` until the
/// terminator is consumed or `buf` is full.
///
/// Returns `None` if `backlog` ran dry first. A byte that does not fit stays
/// at the front of `backlog`.
pub(crate) fn take_until(
    backlog: &mut VecDeque<u8>,
    terminator: u8,
    buf: &mut [u8],
    n: &mut usize,
) -> Option<ReadStatus> {
    while let Some(&b) = backlog.front() {
        if b == terminator {
            backlog.pop_front();
            return Some(ReadStatus::Terminated);
        }
        if *n == buf.len() {
            return Some(ReadStatus::Overflow);
        }
        buf[*n] = b;
        *n += 1;
        backlog.pop_front();
    }
    None
}

/// [`ByteTransport`] over a non-blocking `embedded-hal-nb` serial port.
///
/// Reads poll the port until the deadline taken from `C`; bytes received
/// past a terminator or an overflow are kept for the next read.
#[derive(Debug)]
pub struct SerialTransport<S, C> {
    serial: S,
    clock: C,
    backlog: VecDeque<u8>,
    write_timeout: Duration,
    ready: bool,
}

impl<S, C> SerialTransport<S, C>
where
    S: Read + Write,
    C: Clock,
{
    pub fn new(serial: S, clock: C) -> SerialTransport<S, C> {
        SerialTransport {
            serial,
            clock,
            backlog: VecDeque::new(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ready: true,
        }
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Marks the port as (un)usable, e.g. when the host drops DTR.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn release(self) -> S {
        self.serial
    }

    /// Load what the port has into the backlog, at most [`BUFFER_PASS`] bytes.
    fn buffer(&mut self) {
        for _ in 0..BUFFER_PASS {
            match self.serial.read() {
                Ok(b) => self.backlog.push_back(b),
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => {
                    warn!("serial read error: {:?}", e.kind());
                    break;
                }
            }
        }
    }
}

impl<S, C> ByteTransport for SerialTransport<S, C>
where
    S: Read + Write,
    C: Clock,
{
    fn write(&mut self, bytes: &[u8]) -> usize {
        let deadline = Deadline::after(&self.clock, self.write_timeout);
        let mut written = 0;
        for &b in bytes {
            loop {
                match self.serial.write(b) {
                    Ok(()) => break,
                    Err(nb::Error::WouldBlock) if !deadline.passed(&self.clock) => {}
                    Err(nb::Error::WouldBlock) => return written,
                    Err(nb::Error::Other(e)) => {
                        warn!("serial write error: {:?}", e.kind());
                        return written;
                    }
                }
            }
            written += 1;
        }
        written
    }

    fn read_until(
        &mut self,
        terminator: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> (usize, ReadStatus) {
        let deadline = Deadline::after(&self.clock, timeout);
        let mut n = 0;
        loop {
            if let Some(status) = take_until(&mut self.backlog, terminator, buf, &mut n) {
                return (n, status);
            }
            match self.serial.read() {
                Ok(b) => self.backlog.push_back(b),
                Err(nb::Error::WouldBlock) => {
                    if deadline.passed(&self.clock) {
                        return (n, ReadStatus::TimedOut);
                    }
                }
                Err(nb::Error::Other(e)) => {
                    // A garbled byte is dropped; the frame checksum catches it.
                    warn!("serial read error: {:?}", e.kind());
                    if deadline.passed(&self.clock) {
                        return (n, ReadStatus::TimedOut);
                    }
                }
            }
        }
    }

    fn has_pending(&mut self) -> bool {
        self.buffer();
        !self.backlog.is_empty()
    }

    fn flush_now(&mut self) {
        let deadline = Deadline::after(&self.clock, self.write_timeout);
        loop {
            match self.serial.flush() {
                Ok(()) => return,
                Err(nb::Error::WouldBlock) if !deadline.passed(&self.clock) => {}
                Err(nb::Error::WouldBlock) => {
                    warn!("serial flush timed out");
                    return;
                }
                Err(nb::Error::Other(e)) => {
                    warn!("serial flush error: {:?}", e.kind());
                    return;
                }
            }
        }
    }

    fn purge_input(&mut self) {
        self.buffer();
        self.backlog.clear();
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use core::convert::Infallible;

    use embedded_hal_nb::serial::ErrorType;

    use super::*;
    use crate::transport::tests::StepClock;

    /// Serial port fed from a script; `None` entries block once.
    #[derive(Debug, Default)]
    struct ScriptedSerial {
        rx: VecDeque<Option<u8>>,
        tx: Vec<u8>,
        tx_space: Option<usize>,
    }

    impl ScriptedSerial {
        fn with_input(data: &[u8]) -> ScriptedSerial {
            ScriptedSerial {
                rx: data.iter().map(|&b| Some(b)).collect(),
                ..Default::default()
            }
        }
    }

    impl ErrorType for ScriptedSerial {
        type Error = Infallible;
    }

    impl Read for ScriptedSerial {
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            match self.rx.pop_front() {
                Some(Some(b)) => Ok(b),
                _ => Err(nb::Error::WouldBlock),
            }
        }
    }

    impl Write for ScriptedSerial {
        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            if let Some(space) = self.tx_space.as_mut() {
                if *space == 0 {
                    return Err(nb::Error::WouldBlock);
                }
                *space -= 1;
            }
            self.tx.push(word);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Ok(())
        }
    }

    fn transport(serial: ScriptedSerial) -> SerialTransport<ScriptedSerial, StepClock> {
        SerialTransport::new(serial, StepClock::new(Duration::from_millis(1)))
    }

    const T: Duration = Duration::from_millis(50);

    #[test]
    fn reads_across_would_block() {
        let mut s = ScriptedSerial::with_input(b"ab");
        s.rx.push_back(None);
        s.rx.extend([Some(b'c'), Some(b'#'), Some(b'x')]);
        let mut t = transport(s);

        let mut buf = [0; 8];
        assert_eq!(t.read_until(b'#', &mut buf, T), (3, ReadStatus::Terminated));
        assert_eq!(&buf[..3], b"abc");
        assert!(t.has_pending());
    }

    #[test]
    fn times_out_without_terminator() {
        let mut t = transport(ScriptedSerial::with_input(b"abc"));
        let mut buf = [0; 8];
        assert_eq!(t.read_until(b'#', &mut buf, T), (3, ReadStatus::TimedOut));
    }

    #[test]
    fn overflow_keeps_the_extra_byte() {
        let mut t = transport(ScriptedSerial::with_input(b"abcde#"));
        let mut buf = [0; 3];
        assert_eq!(t.read_until(b'#', &mut buf, T), (3, ReadStatus::Overflow));
        assert_eq!(t.read_until(b'#', &mut buf, T), (2, ReadStatus::Terminated));
        assert_eq!(&buf[..2], b"de");
    }

    #[test]
    fn write_gives_up_at_the_deadline() {
        let mut s = ScriptedSerial::default();
        s.tx_space = Some(2);
        let mut t = transport(s);
        assert_eq!(t.write(b"abcd"), 2);
        assert_eq!(t.release().tx, b"ab");
    }

    #[test]
    fn purge_drops_everything_received() {
        let mut t = transport(ScriptedSerial::with_input(b"stale#data"));
        t.purge_input();
        assert!(!t.has_pending());
    }

    #[test]
    fn busy_port_is_buffered_one_pass_at_a_time() {
        let flood = [b'x'; 3 * BUFFER_PASS];
        let mut t = transport(ScriptedSerial::with_input(&flood));
        assert!(t.has_pending());
        assert_eq!(t.backlog.len(), BUFFER_PASS);
        assert_eq!(t.serial.rx.len(), 2 * BUFFER_PASS);

        t.purge_input();
        assert!(t.backlog.is_empty());
        assert_eq!(t.serial.rx.len(), BUFFER_PASS);
    }

    #[test]
    fn framer_over_serial() {
        use crate::framer::Framer;

        let mut sender = Framer::new(transport(ScriptedSerial::default()));
        assert_eq!(sender.send(b"A#B\\C"), 8);
        let wire = sender.into_inner().release().tx;

        let mut receiver = Framer::new(transport(ScriptedSerial::with_input(&wire)));
        let mut buf = [0; 32];
        assert_eq!(receiver.receive(&mut buf), Ok(&b"A#B\\C"[..]));
    }
}
