use alloc::collections::VecDeque;
use core::time::Duration;

use embedded_io::{Error, Read, ReadReady, Write};
use log::warn;

use crate::serial::take_until;
use crate::transport::{ByteTransport, Clock, Deadline, ReadStatus};

const CHUNK: usize = 64;

/// Bound on how many chunks a purge discards from a stream that keeps sending.
const PURGE_CHUNKS: usize = 16;

/// [`ByteTransport`] over a blocking `embedded-io` stream.
///
/// [`ReadReady`] is polled so a read never blocks past its deadline, and
/// the stream is read one chunk at a time so a busy link cannot hold a read
/// beyond it either.
/// Writes go through whole, as far as the stream lets them.
#[derive(Debug)]
pub struct IoTransport<S, C> {
    stream: S,
    clock: C,
    backlog: VecDeque<u8>,
    ready: bool,
}

impl<S, C> IoTransport<S, C>
where
    S: Read + Write + ReadReady,
    C: Clock,
{
    pub fn new(stream: S, clock: C) -> IoTransport<S, C> {
        IoTransport {
            stream,
            clock,
            backlog: VecDeque::new(),
            ready: true,
        }
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn release(self) -> S {
        self.stream
    }

    /// Moves at most one chunk the stream has ready into the backlog.
    ///
    /// Returns false if nothing was ready.
    fn fill(&mut self) -> bool {
        match self.stream.read_ready() {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("stream readiness error: {:?}", e.kind());
                return false;
            }
        }
        let mut chunk = [0; CHUNK];
        match self.stream.read(&mut chunk) {
            Ok(n) => {
                self.backlog.extend(&chunk[..n]);
                n > 0
            }
            Err(e) => {
                warn!("stream read error: {:?}", e.kind());
                false
            }
        }
    }
}

impl<S, C> ByteTransport for IoTransport<S, C>
where
    S: Read + Write + ReadReady,
    C: Clock,
{
    fn write(&mut self, bytes: &[u8]) -> usize {
        let mut written = 0;
        while written < bytes.len() {
            match self.stream.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) => {
                    warn!("stream write error: {:?}", e.kind());
                    break;
                }
            }
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
        self.fill();
        loop {
            if let Some(status) = take_until(&mut self.backlog, terminator, buf, &mut n) {
                return (n, status);
            }
            if deadline.passed(&self.clock) {
                return (n, ReadStatus::TimedOut);
            }
            self.fill();
        }
    }

    fn has_pending(&mut self) -> bool {
        self.fill();
        !self.backlog.is_empty()
    }

    fn flush_now(&mut self) {
        if let Err(e) = self.stream.flush() {
            warn!("stream flush error: {:?}", e.kind());
        }
    }

    fn purge_input(&mut self) {
        for _ in 0..PURGE_CHUNKS {
            if !self.fill() {
                break;
            }
        }
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

    use embedded_io::ErrorType;

    use super::*;
    use crate::transport::tests::StepClock;

    /// Stream that hands out its input a few bytes at a time.
    #[derive(Debug, Default)]
    struct Trickle {
        input: VecDeque<u8>,
        per_read: usize,
        output: Vec<u8>,
        flushed: bool,
    }

    impl ErrorType for Trickle {
        type Error = Infallible;
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = self.per_read.min(buf.len()).min(self.input.len());
            for (slot, b) in buf.iter_mut().zip(self.input.drain(..n)) {
                *slot = b;
            }
            Ok(n)
        }
    }

    impl ReadReady for Trickle {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.input.is_empty())
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            // Accept at most 3 bytes per call to exercise the write loop.
            let n = buf.len().min(3);
            self.output.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            self.flushed = true;
            Ok(())
        }
    }

    /// Always ready. The first read yields `head`, every later one a full
    /// buffer of `fill`.
    #[derive(Debug, Default)]
    struct Firehose {
        head: Vec<u8>,
        fill: Option<u8>,
        reads: usize,
    }

    impl ErrorType for Firehose {
        type Error = Infallible;
    }

    impl Read for Firehose {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            self.reads += 1;
            if self.reads == 1 {
                let n = self.head.len().min(buf.len());
                buf[..n].copy_from_slice(&self.head[..n]);
                return Ok(n);
            }
            match self.fill {
                Some(b) => {
                    buf.fill(b);
                    Ok(buf.len())
                }
                None => Ok(0),
            }
        }
    }

    impl ReadReady for Firehose {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }
    }

    impl Write for Firehose {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn firehose(head: &[u8], fill: Option<u8>) -> IoTransport<Firehose, StepClock> {
        let stream = Firehose {
            head: head.to_vec(),
            fill,
            reads: 0,
        };
        IoTransport::new(stream, StepClock::new(Duration::from_millis(1)))
    }

    fn transport(input: &[u8]) -> IoTransport<Trickle, StepClock> {
        let stream = Trickle {
            input: input.iter().copied().collect(),
            per_read: 2,
            ..Default::default()
        };
        IoTransport::new(stream, StepClock::new(Duration::from_millis(1)))
    }

    const T: Duration = Duration::from_millis(20);

    #[test]
    fn terminator_in_the_middle_of_a_chunk() {
        let mut t = transport(b"ab#cd#");
        let mut buf = [0; 8];
        assert_eq!(t.read_until(b'#', &mut buf, T), (2, ReadStatus::Terminated));
        assert_eq!(t.read_until(b'#', &mut buf, T), (2, ReadStatus::Terminated));
        assert_eq!(&buf[..2], b"cd");
        assert!(!t.has_pending());
    }

    #[test]
    fn times_out() {
        let mut t = transport(b"abc");
        let mut buf = [0; 8];
        assert_eq!(t.read_until(b'#', &mut buf, T), (3, ReadStatus::TimedOut));
    }

    #[test]
    fn overflow() {
        let mut t = transport(b"abcdef#");
        let mut buf = [0; 4];
        assert_eq!(t.read_until(b'#', &mut buf, T), (4, ReadStatus::Overflow));
        assert!(t.has_pending());
        t.purge_input();
        assert!(!t.has_pending());
    }

    #[test]
    fn writes_go_through_whole() {
        let mut t = transport(b"");
        assert_eq!(t.write(b"abcdefgh"), 8);
        t.flush_now();
        let s = t.release();
        assert_eq!(s.output, b"abcdefgh");
        assert!(s.flushed);
    }

    #[test]
    fn busy_stream_stops_at_the_terminator() {
        let mut t = firehose(b"ab#", Some(b'x'));
        let mut buf = [0; 8];
        assert_eq!(t.read_until(b'#', &mut buf, T), (2, ReadStatus::Terminated));
        assert_eq!(&buf[..2], b"ab");
        assert_eq!(t.stream.reads, 1);
        assert!(t.backlog.len() < CHUNK);
    }

    #[test]
    fn busy_stream_without_terminator_overflows() {
        let mut t = firehose(b"", Some(b'x'));
        let mut buf = [0; 8];
        assert_eq!(t.read_until(b'#', &mut buf, T), (8, ReadStatus::Overflow));
        assert!(t.stream.reads <= 2);
        assert!(t.backlog.len() <= CHUNK);
    }

    #[test]
    fn ready_but_silent_stream_times_out() {
        let mut t = firehose(b"", None);
        let mut buf = [0; 8];
        assert_eq!(t.read_until(b'#', &mut buf, T), (0, ReadStatus::TimedOut));
    }

    #[test]
    fn purge_of_a_busy_stream_is_bounded() {
        let mut t = firehose(b"stale", Some(b'x'));
        t.purge_input();
        assert_eq!(t.stream.reads, PURGE_CHUNKS);
        assert!(t.backlog.is_empty());
    }

    #[test]
    fn framer_over_io() {
        use crate::framer::Framer;

        let mut sender = Framer::new(transport(b""));
        sender.send(b"\\##\\");
        let wire = sender.into_inner().release().output;

        let mut receiver = Framer::new(transport(&wire));
        let mut buf = [0; 32];
        assert_eq!(receiver.receive(&mut buf), Ok(&b"\\##\\"[..]));
    }
}
