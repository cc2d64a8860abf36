use core::marker::PhantomData;
use core::time::Duration;

use log::{debug, trace, warn};

use crate::checksum::KermitCrc;
use crate::error::{EncodingError, FrameError, Result};
use crate::markers::{Ascii, Markers};
use crate::slip::{Frame, unescape_in_place};
use crate::transport::{ByteTransport, ReadStatus};

/// Default bound on a single [`Framer::receive`].
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// CRC trailer size in raw bytes.
const CRC_SIZE: usize = 2;

/// What to make of a terminator that arrives with nothing before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyFrame {
    /// Treat it as if nothing arrived: [`FrameError::Timeout`].
    #[default]
    Timeout,
    /// Deliver it as an empty message. With checksums enabled an empty frame
    /// cannot carry a CRC and is rejected as [`EncodingError::MissingChecksum`].
    Deliver,
}

#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Append a CRC-16/KERMIT to sent frames and verify it on received ones.
    pub use_crc: bool,
    /// Passed to [`ByteTransport::read_until`] on every receive.
    pub read_timeout: Duration,
    pub empty_frame: EmptyFrame,
    /// Discard pending input whenever a receive fails.
    pub purge_on_error: bool,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            use_crc: true,
            read_timeout: DEFAULT_READ_TIMEOUT,
            empty_frame: EmptyFrame::Timeout,
            purge_on_error: false,
        }
    }
}

/// Sends and receives checksummed frames over one [`ByteTransport`].
///
/// A framer keeps no state between messages apart from its CRC register,
/// which is reset at the start of every send and receive. It is not meant to
/// be shared: callers needing concurrent access must serialize it themselves.
#[derive(Debug)]
pub struct Framer<T: ByteTransport, M: Markers = Ascii> {
    transport: T,
    config: FramerConfig,
    crc: KermitCrc,
    markers: PhantomData<M>,
}

impl<T: ByteTransport> Framer<T, Ascii> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, FramerConfig::default())
    }

    pub fn with_config(transport: T, config: FramerConfig) -> Self {
        Self::with_markers(transport, config)
    }
}

impl<T: ByteTransport, M: Markers> Framer<T, M> {
    /// A framer using marker set `M`, e.g. `Framer::<_, Rfc1055>::with_markers(..)`.
    pub fn with_markers(transport: T, config: FramerConfig) -> Self {
        Framer {
            transport,
            config,
            crc: KermitCrc::new(),
            markers: PhantomData,
        }
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut FramerConfig {
        &mut self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends `payload` as one frame.
    ///
    /// Returns the raw byte accounting of the write: payload bytes, CRC bytes
    /// and the terminator whose wire form the transport fully accepted, so a
    /// complete send of an `n` byte payload returns `n + 3` with checksums
    /// and `n + 1` without. Returns 0 without writing if the transport is not
    /// ready. Short writes are neither retried nor reported as errors.
    pub fn send(&mut self, payload: &[u8]) -> usize {
        if !self.transport.is_ready() {
            debug!("send of {} bytes skipped, transport not ready", payload.len());
            return 0;
        }
        let frame = if self.config.use_crc {
            self.crc.reset();
            Frame::<M>::with_checksum(payload, self.crc.update(payload))
        } else {
            Frame::<M>::new(payload)
        };
        let sent = frame.write_to(&mut self.transport);

        let crc_len = if self.config.use_crc { CRC_SIZE } else { 0 };
        let expected = payload.len() + crc_len + 1;
        if sent != expected {
            warn!("short write: {} of {} raw bytes accepted", sent, expected);
        } else {
            trace!("sent frame of {} bytes ({} on the wire)", payload.len(), frame.size());
        }
        sent
    }

    /// Writes a bare terminator, which a receiver sees as an empty frame.
    ///
    /// Useful to flush line noise out of the peer's receive buffer.
    pub fn send_break(&mut self) -> usize {
        if !self.transport.is_ready() {
            return 0;
        }
        self.transport.write(&[M::END])
    }

    /// Receives the next frame into `buf` and returns its verified payload.
    ///
    /// Blocks until a terminator arrives, `buf` fills up, or the configured
    /// read timeout elapses. One byte of `buf` is held back, so at most
    /// `buf.len() - 1` wire bytes are read. The payload is decoded in place
    /// and the checksum, when enabled, is stripped.
    pub fn receive<'b>(&mut self, buf: &'b mut [u8]) -> Result<&'b [u8]> {
        match self.receive_len(buf) {
            Ok(n) => Ok(&buf[..n]),
            Err(e) => {
                if self.config.purge_on_error {
                    self.transport.purge_input();
                }
                Err(e)
            }
        }
    }

    /// Like [`receive`](Framer::receive), copying the payload into an owned
    /// buffer of capacity `N`.
    pub fn receive_vec<const N: usize>(&mut self) -> Result<heapless::Vec<u8, N>> {
        let mut buf = [0; N];
        let payload = self.receive(&mut buf)?;
        let mut v = heapless::Vec::new();
        // A payload never exceeds the wire bytes read into `buf`.
        v.extend_from_slice(payload)
            .map_err(|_| FrameError::BufferTooSmall { capacity: N })?;
        Ok(v)
    }

    fn receive_len(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.transport.is_ready() {
            return Err(FrameError::NotReady);
        }

        let limit = buf.len().saturating_sub(1);
        let (nread, status) =
            self.transport
                .read_until(M::END, &mut buf[..limit], self.config.read_timeout);
        match status {
            ReadStatus::Terminated => {}
            ReadStatus::TimedOut => {
                debug!("no terminator after {} bytes, timed out", nread);
                return Err(FrameError::Timeout);
            }
            ReadStatus::Overflow => {
                debug!("no terminator within {} bytes", limit);
                return Err(FrameError::BufferTooSmall { capacity: limit });
            }
        }
        if nread == 0 {
            match self.config.empty_frame {
                EmptyFrame::Timeout => return Err(FrameError::Timeout),
                EmptyFrame::Deliver if !self.config.use_crc => return Ok(0),
                EmptyFrame::Deliver => {}
            }
        }
        trace!("read {} wire bytes", nread);

        let n = unescape_in_place::<M>(&mut buf[..nread]).inspect_err(|e| {
            warn!("dropping frame: {}", e);
        })?;
        if !self.config.use_crc {
            return Ok(n);
        }
        self.verify(&buf[..n])
    }

    /// Checks the trailing big-endian CRC and returns the payload length.
    fn verify(&mut self, decoded: &[u8]) -> Result<usize> {
        let Some(len) = decoded.len().checked_sub(CRC_SIZE) else {
            warn!("dropping frame of {} bytes: no room for a checksum", decoded.len());
            return Err(EncodingError::MissingChecksum {
                len: decoded.len(),
            }
            .into());
        };
        let (payload, trailer) = decoded.split_at(len);
        let found = u16::from_be_bytes([trailer[0], trailer[1]]);

        self.crc.reset();
        let calculated = self.crc.update(payload);
        if calculated != found {
            warn!(
                "dropping frame: checksum {:#06x} does not match {:#06x}",
                found, calculated
            );
            return Err(EncodingError::ChecksumMismatch { calculated, found }.into());
        }
        debug!("received frame of {} bytes", len);
        Ok(len)
    }

    pub fn has_pending(&mut self) -> bool {
        self.transport.has_pending()
    }

    pub fn flush(&mut self) {
        self.transport.flush_now()
    }

    pub fn purge_input(&mut self) {
        self.transport.purge_input()
    }

    pub fn is_ready(&self) -> bool {
        self.transport.is_ready()
    }
}
