use core::marker::PhantomData;

use log::trace;

use crate::checksum::KermitCrc;
use crate::error::{EncodingError, FrameError};
use crate::markers::{Ascii, Checked, Markers};
use crate::transport::ByteTransport;
use crate::Encode;

/// Escapes `raw` and writes it through `transport`, run by run.
///
/// Unescaped runs go out verbatim in one write each, every reserved byte goes
/// out as its two byte escape pair, and `write_end` appends a bare terminator.
///
/// Returns the number of *raw* bytes whose wire form the transport fully
/// accepted (the terminator counts as one). This is accounting for the caller,
/// it says nothing about whether the encoding is valid. Short writes are not
/// retried here.
pub fn write_escaped<M, T>(transport: &mut T, raw: &[u8], write_end: bool) -> usize
where
    M: Markers,
    T: ByteTransport + ?Sized,
{
    let () = Checked::<M>::OK;
    let mut processed = 0;
    let mut run_start = 0;

    for (i, &b) in raw.iter().enumerate() {
        let pair = if b == M::END {
            M::ESC_END
        } else if b == M::ESC {
            M::ESC_ESC
        } else {
            continue;
        };
        if run_start < i {
            processed += transport.write(&raw[run_start..i]);
        }
        if transport.write(&pair) == pair.len() {
            processed += 1;
        }
        run_start = i + 1;
    }
    if run_start < raw.len() {
        processed += transport.write(&raw[run_start..]);
    }
    if write_end {
        processed += transport.write(&[M::END]);
    }
    trace!("escaped {} of {} raw bytes", processed, raw.len());
    processed
}

/// Number of wire bytes `raw` escapes to, terminator excluded.
pub fn escaped_len<M: Markers>(raw: &[u8]) -> usize {
    raw.len()
        + raw
            .iter()
            .filter(|&&b| b == M::END || b == M::ESC)
            .count()
}

/// Escapes `raw` into `out`, which must hold `escaped_len(raw)` bytes.
fn escape_into<M: Markers>(raw: &[u8], out: &mut [u8]) -> usize {
    let mut n = 0;
    for &b in raw {
        if b == M::END {
            out[n..n + 2].copy_from_slice(&M::ESC_END);
            n += 2;
        } else if b == M::ESC {
            out[n..n + 2].copy_from_slice(&M::ESC_ESC);
            n += 2;
        } else {
            out[n] = b;
            n += 1;
        }
    }
    n
}

/// Decodes the byte or escape pair starting at `wire[i]`.
///
/// Returns the raw byte and how many wire bytes it took.
fn unescape_at<M: Markers>(wire: &[u8], i: usize) -> Result<(u8, usize), EncodingError> {
    let b = wire[i];
    if b != M::ESC {
        return Ok((b, 1));
    }
    match wire.get(i + 1) {
        Some(&s) if s == M::SUB_END => Ok((M::END, 2)),
        Some(&s) if s == M::SUB_ESC => Ok((M::ESC, 2)),
        Some(&found) => Err(EncodingError::MalformedEscape { index: i, found }),
        None => Err(EncodingError::TrailingEscape),
    }
}

/// Reverses the escaping of `wire` into `dest`.
///
/// `wire` is a frame body as read off the transport, terminator excluded.
/// Returns the number of raw bytes written to `dest`. No byte count is
/// returned for a malformed frame.
pub fn unescape<M: Markers>(wire: &[u8], dest: &mut [u8]) -> Result<usize, FrameError> {
    let () = Checked::<M>::OK;
    let mut r = 0;
    let mut w = 0;
    while r < wire.len() {
        let (b, used) = unescape_at::<M>(wire, r)?;
        let Some(slot) = dest.get_mut(w) else {
            return Err(FrameError::BufferTooSmall {
                capacity: dest.len(),
            });
        };
        *slot = b;
        r += used;
        w += 1;
    }
    Ok(w)
}

/// Like [`unescape`], decoding `buf` onto itself.
///
/// The raw form is never longer than the wire form, so the output always fits.
pub fn unescape_in_place<M: Markers>(buf: &mut [u8]) -> Result<usize, FrameError> {
    let () = Checked::<M>::OK;
    let mut r = 0;
    let mut w = 0;
    while r < buf.len() {
        let (b, used) = unescape_at::<M>(buf, r)?;
        buf[w] = b;
        r += used;
        w += 1;
    }
    Ok(w)
}

/// One logical message: the payload and, if checksums are in use, its CRC.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a, M: Markers = Ascii> {
    data: &'a [u8],
    crc: Option<u16>,
    markers: PhantomData<M>,
}

impl<'a, M: Markers> Frame<'a, M> {
    /// A frame without a checksum trailer.
    pub fn new(data: &'a [u8]) -> Frame<'a, M> {
        Frame {
            data,
            crc: None,
            markers: PhantomData,
        }
    }

    /// A frame carrying the CRC-16/KERMIT of `data`.
    pub fn checked(data: &'a [u8]) -> Frame<'a, M> {
        Frame::with_checksum(data, KermitCrc::checksum(data))
    }

    pub fn with_checksum(data: &'a [u8], crc: u16) -> Frame<'a, M> {
        Frame {
            data,
            crc: Some(crc),
            markers: PhantomData,
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn crc(&self) -> Option<u16> {
        self.crc
    }

    /// Wire size including the terminator.
    pub fn size(&self) -> usize {
        let crc = self.crc.map_or(0, |c| escaped_len::<M>(&c.to_be_bytes()));
        escaped_len::<M>(self.data) + crc + 1
    }

    /// Writes the frame through `transport`, returning the raw byte accounting
    /// of [`write_escaped`] summed over payload, checksum and terminator.
    pub fn write_to<T: ByteTransport + ?Sized>(&self, transport: &mut T) -> usize {
        let mut n = write_escaped::<M, T>(transport, self.data, false);
        if let Some(crc) = self.crc {
            n += write_escaped::<M, T>(transport, &crc.to_be_bytes(), false);
        }
        n + transport.write(&[M::END])
    }
}

impl<'a, M: Markers> Encode for Frame<'a, M> {
    type Error = FrameError;

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let () = Checked::<M>::OK;
        if buffer.len() < self.size() {
            return Err(FrameError::BufferTooSmall {
                capacity: buffer.len(),
            });
        }
        // ESCAPED DATA | ESCAPED CRC (0 or 2 raw bytes) | END
        let mut n = escape_into::<M>(self.data, buffer);
        if let Some(crc) = self.crc {
            n += escape_into::<M>(&crc.to_be_bytes(), &mut buffer[n..]);
        }
        buffer[n] = M::END;
        Ok(n + 1)
    }
}
