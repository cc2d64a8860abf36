//! SLIP style framing with a CRC-16/KERMIT trailer for serial links.
//!
//! A frame on the wire is the escaped payload, optionally followed by the
//! escaped big-endian checksum of the raw payload, and a single terminator:
//!
//! ```text
//! escaped(payload) ++ escaped(crc16_be) ++ END
//! ```
//!
//! The [`Framer`] drives any [`ByteTransport`]; adapters are provided for
//! `embedded-hal-nb` serial ports ([`SerialTransport`]) and blocking
//! `embedded-io` streams ([`IoTransport`]).
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod checksum;
pub mod error;
pub mod framer;
pub mod io;
pub mod loopback;
pub mod markers;
pub mod serial;
pub mod slip;
pub mod transport;

pub trait Encode {
    type Error;

    /// Writes the wire form into `buffer`, returning the number of bytes used.
    fn encode(&self, buffer: &mut [u8]) -> core::result::Result<usize, Self::Error>;
}

pub use checksum::KermitCrc;
pub use error::{EncodingError, ErrorKind, FrameError, Result};
pub use framer::{EmptyFrame, Framer, FramerConfig};
pub use io::IoTransport;
pub use loopback::Loopback;
pub use markers::{Ascii, Markers, Rfc1055};
pub use serial::SerialTransport;
pub use slip::{Frame, escaped_len, unescape, unescape_in_place, write_escaped};
pub use transport::{ByteTransport, Clock, ReadStatus};

#[cfg(feature = "std")]
pub use transport::StdClock;
