/// Why a frame could not be turned back into a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// An escape byte was followed by something other than a substitute.
    #[error("malformed escape at wire offset {index} (found {found:#04x})")]
    MalformedEscape { index: usize, found: u8 },

    /// The frame ended on an escape byte.
    #[error("frame ends in a lone escape byte")]
    TrailingEscape,

    /// Checksums are enabled but the frame is too short to carry one.
    #[error("frame of {len} bytes is too short for a checksum")]
    MissingChecksum { len: usize },

    /// The received checksum does not match the payload.
    #[error("checksum mismatch (calculated {calculated:#06x}, found {found:#06x})")]
    ChecksumMismatch { calculated: u16, found: u16 },
}

/// Errors produced while sending or receiving frames.
///
/// Every variant is recoverable: callers may simply issue the operation again,
/// optionally after purging pending input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// No terminator arrived within the read timeout.
    #[error("timed out waiting for a frame terminator")]
    Timeout,

    /// The destination filled up before a terminator was seen.
    #[error("frame does not fit in {capacity} bytes")]
    BufferTooSmall { capacity: usize },

    /// The transport is not initialised.
    #[error("transport not ready")]
    NotReady,

    #[error("bad frame encoding: {0}")]
    Encoding(#[from] EncodingError),
}

/// Coarse outcome class of a [`FrameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Buffer,
    Stream,
    Encoding,
}

impl FrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::Timeout => ErrorKind::Timeout,
            FrameError::BufferTooSmall { .. } => ErrorKind::Buffer,
            FrameError::NotReady => ErrorKind::Stream,
            FrameError::Encoding(_) => ErrorKind::Encoding,
        }
    }
}

pub type Result<T> = core::result::Result<T, FrameError>;
