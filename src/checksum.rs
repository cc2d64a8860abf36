use crc::{Crc, Digest};

/// CRC-16/KERMIT: poly 0x1021, init 0x0000, reflected in and out, no final xor.
static KERMIT: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_KERMIT);

/// Streaming CRC-16/KERMIT register.
///
/// Feeding `a` then `b` yields the same value as feeding `a ++ b` at once.
/// The register must be [`reset`](KermitCrc::reset) before every message.
#[derive(Clone)]
pub struct KermitCrc {
    digest: Digest<'static, u16>,
}

impl KermitCrc {
    pub fn new() -> KermitCrc {
        KermitCrc {
            digest: KERMIT.digest(),
        }
    }

    pub fn reset(&mut self) {
        self.digest = KERMIT.digest();
    }

    /// Folds `data` into the register and returns the value so far.
    pub fn update(&mut self, data: &[u8]) -> u16 {
        self.digest.update(data);
        self.value()
    }

    pub fn value(&self) -> u16 {
        self.digest.clone().finalize()
    }

    /// One-shot checksum of `data`.
    pub fn checksum(data: &[u8]) -> u16 {
        KERMIT.checksum(data)
    }
}

impl Default for KermitCrc {
    fn default() -> Self {
        KermitCrc::new()
    }
}

impl core::fmt::Debug for KermitCrc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KermitCrc")
            .field("value", &format_args!("{:#06x}", self.value()))
            .finish()
    }
}
