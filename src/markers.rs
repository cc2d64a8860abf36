//! Reserved bytes of the framing.
//!
//! A marker set is chosen at build time through the [`Markers`] type
//! parameter; nothing about it is negotiated on the wire.

/// Terminator, escape byte and the two substitutes that follow an escape.
pub trait Markers {
    /// Ends a frame.
    const END: u8;
    /// Starts a two byte escape sequence.
    const ESC: u8;
    /// Follows `ESC` in place of an `END` payload byte.
    const SUB_END: u8;
    /// Follows `ESC` in place of an `ESC` payload byte.
    const SUB_ESC: u8;

    const ESC_END: [u8; 2] = [Self::ESC, Self::SUB_END];
    const ESC_ESC: [u8; 2] = [Self::ESC, Self::SUB_ESC];
}

/// Printable markers used by the device firmware: `#`, `\`, `N`, `E`.
///
/// Handy on a terminal, since frames stay readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ascii;

impl Markers for Ascii {
    const END: u8 = b'#';
    const ESC: u8 = b'\\';
    const SUB_END: u8 = b'N';
    const SUB_ESC: u8 = b'E';
}

/// The RFC 1055 values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc1055;

impl Markers for Rfc1055 {
    const END: u8 = 0xC0;
    const ESC: u8 = 0xDB;
    const SUB_END: u8 = 0xDC;
    const SUB_ESC: u8 = 0xDD;
}

/// True if decoding with `M` can never be ambiguous.
pub const fn unambiguous<M: Markers>() -> bool {
    M::END != M::ESC
        && M::SUB_END != M::END
        && M::SUB_END != M::ESC
        && M::SUB_ESC != M::END
        && M::SUB_ESC != M::ESC
        && M::SUB_END != M::SUB_ESC
}

pub(crate) struct Checked<M>(core::marker::PhantomData<M>);

impl<M: Markers> Checked<M> {
    /// Evaluated once per marker set that is actually used.
    pub(crate) const OK: () = assert!(
        unambiguous::<M>(),
        "marker set is ambiguous: END, ESC and both substitutes must all differ"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SameSubstitutes;

    impl Markers for SameSubstitutes {
        const END: u8 = 0x01;
        const ESC: u8 = 0x02;
        const SUB_END: u8 = 0x03;
        const SUB_ESC: u8 = 0x03;
    }

    struct SubstituteIsEnd;

    impl Markers for SubstituteIsEnd {
        const END: u8 = 0x01;
        const ESC: u8 = 0x02;
        const SUB_END: u8 = 0x01;
        const SUB_ESC: u8 = 0x04;
    }

    #[test]
    fn bundled_sets_are_unambiguous() {
        assert!(unambiguous::<Ascii>());
        assert!(unambiguous::<Rfc1055>());
    }

    #[test]
    fn clashing_sets_are_rejected() {
        assert!(!unambiguous::<SameSubstitutes>());
        assert!(!unambiguous::<SubstituteIsEnd>());
    }

    #[test]
    fn escape_pairs() {
        assert_eq!(Ascii::ESC_END, *b"\\N");
        assert_eq!(Ascii::ESC_ESC, *b"\\E");
        assert_eq!(Rfc1055::ESC_END, [0xDB, 0xDC]);
    }
}
