//! Bit-packed method facets.
//!
//! The bit positions below are part of the persisted format. A new facet must
//! take an unused bit; existing bits are never renumbered.
//!
//! | bit | mask   | facet                          |
//! |-----|--------|--------------------------------|
//! | 0   | `0x01` | constructor                    |
//! | 1   | `0x02` | varargs                        |
//! | 2   | `0x04` | annotation method              |
//! | 3   | `0x08` | deprecated (doc comment tag)   |
//! | 4   | `0x10` | deprecated (annotation)        |
//! | 5   | `0x20` | parsed via generic signature   |

use serde::Deserialize;
use serde::Serialize;
use std::fmt;

const CONSTRUCTOR: u8 = 0x01;
const VARARGS: u8 = 0x02;
const ANNOTATION: u8 = 0x04;
const DEPRECATED: u8 = 0x08;
const DEPRECATED_ANNOTATION: u8 = 0x10;
const PARSED_VIA_GENERIC_SIGNATURE: u8 = 0x20;

/// Packed flags byte of a method descriptor
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodFlags(u8);

impl MethodFlags {
    /// Pack the externally settable facets.
    ///
    /// The generic-signature bit is reserved for the codec and cannot be set here.
    pub const fn pack(
        is_constructor: bool,
        is_varargs: bool,
        is_annotation_method: bool,
        is_deprecated: bool,
        has_deprecated_annotation: bool,
    ) -> Self {
        let mut bits = 0;
        if is_constructor {
            bits |= CONSTRUCTOR;
        }
        if is_varargs {
            bits |= VARARGS;
        }
        if is_annotation_method {
            bits |= ANNOTATION;
        }
        if is_deprecated {
            bits |= DEPRECATED;
        }
        if has_deprecated_annotation {
            bits |= DEPRECATED_ANNOTATION;
        }
        Self(bits)
    }

    /// Rebuild flags from a previously persisted byte, keeping every bit as written
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_constructor(self) -> bool {
        self.0 & CONSTRUCTOR != 0
    }

    pub const fn is_varargs(self) -> bool {
        self.0 & VARARGS != 0
    }

    pub const fn is_annotation_method(self) -> bool {
        self.0 & ANNOTATION != 0
    }

    /// Deprecated through a documentation comment tag
    pub const fn is_deprecated(self) -> bool {
        self.0 & DEPRECATED != 0
    }

    /// Deprecated through an explicit annotation
    pub const fn has_deprecated_annotation(self) -> bool {
        self.0 & DEPRECATED_ANNOTATION != 0
    }

    pub const fn is_parsed_via_generic_signature(self) -> bool {
        self.0 & PARSED_VIA_GENERIC_SIGNATURE != 0
    }

    pub(crate) const fn with_generic_signature(self, parsed: bool) -> Self {
        if parsed {
            Self(self.0 | PARSED_VIA_GENERIC_SIGNATURE)
        } else {
            Self(self.0 & !PARSED_VIA_GENERIC_SIGNATURE)
        }
    }
}

impl fmt::Debug for MethodFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodFlags")
            .field("bits", &format_args!("{:#04x}", self.0))
            .field("constructor", &self.is_constructor())
            .field("varargs", &self.is_varargs())
            .field("annotation", &self.is_annotation_method())
            .field("deprecated", &self.is_deprecated())
            .field("deprecated_annotation", &self.has_deprecated_annotation())
            .field("generic_signature", &self.is_parsed_via_generic_signature())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bit_positions_are_stable() {
        assert_eq!(MethodFlags::pack(true, false, false, false, false).bits(), 0x01);
        assert_eq!(MethodFlags::pack(false, true, false, false, false).bits(), 0x02);
        assert_eq!(MethodFlags::pack(false, false, true, false, false).bits(), 0x04);
        assert_eq!(MethodFlags::pack(false, false, false, true, false).bits(), 0x08);
        assert_eq!(MethodFlags::pack(false, false, false, false, true).bits(), 0x10);
    }

    #[test]
    fn test_generic_signature_bit() {
        let flags = MethodFlags::pack(true, true, true, true, true);
        assert!(!flags.is_parsed_via_generic_signature());

        let parsed = flags.with_generic_signature(true);
        assert!(parsed.is_parsed_via_generic_signature());
        assert_eq!(parsed.bits(), 0x3f);
        assert_eq!(parsed.with_generic_signature(false), flags);
    }

    #[test]
    fn test_from_bits_keeps_unknown_bits() {
        let flags = MethodFlags::from_bits(0xc2);
        assert!(flags.is_varargs());
        assert_eq!(flags.bits(), 0xc2);
    }

    proptest! {
        #[test]
        fn pack_round_trips(
            constructor in any::<bool>(),
            varargs in any::<bool>(),
            annotation in any::<bool>(),
            deprecated in any::<bool>(),
            deprecated_annotation in any::<bool>(),
        ) {
            let flags = MethodFlags::pack(constructor, varargs, annotation, deprecated, deprecated_annotation);
            let restored = MethodFlags::from_bits(flags.bits());
            prop_assert_eq!(restored.is_constructor(), constructor);
            prop_assert_eq!(restored.is_varargs(), varargs);
            prop_assert_eq!(restored.is_annotation_method(), annotation);
            prop_assert_eq!(restored.is_deprecated(), deprecated);
            prop_assert_eq!(restored.has_deprecated_annotation(), deprecated_annotation);
            prop_assert!(!restored.is_parsed_via_generic_signature());
        }
    }
}
