//! Exotically-sized integers used by the MIDI standard.
//!
//! These are thin wrappers that guarantee that the unused top bits are always zero, so a
//! channel can never be 16 and a key can never be 128.

use crate::prelude::*;

macro_rules! restricted_int {
    {$(#[$attr:meta])* $name:ident : $inner:tt => $bits:expr} => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
        #[repr(transparent)]
        #[allow(non_camel_case_types)]
        pub struct $name($inner);
        impl From<$inner> for $name {
            /// Lossy conversion, loses the top bits.
            #[inline]
            fn from(raw: $inner) -> $name {
                $name::from_int_lossy(raw)
            }
        }
        impl From<$name> for $inner {
            #[inline]
            fn from(restricted: $name) -> $inner {
                restricted.0
            }
        }
        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
        impl $name {
            const MASK: $inner = (1 << $bits) - 1;

            /// The maximum value that this restricted integer can hold.
            #[inline]
            pub const fn max_value() -> $name {
                $name(Self::MASK)
            }

            /// Creates a restricted int from its primitive counterpart, truncating the top bits.
            #[inline]
            pub const fn new(raw: $inner) -> $name {
                $name(raw & Self::MASK)
            }

            /// Like `new`, but usable where the lossy intent should be explicit.
            #[inline]
            pub const fn from_int_lossy(raw: $inner) -> $name {
                $name(raw & Self::MASK)
            }

            /// Returns `None` if the raw value has any of the top bits set.
            #[inline]
            pub fn try_from(raw: $inner) -> Option<$name> {
                if raw <= Self::MASK {
                    Some($name(raw))
                } else {
                    None
                }
            }

            /// Get the primitive counterpart of this restricted integer.
            #[inline]
            pub fn as_int(self) -> $inner {
                self.0
            }
        }
        impl PartialEq<$inner> for $name {
            fn eq(&self, rhs: &$inner) -> bool {
                self.as_int() == *rhs
            }
        }
        impl PartialOrd<$inner> for $name {
            fn partial_cmp(&self, rhs: &$inner) -> Option<core::cmp::Ordering> {
                Some(self.as_int().cmp(rhs))
            }
        }
    };
}

restricted_int! {
    /// A 4-bit integer type, used for MIDI channels.
    ///
    /// Wraps the `u8` type and ensures that the top 4 bits are always zero.
    u4: u8 => 4
}
restricted_int! {
    /// A 7-bit integer type, used for keys, velocities and most other MIDI data bytes.
    ///
    /// Wraps the `u8` type and ensures that the top bit is always zero.
    u7: u8 => 7
}
restricted_int! {
    /// A 14-bit integer type.
    ///
    /// Wraps the `u16` type and ensures that the top two bits are always zero.
    u14: u16 => 14
}
restricted_int! {
    /// A 24-bit integer type.
    ///
    /// Wraps the `u32` type and ensures that the top 8 bits are always zero.
    u24: u32 => 24
}
restricted_int! {
    /// Referred to in the MIDI spec as "variable length int".
    ///
    /// This is the type of every delta time, so no two consecutive events in a track may be
    /// more than `u28::max_value()` ticks apart.
    u28: u32 => 28
}

impl u28 {
    /// Encode a tick distance as a delta time.
    ///
    /// Fails with `ErrorKind::DeltaOverflow` instead of truncating.
    pub(crate) fn from_ticks(ticks: u64) -> Result<u28> {
        if ticks <= u64::from(u28::max_value().as_int()) {
            Ok(u28(ticks as u32))
        } else {
            Err(ErrorKind::DeltaOverflow(ticks).into())
        }
    }

    /// The delta time as an amount of ticks.
    #[inline]
    pub fn ticks(self) -> u64 {
        u64::from(self.0)
    }
}
