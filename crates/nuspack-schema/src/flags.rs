//! Content type flags as stored in TMD content records.

use std::fmt;
use std::ops::BitOr;

/// Bitset describing one content's type, written verbatim into its TMD
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentFlags(u16);

impl ContentFlags {
    /// Payload is encrypted under the title key. Set on every content this
    /// packer produces.
    pub const ENCRYPTED: Self = Self(0x0001);

    /// Integrity is a block-chained hash tree rather than a single
    /// whole-file digest.
    pub const HASHED: Self = Self(0x0002);

    /// Content may be shared with a parent title and skipped on install.
    pub const OPTIONAL: Self = Self(0x4000);

    /// Raw bit value for serialization.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ContentFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ContentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::ENCRYPTED) {
            names.push("encrypted");
        }
        if self.contains(Self::HASHED) {
            names.push("hashed");
        }
        if self.contains(Self::OPTIONAL) {
            names.push("optional");
        }
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}
