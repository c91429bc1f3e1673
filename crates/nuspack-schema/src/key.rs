//! Fixed-length symmetric key newtype.

use thiserror::Error;

/// Errors from [`Key`] construction.
#[derive(Error, Debug)]
pub enum KeyError {
    /// Input was not exactly 32 characters.
    #[error("invalid key length: expected 32 hex characters, got {0}")]
    Length(usize),

    /// Input held non-hex characters.
    #[error("key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A 16-byte AES key.
///
/// Provides compile-time distinction from other byte buffers and validated
/// construction from the 32-hex-character form used on the command line.
/// Equality is plain comparison; keys of this type are configuration
/// inputs, not secrets compared at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key([u8; 16]);

impl Key {
    /// Parse a key from a 32-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the string is not exactly 32 ASCII hex
    /// characters.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        if s.len() != 32 {
            return Err(KeyError::Length(s.len()));
        }
        let raw = hex::decode(s)?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    /// Construct a key from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Return the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl From<[u8; 16]> for Key {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_32_hex_chars() {
        let key = Key::from_hex("000102030405060708090A0B0C0D0E0F").unwrap();
        assert_eq!(
            key.as_bytes(),
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]
        );
    }

    #[test]
    fn rejects_short_key() {
        match Key::from_hex("0011223344556677889900112233445") {
            Err(KeyError::Length(31)) => {}
            other => panic!("expected length error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_hex() {
        assert!(Key::from_hex("zz102030405060708090A0B0C0D0E0F0").is_err());
    }

    #[test]
    fn display_is_uppercase_hex() {
        let key = Key::from_bytes([0xAB; 16]);
        assert_eq!(key.to_string(), "AB".repeat(16));
    }

    #[test]
    fn hex_roundtrip() {
        let s = "13371337133713371337133713371337";
        assert_eq!(Key::from_hex(s).unwrap().to_string(), s);
    }
}
