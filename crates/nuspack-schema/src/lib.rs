//! Shared types and wire format for nuspack.
//!
//! Everything a NUS package writer and its callers agree on lives here:
//! the [`Key`] newtype, content type flags, the byte-exact Title Metadata
//! and Ticket serializers, and the platform constants (issuers, block
//! sizes, default keys, output file names). This crate does no I/O.

pub mod flags;
pub mod key;
pub mod ticket;
pub mod tmd;

// Re-exports
pub use flags::ContentFlags;
pub use key::{Key, KeyError};
pub use ticket::Ticket;
pub use tmd::{Tmd, TmdContent};

/// AES block size in bytes. Encrypted content sizes are always a multiple
/// of this.
pub const CIPHER_BLOCK_SIZE: usize = 16;

/// Plaintext block size for hashed contents (64 KiB). One digest is
/// computed per block of this size.
pub const HASH_BLOCK_SIZE: usize = 0x10000;

/// Signature type tag written to both TMD and Ticket headers
/// (RSA-2048 / SHA-256).
pub const SIGNATURE_TYPE: u32 = 0x0001_0004;

/// Issuer written into the TMD header.
pub const TMD_ISSUER: &str = "Root-CA00000003-CP0000000b";

/// Issuer written into the Ticket header.
pub const TICKET_ISSUER: &str = "Root-CA00000003-XS0000000c";

/// Fallback encryption key used when the caller supplies an empty or
/// malformed key string.
pub const DEFAULT_ENCRYPTION_KEY: &str = "13371337133713371337133713371337";

/// Fallback wrap ("encrypt key with") key. Packages built with this key
/// will not decrypt on real hardware; a real common key must be supplied.
pub const DEFAULT_ENCRYPT_WITH_KEY: &str = "00000000000000000000000000000000";

/// File next to the working directory from which the wrap key is loaded
/// when not passed on the command line.
pub const ENCRYPT_WITH_FILE: &str = "encryptKeyWith.txt";

/// Output file name for the Title Metadata.
pub const TMD_FILE: &str = "title.tmd";

/// Output file name for the Ticket.
pub const TICKET_FILE: &str = "title.tik";

/// Output file name for the certificate chain passthrough.
pub const CERT_FILE: &str = "title.cert";

/// Output file name for one encrypted content payload.
pub fn content_file_name(content_id: u32) -> String {
    format!("{content_id:08X}.app")
}
