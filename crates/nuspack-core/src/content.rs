//! Content descriptors and per-content build results.

use std::path::PathBuf;

use nuspack_schema::ContentFlags;

/// One logical content of the package, bound to a source file.
///
/// Created by rule resolution and read-only afterward. Indices are dense,
/// 0-based and strictly increasing; index 0 is always the executable.
#[derive(Debug, Clone)]
pub struct ContentDescriptor {
    /// Dense 0-based index. Feeds IV derivation, so it must be stable
    /// across runs for identical inputs.
    pub index: u16,
    /// Content id; names the output payload file. Equal to the index.
    pub id: u32,
    /// Type flags.
    pub flags: ContentFlags,
    /// Source path relative to the input root, `/`-separated.
    pub rel_path: String,
    /// Resolved absolute source path.
    pub source: PathBuf,
}

impl ContentDescriptor {
    /// Whether this content uses the block-chained hash tree.
    pub fn is_hashed(&self) -> bool {
        self.flags.contains(ContentFlags::HASHED)
    }
}

/// The outcome of encrypting and digesting one content. Produced exactly
/// once per descriptor.
#[derive(Debug, Clone)]
pub struct ContentResult {
    /// The descriptor this result belongs to.
    pub descriptor: ContentDescriptor,
    /// Original plaintext size in bytes.
    pub plaintext_size: u64,
    /// Ciphertext size, zero-padded to the cipher block size.
    pub encrypted_size: u64,
    /// Top-level SHA-1 digest per the content's flags.
    pub digest: [u8; 20],
}
