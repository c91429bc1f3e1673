//! Title-key management and streaming content encryption.
//!
//! All payload encryption is AES-128-CBC under the per-title key. IVs are
//! derived, never random: the title-key wrap uses the big-endian title id
//! left-aligned in a zero block, and each content uses its own big-endian
//! index the same way. Two contents must never share an IV under the same
//! title key, which the dense unique indices guarantee.

use std::io::{Read, Write};

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use nuspack_schema::{CIPHER_BLOCK_SIZE, HASH_BLOCK_SIZE, Key};
use rand::RngCore;
use zeroize::Zeroize;

use crate::digest::ContentDigester;
use crate::error::PackError;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// The plaintext title key for one build.
///
/// Exists only in memory for the duration of content encryption; the
/// backing bytes are cleared on drop, on success and error paths alike.
pub struct TitleKey([u8; 16]);

impl TitleKey {
    /// Draw a fresh key from the thread-local CSPRNG. Never deterministic;
    /// tests use [`TitleKey::fixed`] for golden outputs.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Use a caller-supplied key as the title key.
    pub fn fixed(key: Key) -> Self {
        Self(*key.as_bytes())
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Encrypt this key under the common key for transport in the ticket.
    /// Single AES-CBC block, IV derived from the title id, no padding.
    /// Deterministic given (title key, common key, title id).
    pub fn wrap(&self, common_key: &Key, title_id: u64) -> [u8; 16] {
        let iv = title_id_iv(title_id);
        let mut block = self.0;
        let mut enc = Aes128CbcEnc::new(common_key.as_bytes().into(), (&iv).into());
        enc.encrypt_block_mut(GenericArray::from_mut_slice(&mut block));
        block
    }
}

impl Drop for TitleKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for TitleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the plaintext key.
        f.write_str("TitleKey(..)")
    }
}

/// Invert [`TitleKey::wrap`]. Used to verify tickets and by tests.
pub fn unwrap_title_key(wrapped: &[u8; 16], common_key: &Key, title_id: u64) -> Key {
    let iv = title_id_iv(title_id);
    let mut block = *wrapped;
    let mut dec = Aes128CbcDec::new(common_key.as_bytes().into(), (&iv).into());
    dec.decrypt_block_mut(GenericArray::from_mut_slice(&mut block));
    Key::from_bytes(block)
}

/// IV for the title-key wrap: big-endian title id in bytes 0..8, zeros in
/// 8..16.
fn title_id_iv(title_id: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&title_id.to_be_bytes());
    iv
}

/// IV for one content: big-endian content index in bytes 0..2, zeros
/// elsewhere.
fn content_iv(index: u16) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..2].copy_from_slice(&index.to_be_bytes());
    iv
}

/// Sizes produced by one content encryption.
#[derive(Debug, Clone, Copy)]
pub struct ContentCrypt {
    /// Bytes read from the source.
    pub plaintext_len: u64,
    /// Bytes written, zero-padded to the cipher block size.
    pub encrypted_len: u64,
}

/// Encrypt one content stream under the title key.
///
/// Streams in 64 KiB chunks so memory stays O(chunk) for multi-gigabyte
/// contents. Plaintext is fed to `digester` before in-place encryption;
/// ciphertext after. The final partial block is zero-padded, so the
/// output length is the plaintext length rounded up to 16 bytes.
///
/// # Errors
///
/// `PackError::Io` on any read or write failure. Partial output must be
/// discarded by the caller; there is no retry.
pub fn encrypt_content<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    title_key: &TitleKey,
    index: u16,
    digester: &mut ContentDigester,
) -> Result<ContentCrypt, PackError> {
    let iv = content_iv(index);
    let mut enc = Aes128CbcEnc::new(title_key.as_bytes().into(), (&iv).into());

    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    let mut plaintext_len: u64 = 0;
    let mut encrypted_len: u64 = 0;

    loop {
        let read = read_full(&mut reader, &mut buf)?;
        if read == 0 {
            break;
        }
        plaintext_len += read as u64;
        digester.update_plaintext(&buf[..read]);

        let padded = read.next_multiple_of(CIPHER_BLOCK_SIZE);
        buf[read..padded].fill(0);
        for block in buf[..padded].chunks_exact_mut(CIPHER_BLOCK_SIZE) {
            enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        digester.update_ciphertext(&buf[..padded]);
        writer.write_all(&buf[..padded])?;
        encrypted_len += padded as u64;

        if read < buf.len() {
            break; // EOF reached mid-chunk
        }
    }
    writer.flush()?;

    Ok(ContentCrypt {
        plaintext_len,
        encrypted_len,
    })
}

/// Read until `buf` is full or the stream ends; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
