//! Per-content integrity digests.
//!
//! Non-hashed contents carry a single SHA-1 over the whole ciphertext.
//! Hashed contents carry a block-chained hash tree: one SHA-1 per 64 KiB
//! plaintext block, with the top-level digest being SHA-1 over the
//! concatenated block digests. Tampering with any block is detectable
//! from the top-level digest alone. The builder only produces digests;
//! verification is the console's job.

use nuspack_schema::HASH_BLOCK_SIZE;
use sha1::{Digest, Sha1};

/// Streaming digest state for one content.
#[derive(Debug)]
pub enum ContentDigester {
    /// Whole-ciphertext digest for non-hashed contents.
    Whole(Sha1),
    /// Block-chained plaintext digest for hashed contents.
    Blocked {
        /// Digest of the block currently being filled.
        current: Sha1,
        /// Bytes fed into `current` so far.
        filled: usize,
        /// Completed per-block digests, in block order.
        block_digests: Vec<[u8; 20]>,
    },
}

impl ContentDigester {
    /// Create the digester matching a content's `hashed` flag.
    pub fn new(hashed: bool) -> Self {
        if hashed {
            Self::Blocked {
                current: Sha1::new(),
                filled: 0,
                block_digests: Vec::new(),
            }
        } else {
            Self::Whole(Sha1::new())
        }
    }

    /// Feed plaintext. Only the blocked mode consumes it.
    pub fn update_plaintext(&mut self, mut data: &[u8]) {
        let Self::Blocked {
            current,
            filled,
            block_digests,
        } = self
        else {
            return;
        };
        while !data.is_empty() {
            let take = (HASH_BLOCK_SIZE - *filled).min(data.len());
            current.update(&data[..take]);
            *filled += take;
            data = &data[take..];
            if *filled == HASH_BLOCK_SIZE {
                block_digests.push(current.finalize_reset().into());
                *filled = 0;
            }
        }
    }

    /// Feed ciphertext. Only the whole-file mode consumes it.
    pub fn update_ciphertext(&mut self, data: &[u8]) {
        if let Self::Whole(sha) = self {
            sha.update(data);
        }
    }

    /// Produce the 20-byte top-level digest.
    pub fn finalize(self) -> [u8; 20] {
        match self {
            Self::Whole(sha) => sha.finalize().into(),
            Self::Blocked {
                current,
                filled,
                mut block_digests,
            } => {
                // A trailing partial block gets its own digest; an empty
                // content hashes one empty block so the value is defined.
                if filled > 0 || block_digests.is_empty() {
                    block_digests.push(current.finalize().into());
                }
                let mut top = Sha1::new();
                for digest in &block_digests {
                    top.update(digest);
                }
                top.finalize().into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked_digest(data: &[u8]) -> [u8; 20] {
        let mut d = ContentDigester::new(true);
        d.update_plaintext(data);
        d.finalize()
    }

    #[test]
    fn whole_mode_matches_plain_sha1() {
        let mut d = ContentDigester::new(false);
        d.update_ciphertext(b"cipher");
        d.update_plaintext(b"ignored plaintext");
        let expected: [u8; 20] = Sha1::digest(b"cipher").into();
        assert_eq!(d.finalize(), expected);
    }

    #[test]
    fn blocked_mode_chains_block_digests() {
        let data = vec![0x5Au8; HASH_BLOCK_SIZE + 100];
        let block0: [u8; 20] = Sha1::digest(&data[..HASH_BLOCK_SIZE]).into();
        let block1: [u8; 20] = Sha1::digest(&data[HASH_BLOCK_SIZE..]).into();
        let mut top = Sha1::new();
        top.update(block0);
        top.update(block1);
        let expected: [u8; 20] = top.finalize().into();

        assert_eq!(blocked_digest(&data), expected);
    }

    #[test]
    fn blocked_mode_is_chunking_independent() {
        let data: Vec<u8> = (0..3 * HASH_BLOCK_SIZE + 7).map(|i| (i % 251) as u8).collect();
        let whole = blocked_digest(&data);

        let mut d = ContentDigester::new(true);
        for chunk in data.chunks(1234) {
            d.update_plaintext(chunk);
        }
        assert_eq!(d.finalize(), whole);
    }

    #[test]
    fn empty_content_has_defined_digest() {
        let empty_block: [u8; 20] = Sha1::digest(b"").into();
        let expected: [u8; 20] = Sha1::digest(empty_block).into();
        assert_eq!(blocked_digest(&[]), expected);
    }

    #[test]
    fn single_byte_change_flips_top_digest() {
        let mut data = vec![0u8; 2 * HASH_BLOCK_SIZE];
        let before = blocked_digest(&data);
        data[HASH_BLOCK_SIZE + 17] ^= 1;
        assert_ne!(blocked_digest(&data), before);
    }
}
