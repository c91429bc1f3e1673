//! Title Metadata (TMD) binary serialization.
//!
//! The TMD describes a title's identity and one record per content. The
//! target console verifies field widths and offsets exactly, so the layout
//! here is written field by field in big-endian order rather than relying
//! on native struct layout. Signature bytes are zero placeholders; this
//! packer does not sign.

use bytes::{BufMut, BytesMut};
use sha2::{Digest, Sha256};

use crate::{ContentFlags, SIGNATURE_TYPE, TMD_ISSUER};

/// Offset of the content chunk records from the start of the TMD.
pub const CHUNK_RECORDS_OFFSET: usize = 0xB04;

/// Size of one content chunk record.
pub const CHUNK_RECORD_SIZE: usize = 0x30;

/// Number of content-info record slots. Only slot 0 is populated.
const INFO_RECORD_SLOTS: usize = 64;

/// Size of one content-info record.
const INFO_RECORD_SIZE: usize = 0x24;

/// One content's entry in the TMD.
#[derive(Debug, Clone)]
pub struct TmdContent {
    /// Content id; also names the `.app` payload file.
    pub id: u32,
    /// Dense 0-based content index.
    pub index: u16,
    /// Type flags.
    pub flags: ContentFlags,
    /// Encrypted payload size in bytes (multiple of the cipher block).
    pub encrypted_size: u64,
    /// Top-level SHA-1 digest of the content.
    pub digest: [u8; 20],
}

/// Title Metadata, ready to serialize.
#[derive(Debug, Clone)]
pub struct Tmd {
    /// Target OS version.
    pub os_version: u64,
    /// 64-bit title id.
    pub title_id: u64,
    /// Application type flags.
    pub app_type: u32,
    /// Content group id (bits 8-23 of the title id).
    pub group_id: u16,
    /// Title version.
    pub title_version: u16,
    /// Content records in index order.
    pub contents: Vec<TmdContent>,
}

impl Tmd {
    /// Total serialized size for this TMD.
    pub fn byte_len(&self) -> usize {
        CHUNK_RECORDS_OFFSET + self.contents.len() * CHUNK_RECORD_SIZE
    }

    /// Serialize to the console's exact binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let chunk_records = self.chunk_record_bytes();
        let info_records = info_record_bytes(self.contents.len() as u16, &chunk_records);
        let info_digest = Sha256::digest(&info_records);

        let mut buf = BytesMut::with_capacity(self.byte_len());
        buf.put_u32(SIGNATURE_TYPE);
        buf.put_bytes(0, 0x100); // signature placeholder
        buf.put_bytes(0, 0x3C);
        put_issuer(&mut buf, TMD_ISSUER);
        buf.put_u8(1); // format version
        buf.put_u8(0); // ca crl version
        buf.put_u8(0); // signer crl version
        buf.put_u8(0);
        buf.put_u64(self.os_version);
        buf.put_u64(self.title_id);
        buf.put_u32(self.app_type);
        buf.put_u16(self.group_id);
        buf.put_bytes(0, 0x3E);
        buf.put_u32(0); // access rights
        buf.put_u16(self.title_version);
        buf.put_u16(self.contents.len() as u16);
        buf.put_u16(0); // boot index
        buf.put_u16(0);
        buf.put_slice(&info_digest);
        buf.put_slice(&info_records);
        buf.put_slice(&chunk_records);

        debug_assert_eq!(buf.len(), self.byte_len());
        buf.to_vec()
    }

    fn chunk_record_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.contents.len() * CHUNK_RECORD_SIZE);
        for content in &self.contents {
            buf.put_u32(content.id);
            buf.put_u16(content.index);
            buf.put_u16(content.flags.bits());
            buf.put_u64(content.encrypted_size);
            buf.put_slice(&content.digest);
            buf.put_bytes(0, 12);
        }
        buf.to_vec()
    }
}

/// Build the 64-slot content-info block. Slot 0 covers all chunk records
/// with a SHA-256 over their serialized bytes; the remaining slots are
/// zero.
fn info_record_bytes(content_count: u16, chunk_records: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(INFO_RECORD_SLOTS * INFO_RECORD_SIZE);
    buf.put_u16(0); // index offset
    buf.put_u16(content_count);
    buf.put_slice(&Sha256::digest(chunk_records));
    buf.put_bytes(0, (INFO_RECORD_SLOTS - 1) * INFO_RECORD_SIZE);
    buf.to_vec()
}

/// Write a NUL-padded 64-byte issuer field.
pub(crate) fn put_issuer(buf: &mut BytesMut, issuer: &str) {
    debug_assert!(issuer.len() <= 0x40);
    buf.put_slice(issuer.as_bytes());
    buf.put_bytes(0, 0x40 - issuer.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tmd() -> Tmd {
        Tmd {
            os_version: 0x0005_0010_1000_400A,
            title_id: 0x0005_0000_1000_0001,
            app_type: 0x8000_0000,
            group_id: 0x1000,
            title_version: 0,
            contents: vec![
                TmdContent {
                    id: 0,
                    index: 0,
                    flags: ContentFlags::ENCRYPTED | ContentFlags::HASHED,
                    encrypted_size: 0x20,
                    digest: [0x11; 20],
                },
                TmdContent {
                    id: 1,
                    index: 1,
                    flags: ContentFlags::ENCRYPTED,
                    encrypted_size: 0x10,
                    digest: [0x22; 20],
                },
            ],
        }
    }

    #[test]
    fn total_size_matches_layout() {
        let tmd = sample_tmd();
        let bytes = tmd.to_bytes();
        assert_eq!(bytes.len(), 0xB04 + 2 * 0x30);
        assert_eq!(bytes.len(), tmd.byte_len());
    }

    #[test]
    fn header_fields_land_at_documented_offsets() {
        let bytes = sample_tmd().to_bytes();
        assert_eq!(&bytes[0..4], &SIGNATURE_TYPE.to_be_bytes());
        // Signature placeholder is all zero.
        assert!(bytes[0x4..0x104].iter().all(|&b| b == 0));
        assert_eq!(&bytes[0x140..0x140 + TMD_ISSUER.len()], TMD_ISSUER.as_bytes());
        assert_eq!(bytes[0x180], 1); // format version
        assert_eq!(&bytes[0x184..0x18C], &0x0005_0010_1000_400Au64.to_be_bytes());
        assert_eq!(&bytes[0x18C..0x194], &0x0005_0000_1000_0001u64.to_be_bytes());
        assert_eq!(&bytes[0x194..0x198], &0x8000_0000u32.to_be_bytes());
        assert_eq!(&bytes[0x198..0x19A], &0x1000u16.to_be_bytes());
        assert_eq!(&bytes[0x1DE..0x1E0], &2u16.to_be_bytes()); // content count
    }

    #[test]
    fn chunk_records_serialize_in_order() {
        let bytes = sample_tmd().to_bytes();
        let first = &bytes[CHUNK_RECORDS_OFFSET..CHUNK_RECORDS_OFFSET + CHUNK_RECORD_SIZE];
        assert_eq!(&first[0..4], &0u32.to_be_bytes());
        assert_eq!(&first[4..6], &0u16.to_be_bytes());
        assert_eq!(&first[6..8], &0x0003u16.to_be_bytes());
        assert_eq!(&first[8..16], &0x20u64.to_be_bytes());
        assert_eq!(&first[16..36], &[0x11; 20]);
        assert!(first[36..48].iter().all(|&b| b == 0));

        let second_off = CHUNK_RECORDS_OFFSET + CHUNK_RECORD_SIZE;
        let second = &bytes[second_off..second_off + CHUNK_RECORD_SIZE];
        assert_eq!(&second[4..6], &1u16.to_be_bytes());
        assert_eq!(&second[16..36], &[0x22; 20]);
    }

    #[test]
    fn info_record_digest_covers_chunk_records() {
        let tmd = sample_tmd();
        let bytes = tmd.to_bytes();
        let expected = Sha256::digest(&bytes[CHUNK_RECORDS_OFFSET..]);
        // Slot 0 digest at 0x204 + 4.
        assert_eq!(&bytes[0x208..0x228], expected.as_slice());
        // Block digest at 0x1E4 covers the info-record block.
        let info_digest = Sha256::digest(&bytes[0x204..0xB04]);
        assert_eq!(&bytes[0x1E4..0x204], info_digest.as_slice());
    }

    #[test]
    fn serialization_is_deterministic() {
        let tmd = sample_tmd();
        assert_eq!(tmd.to_bytes(), tmd.to_bytes());
    }
}
