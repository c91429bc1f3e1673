//! Ticket binary serialization.
//!
//! The Ticket carries the wrapped title key and the title identity the
//! console needs to decrypt contents. Same bit-exact layout rules as the
//! TMD; the signature is a zero placeholder.

use bytes::{BufMut, BytesMut};

use crate::tmd::put_issuer;
use crate::{SIGNATURE_TYPE, TICKET_ISSUER};

/// Serialized ticket size.
pub const TICKET_SIZE: usize = 0x2A4;

/// A ticket, ready to serialize.
#[derive(Debug, Clone)]
pub struct Ticket {
    /// Title key encrypted under the common key.
    pub wrapped_title_key: [u8; 16],
    /// Ticket id.
    pub ticket_id: u64,
    /// 64-bit title id.
    pub title_id: u64,
    /// Title version.
    pub title_version: u16,
}

impl Ticket {
    /// Derive the deterministic ticket id for a title. Keeping this a pure
    /// function of the title id makes fixed-key builds byte-reproducible.
    pub fn ticket_id_for(title_id: u64) -> u64 {
        0x0005_0000_0000_0000 | (title_id & 0xFFFF_FFFF)
    }

    /// Serialize to the console's exact binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(TICKET_SIZE);
        buf.put_u32(SIGNATURE_TYPE);
        buf.put_bytes(0, 0x100); // signature placeholder
        buf.put_bytes(0, 0x3C);
        put_issuer(&mut buf, TICKET_ISSUER);
        buf.put_bytes(0, 0x3C); // ECDH data placeholder
        buf.put_u8(1); // version
        buf.put_u8(0); // ca crl version
        buf.put_u8(0); // signer crl version
        buf.put_slice(&self.wrapped_title_key);
        buf.put_u8(0);
        buf.put_u64(self.ticket_id);
        buf.put_u32(0); // console id placeholder
        buf.put_u64(self.title_id);
        buf.put_u16(0);
        buf.put_u16(self.title_version);
        buf.put_u32(0); // permitted titles mask
        buf.put_u32(0xFFFF_FFFF); // permit mask
        buf.put_u8(0); // title export allowed
        buf.put_u8(0); // common key index
        buf.put_bytes(0, 0x30);
        buf.put_bytes(0xFF, 0x40); // content access permissions
        buf.put_bytes(0, 2);
        buf.put_bytes(0, 8 * 8); // limit entries

        debug_assert_eq!(buf.len(), TICKET_SIZE);
        buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ticket() -> Ticket {
        Ticket {
            wrapped_title_key: [0xAA; 16],
            ticket_id: Ticket::ticket_id_for(0x0005_0000_1000_0001),
            title_id: 0x0005_0000_1000_0001,
            title_version: 3,
        }
    }

    #[test]
    fn serialized_size_is_fixed() {
        assert_eq!(sample_ticket().to_bytes().len(), TICKET_SIZE);
    }

    #[test]
    fn fields_land_at_documented_offsets() {
        let bytes = sample_ticket().to_bytes();
        assert_eq!(&bytes[0..4], &SIGNATURE_TYPE.to_be_bytes());
        assert_eq!(
            &bytes[0x140..0x140 + TICKET_ISSUER.len()],
            TICKET_ISSUER.as_bytes()
        );
        assert_eq!(bytes[0x1BC], 1); // version
        assert_eq!(&bytes[0x1BF..0x1CF], &[0xAA; 16]); // wrapped title key
        assert_eq!(
            &bytes[0x1D0..0x1D8],
            &0x0005_0000_1000_0001u64.to_be_bytes()
        );
        assert_eq!(&bytes[0x1D8..0x1DC], &0u32.to_be_bytes()); // console id
        assert_eq!(
            &bytes[0x1DC..0x1E4],
            &0x0005_0000_1000_0001u64.to_be_bytes()
        );
        assert_eq!(&bytes[0x1E6..0x1E8], &3u16.to_be_bytes());
        assert_eq!(&bytes[0x1EC..0x1F0], &0xFFFF_FFFFu32.to_be_bytes());
        assert_eq!(bytes[0x1F1], 0); // common key index
        assert!(bytes[0x222..0x262].iter().all(|&b| b == 0xFF));
        assert!(bytes[0x264..].iter().all(|&b| b == 0));
    }

    #[test]
    fn ticket_id_keeps_low_word_of_title_id() {
        assert_eq!(
            Ticket::ticket_id_for(0x0005_0002_1234_5678),
            0x0005_0000_1234_5678
        );
    }

    #[test]
    fn serialization_is_deterministic() {
        let ticket = sample_ticket();
        assert_eq!(ticket.to_bytes(), ticket.to_bytes());
    }
}
