//! Image header persisted at the end of each bank.
//!
//! | Offset | Field     |                                   |
//! |--------|-----------|-----------------------------------|
//! | 0      | `magic`   | [`HEADER_MAGIC`]                  |
//! | 4      | `version` | firmware version                  |
//! | 8      | `size`    | image size in bytes               |
//! | 12     | `crc`     | CRC32 (IEEE) of the image bytes   |
//! | 16     | `state`   | see [`HeaderState`]               |
//!
//! All fields are little endian. The state word is last so a header can
//! be invalidated in place with a single word write.
use crate::error::Error;
#[cfg(target_arch = "arm")]
use defmt::Format;
use nom::{number::complete::le_u32, sequence::tuple, IResult};

pub const HEADER_SIZE: usize = 20;
pub const HEADER_MAGIC: u32 = 0x4C53_5542;
pub const STATE_OFFSET: usize = 16;

const ERASED: u32 = 0xFFFF_FFFF;
const VALID: u32 = 0x5A5A_A5A5;
const INVALIDATED: u32 = 0x0000_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum HeaderState {
    /// Never finalized.
    Erased,
    Valid,
    /// Superseded by a newer image, or rejected on authentication.
    Invalidated,
}

impl HeaderState {
    pub fn word(self) -> u32 {
        match self {
            HeaderState::Erased => ERASED,
            HeaderState::Valid => VALID,
            HeaderState::Invalidated => INVALIDATED,
        }
    }

    fn from_word(word: u32) -> Option<Self> {
        match word {
            ERASED => Some(HeaderState::Erased),
            VALID => Some(HeaderState::Valid),
            INVALIDATED => Some(HeaderState::Invalidated),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub struct ImageHeader {
    pub version: u32,
    pub size: u32,
    pub crc: u32,
    pub state: HeaderState,
}

impl ImageHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let words = [HEADER_MAGIC, self.version, self.size, self.crc, self.state.word()];
        bytes.chunks_exact_mut(4).zip(words.iter()).for_each(|(chunk, word)| {
            chunk.copy_from_slice(&word.to_le_bytes());
        });
        bytes
    }

    /// Decodes a raw header. A fully erased header reports
    /// [`Error::BankEmpty`], anything else that doesn't decode reports
    /// [`Error::HeaderInvalid`].
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self, Error> {
        if bytes.iter().all(|b| *b == 0xFF) {
            return Err(Error::BankEmpty);
        }
        let (_, (magic, version, size, crc, state)) =
            words(bytes).map_err(|_| Error::HeaderInvalid)?;
        match (magic, HeaderState::from_word(state)) {
            (HEADER_MAGIC, Some(state)) => Ok(Self { version, size, crc, state }),
            _ => Err(Error::HeaderInvalid),
        }
    }
}

fn words(input: &[u8]) -> IResult<&[u8], (u32, u32, u32, u32, u32)> {
    tuple((le_u32, le_u32, le_u32, le_u32, le_u32))(input)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_layout_is_little_endian_with_state_last() {
        let header =
            ImageHeader { version: 3, size: 0x0102, crc: 0xAABB_CCDD, state: HeaderState::Valid };
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..4], &[0x42, 0x55, 0x53, 0x4C]);
        assert_eq!(&bytes[4..8], &[3, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[0x02, 0x01, 0, 0]);
        assert_eq!(&bytes[12..16], &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(&bytes[STATE_OFFSET..], &VALID.to_le_bytes());
        assert_eq!(ImageHeader::parse(&bytes), Ok(header));
    }

    #[test]
    fn erased_and_corrupted_headers_are_told_apart() {
        assert_eq!(ImageHeader::parse(&[0xFF; HEADER_SIZE]), Err(Error::BankEmpty));

        let header =
            ImageHeader { version: 1, size: 4, crc: 0, state: HeaderState::Invalidated };
        let mut bytes = header.to_bytes();
        assert_eq!(ImageHeader::parse(&bytes).map(|h| h.state), Ok(HeaderState::Invalidated));

        bytes[0] ^= 0x01;
        assert_eq!(ImageHeader::parse(&bytes), Err(Error::HeaderInvalid));

        let mut bytes = header.to_bytes();
        bytes[STATE_OFFSET] = 0x12;
        assert_eq!(ImageHeader::parse(&bytes), Err(Error::HeaderInvalid));
    }
}
