//! Update protocol frames and command parser.
//!
//! Every frame payload starts with a command byte. Integers are little
//! endian. The integrity tag travelling with each frame is the CRC32
//! (IEEE) of its payload.
//!
//! | Command | Byte   | Body                                         |
//! |---------|--------|----------------------------------------------|
//! | Start   | `0x01` | `version: u32`, `size: u32`, `proof: [u8]`   |
//! | Data    | `0x02` | `sequence: u16`, `chunk: [u8; 1..=128]`      |
//! | Abort   | `0x03` | -                                            |
use crate::error::Error;
use crc::crc32;
#[cfg(target_arch = "arm")]
use defmt::Format;
use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{eof, rest, verify},
    number::complete::{le_u16, le_u32},
    IResult,
};
use static_assertions::const_assert;

pub const START: u8 = 0x01;
pub const DATA: u8 = 0x02;
pub const ABORT: u8 = 0x03;

pub const MAX_PAYLOAD_SIZE: usize = 136;
pub const MAX_CHUNK_SIZE: usize = 128;
pub const MAX_PROOF_SIZE: usize = 64;

const START_HEADER_SIZE: usize = 1 + 4 + 4;
const DATA_HEADER_SIZE: usize = 1 + 2;

const_assert!(START_HEADER_SIZE + MAX_PROOF_SIZE <= MAX_PAYLOAD_SIZE);
const_assert!(DATA_HEADER_SIZE + MAX_CHUNK_SIZE <= MAX_PAYLOAD_SIZE);
const_assert!(MAX_PAYLOAD_SIZE <= u8::MAX as usize);

/// One inbound message, as delivered by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    buffer: [u8; MAX_PAYLOAD_SIZE],
    length: usize,
    integrity_tag: u32,
}

impl Frame {
    /// Wraps a received payload and the tag that travelled with it.
    /// Returns `None` if the payload doesn't fit in a frame.
    pub fn new(payload: &[u8], integrity_tag: u32) -> Option<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return None;
        }
        let mut buffer = [0u8; MAX_PAYLOAD_SIZE];
        buffer[..payload.len()].copy_from_slice(payload);
        Some(Self { buffer, length: payload.len(), integrity_tag })
    }

    /// Frame whose integrity tag is computed from its payload.
    pub fn sealed(payload: &[u8]) -> Option<Self> {
        Self::new(payload, crc32::checksum_ieee(payload))
    }

    pub fn start(version: u32, size: u32, proof: &[u8]) -> Option<Self> {
        let mut payload = [0u8; MAX_PAYLOAD_SIZE];
        let length = START_HEADER_SIZE + proof.len();
        if proof.len() > MAX_PROOF_SIZE {
            return None;
        }
        payload[0] = START;
        payload[1..5].copy_from_slice(&version.to_le_bytes());
        payload[5..9].copy_from_slice(&size.to_le_bytes());
        payload[START_HEADER_SIZE..length].copy_from_slice(proof);
        Self::sealed(&payload[..length])
    }

    pub fn data(sequence: u16, chunk: &[u8]) -> Option<Self> {
        let mut payload = [0u8; MAX_PAYLOAD_SIZE];
        let length = DATA_HEADER_SIZE + chunk.len();
        if chunk.is_empty() || chunk.len() > MAX_CHUNK_SIZE {
            return None;
        }
        payload[0] = DATA;
        payload[1..3].copy_from_slice(&sequence.to_le_bytes());
        payload[DATA_HEADER_SIZE..length].copy_from_slice(chunk);
        Self::sealed(&payload[..length])
    }

    pub fn abort() -> Self {
        let mut buffer = [0u8; MAX_PAYLOAD_SIZE];
        buffer[0] = ABORT;
        Self { buffer, length: 1, integrity_tag: crc32::checksum_ieee(&[ABORT]) }
    }

    pub fn payload(&self) -> &[u8] { &self.buffer[..self.length] }
    pub fn integrity_tag(&self) -> u32 { self.integrity_tag }
}

/// Decoded frame payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Begins (or restarts) the transfer of an image of `size` bytes.
    /// `proof` authenticates the complete image.
    Start { version: u32, size: u32, proof: &'a [u8] },
    /// Carries the next slice of the image.
    Data { sequence: u16, chunk: &'a [u8] },
    /// Abandons the transfer.
    Abort,
}

/// Reason a frame was rejected, sent back in a negative acknowledgement.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum ErrorCode {
    Integrity = 0x01,
    Malformed = 0x02,
    UnknownCommand = 0x03,
    NotReceiving = 0x04,
    Sequence = 0x05,
    ImageTooBig = 0x06,
    Overflow = 0x07,
    Authenticity = 0x08,
    Storage = 0x09,
    /// The offered version is not newer than the installed firmware.
    Downgrade = 0x0A,
}

impl ErrorCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => ErrorCode::Integrity,
            0x02 => ErrorCode::Malformed,
            0x03 => ErrorCode::UnknownCommand,
            0x04 => ErrorCode::NotReceiving,
            0x05 => ErrorCode::Sequence,
            0x06 => ErrorCode::ImageTooBig,
            0x07 => ErrorCode::Overflow,
            0x08 => ErrorCode::Authenticity,
            0x09 => ErrorCode::Storage,
            0x0A => ErrorCode::Downgrade,
            _ => return None,
        })
    }
}

impl From<Error> for ErrorCode {
    fn from(error: Error) -> Self {
        match error {
            Error::ImageTooBig => ErrorCode::ImageTooBig,
            Error::ImageIncomplete => ErrorCode::Overflow,
            Error::CrcInvalid => ErrorCode::Authenticity,
            _ => ErrorCode::Storage,
        }
    }
}

/// Status reply sent after every processed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum Ack {
    Positive,
    Negative(ErrorCode),
}

impl Ack {
    pub const POSITIVE: u8 = 0x00;

    pub fn to_byte(self) -> u8 {
        match self {
            Ack::Positive => Self::POSITIVE,
            Ack::Negative(code) => code as u8,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::POSITIVE => Some(Ack::Positive),
            code => ErrorCode::from_byte(code).map(Ack::Negative),
        }
    }
}

/// Decodes a frame payload into a [`Command`].
pub fn parse_command(input: &[u8]) -> Result<Command<'_>, ErrorCode> {
    match input.first() {
        None => Err(ErrorCode::Malformed),
        Some(&START) | Some(&DATA) | Some(&ABORT) => alt((parse_start, parse_data, parse_abort))(input)
            .map(|(_, command)| command)
            .map_err(|_| ErrorCode::Malformed),
        Some(_) => Err(ErrorCode::UnknownCommand),
    }
}

fn parse_start(input: &[u8]) -> IResult<&[u8], Command<'_>> {
    let (input, _) = tag(&[START][..])(input)?;
    let (input, version) = le_u32(input)?;
    let (input, size) = le_u32(input)?;
    let (input, proof) = verify(rest, |proof: &[u8]| proof.len() <= MAX_PROOF_SIZE)(input)?;
    Ok((input, Command::Start { version, size, proof }))
}

fn parse_data(input: &[u8]) -> IResult<&[u8], Command<'_>> {
    let (input, _) = tag(&[DATA][..])(input)?;
    let (input, sequence) = le_u16(input)?;
    let (input, chunk) =
        verify(rest, |chunk: &[u8]| !chunk.is_empty() && chunk.len() <= MAX_CHUNK_SIZE)(input)?;
    Ok((input, Command::Data { sequence, chunk }))
}

fn parse_abort(input: &[u8]) -> IResult<&[u8], Command<'_>> {
    let (input, _) = tag(&[ABORT][..])(input)?;
    let (input, _) = eof(input)?;
    Ok((input, Command::Abort))
}
