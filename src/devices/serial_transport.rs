//! Update protocol over a byte oriented serial link.
//!
//! Frames travel as `0x7E`, a length byte, the payload, then the payload's
//! CRC32 (little endian). There is no byte stuffing: payloads may contain
//! `0x7E`, and the receiver only resynchronizes when a length is invalid.
//! Acknowledgements use the same framing with a one byte payload.
use crate::{
    devices::{
        interfaces::transport::Transport,
        protocol::{Ack, Frame, MAX_PAYLOAD_SIZE},
        traits::Serial,
    },
    error::{self, Error},
};
use crc::crc32;
#[cfg(target_arch = "arm")]
use defmt::Format;

pub const FRAME_START: u8 = 0x7E;
const TAG_SIZE: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum TransportError {
    /// `receive` was called with no complete frame pending.
    NoFrame,
    /// The serial peripheral failed while sending.
    Serial,
}

impl error::Convertible for TransportError {
    fn into(self) -> Error {
        match self {
            TransportError::NoFrame => Error::TransportError("No frame pending"),
            TransportError::Serial => Error::TransportError("Serial write failed"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Framing {
    Start,
    Length,
    Payload { length: usize, received: usize },
    Tag { length: usize, received: usize },
}

/// Transport adapter over any supported serial port.
pub struct SerialTransport<S: Serial> {
    serial: S,
    framing: Framing,
    buffer: [u8; MAX_PAYLOAD_SIZE + TAG_SIZE],
    pending: Option<Frame>,
}

impl<S: Serial> SerialTransport<S> {
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            framing: Framing::Start,
            buffer: [0u8; MAX_PAYLOAD_SIZE + TAG_SIZE],
            pending: None,
        }
    }

    /// Releases the serial port.
    pub fn free(self) -> S { self.serial }

    fn consume(&mut self, byte: u8) {
        self.framing = match self.framing {
            Framing::Start if byte == FRAME_START => Framing::Length,
            Framing::Start => Framing::Start,
            Framing::Length => match byte as usize {
                length if length > 0 && length <= MAX_PAYLOAD_SIZE => {
                    Framing::Payload { length, received: 0 }
                }
                _ => Framing::Start,
            },
            Framing::Payload { length, received } => {
                self.buffer[received] = byte;
                match received + 1 {
                    received if received == length => Framing::Tag { length, received: 0 },
                    received => Framing::Payload { length, received },
                }
            }
            Framing::Tag { length, received } => {
                self.buffer[length + received] = byte;
                if received + 1 < TAG_SIZE {
                    Framing::Tag { length, received: received + 1 }
                } else {
                    let mut tag = [0u8; TAG_SIZE];
                    tag.copy_from_slice(&self.buffer[length..length + TAG_SIZE]);
                    self.pending = Frame::new(&self.buffer[..length], u32::from_le_bytes(tag));
                    Framing::Start
                }
            }
        };
    }
}

impl<S: Serial> Transport for SerialTransport<S> {
    type Error = TransportError;

    /// Drains the serial port until a frame completes or no byte is
    /// waiting. Stops reading while a frame is pending.
    fn has_new_message(&mut self) -> bool {
        while self.pending.is_none() {
            match self.serial.read() {
                Ok(byte) => self.consume(byte),
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(error)) => {
                    let error = Error::from(error);
                    log!(warn, "Serial read failed, dropping partial frame: {}", error.description());
                    self.framing = Framing::Start;
                    break;
                }
            }
        }
        self.pending.is_some()
    }

    fn receive(&mut self) -> Result<Frame, Self::Error> {
        self.pending.take().ok_or(TransportError::NoFrame)
    }

    fn send(&mut self, ack: Ack) -> Result<(), Self::Error> {
        let payload = [ack.to_byte()];
        let tag = crc32::checksum_ieee(&payload).to_le_bytes();
        let frame = [FRAME_START, 1, payload[0], tag[0], tag[1], tag[2], tag[3]];
        self.serial.write_all(&frame).map_err(|_| TransportError::Serial)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        devices::protocol::{ErrorCode, MAX_CHUNK_SIZE},
        hal::doubles::serial::MockSerial,
    };

    fn framed(frame: &Frame) -> Vec<u8> {
        let mut bytes = vec![FRAME_START, frame.payload().len() as u8];
        bytes.extend_from_slice(frame.payload());
        bytes.extend_from_slice(&frame.integrity_tag().to_le_bytes());
        bytes
    }

    #[test]
    fn frame_assembled_across_polls() {
        // Given
        let frame = Frame::data(3, &[FRAME_START; MAX_CHUNK_SIZE]).unwrap();
        let bytes = framed(&frame);
        let mut transport = SerialTransport::new(MockSerial::default());

        // When
        transport.serial.feed(&bytes[..50]);
        let early = transport.has_new_message();
        transport.serial.feed(&bytes[50..]);
        let complete = transport.has_new_message();

        // Then
        assert!(!early);
        assert!(complete);
        assert_eq!(transport.receive(), Ok(frame));
        assert!(!transport.has_new_message());
        assert_eq!(transport.receive(), Err(TransportError::NoFrame));
    }

    #[test]
    fn noise_and_bad_lengths_are_skipped() {
        // Given
        let frame = Frame::abort();
        let mut transport = SerialTransport::new(MockSerial::default());
        transport.serial.feed(&[0x00, 0x11, FRAME_START, 0x00, 0x42, FRAME_START, 0xFF]);
        transport.serial.feed(&framed(&frame));

        // Then
        assert!(transport.has_new_message());
        assert_eq!(transport.receive(), Ok(frame));
    }

    #[test]
    fn one_frame_in_flight_at_a_time() {
        // Given
        let first = Frame::abort();
        let second = Frame::data(0, &[1, 2, 3]).unwrap();
        let mut transport = SerialTransport::new(MockSerial::default());
        transport.serial.feed(&framed(&first));
        transport.serial.feed(&framed(&second));

        // When
        assert!(transport.has_new_message());

        // Then the second frame is left on the wire until the first is taken
        assert_eq!(transport.serial.to_read.len(), framed(&second).len());
        assert_eq!(transport.receive(), Ok(first));
        assert!(transport.has_new_message());
        assert_eq!(transport.receive(), Ok(second));
    }

    #[test]
    fn corrupted_tag_is_delivered_for_verification() {
        let frame = Frame::abort();
        let mut bytes = framed(&frame);
        *bytes.last_mut().unwrap() ^= 0xFF;
        let mut transport = SerialTransport::new(MockSerial::default());
        transport.serial.feed(&bytes);

        assert!(transport.has_new_message());
        assert_ne!(transport.receive().unwrap().integrity_tag(), frame.integrity_tag());
    }

    #[test]
    fn read_errors_drop_the_partial_frame() {
        let mut transport = SerialTransport::new(MockSerial::default());
        transport.serial.feed(&framed(&Frame::abort())[..3]);
        transport.has_new_message();

        transport.serial.fail_reads = true;
        assert!(!transport.has_new_message());
        transport.serial.fail_reads = false;

        transport.serial.feed(&framed(&Frame::abort())[3..]);
        assert!(!transport.has_new_message());
    }

    #[test]
    fn acknowledgements_are_framed() {
        // Given
        let mut transport = SerialTransport::new(MockSerial::default());

        // When
        transport.send(Ack::Negative(ErrorCode::Sequence)).unwrap();

        // Then
        let written = transport.free().written;
        let tag = crc32::checksum_ieee(&[0x05]).to_le_bytes();
        assert_eq!(written, vec![FRAME_START, 1, 0x05, tag[0], tag[1], tag[2], tag[3]]);
    }
}
