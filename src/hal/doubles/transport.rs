use super::error::FakeError;
use crate::devices::{
    interfaces::transport::Transport,
    protocol::{Ack, Frame, MAX_CHUNK_SIZE},
    verification::image_crc,
};
use std::collections::VecDeque;

/// Transport fed from a frame queue, recording every acknowledgement.
#[derive(Default)]
pub struct MockTransport {
    pub incoming: VecDeque<Frame>,
    pub sent: Vec<Ack>,
    pub fail_receives: bool,
}

impl MockTransport {
    pub fn push(&mut self, frame: Frame) { self.incoming.push_back(frame) }
}

/// Frames transferring `image` in full, CRC authenticated.
pub fn image_frames(version: u32, image: &[u8]) -> Vec<Frame> {
    let proof = image_crc(image.iter().copied()).to_le_bytes();
    let start = Frame::start(version, image.len() as u32, &proof);
    let data = image
        .chunks(MAX_CHUNK_SIZE)
        .enumerate()
        .map(|(sequence, chunk)| Frame::data(sequence as u16, chunk));
    core::iter::once(start).chain(data).map(|frame| frame.unwrap()).collect()
}

/// Same frame with a corrupted integrity tag.
pub fn corrupted(frame: Frame) -> Frame {
    Frame::new(frame.payload(), !frame.integrity_tag()).unwrap()
}

impl Transport for MockTransport {
    type Error = FakeError;

    fn has_new_message(&mut self) -> bool { !self.incoming.is_empty() }

    fn receive(&mut self) -> Result<Frame, Self::Error> {
        let frame = self.incoming.pop_front().ok_or(FakeError)?;
        if self.fail_receives {
            Err(FakeError)
        } else {
            Ok(frame)
        }
    }

    fn send(&mut self, ack: Ack) -> Result<(), Self::Error> {
        self.sent.push(ack);
        Ok(())
    }
}
