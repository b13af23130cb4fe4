use super::error::FakeError;
use crate::hal::serial;
use std::collections::VecDeque;

/// Serial port fed from a byte queue, recording everything written.
#[derive(Default)]
pub struct MockSerial {
    pub to_read: VecDeque<u8>,
    pub written: Vec<u8>,
    pub fail_reads: bool,
}

impl MockSerial {
    pub fn feed(&mut self, bytes: &[u8]) { self.to_read.extend(bytes.iter().copied()) }
}

impl serial::Read for MockSerial {
    type Error = FakeError;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        if self.fail_reads {
            return Err(nb::Error::Other(FakeError));
        }
        self.to_read.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

impl serial::Write for MockSerial {
    type Error = FakeError;

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        self.written.push(byte);
        Ok(())
    }
}
