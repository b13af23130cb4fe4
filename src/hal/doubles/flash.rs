use super::error::FakeError;
use crate::hal::flash;
use std::{
    cmp::max,
    ops::{Add, Sub},
};

/// Value of erased flash.
const ERASED: u8 = 0xFF;

/// RAM backed flash. Unwritten memory reads as erased, and every
/// write is recorded so tests can assert on what was touched.
pub struct FakeFlash {
    base: Address,
    length: usize,
    data: Vec<u8>,
    pub writes: Vec<(Address, usize)>,
    pub fail_writes: bool,
}

impl FakeFlash {
    pub fn new(base: Address) -> FakeFlash {
        FakeFlash { base, data: Vec::new(), length: mb!(16), writes: Vec::new(), fail_writes: false }
    }

    /// Writes recorded inside `[start, start + size)`.
    pub fn writes_within(&self, start: Address, size: usize) -> usize {
        self.writes.iter().filter(|(address, _)| *address >= start && *address < start + size).count()
    }
}

#[derive(Copy, Clone, Debug, Ord, PartialOrd, PartialEq, Eq)]
pub struct Address(pub u32);

impl flash::ReadWrite for FakeFlash {
    type Error = FakeError;
    type Address = Address;

    fn read(&mut self, address: Self::Address, bytes: &mut [u8]) -> nb::Result<(), Self::Error> {
        if address < self.base || address + bytes.len() > self.base + self.length {
            return Err(nb::Error::Other(FakeError));
        }
        let offset = address - self.base;
        bytes.iter_mut().enumerate().for_each(|(i, o)| {
            *o = self.data.get(offset + i).copied().unwrap_or(ERASED);
        });
        Ok(())
    }

    fn write(&mut self, address: Self::Address, bytes: &[u8]) -> nb::Result<(), Self::Error> {
        if self.fail_writes
            || address < self.base
            || address + bytes.len() > self.base + self.length
        {
            return Err(nb::Error::Other(FakeError));
        }
        let offset = address - self.base;
        self.data.resize(max(self.data.len(), offset + bytes.len()), ERASED);
        self.data.iter_mut().skip(offset).zip(bytes).for_each(|(o, i)| *o = *i);
        self.writes.push((address, bytes.len()));
        Ok(())
    }

    fn range(&self) -> (Self::Address, Self::Address) { (self.base, self.base + self.length) }
}

impl Add<usize> for Address {
    type Output = Address;
    fn add(self, rhs: usize) -> Self::Output { Address(self.0 + rhs as u32) }
}

impl Sub<usize> for Address {
    type Output = Address;
    fn sub(self, rhs: usize) -> Self::Output { Address(self.0.saturating_sub(rhs as u32)) }
}

impl Sub<Address> for Address {
    type Output = usize;
    fn sub(self, rhs: Address) -> Self::Output { self.0.saturating_sub(rhs.0) as usize }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self { address.0 as usize }
}

impl From<u32> for Address {
    fn from(raw: u32) -> Self { Address(raw) }
}
