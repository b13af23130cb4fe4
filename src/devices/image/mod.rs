//! Firmware image storage.
//!
//! Flash is partitioned into two banks, each able to hold one image
//! followed by its [header](header::ImageHeader). The bank holding the
//! newest valid image is the *current* one; incoming images are
//! written to the other one, the *candidate*.
use crate::{devices::verification::Verifier, error::Error, utilities::memory::Address};
#[cfg(target_arch = "arm")]
use defmt::Format;

pub mod banked;
pub mod header;

pub use banked::BankedImageStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Image bank descriptor.
///
/// A bank is a section of flash that may contain a single firmware
/// image. Its last [`header::HEADER_SIZE`] bytes are reserved for the
/// image header.
#[derive(Clone, Copy, Debug)]
pub struct Bank<A: Address> {
    pub slot: Slot,
    /// Address of the start of the bank, which is also the start of the
    /// image vector table.
    pub location: A,
    /// Size in bytes of the flash range occupied by this bank.
    pub size: usize,
}

impl<A: Address> Bank<A> {
    /// Bytes available to the image itself.
    pub fn capacity(&self) -> usize { self.size.saturating_sub(header::HEADER_SIZE) }
    pub fn header_location(&self) -> A { self.location + self.capacity() }
}

/// Summary of the newest bootable firmware, computed once per boot cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub struct FirmwareDescriptor {
    pub version: u32,
    pub valid: bool,
}

impl FirmwareDescriptor {
    /// Version read back from an erased header.
    pub const ABSENT_VERSION: u32 = 0xFFFF_FFFF;

    /// The all-ones version is never valid, whatever the caller claims.
    pub fn new(version: u32, valid: bool) -> Self {
        Self { version, valid: valid && version != Self::ABSENT_VERSION }
    }

    pub fn absent() -> Self { Self::new(Self::ABSENT_VERSION, false) }
}

/// Persistent image storage driven by the update state machine.
pub trait ImageStore {
    type Bytes<'a>: Iterator<Item = u8>
    where
        Self: 'a;

    /// Scans both banks and reports the newest valid image. Also settles
    /// which slot is current and which one receives updates.
    fn latest_descriptor(&mut self) -> FirmwareDescriptor;

    /// Reports the image in `slot` without changing which slot is current.
    fn descriptor(&mut self, slot: Slot) -> FirmwareDescriptor;

    /// Slot holding the image that would boot today, if any. After a
    /// successful [`update_headers(true)`](ImageStore::update_headers) this
    /// is the slot just finalized, until the next scan.
    fn current(&self) -> Option<Slot>;

    /// Slot an incoming image is written to.
    fn candidate(&self) -> Slot { self.current().map_or(Slot::A, Slot::other) }

    /// Largest image the candidate slot accepts.
    fn capacity(&self) -> usize;

    /// Start address of `slot`, as a raw pointer value.
    fn location(&self, slot: Slot) -> usize;

    /// Prepares the candidate slot for an image of `size` bytes.
    fn begin(&mut self, version: u32, size: usize) -> Result<(), Error>;

    /// Writes image bytes at `offset` from the start of the candidate slot.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Error>;

    /// Reads back the first `size` bytes of the candidate slot.
    fn candidate_bytes(&mut self, size: usize) -> Self::Bytes<'_>;

    /// Finalizes the candidate header, marking it valid or invalidated.
    fn update_headers(&mut self, new_valid: bool) -> Result<(), Error>;

    /// Invalidates the header of the image the candidate supersedes.
    fn erase_old_header(&mut self) -> Result<(), Error>;

    /// Authenticates the first `size` bytes of the candidate slot.
    fn authenticate_candidate<V: Verifier>(&mut self, verifier: &V, size: usize, proof: &[u8]) -> bool
    where
        Self: Sized,
    {
        verifier.check_authenticity(self.candidate_bytes(size), proof)
    }
}
