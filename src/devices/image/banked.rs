//! Two-bank image store over a single flash.
use super::{
    header::{HeaderState, ImageHeader, HEADER_SIZE, STATE_OFFSET},
    Bank, FirmwareDescriptor, ImageStore, Slot,
};
use crate::{
    configuration,
    devices::{traits::Flash, verification::image_crc},
    error::Error,
    hal::flash::ReadIterator,
};
use core::iter::Take;
use nb::block;

#[derive(Clone, Copy, Debug)]
struct Transfer {
    version: u32,
    size: usize,
}

/// Image store keeping one image per bank.
///
/// Finalizing a new image makes its slot current straight away; the
/// slot it superseded is remembered until its header is invalidated.
pub struct BankedImageStore<F: Flash> {
    flash: F,
    banks: [Bank<F::Address>; 2],
    current: Option<Slot>,
    superseded: Option<Slot>,
    transfer: Option<Transfer>,
}

impl<F: Flash> BankedImageStore<F> {
    pub fn new(flash: F, banks: [Bank<F::Address>; 2]) -> Self {
        let mut store = Self { flash, banks, current: None, superseded: None, transfer: None };
        store.latest_descriptor();
        store
    }

    /// Store over the slots fixed by the build configuration.
    pub fn from_configuration(flash: F) -> Self
    where
        F::Address: From<u32>,
    {
        let bank = |slot, (start, size): (u32, usize)| Bank { slot, location: start.into(), size };
        Self::new(flash, [
            bank(Slot::A, configuration::SLOT_A),
            bank(Slot::B, configuration::SLOT_B),
        ])
    }

    fn bank(&self, slot: Slot) -> Bank<F::Address> {
        match slot {
            Slot::A => self.banks[0],
            Slot::B => self.banks[1],
        }
    }

    /// Header of a slot holding a complete, CRC verified image.
    fn inspect(&mut self, slot: Slot) -> Result<ImageHeader, Error> {
        let bank = self.bank(slot);
        let mut bytes = [0u8; HEADER_SIZE];
        block!(self.flash.read(bank.header_location(), &mut bytes))?;
        let header = ImageHeader::parse(&bytes)?;

        if header.state != HeaderState::Valid
            || header.version == FirmwareDescriptor::ABSENT_VERSION
            || header.size as usize > bank.capacity()
        {
            return Err(Error::HeaderInvalid);
        }

        if image_crc(self.flash.bytes(bank.location).take(header.size as usize)) != header.crc {
            return Err(Error::CrcInvalid);
        }
        Ok(header)
    }

    fn write_header(&mut self, slot: Slot, header: &ImageHeader) -> Result<(), Error> {
        let location = self.bank(slot).header_location();
        block!(self.flash.write(location, &header.to_bytes()))?;
        Ok(())
    }
}

#[cfg(test)]
impl<F: Flash> BankedImageStore<F> {
    pub fn flash(&self) -> &F { &self.flash }
    pub fn flash_mut(&mut self) -> &mut F { &mut self.flash }
}

impl<F: Flash> ImageStore for BankedImageStore<F> {
    type Bytes<'a> = Take<ReadIterator<'a, F>> where Self: 'a;

    fn latest_descriptor(&mut self) -> FirmwareDescriptor {
        let newest = [Slot::A, Slot::B]
            .iter()
            .filter_map(|&slot| match self.inspect(slot) {
                Ok(header) => Some((slot, header)),
                Err(error) => {
                    log!(debug, "Slot {} holds no bootable image: {}", slot, error.description());
                    None
                }
            })
            .max_by_key(|(_, header)| header.version);

        self.current = newest.map(|(slot, _)| slot);
        match newest {
            Some((_, header)) => FirmwareDescriptor::new(header.version, true),
            None => FirmwareDescriptor::absent(),
        }
    }

    fn descriptor(&mut self, slot: Slot) -> FirmwareDescriptor {
        match self.inspect(slot) {
            Ok(header) => FirmwareDescriptor::new(header.version, true),
            Err(_) => FirmwareDescriptor::absent(),
        }
    }

    fn current(&self) -> Option<Slot> { self.current }

    fn capacity(&self) -> usize { self.bank(self.candidate()).capacity() }

    fn location(&self, slot: Slot) -> usize { self.bank(slot).location.into() }

    fn begin(&mut self, version: u32, size: usize) -> Result<(), Error> {
        if version == FirmwareDescriptor::ABSENT_VERSION {
            return Err(Error::HeaderInvalid);
        }
        if size > self.capacity() {
            return Err(Error::ImageTooBig);
        }
        self.transfer = Some(Transfer { version, size });
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        let transfer =
            self.transfer.ok_or(Error::DeviceError("Image write outside of a transfer"))?;
        if offset + bytes.len() > transfer.size {
            return Err(Error::ImageTooBig);
        }
        let location = self.bank(self.candidate()).location + offset;
        block!(self.flash.write(location, bytes))?;
        Ok(())
    }

    fn candidate_bytes(&mut self, size: usize) -> Self::Bytes<'_> {
        let location = self.bank(self.candidate()).location;
        self.flash.bytes(location).take(size)
    }

    fn update_headers(&mut self, new_valid: bool) -> Result<(), Error> {
        let transfer = self.transfer.take().ok_or(Error::ImageIncomplete)?;
        let candidate = self.candidate();
        let header = if new_valid {
            let crc = image_crc(self.candidate_bytes(transfer.size));
            ImageHeader {
                version: transfer.version,
                size: transfer.size as u32,
                crc,
                state: HeaderState::Valid,
            }
        } else {
            ImageHeader {
                version: transfer.version,
                size: transfer.size as u32,
                crc: 0,
                state: HeaderState::Invalidated,
            }
        };
        self.write_header(candidate, &header)?;

        if new_valid {
            self.superseded = self.current;
            self.current = Some(candidate);
            log!(info, "Image v{} finalized in slot {}", transfer.version, candidate);
        }
        Ok(())
    }

    fn erase_old_header(&mut self) -> Result<(), Error> {
        let old = match self.superseded.take() {
            Some(old) => old,
            None => return Ok(()),
        };
        let location = self.bank(old).header_location() + STATE_OFFSET;
        block!(self.flash.write(location, &HeaderState::Invalidated.word().to_le_bytes()))?;
        log!(info, "Superseded image in slot {} invalidated", old);
        Ok(())
    }
}
