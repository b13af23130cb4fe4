//! Error types and methods

#[cfg(target_arch = "arm")]
use defmt::Format;

/// Top level error type for the bootloader. Driver specific errors are
/// lifted into it through [`Convertible`], so `?` works across layers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum Error {
    /// Error caused by a faulty configuration
    ConfigurationError(&'static str),
    /// Error caused by a high level device driver
    DeviceError(&'static str),
    /// Error raised by the bus transport while exchanging a frame
    TransportError(&'static str),
    /// No slot holds a bootable image
    NoValidFirmware,
    /// The slot contains no image header
    BankEmpty,
    /// The slot header is present but malformed or invalidated
    HeaderInvalid,
    /// The image does not fit in its slot
    ImageTooBig,
    /// The image was committed before all of its bytes were received
    ImageIncomplete,
    /// The image CRC does not match the expected value
    CrcInvalid,
}

/// Implemented by driver level error types to make them
/// convertible into the top level [`Error`].
pub trait Convertible {
    fn into(self) -> Error;
}

impl<T: Convertible> From<T> for Error {
    fn from(t: T) -> Self { t.into() }
}

impl Error {
    /// Short human readable description, for logging.
    pub fn description(&self) -> &'static str {
        match self {
            Error::ConfigurationError(text)
            | Error::DeviceError(text)
            | Error::TransportError(text) => text,
            Error::NoValidFirmware => "No slot holds a bootable image",
            Error::BankEmpty => "Slot is empty (contains no image header)",
            Error::HeaderInvalid => "Slot header is corrupted or invalidated",
            Error::ImageTooBig => "Firmware image too big for its slot",
            Error::ImageIncomplete => "Firmware image is incomplete",
            Error::CrcInvalid => "Image CRC is invalid",
        }
    }
}
