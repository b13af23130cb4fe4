use crate::error::{self, Error};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FakeError;

impl error::Convertible for FakeError {
    fn into(self) -> Error { Error::DeviceError("A fake error occurred [TESTING ONLY]") }
}
