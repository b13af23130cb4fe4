//! Utilities to manipulate generic memory

/// Generic address for the purpose of this module's methods.
/// Anything that can be offset by a usize and yield another
/// address, and that can be reduced to a raw pointer value,
/// works as an address.
pub trait Address: Copy + core::ops::Add<usize, Output = Self> + Into<usize> {}
impl<A> Address for A where A: Copy + core::ops::Add<usize, Output = A> + Into<usize> {}
