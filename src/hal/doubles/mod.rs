//! Test doubles for the hardware interfaces the bootloader consumes.
pub mod boot;
pub mod error;
pub mod flash;
pub mod serial;
pub mod timer;
pub mod transport;
