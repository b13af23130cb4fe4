//! # Fail-safe Update Bootloader Library
//!
//! This crate contains all functionality for the bus update
//! bootloader in library form. Board specific entry points build a
//! [`devices::bootloader::Bootloader`] out of their concrete drivers
//! and call `run` on it.
#![cfg_attr(test, allow(unused_imports))]
#![cfg_attr(target_arch = "arm", no_std)]

extern crate static_assertions;

#[macro_use]
pub mod utilities {
    #[macro_use]
    pub mod macros;
    pub mod memory;
}

pub mod configuration;
pub mod devices;
#[cfg(target_arch = "arm")]
pub mod drivers;
pub mod error;
pub mod hal;
