//! Generation of the constants module included by the bootloader.
use std::{fs::OpenOptions, io::Write, path::Path};

use anyhow::{anyhow, Result};
use quote::quote;

use crate::{security::SecurityMode, Configuration};

/// Name of the generated file, relative to the output directory.
pub const CONFIGURATION_FILE: &str = "configuration.rs";

/// Validates `configuration` and writes the constants module to `out_dir`.
pub fn generate_modules<P: AsRef<Path>>(out_dir: P, configuration: &Configuration) -> Result<()> {
    if let Some(step) = configuration.required_configuration_steps().next() {
        return Err(anyhow!("Configuration is incomplete: {}", step));
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(out_dir.as_ref().join(CONFIGURATION_FILE))?;

    file.write_all(format!("{}", generate_constants(configuration)?).as_bytes())?;
    Ok(())
}

fn generate_constants(configuration: &Configuration) -> Result<proc_macro2::TokenStream> {
    let [slot_a, slot_b] = configuration.memory_configuration.slots;
    let (slot_a_location, slot_a_size) = (slot_a.start_address, slot_a.size());
    let (slot_b_location, slot_b_size) = (slot_b.start_address, slot_b.size());
    let window_ticks = configuration.timing_configuration.window_ticks();
    let tick_ms = configuration.timing_configuration.tick_ms;
    let ecdsa = configuration.security_configuration.security_mode == SecurityMode::P256ECDSA;
    let key = configuration.security_configuration.verifying_key_sec1()?;

    Ok(quote! {
        /// Location and size in bytes of the first image slot.
        pub const SLOT_A: (u32, usize) = (#slot_a_location, #slot_a_size);
        /// Location and size in bytes of the second image slot.
        pub const SLOT_B: (u32, usize) = (#slot_b_location, #slot_b_size);
        /// Length of the update window, in supervisor ticks.
        pub const UPDATE_WINDOW_TICKS: u32 = #window_ticks;
        /// Period of a supervisor tick.
        pub const TICK_PERIOD_MS: u32 = #tick_ms;
        /// Whether images are authenticated with P256 ECDSA rather than CRC32.
        pub const ECDSA_AUTHENTICATION: bool = #ecdsa;
        /// Uncompressed SEC1 verifying key. Empty in CRC mode.
        pub const VERIFYING_KEY: &[u8] = &[#(#key),*];
    })
}
