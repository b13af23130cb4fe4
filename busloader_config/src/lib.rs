//! This busloader sub-crate contains all definitions needed to configure
//! a busloader build.
//!
//! NOTE: This code is not included anywhere from the bootloader itself! This
//! is a dependency of the bootloader **build script**, which uses it to parse
//! the RON configuration and to generate the constants the bootloader includes
//! (memory map, update window, verifying key).

use std::fmt::Display;

use memory::MemoryConfiguration;
use security::{SecurityConfiguration, SecurityMode};
use serde::{Deserialize, Serialize};
use timing::TimingConfiguration;

pub mod codegen;
pub mod memory;
pub mod security;
pub mod timing;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub memory_configuration: MemoryConfiguration,
    pub timing_configuration: TimingConfiguration,
    pub security_configuration: SecurityConfiguration,
}

impl Configuration {
    pub fn complete(&self) -> bool { self.required_configuration_steps().next().is_none() }

    /// Lists every problem that prevents this configuration from producing
    /// a working bootloader.
    pub fn required_configuration_steps(&self) -> impl Iterator<Item = RequiredConfigurationStep> {
        let memory = &self.memory_configuration;
        let timing = &self.timing_configuration;
        let security = &self.security_configuration;

        #[rustfmt::skip]
        let steps = [
            memory.slots.iter().any(|s| s.size_kb == 0)
                .then_some(RequiredConfigurationStep::SlotSize),

            memory.slots_overlap()
                .then_some(RequiredConfigurationStep::SlotOverlap),

            memory.slots.iter().any(|s| !memory.contains(s))
                .then_some(RequiredConfigurationStep::SlotOutsideFlash),

            memory.slots.iter().any(|s| s.start_address % memory::VECTOR_TABLE_ALIGNMENT != 0)
                .then_some(RequiredConfigurationStep::SlotAlignment),

            (timing.tick_ms == 0 || timing.window_ms < timing.tick_ms)
                .then_some(RequiredConfigurationStep::UpdateWindow),

            (security.security_mode == SecurityMode::P256ECDSA
                && security.verifying_key().is_err())
                .then_some(RequiredConfigurationStep::PublicKey),
        ];
        steps.into_iter().flatten()
    }

    /// Feature flags the bootloader must be built with to honour this configuration.
    pub fn required_feature_flags(&self) -> impl Iterator<Item = &'static str> {
        (self.security_configuration.security_mode == SecurityMode::P256ECDSA)
            .then_some("ecdsa-verify")
            .into_iter()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequiredConfigurationStep {
    SlotSize,
    SlotOverlap,
    SlotOutsideFlash,
    SlotAlignment,
    UpdateWindow,
    PublicKey,
}

impl Display for RequiredConfigurationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RequiredConfigurationStep::SlotSize => "[Memory Map] Both image slots need a size",
            RequiredConfigurationStep::SlotOverlap => "[Memory Map] Image slots must not overlap",
            RequiredConfigurationStep::SlotOutsideFlash => {
                "[Memory Map] Image slots must fit inside the MCU flash"
            }
            RequiredConfigurationStep::SlotAlignment => {
                "[Memory Map] Image slots must start on a vector table boundary"
            }
            RequiredConfigurationStep::UpdateWindow => {
                "[Timing] Update window must span at least one timer tick"
            }
            RequiredConfigurationStep::PublicKey => {
                "[Security] Provide a P256 ECDSA public key (PEM) or enable CRC32 mode"
            }
        })
    }
}
