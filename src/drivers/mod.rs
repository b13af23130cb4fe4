//! Cortex-M implementations of the bootloader's hardware interfaces.
//! Only built for the target.
pub mod cortex_m_boot;
pub mod systick;
