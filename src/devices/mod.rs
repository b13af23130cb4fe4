//! Complex modules with business logic related to the problem
//! domain, that lay on top of abstract drivers. Devices are
//! generic, while board specifics (bus drivers, timers, the
//! jump itself) live behind the `interfaces` traits.

pub mod boot_metrics;
pub mod bootloader;
pub mod image;
pub mod interfaces;
pub mod protocol;
pub mod serial_transport;
pub mod update;
pub mod verification;

/// General purpose traits that summarize requirements on devices.
pub mod traits {
    use crate::{
        devices::interfaces::transport,
        error,
        hal::{flash, serial},
    };
    use marker_blanket::marker_blanket;

    /// A supported flash must be able to read, write, and report errors
    /// to the bootloader.
    #[marker_blanket]
    pub trait Flash: flash::ReadWrite<Error: error::Convertible> {}

    /// A supported serial must be able to read and write single bytes,
    /// and report errors to the bootloader.
    #[marker_blanket]
    pub trait Serial: serial::Read<Error: error::Convertible> + serial::Write {}

    /// A supported transport must exchange frames and acknowledgements,
    /// and report errors to the bootloader.
    #[marker_blanket]
    pub trait Transport: transport::Transport<Error: error::Convertible> {}
}
