//! Boundaries between the update core and the collaborators it drives.
//! Everything behind these traits (bus drivers, timer peripherals, the
//! jump itself) is board specific.
pub mod boot;
pub mod timeout;
pub mod transport;
