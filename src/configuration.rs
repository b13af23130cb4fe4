//! Build time configuration.
//!
//! The constants below are generated by the build script from the RON
//! configuration in `BUSLOADER_CONFIG` (or the defaults, when it is unset).
include!(concat!(env!("OUT_DIR"), "/configuration.rs"));
