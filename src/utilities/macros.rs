//! Convenience macros for the bootloader project
#![macro_use]

/// Logs through `defmt` on the target.
///
/// Host builds (unit tests, tooling) have no global `defmt` logger, so the
/// macro only evaluates its arguments there.
///
/// # Example
/// ```ignore
/// log!(info, "Update window open for {} ticks", ticks);
/// ```
#[macro_export]
macro_rules! log {
    ($level:ident, $format:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_arch = "arm")]
        defmt::$level!($format $(, $arg)*);
        $(
            #[cfg(not(target_arch = "arm"))]
            let _ = &$arg;
        )*
    }};
}

#[macro_export]
macro_rules! mb {
    ($val:expr) => {
        $val * 1024 * 1024
    };
}
