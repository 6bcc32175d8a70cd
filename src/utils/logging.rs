//! Logging macros that respect a per-module `ENABLE_LOGS` switch.
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("Saved session {}", record.id);
//! ```
//!
//! Flipping the constant to `false` silences a noisy module without touching the
//! global `RUST_LOG` filter.

#[doc(hidden)]
#[macro_export]
macro_rules! log_if_enabled {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            log::$level!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::log_if_enabled!(debug, $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::log_if_enabled!(info, $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::log_if_enabled!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::log_if_enabled!(error, $($arg)*) };
}
