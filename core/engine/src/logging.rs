//! FILENAME: core/engine/src/logging.rs
//! PURPOSE: Category-tagged logging macros for the template crates.
//! CONTEXT: Every line carries a category (GUARD, STRUCTURE, SESSION, ...),
//! which becomes the `log` target. The host application installs the
//! logger; library code only emits through the `log` facade.

#[doc(hidden)]
pub use log;

pub const CAT_GUARD: &str = "GUARD";
pub const CAT_STRUCTURE: &str = "STRUCTURE";
pub const CAT_SESSION: &str = "SESSION";
pub const CAT_VALIDATION: &str = "VALIDATION";
pub const CAT_IMPORT: &str = "IMPORT";

// ============================================================================
// MACRO DEFINITIONS & EXPORTS
// ============================================================================

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::log::debug!(target: $cat, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::log::info!(target: $cat, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::log::warn!(target: $cat, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::log::error!(target: $cat, $($arg)*)
    };
}

// Re-export the macros so they can be imported via `use crate::logging::log_info;`
pub use log_debug;
pub use log_error;
pub use log_info;
pub use log_warn;
