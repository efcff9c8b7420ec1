//! FILENAME: data-model/src/logging.rs
// PURPOSE: Categorized logging macros shared by every crate of the workspace.
// CONTEXT: Same call shape as the application's unified log (`log_info!("PIVOT", ...)`),
//          but backed by the `log` facade so the host decides where lines go.
//          The category becomes the log target.

/// Re-exported so the macros resolve `log` through this crate.
pub use log;

// ============================================================================
// LEVEL MACROS
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

// ============================================================================
// ENTER/EXIT macros for function tracing
// ============================================================================

#[macro_export]
macro_rules! log_enter {
    ($cat:expr, $func:expr) => {
        $crate::logging::log::debug!(target: $cat, "ENTER {}", $func)
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::log::debug!(target: $cat, "ENTER {} {}", $func, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_exit {
    ($cat:expr, $func:expr) => {
        $crate::logging::log::debug!(target: $cat, "EXIT {}", $func)
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::log::debug!(target: $cat, "EXIT {} {}", $func, format_args!($($arg)*))
    };
}
