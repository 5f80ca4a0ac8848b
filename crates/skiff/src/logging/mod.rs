// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compile-time configurable logging.
//!
//! Four severity levels, each with a macro that expands to a no-op when the
//! `logging` cargo feature is disabled:
//! - `debug!()` - development detail
//! - `info!()` - normal operation
//! - `warn!()` - suspicious but survivable conditions
//! - `error!()` - failures
//!
//! The runtime's own diagnostics (memory warnings, loader failures, signal
//! delivery) go through these macros; the embedding server decides where
//! they land by installing a [`Sink`] via [`init_logging`].
//!
//! ```ignore
//! use skiff::logging::{init_logging, ConsoleSink, LogLevel};
//! use std::sync::Arc;
//!
//! init_logging(Arc::new(ConsoleSink::new()), LogLevel::Info);
//! info!("listening on {}", addr);
//! ```

#[cfg(feature = "logging")]
pub mod logger;
#[cfg(feature = "logging")]
mod sink;

#[cfg(feature = "logging")]
pub use logger::{flush_logging, init_logging};
#[cfg(feature = "logging")]
pub use sink::{ConsoleSink, FileSink, LogLevel, Sink};

/// Debug-level log message. Same formatting rules as `println!()`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! debug {
    ($($arg:tt)*) => {
        let _ = $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Debug,
            &format!($($arg)*),
        );
    };
}

/// Info-level log message. Same formatting rules as `println!()`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! info {
    ($($arg:tt)*) => {
        let _ = $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Info,
            &format!($($arg)*),
        );
    };
}

/// Warning-level log message. Same formatting rules as `println!()`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! warn {
    ($($arg:tt)*) => {
        let _ = $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Warning,
            &format!($($arg)*),
        );
    };
}

/// Error-level log message. Same formatting rules as `println!()`.
#[macro_export]
#[cfg(feature = "logging")]
macro_rules! error {
    ($($arg:tt)*) => {
        let _ = $crate::logging::logger::log_message(
            $crate::logging::LogLevel::Error,
            &format!($($arg)*),
        );
    };
}

/// No-op debug macro (logging feature disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

/// No-op info macro (logging feature disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}

/// No-op warn macro (logging feature disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

/// No-op error macro (logging feature disabled).
#[macro_export]
#[cfg(not(feature = "logging"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
