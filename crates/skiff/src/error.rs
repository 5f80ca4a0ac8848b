// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Recoverable "need more data" conditions are expressed as `Option`
//! sentinels at the call sites that produce them (see
//! [`DataBuffer::read_header`](crate::DataBuffer::read_header)); precondition
//! and capacity violations are assertions. Everything that can actually fail
//! at runtime funnels through [`Error`].

use std::fmt;

/// Errors surfaced by the script host and its collaborators.
#[derive(Debug)]
pub enum Error {
    /// The bootstrap loader chunk could not be read from disk.
    LoaderRead {
        /// Configured loader path.
        path: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The bootstrap loader chunk failed to compile.
    LoaderLoad {
        /// Configured loader path.
        path: String,
        /// Interpreter diagnostic.
        reason: String,
    },
    /// The bootstrap loader raised while running the startup arguments.
    LoaderCall(String),
    /// A message arrived but the script never registered a callback.
    NoCallback,
    /// The interpreter raised while handling a dispatched message.
    Script(mlua::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LoaderRead { path, source } => {
                write!(f, "can't read loader {}: {}", path, source)
            }
            Error::LoaderLoad { path, reason } => write!(f, "can't load {}: {}", path, reason),
            Error::LoaderCall(msg) => write!(f, "loader error: {}", msg),
            Error::NoCallback => write!(f, "message dispatched but no callback registered"),
            Error::Script(e) => write!(f, "script error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::LoaderRead { source, .. } => Some(source),
            Error::Script(e) => Some(e),
            _ => None,
        }
    }
}

impl From<mlua::Error> for Error {
    fn from(e: mlua::Error) -> Self {
        Error::Script(e)
    }
}

/// Convenient alias for API results using the public [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
