// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global logger instance.
//!
//! Install-once singleton; logging before installation is a silent no-op so
//! library code never has to care whether the embedding server configured a
//! sink.

use super::sink::{LogLevel, Sink};
use std::io;
use std::sync::{Arc, OnceLock, RwLock};

static LOGGER: OnceLock<RwLock<GlobalLogger>> = OnceLock::new();

struct GlobalLogger {
    sink: Arc<dyn Sink>,
    level_filter: LogLevel,
}

/// Install the global sink and minimum level.
///
/// Only the first call takes effect; later calls are ignored. Call early in
/// server startup, before the first service launches.
pub fn init_logging(sink: Arc<dyn Sink>, level: LogLevel) {
    let _ = LOGGER.get_or_init(|| {
        RwLock::new(GlobalLogger {
            sink,
            level_filter: level,
        })
    });
}

/// Write one message through the global sink.
///
/// No-op when logging was never initialized or the level is filtered.
#[inline]
pub(crate) fn log_message(level: LogLevel, message: &str) -> io::Result<()> {
    let Some(lock) = LOGGER.get() else {
        return Ok(());
    };
    let logger = lock
        .read()
        .map_err(|_| io::Error::other("global logger lock poisoned"))?;
    if level < logger.level_filter {
        return Ok(());
    }
    logger.sink.write(level, message)
}

/// Flush the global sink. Safe to call when logging is uninitialized.
pub fn flush_logging() -> io::Result<()> {
    match LOGGER.get() {
        Some(lock) => lock
            .read()
            .map_err(|_| io::Error::other("global logger lock poisoned"))?
            .sink
            .flush(),
        None => Ok(()),
    }
}
