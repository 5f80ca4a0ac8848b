// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Embedded Lua service host.
//!
//! Each scripted service owns an isolated Lua 5.4 interpreter wrapped in a
//! [`ScriptHost`]: startup arguments arrive as the first message, the
//! bootstrap loader wires the service's main chunk, and from then on every
//! delivered envelope invokes the registered Lua callback.
//!
//! Around the interpreter the host maintains the three safety rails the
//! rest of the system depends on:
//!
//! - **memory accounting** - usage is tracked continuously; crossing a
//!   doubling warning threshold logs, and an optional per-service limit
//!   refuses growth beyond it (cooperative rail, not a security boundary);
//! - **coroutine profiling** - `skiff.profile` measures per-coroutine CPU
//!   time through replaced `coroutine.resume`/`wrap` entry points;
//! - **interrupt trap** - [`SignalHandle::signal`] with signal 0 unwinds a
//!   runaway script at its next instruction-count checkpoint.

mod api;
mod host;
mod profile;
mod trap;

pub use host::ScriptHost;
pub use trap::{SignalHandle, SIGNAL_INTERRUPT, SIGNAL_MEMORY_INFO};

use crate::dispatch::{Dispatcher, Envelope, Service, Target, KIND_TEXT, TAG_DONT_COPY};
use crate::error::Result;
use crate::registry::{Handle, HandleRegistry};
use parking_lot::Mutex;
use std::sync::Arc;

/// [`Service`] adapter owning one [`ScriptHost`].
///
/// The dispatcher serializes deliveries per service, so the mutex is
/// uncontended in steady state; it exists to give the host the exclusive
/// access the interpreter requires.
pub struct ScriptService {
    host: Mutex<Option<ScriptHost>>,
}

impl ScriptService {
    /// Register a fresh scripted service and queue its startup arguments
    /// as the first message.
    ///
    /// Returns the assigned handle. The service initializes lazily: the
    /// interpreter opens its libraries and runs the bootstrap loader when
    /// the dispatcher delivers that first message.
    pub fn launch(
        dispatcher: Arc<dyn Dispatcher>,
        registry: &HandleRegistry,
        args: &str,
    ) -> Result<Handle> {
        let service = Arc::new(ScriptService {
            host: Mutex::new(None),
        });
        let handle = registry.register(service.clone());
        match ScriptHost::new(dispatcher.clone(), handle) {
            Ok(host) => *service.host.lock() = Some(host),
            Err(e) => {
                registry.retire(handle);
                return Err(e);
            }
        }
        dispatcher.send(
            handle,
            Target::Handle(handle),
            KIND_TEXT | TAG_DONT_COPY,
            0,
            Box::from(args.as_bytes()),
        );
        Ok(handle)
    }

    /// Signalling endpoint for this service, once launched.
    pub fn signal_handle(&self) -> Option<SignalHandle> {
        self.host.lock().as_ref().map(ScriptHost::signal_handle)
    }
}

impl Service for ScriptService {
    fn on_message(&self, env: Envelope) {
        let mut guard = self.host.lock();
        match guard.as_mut() {
            Some(host) => {
                if let Err(e) = host.on_message(env) {
                    crate::error!("script service error: {}", e);
                }
            }
            None => {
                crate::warn!("message for unlaunched script service dropped");
            }
        }
    }
}
