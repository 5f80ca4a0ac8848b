// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-thread interrupt for a cooperatively-scheduled interpreter.
//!
//! The interpreter cannot be preempted; the only safe cross-thread
//! intervention is to arm a flag that the interpreter itself observes at
//! its next opportunity (the instruction-count hook, and every coroutine
//! resume boundary). A three-state atomic coordinates one-shot arming
//! between concurrent signallers and the interpreter thread:
//!
//! ```text
//!  0 (idle) --signal(0), CAS--> 1 (arming) --CAS--> -1 (armed)
//!  -1 --hook observes--> 0, interpreter error "signal 0"
//! ```
//!
//! Losing the first CAS means another signaller got there; the signal is
//! dropped. After the interpreter returns to the host, the host waits out
//! any signaller still between the two transitions so the next entry into
//! the interpreter sees a settled trap.

use super::host::HostShared;
use crate::dispatch::Dispatcher;
use crate::registry::Handle;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Interrupt the running script with the error `"signal 0"`.
pub const SIGNAL_INTERRUPT: u32 = 0;
/// Log the service's current interpreter memory usage.
pub const SIGNAL_MEMORY_INFO: u32 = 1;

pub(crate) const TRAP_IDLE: i32 = 0;
pub(crate) const TRAP_ARMING: i32 = 1;
pub(crate) const TRAP_ARMED: i32 = -1;

/// Interpreter-side observation point.
///
/// Called from the instruction-count hook and from the resume wrappers; on
/// a pending trap it clears the flag and raises the interpreter error that
/// unwinds the running coroutine.
pub(crate) fn observe(trap: &AtomicI32) -> mlua::Result<()> {
    if trap.load(Ordering::Acquire) != TRAP_IDLE {
        trap.store(TRAP_IDLE, Ordering::Release);
        return Err(mlua::Error::RuntimeError("signal 0".to_string()));
    }
    Ok(())
}

/// Host-side settling point, run after every interpreter entry.
///
/// A signaller observed mid-arming (state 1) is about to finish its second
/// CAS; spin until the trap leaves the non-negative transient states so a
/// later interpreter entry cannot race the arming sequence.
pub(crate) fn drain(trap: &AtomicI32) {
    if trap.load(Ordering::Acquire) != TRAP_IDLE {
        while trap.load(Ordering::Acquire) >= TRAP_IDLE {
            std::hint::spin_loop();
        }
    }
}

/// Cloneable signalling endpoint for one script host.
///
/// Safe to use from any thread; only the shared atomics cross the thread
/// boundary.
#[derive(Clone)]
pub struct SignalHandle {
    pub(crate) shared: Arc<HostShared>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
    pub(crate) handle: Handle,
}

impl SignalHandle {
    /// Deliver a signal to the host.
    ///
    /// [`SIGNAL_INTERRUPT`] arms the trap; the interpreter raises
    /// `"signal 0"` at its next observation point. [`SIGNAL_MEMORY_INFO`]
    /// logs current memory usage. Other values are logged and ignored.
    pub fn signal(&self, signal: u32) {
        self.dispatcher
            .report(self.handle, &format!("recv a signal {}", signal));
        match signal {
            SIGNAL_INTERRUPT => {
                let trap = &self.shared.trap;
                if trap.load(Ordering::Acquire) == TRAP_IDLE {
                    // Only one signaller may arm the trap (0 -> 1).
                    if trap
                        .compare_exchange(
                            TRAP_IDLE,
                            TRAP_ARMING,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_err()
                    {
                        return;
                    }
                    // The observation hook is installed for the whole life
                    // of the interpreter; publish the armed state (1 -> -1).
                    let _ = trap.compare_exchange(
                        TRAP_ARMING,
                        TRAP_ARMED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                }
            }
            SIGNAL_MEMORY_INFO => {
                let mem = self.shared.mem.load(Ordering::Relaxed);
                self.dispatcher.report(
                    self.handle,
                    &format!("Current Memory {:.3}K", mem as f64 / 1024.0),
                );
            }
            _ => {}
        }
    }
}
