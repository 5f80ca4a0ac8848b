// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-service Lua host.
//!
//! Owns one isolated interpreter, its memory accounting and the interrupt
//! trap. The dispatcher guarantees a host is entered by at most one worker
//! at a time, so the host itself holds no lock; the `trap` and the memory
//! mirror are the only fields another thread may touch, and only through
//! atomics.

use super::trap::{self, SignalHandle};
use super::{api, profile};
use crate::config;
use crate::dispatch::{Dispatcher, Envelope, Target, KIND_MASK, KIND_TEXT};
use crate::error::{Error, Result};
use crate::registry::Handle;
use mlua::{Function, HookTriggers, Lua, LuaOptions, StdLib, Table, Value};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

/// First memory-warning threshold; doubles every time usage crosses it.
const MEMORY_WARNING_REPORT: usize = 32 * 1024 * 1024;

/// Instruction count between trap observations. Small enough to interrupt
/// a hot loop within microseconds, large enough that the hook is noise in
/// profiles.
const TRAP_CHECK_INTERVAL: u32 = 128;

/// State shared with [`SignalHandle`]s on other threads.
pub(crate) struct HostShared {
    /// Three-state interrupt flag; see [`trap`](super::trap).
    pub(crate) trap: AtomicI32,
    /// Mirror of the interpreter's memory usage, refreshed after every
    /// interpreter entry, read by the memory-info signal.
    pub(crate) mem: AtomicUsize,
}

/// One service's embedded interpreter.
pub struct ScriptHost {
    lua: Lua,
    dispatcher: Arc<dyn Dispatcher>,
    handle: Handle,
    shared: Arc<HostShared>,
    /// Next memory-warning threshold.
    mem_report: usize,
    /// Interpreter memory cap in bytes; 0 = unlimited.
    mem_limit: usize,
    started: bool,
}

impl ScriptHost {
    /// Create a host with a bare interpreter.
    ///
    /// The standard libraries open during initialization, which runs when
    /// the first message (the startup arguments) arrives.
    pub fn new(dispatcher: Arc<dyn Dispatcher>, handle: Handle) -> Result<Self> {
        let lua = Lua::new_with(StdLib::NONE, LuaOptions::default()).map_err(Error::Script)?;
        let shared = Arc::new(HostShared {
            trap: AtomicI32::new(0),
            mem: AtomicUsize::new(0),
        });
        let hook_shared = shared.clone();
        lua.set_hook(
            HookTriggers::default().every_nth_instruction(TRAP_CHECK_INTERVAL),
            move |_lua, _debug| trap::observe(&hook_shared.trap),
        );
        Ok(Self {
            lua,
            dispatcher,
            handle,
            shared,
            mem_report: MEMORY_WARNING_REPORT,
            mem_limit: 0,
            started: false,
        })
    }

    /// The handle this host answers to.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Current interpreter memory usage in bytes.
    pub fn memory_used(&self) -> usize {
        self.shared.mem.load(Ordering::Relaxed)
    }

    /// Configured memory cap in bytes; 0 = unlimited.
    pub fn memory_limit(&self) -> usize {
        self.mem_limit
    }

    /// Cloneable signalling endpoint usable from any thread.
    pub fn signal_handle(&self) -> SignalHandle {
        SignalHandle {
            shared: self.shared.clone(),
            dispatcher: self.dispatcher.clone(),
            handle: self.handle,
        }
    }

    /// Deliver one message.
    ///
    /// The first message carries the startup arguments and runs
    /// initialization; afterwards messages invoke the callback the script
    /// registered through `skiff.core.callback`. Errors are reported
    /// through the dispatcher and returned; an initialization failure also
    /// notifies the launcher and asks the dispatcher to retire this
    /// service.
    pub fn on_message(&mut self, env: Envelope) -> Result<()> {
        if !self.started {
            self.started = true;
            debug_assert_eq!(env.kind & KIND_MASK, KIND_TEXT);
            debug_assert_eq!(env.session, 0);
            let res = self.init(&env.payload);
            self.settle();
            if let Err(e) = res {
                self.dispatcher.report(self.handle, &e.to_string());
                self.report_launcher_error();
                self.dispatcher.command(self.handle, "EXIT", None);
                return Err(e);
            }
            return Ok(());
        }
        let res = self.dispatch(env);
        self.settle();
        if let Err(e) = res {
            self.dispatcher
                .report(self.handle, &format!("message handler error: {}", e));
            return Err(e);
        }
        Ok(())
    }

    /// Run the startup sequence with the given arguments.
    fn init(&mut self, args: &[u8]) -> Result<()> {
        let lua = &self.lua;
        lua.gc_stop();
        // Standard libraries must ignore host process environment variables.
        lua.set_named_registry_value("LUA_NOENV", true)?;
        lua.load_from_std_lib(StdLib::ALL_SAFE)?;

        let globals = lua.globals();
        let loaded: Table = globals.get::<_, Table>("package")?.get("loaded")?;

        // Profiling shim takes over coroutine scheduling entry points.
        let profile = profile::install(lua, self.shared.clone())?;
        let coroutine: Table = globals.get("coroutine")?;
        coroutine.set("resume", profile.get::<_, Function>("resume")?)?;
        coroutine.set("wrap", profile.get::<_, Function>("wrap")?)?;
        loaded.set("skiff.profile", profile)?;

        loaded.set(
            "skiff.core",
            api::install(lua, self.dispatcher.clone(), self.handle)?,
        )?;
        loaded.set("skiff.codecache", api::codecache(lua)?)?;

        let _ = lua.gc_gen(0, 0);

        globals.set(
            "lua_path",
            self.getenv_or(config::ENV_LUA_PATH, config::DEFAULT_LUA_PATH),
        )?;
        globals.set(
            "lua_cpath",
            self.getenv_or(config::ENV_LUA_CPATH, config::DEFAULT_LUA_CPATH),
        )?;
        globals.set(
            "service_path",
            self.getenv_or(config::ENV_SERVICE_PATH, config::DEFAULT_SERVICE_PATH),
        )?;
        if let Some(preload) = self.getenv(config::ENV_PRELOAD) {
            globals.set("preload_script", preload)?;
        }

        let loader = self.getenv_or(config::ENV_LOADER, config::DEFAULT_LOADER);
        let chunk = std::fs::read(&loader).map_err(|source| Error::LoaderRead {
            path: loader.clone(),
            source,
        })?;
        let entry = lua
            .load(&chunk[..])
            .set_name(format!("@{}", loader))
            .into_function()
            .map_err(|e| Error::LoaderLoad {
                path: loader.clone(),
                reason: e.to_string(),
            })?;
        let args = lua.create_string(args)?;
        entry
            .call::<_, ()>(args)
            .map_err(|e| Error::LoaderCall(e.to_string()))?;

        // The loader may have requested a memory cap for this service.
        let limit = match lua.named_registry_value::<Value>(api::MEMLIMIT_KEY)? {
            Value::Integer(n) if n > 0 => Some(n as usize),
            Value::Number(n) if n > 0.0 => Some(n as usize),
            _ => None,
        };
        if let Some(limit) = limit {
            lua.set_memory_limit(limit)?;
            self.mem_limit = limit;
            self.dispatcher.report(
                self.handle,
                &format!("Set memory limit to {:.2} M", limit as f64 / (1024.0 * 1024.0)),
            );
            lua.unset_named_registry_value(api::MEMLIMIT_KEY)?;
        }

        lua.gc_restart();
        Ok(())
    }

    /// Invoke the registered Lua callback for one envelope.
    fn dispatch(&self, env: Envelope) -> Result<()> {
        let callback = match self.lua.named_registry_value::<Value>(api::CALLBACK_KEY)? {
            Value::Function(f) => f,
            _ => return Err(Error::NoCallback),
        };
        let payload = self.lua.create_string(&env.payload)?;
        callback
            .call::<_, ()>((env.kind, env.session, env.source.raw(), payload))
            .map_err(Error::Script)
    }

    /// Post-entry bookkeeping: wait out a signaller caught mid-arming,
    /// refresh the memory mirror and emit crossing warnings.
    fn settle(&mut self) {
        trap::drain(&self.shared.trap);
        let used = self.lua.used_memory();
        self.shared.mem.store(used, Ordering::Relaxed);
        while used > self.mem_report {
            self.mem_report = self.mem_report.saturating_mul(2);
            self.dispatcher.report(
                self.handle,
                &format!("Memory warning {:.2} M", used as f64 / (1024.0 * 1024.0)),
            );
        }
    }

    fn report_launcher_error(&self) {
        self.dispatcher.send(
            self.handle,
            Target::Name(Arc::from(config::LAUNCHER_NAME)),
            KIND_TEXT,
            0,
            Box::from(&b"ERROR"[..]),
        );
    }

    fn getenv(&self, key: &str) -> Option<String> {
        self.dispatcher.command(self.handle, "GETENV", Some(key))
    }

    fn getenv_or(&self, key: &str, default: &str) -> String {
        self.getenv(key).unwrap_or_else(|| default.to_string())
    }
}
