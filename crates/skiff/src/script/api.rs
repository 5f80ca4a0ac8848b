// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The `skiff.core` bridge library.
//!
//! Everything a service script can do to the outside world goes through
//! this table; the functions close over the dispatcher and the service's
//! own handle, so scripts never see raw pointers or ambient globals.
//!
//! ```lua
//! local core = require "skiff.core"
//! core.callback(function(kind, session, source, payload)
//!     core.send(source, kind, session, "pong")
//! end)
//! ```

use crate::dispatch::{Dispatcher, Target};
use crate::registry::Handle;
use mlua::{Function, Lua, MultiValue, String as LuaString, Table, Value};
use std::sync::Arc;

/// Interpreter registry slot holding the script's message callback.
pub(crate) const CALLBACK_KEY: &str = "skiff_callback";

/// Interpreter registry slot a script writes through `core.memlimit`;
/// consulted once, after the bootstrap loader returns.
pub(crate) const MEMLIMIT_KEY: &str = "memlimit";

/// Build the `skiff.core` table.
pub(crate) fn install(
    lua: &Lua,
    dispatcher: Arc<dyn Dispatcher>,
    handle: Handle,
) -> mlua::Result<Table> {
    let api = lua.create_table()?;

    api.set(
        "callback",
        lua.create_function(|lua, callback: Function| {
            lua.set_named_registry_value(CALLBACK_KEY, callback)
        })?,
    )?;

    {
        let dispatcher = dispatcher.clone();
        api.set(
            "send",
            lua.create_function(
                move |_lua,
                      (dest, kind, session, payload): (
                    Value,
                    u32,
                    u32,
                    Option<LuaString>,
                )| {
                    let target = match &dest {
                        Value::Integer(raw) => Target::Handle(Handle::from_raw(*raw as u32)),
                        Value::String(name) => Target::Name(Arc::from(name.to_str()?)),
                        _ => {
                            return Err(mlua::Error::RuntimeError(
                                "destination must be a handle or a name".to_string(),
                            ))
                        }
                    };
                    let payload: Box<[u8]> = payload
                        .map(|p| Box::from(p.as_bytes()))
                        .unwrap_or_default();
                    dispatcher.send(handle, target, kind, session, payload);
                    Ok(())
                },
            )?,
        )?;
    }

    {
        let dispatcher = dispatcher.clone();
        api.set(
            "command",
            lua.create_function(move |_lua, (op, arg): (String, Option<String>)| {
                Ok(dispatcher.command(handle, &op, arg.as_deref()))
            })?,
        )?;
    }

    api.set(
        "error",
        lua.create_function(move |_lua, msg: String| {
            dispatcher.report(handle, &msg);
            Ok(())
        })?,
    )?;

    api.set(
        "memlimit",
        lua.create_function(|lua, bytes: u64| lua.set_named_registry_value(MEMLIMIT_KEY, bytes))?,
    )?;

    Ok(api)
}

/// Build the `skiff.codecache` stub.
///
/// Chunk caching needs a patched interpreter with shared prototypes; this
/// build ships the compatible surface so service libraries can call it
/// unconditionally: `clear` and `mode` accept anything and do nothing,
/// `loadfile` is the stock global.
pub(crate) fn codecache(lua: &Lua) -> mlua::Result<Table> {
    let cache = lua.create_table()?;
    cache.set("clear", lua.create_function(|_, _args: MultiValue| Ok(()))?)?;
    cache.set("mode", lua.create_function(|_, _args: MultiValue| Ok(()))?)?;
    cache.set("loadfile", lua.globals().get::<_, Value>("loadfile")?)?;
    Ok(cache)
}
