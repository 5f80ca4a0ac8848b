// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Coroutine CPU profiler.
//!
//! Builds the `skiff.profile` library and the `resume`/`wrap` replacements
//! the host splices over the stock coroutine functions. Two weak-valued
//! tables keyed by coroutine carry the bookkeeping: `start_time[co]` is the
//! clock reading of the slice currently running, `total_time[co]` the sum
//! of completed slices. A coroutine that was never `profile.start`ed pays
//! one table probe per resume and nothing else.
//!
//! The clock is per-thread CPU time where the platform offers it, so
//! measurements are immune to scheduler delay. Seconds are masked to 16
//! bits with the fraction carried separately; [`diff_time`] compensates a
//! wrapped reading by adding `2^16`.

use super::host::HostShared;
use super::trap;
use mlua::{Function, Lua, MultiValue, Table, Thread, Value};
use std::sync::Arc;

/// Span of the 16-bit masked seconds field.
const CLOCK_WRAP: f64 = 65536.0;

#[cfg(unix)]
fn thread_time() -> f64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid out-pointer for the duration of the call.
    unsafe {
        libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts);
    }
    ((ts.tv_sec & 0xffff) as f64) + ts.tv_nsec as f64 / 1e9
}

#[cfg(not(unix))]
fn thread_time() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let elapsed = EPOCH.get_or_init(Instant::now).elapsed();
    ((elapsed.as_secs() & 0xffff) as f64) + f64::from(elapsed.subsec_nanos()) / 1e9
}

/// Elapsed time since `start`, tolerating one wrap of the masked seconds.
fn diff_time(start: f64) -> f64 {
    let now = thread_time();
    if now < start {
        now + CLOCK_WRAP - start
    } else {
        now - start
    }
}

fn started_at(start_times: &Table, co: &Thread) -> mlua::Result<Option<f64>> {
    match start_times.raw_get::<_, Value>(co.clone())? {
        Value::Number(n) => Ok(Some(n)),
        Value::Integer(n) => Ok(Some(n as f64)),
        _ => Ok(None),
    }
}

fn accumulate(total_times: &Table, co: &Thread, started: f64) -> mlua::Result<()> {
    let total: f64 = total_times.raw_get(co.clone())?;
    total_times.raw_set(co.clone(), total + diff_time(started))?;
    Ok(())
}

/// Build the `skiff.profile` table: `start`, `stop`, `resume`, `wrap`.
pub(crate) fn install(lua: &Lua, shared: Arc<HostShared>) -> mlua::Result<Table> {
    let weak = lua.create_table()?;
    weak.set("__mode", "kv")?;

    let start_times = lua.create_table()?;
    start_times.set_metatable(Some(weak.clone()));
    let total_times = lua.create_table()?;
    total_times.set_metatable(Some(weak));

    let base_resume: Function = lua
        .globals()
        .get::<_, Table>("coroutine")?
        .get("resume")?;

    let start_key = Arc::new(lua.create_registry_value(start_times)?);
    let total_key = Arc::new(lua.create_registry_value(total_times)?);
    let resume_key = Arc::new(lua.create_registry_value(base_resume)?);

    let profile = lua.create_table()?;

    {
        let start_key = start_key.clone();
        let total_key = total_key.clone();
        profile.set(
            "start",
            lua.create_function(move |lua, co: Option<Thread>| {
                let co = co.unwrap_or_else(|| lua.current_thread());
                let start_times: Table = lua.registry_value(&start_key)?;
                let total_times: Table = lua.registry_value(&total_key)?;
                if started_at(&start_times, &co)?.is_some() {
                    return Err(mlua::Error::RuntimeError(
                        "start profile more than once".to_string(),
                    ));
                }
                total_times.raw_set(co.clone(), 0.0)?;
                start_times.raw_set(co, thread_time())?;
                Ok(())
            })?,
        )?;
    }

    {
        let start_key = start_key.clone();
        let total_key = total_key.clone();
        profile.set(
            "stop",
            lua.create_function(move |lua, co: Option<Thread>| {
                let co = co.unwrap_or_else(|| lua.current_thread());
                let start_times: Table = lua.registry_value(&start_key)?;
                let total_times: Table = lua.registry_value(&total_key)?;
                let Some(started) = started_at(&start_times, &co)? else {
                    return Err(mlua::Error::RuntimeError(
                        "call profile.start() before profile.stop()".to_string(),
                    ));
                };
                let slice = diff_time(started);
                let total: f64 = total_times.raw_get(co.clone())?;
                start_times.raw_set(co.clone(), Value::Nil)?;
                total_times.raw_set(co, Value::Nil)?;
                Ok(total + slice)
            })?,
        )?;
    }

    {
        let start_key = start_key.clone();
        let total_key = total_key.clone();
        let resume_key = resume_key.clone();
        let shared = shared.clone();
        profile.set(
            "resume",
            lua.create_function(move |lua, (co, args): (Thread, MultiValue)| {
                trap::observe(&shared.trap)?;
                let start_times: Table = lua.registry_value(&start_key)?;
                let total_times: Table = lua.registry_value(&total_key)?;
                let profiled = started_at(&start_times, &co)?.is_some();
                if profiled {
                    start_times.raw_set(co.clone(), thread_time())?;
                }
                let base: Function = lua.registry_value(&resume_key)?;
                let ret = base.call::<_, MultiValue>((co.clone(), args));
                if profiled {
                    if let Some(started) = started_at(&start_times, &co)? {
                        accumulate(&total_times, &co, started)?;
                    }
                }
                ret
            })?,
        )?;
    }

    {
        profile.set(
            "wrap",
            lua.create_function(move |lua, f: Function| {
                let co_key = Arc::new(lua.create_registry_value(lua.create_thread(f)?)?);
                let start_key = start_key.clone();
                let total_key = total_key.clone();
                let shared = shared.clone();
                lua.create_function(move |lua, args: MultiValue| {
                    trap::observe(&shared.trap)?;
                    let co: Thread = lua.registry_value(&co_key)?;
                    let start_times: Table = lua.registry_value(&start_key)?;
                    let total_times: Table = lua.registry_value(&total_key)?;
                    let profiled = started_at(&start_times, &co)?.is_some();
                    if profiled {
                        start_times.raw_set(co.clone(), thread_time())?;
                    }
                    let ret = co.resume::<_, MultiValue>(args);
                    if profiled {
                        if let Some(started) = started_at(&start_times, &co)? {
                            accumulate(&total_times, &co, started)?;
                        }
                    }
                    ret
                })
            })?,
        )?;
    }

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_time_monotonic_modulo_wrap() {
        let a = thread_time();
        // Burn a little CPU so the clock advances.
        let mut x = 0u64;
        for i in 0..100_000u64 {
            x = x.wrapping_add(i);
        }
        assert!(x > 0);
        let d = diff_time(a);
        assert!(d >= 0.0, "elapsed time must be non-negative, got {}", d);
        assert!(d < CLOCK_WRAP);
    }

    #[test]
    fn test_diff_time_handles_wrap() {
        // A start reading "in the future" models a wrapped 16-bit seconds
        // field; the difference must come out non-negative and bounded.
        let d = diff_time(thread_time() + 1.0);
        assert!(d >= 0.0);
        assert!(d <= CLOCK_WRAP);
    }
}
