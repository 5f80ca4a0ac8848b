// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration store and compile-time defaults.
//!
//! Services never read process environment variables directly; everything
//! flows through the dispatcher's `GETENV` command, which is answered from
//! an [`Env`] store. Keys are free-form strings; the handful the script
//! host consults are named by the `ENV_*` constants below, with their
//! defaults alongside.
//!
//! The store is a lock-free string map (`DashMap` with `Arc<str>` keys and
//! values), so dispatch-path lookups never contend with configuration
//! updates.

use dashmap::DashMap;
use std::sync::Arc;

/// Search path for Lua library modules.
pub const ENV_LUA_PATH: &str = "lua_path";
/// Search path for native Lua extension modules.
pub const ENV_LUA_CPATH: &str = "lua_cpath";
/// Search path for service scripts.
pub const ENV_SERVICE_PATH: &str = "luaservice";
/// Module preloaded into every service before its main chunk runs.
pub const ENV_PRELOAD: &str = "preload";
/// Bootstrap loader script run with the startup arguments.
pub const ENV_LOADER: &str = "lualoader";

/// Default for [`ENV_LUA_PATH`].
pub const DEFAULT_LUA_PATH: &str = "./lualib/?.lua;./lualib/?/init.lua";
/// Default for [`ENV_LUA_CPATH`].
pub const DEFAULT_LUA_CPATH: &str = "./luaclib/?.so";
/// Default for [`ENV_SERVICE_PATH`].
pub const DEFAULT_SERVICE_PATH: &str = "./service/?.lua";
/// Default for [`ENV_LOADER`].
pub const DEFAULT_LOADER: &str = "./lualib/loader.lua";

/// Well-known alias of the service that supervises service startup.
pub const LAUNCHER_NAME: &str = ".launcher";

/// Shared string-keyed configuration store.
///
/// Cheap to clone through an `Arc`; get/set are O(1) and lock-free.
#[derive(Default)]
pub struct Env {
    vars: DashMap<Arc<str>, Arc<str>>,
}

impl Env {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            vars: DashMap::new(),
        }
    }

    /// Look up a key. Returns a shared copy of the value.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.vars.get(key).map(|v| v.value().clone())
    }

    /// Look up a key, falling back to `default` when unset.
    pub fn get_or(&self, key: &str, default: &str) -> Arc<str> {
        self.get(key).unwrap_or_else(|| Arc::from(default))
    }

    /// Set a key. Existing values are replaced.
    pub fn set(&self, key: &str, value: &str) {
        self.vars.insert(Arc::from(key), Arc::from(value));
    }

    /// Remove a key, returning whether it was present.
    pub fn unset(&self, key: &str) -> bool {
        self.vars.remove(key).is_some()
    }

    /// Number of keys currently set.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True when no keys are set.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_roundtrip() {
        let env = Env::new();
        assert!(env.get(ENV_LOADER).is_none());
        env.set(ENV_LOADER, "./boot/loader.lua");
        assert_eq!(env.get(ENV_LOADER).as_deref(), Some("./boot/loader.lua"));
    }

    #[test]
    fn test_get_or_default() {
        let env = Env::new();
        assert_eq!(&*env.get_or(ENV_LUA_PATH, DEFAULT_LUA_PATH), DEFAULT_LUA_PATH);
        env.set(ENV_LUA_PATH, "./x/?.lua");
        assert_eq!(&*env.get_or(ENV_LUA_PATH, DEFAULT_LUA_PATH), "./x/?.lua");
    }

    #[test]
    fn test_overwrite_and_unset() {
        let env = Env::new();
        env.set("harbor", "1");
        env.set("harbor", "2");
        assert_eq!(env.get("harbor").as_deref(), Some("2"));
        assert!(env.unset("harbor"));
        assert!(!env.unset("harbor"));
        assert!(env.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        let env = Arc::new(Env::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let env = env.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    env.set(&format!("k{}_{}", t, i), "v");
                }
            }));
        }
        for h in handles {
            h.join().expect("writer thread panicked");
        }
        assert_eq!(env.len(), 400);
    }
}
