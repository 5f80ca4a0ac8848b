// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Skiff - lightweight actor-service runtime
//!
//! Skiff is the core substrate of an actor-style service framework: many
//! lightweight Lua-scripted services exchange typed messages, each with its
//! own isolated interpreter, all scheduled onto a small pool of worker
//! threads. This crate provides the three subsystems everything else leans
//! on:
//!
//! - [`registry`] - a concurrent, resizable directory mapping 32-bit
//!   handles to live services, with a sorted secondary index of aliases.
//! - [`buffer`] - a per-connection byte accumulator that reassembles
//!   length-prefixed frames out of arbitrarily fragmented reads, backed by
//!   a pooled allocator of message nodes.
//! - [`script`] - the per-service host that owns an embedded Lua 5.4
//!   interpreter, enforces memory accounting and limits, integrates a
//!   coroutine profiler and accepts a cross-thread interrupt signal.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                      Worker Threads (external)               |
//! +--------------------------------------------------------------+
//! |  Dispatcher contract                                         |
//! |    send | command (REG/GETENV/EXIT) | report                 |
//! +--------------------------------------------------------------+
//! |  HandleRegistry          ScriptHost (per service)            |
//! |    slots (open addr)       Lua state + skiff.core bridge     |
//! |    alias index             memory limit / warning thresholds |
//! |                            profile shim | trap (signal 0)    |
//! +--------------------------------------------------------------+
//! |  DataBuffer + MessagePool (per stream)                       |
//! |    [len BE 2|4][payload] framing over fragmented reads       |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skiff::{Env, HandleRegistry, LocalDispatcher, ScriptService};
//! use std::sync::Arc;
//!
//! fn main() -> skiff::Result<()> {
//!     let registry = Arc::new(HandleRegistry::new(1));
//!     let env = Arc::new(Env::new());
//!     let hub = Arc::new(LocalDispatcher::new(registry.clone(), env));
//!
//!     let handle = ScriptService::launch(hub.clone(), &registry, "bootstrap")?;
//!     hub.pump();
//!     println!("service :{:08x} running", handle.raw());
//!     Ok(())
//! }
//! ```
//!
//! The worker loop, per-service mailbox and transport layer are collaborators
//! supplied by the embedding server; [`LocalDispatcher`] is a single-process
//! stand-in good enough for tests and tools.

pub mod buffer;
pub mod config;
pub mod dispatch;
mod error;
pub mod logging;
pub mod registry;
pub mod script;

pub use buffer::{DataBuffer, MessagePool};
pub use config::Env;
pub use dispatch::{Dispatcher, Envelope, LocalDispatcher, Service, Target};
pub use error::{Error, Result};
pub use registry::{Handle, HandleRegistry};
pub use script::{ScriptHost, ScriptService, SignalHandle};
