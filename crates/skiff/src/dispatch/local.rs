// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-process dispatcher.
//!
//! Routes messages through the shared [`HandleRegistry`] and answers the
//! control commands the script host depends on. Sends go onto an unbounded
//! queue and are delivered by [`pump`](LocalDispatcher::pump), so a service
//! may freely send from inside its own message handler without recursing.
//!
//! This is deliberately not the production scheduler: no worker pool, no
//! per-service mailbox fairness. It exists so the core can be exercised
//! end-to-end in tests and small tools.

use super::{Dispatcher, Envelope, Target};
use crate::config::Env;
use crate::registry::{Handle, HandleRegistry};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::sync::Arc;

/// In-process dispatcher over a shared registry and configuration store.
pub struct LocalDispatcher {
    registry: Arc<HandleRegistry>,
    env: Arc<Env>,
    queue_tx: Sender<(Target, Envelope)>,
    queue_rx: Receiver<(Target, Envelope)>,
}

impl LocalDispatcher {
    /// Create a dispatcher over the given registry and configuration.
    pub fn new(registry: Arc<HandleRegistry>, env: Arc<Env>) -> Self {
        let (queue_tx, queue_rx) = unbounded();
        Self {
            registry,
            env,
            queue_tx,
            queue_rx,
        }
    }

    /// The registry this dispatcher routes through.
    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Deliver queued messages until the queue drains.
    ///
    /// Messages enqueued during delivery are delivered in the same pass.
    /// Returns the number of messages delivered; undeliverable messages
    /// (retired handle, unbound alias) are dropped with a warning, matching
    /// the at-most-once contract of a local send.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        while let Ok((target, env)) = self.queue_rx.try_recv() {
            let handle = match &target {
                Target::Handle(h) => Some(*h),
                Target::Name(name) => self.registry.find_by_name(name),
            };
            let service = handle.and_then(|h| self.registry.grab(h));
            match service {
                Some(service) => {
                    service.on_message(env);
                    delivered += 1;
                }
                None => {
                    crate::warn!("dropping message for dead target {:?}", target);
                }
            }
        }
        delivered
    }
}

impl Dispatcher for LocalDispatcher {
    fn send(&self, source: Handle, target: Target, kind: u32, session: u32, payload: Box<[u8]>) {
        let env = Envelope {
            kind,
            session,
            source,
            payload,
        };
        // The receiver lives as long as self; send cannot fail.
        let _ = self.queue_tx.send((target, env));
    }

    fn command(&self, source: Handle, op: &str, arg: Option<&str>) -> Option<String> {
        match op {
            "REG" => {
                if let Some(name) = arg {
                    self.registry.bind_name(source, name)?;
                }
                Some(source.to_string())
            }
            "QUERY" => {
                let name = arg?;
                self.registry.find_by_name(name).map(|h| h.to_string())
            }
            "GETENV" => self.env.get(arg?).map(|v| v.to_string()),
            "SETENV" => {
                let (key, value) = arg?.split_once(' ')?;
                self.env.set(key, value);
                None
            }
            "EXIT" => {
                self.registry.retire(source);
                None
            }
            _ => {
                crate::warn!("unknown command {} from {}", op, source);
                None
            }
        }
    }

    fn report(&self, source: Handle, message: &str) {
        crate::error!("{} {}", source, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Service, KIND_TEXT};
    use parking_lot::Mutex;

    struct Recorder {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Service for Recorder {
        fn on_message(&self, env: Envelope) {
            self.seen.lock().push(env.payload.into_vec());
        }
    }

    fn fixture() -> (Arc<HandleRegistry>, Arc<LocalDispatcher>) {
        let registry = Arc::new(HandleRegistry::new(1));
        let env = Arc::new(Env::new());
        let hub = Arc::new(LocalDispatcher::new(registry.clone(), env));
        (registry, hub)
    }

    #[test]
    fn test_send_by_handle() {
        let (registry, hub) = fixture();
        let recorder = Recorder::new();
        let h = registry.register(recorder.clone());

        hub.send(h, Target::Handle(h), KIND_TEXT, 0, Box::from(&b"ping"[..]));
        assert_eq!(hub.pump(), 1);
        assert_eq!(recorder.seen.lock().as_slice(), &[b"ping".to_vec()]);
    }

    #[test]
    fn test_send_by_name() {
        let (registry, hub) = fixture();
        let recorder = Recorder::new();
        let h = registry.register(recorder.clone());
        registry.bind_name(h, ".launcher");

        hub.send(
            h,
            Target::Name(Arc::from(".launcher")),
            KIND_TEXT,
            0,
            Box::from(&b"ERROR"[..]),
        );
        hub.pump();
        assert_eq!(recorder.seen.lock().as_slice(), &[b"ERROR".to_vec()]);
    }

    #[test]
    fn test_send_to_retired_handle_dropped() {
        let (registry, hub) = fixture();
        let recorder = Recorder::new();
        let h = registry.register(recorder.clone());
        registry.retire(h);

        hub.send(h, Target::Handle(h), KIND_TEXT, 0, Box::default());
        assert_eq!(hub.pump(), 0);
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn test_command_reg_and_query() {
        let (registry, hub) = fixture();
        let h = registry.register(Recorder::new());

        assert_eq!(hub.command(h, "REG", None), Some(h.to_string()));
        assert_eq!(hub.command(h, "REG", Some(".gate")), Some(h.to_string()));
        assert_eq!(hub.command(h, "QUERY", Some(".gate")), Some(h.to_string()));
        assert_eq!(hub.command(h, "QUERY", Some(".missing")), None);
    }

    #[test]
    fn test_command_getenv_and_exit() {
        let registry = Arc::new(HandleRegistry::new(1));
        let env = Arc::new(Env::new());
        env.set("lualoader", "./boot.lua");
        let hub = LocalDispatcher::new(registry.clone(), env);
        let h = registry.register(Recorder::new());

        assert_eq!(
            hub.command(h, "GETENV", Some("lualoader")),
            Some("./boot.lua".to_string())
        );
        assert_eq!(hub.command(h, "GETENV", Some("missing")), None);

        assert_eq!(hub.command(h, "EXIT", None), None);
        assert!(registry.grab(h).is_none());
    }

    #[test]
    fn test_pump_delivers_chained_sends() {
        struct Forwarder {
            hub: Arc<LocalDispatcher>,
            next: Handle,
        }
        impl Service for Forwarder {
            fn on_message(&self, env: Envelope) {
                self.hub
                    .send(env.source, Target::Handle(self.next), env.kind, 0, env.payload);
            }
        }

        let (registry, hub) = fixture();
        let sink = Recorder::new();
        let sink_h = registry.register(sink.clone());
        let fwd = Arc::new(Forwarder {
            hub: hub.clone(),
            next: sink_h,
        });
        let fwd_h = registry.register(fwd);

        hub.send(sink_h, Target::Handle(fwd_h), KIND_TEXT, 0, Box::from(&b"hop"[..]));
        // One pass delivers both the original and the forwarded message.
        assert_eq!(hub.pump(), 2);
        assert_eq!(sink.seen.lock().as_slice(), &[b"hop".to_vec()]);
    }
}
