// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide directory of live services.
//!
//! Every service gets a 32-bit [`Handle`] at registration; every message
//! dispatch resolves a handle back to the service through [`grab`]. Reads
//! vastly outnumber writes, so the whole structure sits behind one
//! reader-writer lock: lookups take the shared lock, registration and
//! retirement take the exclusive lock and keep the critical section short.
//!
//! The slot table is open-addressed and power-of-two sized. A handle is
//! live iff the slot at `handle & (slot_size - 1)` stores exactly that
//! handle, which makes stale handles (retired, or from before a wrap of the
//! 24-bit id space) resolve to nothing instead of to a stranger.
//!
//! A sorted array of unique aliases provides name lookup via binary
//! search. Bindings are rare and service counts are bounded, so O(n)
//! insertion is a fine trade for lock-friendly O(log n) reads.
//!
//! [`grab`]: HandleRegistry::grab

mod handle;

pub use handle::{Handle, HANDLE_BITS, HANDLE_MASK};

use crate::dispatch::Service;
use parking_lot::RwLock;
use std::sync::Arc;

/// Initial slot table size. Must be a power of two.
const DEFAULT_SLOT_SIZE: usize = 4;

/// Upper bound for the slot table and the alias index.
const MAX_SLOT_SIZE: usize = 0x4000_0000;

struct Slot {
    handle: Handle,
    service: Arc<dyn Service>,
}

struct NameEntry {
    name: Arc<str>,
    handle: Handle,
}

struct Inner {
    /// Next candidate local id; advances monotonically, wrapping past the
    /// 24-bit maximum back to 1 (0 is reserved).
    handle_index: u32,
    /// Open-addressed table indexed by `handle & (len - 1)`.
    slots: Vec<Option<Slot>>,
    /// Strictly sorted by alias, unique.
    names: Vec<NameEntry>,
}

/// Concurrent, resizable mapping from handles to live services.
pub struct HandleRegistry {
    /// Harbor id pre-shifted into the upper 8 bits.
    harbor: u32,
    inner: RwLock<Inner>,
}

impl HandleRegistry {
    /// Create a registry for the given harbor (node) id.
    pub fn new(harbor: u8) -> Self {
        Self {
            harbor: u32::from(harbor) << HANDLE_BITS,
            inner: RwLock::new(Inner {
                handle_index: 1,
                slots: (0..DEFAULT_SLOT_SIZE).map(|_| None).collect(),
                names: Vec::with_capacity(2),
            }),
        }
    }

    /// Register a service and assign it a fresh handle.
    ///
    /// Probes consecutive local ids starting at the rolling index; the first
    /// empty slot wins. When a full pass finds no hole the table doubles and
    /// every entry is rehashed by its stored handle.
    ///
    /// # Panics
    /// Panics if the slot table would exceed 2^30 entries; an address space
    /// that full indicates corruption long before this bound is reached.
    pub fn register(&self, service: Arc<dyn Service>) -> Handle {
        let mut inner = self.inner.write();
        loop {
            if let Some((hash, id)) = Self::probe(&inner) {
                let handle = Handle::from_raw(id | self.harbor);
                inner.slots[hash] = Some(Slot { handle, service });
                inner.handle_index = id + 1;
                return handle;
            }
            Self::grow(&mut inner);
        }
    }

    /// Scan one full round of the table for a free slot.
    fn probe(inner: &Inner) -> Option<(usize, u32)> {
        let slot_size = inner.slots.len() as u32;
        let mut id = inner.handle_index;
        for _ in 0..slot_size {
            if id > HANDLE_MASK {
                // 0 is reserved
                id = 1;
            }
            let hash = (id & (slot_size - 1)) as usize;
            if inner.slots[hash].is_none() {
                return Some((hash, id));
            }
            id += 1;
        }
        None
    }

    /// Double the slot table and rehash every live entry.
    fn grow(inner: &mut Inner) {
        let new_size = inner.slots.len() * 2;
        assert!(new_size <= MAX_SLOT_SIZE, "handle slot table overflow");
        let mut new_slots: Vec<Option<Slot>> = (0..new_size).map(|_| None).collect();
        let mask = new_size as u32 - 1;
        for slot in inner.slots.drain(..) {
            if let Some(s) = slot {
                let hash = (s.handle.raw() & mask) as usize;
                debug_assert!(new_slots[hash].is_none());
                new_slots[hash] = Some(s);
            }
        }
        inner.slots = new_slots;
    }

    /// Retire a handle, dropping the registry's reference to its service
    /// and every alias bound to it.
    ///
    /// Returns `true` iff a service was actually retired. The service
    /// reference is dropped only after the write lock is released, because
    /// service teardown may re-enter the registry.
    pub fn retire(&self, handle: Handle) -> bool {
        let service = {
            let mut inner = self.inner.write();
            let mask = inner.slots.len() as u32 - 1;
            let hash = (handle.raw() & mask) as usize;
            let occupied = matches!(&inner.slots[hash], Some(s) if s.handle == handle);
            if occupied {
                let slot = inner.slots[hash].take();
                inner.names.retain(|n| n.handle != handle);
                slot.map(|s| s.service)
            } else {
                None
            }
        };
        match service {
            Some(service) => {
                drop(service);
                true
            }
            None => false,
        }
    }

    /// Retire every live service.
    ///
    /// Two-phase sweep: collect live handles under the read lock, retire
    /// them without it, repeat until a full pass observes zero live
    /// entries. Services whose teardown registers or retires other services
    /// extend the sweep rather than breaking it.
    pub fn retire_all(&self) {
        loop {
            let mut live = 0usize;
            let slot_size = self.inner.read().slots.len();
            for i in 0..slot_size {
                let handle = {
                    let inner = self.inner.read();
                    // The table only ever grows, but re-check the bound in
                    // case a concurrent resize moved entries under us.
                    inner.slots.get(i).and_then(|s| s.as_ref()).map(|s| s.handle)
                };
                if let Some(h) = handle {
                    live += 1;
                    self.retire(h);
                }
            }
            if live == 0 {
                return;
            }
        }
    }

    /// Resolve a handle to its service, taking a shared reference.
    ///
    /// Returns `None` for retired or never-issued handles.
    pub fn grab(&self, handle: Handle) -> Option<Arc<dyn Service>> {
        let inner = self.inner.read();
        let mask = inner.slots.len() as u32 - 1;
        let hash = (handle.raw() & mask) as usize;
        match &inner.slots[hash] {
            Some(s) if s.handle == handle => Some(s.service.clone()),
            _ => None,
        }
    }

    /// Look up an alias. Returns `None` when the name was never bound or
    /// its owner has been retired.
    pub fn find_by_name(&self, name: &str) -> Option<Handle> {
        let inner = self.inner.read();
        inner
            .names
            .binary_search_by(|e| e.name.as_ref().cmp(name))
            .ok()
            .map(|i| inner.names[i].handle)
    }

    /// Bind an alias to a handle.
    ///
    /// Aliases are unique: binding a name that already exists is refused
    /// and returns `None`, leaving the existing binding untouched. On
    /// success the interned name is returned for the caller to keep.
    pub fn bind_name(&self, handle: Handle, name: &str) -> Option<Arc<str>> {
        let mut inner = self.inner.write();
        match inner.names.binary_search_by(|e| e.name.as_ref().cmp(name)) {
            Ok(_) => None,
            Err(pos) => {
                assert!(inner.names.len() < MAX_SLOT_SIZE, "alias index overflow");
                let owned: Arc<str> = Arc::from(name);
                inner.names.insert(
                    pos,
                    NameEntry {
                        name: owned.clone(),
                        handle,
                    },
                );
                Some(owned)
            }
        }
    }

    /// Number of live services.
    pub fn len(&self) -> usize {
        self.inner.read().slots.iter().filter(|s| s.is_some()).count()
    }

    /// True when no service is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn set_handle_index(&self, id: u32) {
        self.inner.write().handle_index = id;
    }
}
