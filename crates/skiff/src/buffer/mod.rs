// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream framing over fragmented reads.
//!
//! TCP hands the gate arbitrary byte chunks; applications speak in
//! length-prefixed frames:
//!
//! ```text
//! +-------------------+------------------+
//! | Length (2B/4B BE) | Payload          |
//! +-------------------+------------------+
//! ```
//!
//! A [`DataBuffer`] accumulates pushed chunks for one stream and hands back
//! whole frames; a [`MessagePool`] recycles the per-chunk bookkeeping nodes
//! so the receive path performs no node allocation in steady state. The
//! pool is deliberately not thread-safe: a buffer group belongs to a single
//! stream owner, and that ownership already serializes access.
//!
//! ```
//! use skiff::{DataBuffer, MessagePool};
//!
//! let mut pool = MessagePool::new();
//! let mut db = DataBuffer::new();
//!
//! db.push(&mut pool, Box::from(&[0x00, 0x05][..]));
//! db.push(&mut pool, Box::from(&b"hello"[..]));
//!
//! let len = db.read_header(&mut pool, 2).expect("frame complete");
//! let mut frame = vec![0u8; len];
//! db.read(&mut pool, &mut frame);
//! db.reset();
//! assert_eq!(&frame, b"hello");
//! ```

mod databuffer;
mod pool;

pub use databuffer::DataBuffer;
pub use pool::MessagePool;
