// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-stream frame assembly.

use super::pool::{MessagePool, NodeIndex, NIL};

/// Byte accumulator for one logical stream.
///
/// Pushed chunks queue up as a FIFO of pool nodes; reads copy across node
/// boundaries and recycle each node the moment its last byte is consumed.
/// [`read_header`](DataBuffer::read_header) drives the length-prefix state
/// machine: `None` means "need more data", a recoverable condition the
/// caller answers by pushing the next chunk, never an error.
///
/// All operations borrow the owning [`MessagePool`]; the pair is
/// single-owner state and performs no internal locking.
pub struct DataBuffer {
    /// Decoded payload length of the frame being awaited; 0 when no frame
    /// is in progress.
    expected_header: usize,
    /// Read cursor inside the head node's payload.
    offset: usize,
    /// Unread bytes across the whole chain.
    size: usize,
    head: NodeIndex,
    tail: NodeIndex,
}

impl DataBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            expected_header: 0,
            offset: 0,
            size: 0,
            head: NIL,
            tail: NIL,
        }
    }

    /// Unread bytes currently buffered.
    pub fn len(&self) -> usize {
        self.size
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Append a received chunk, taking ownership of the payload.
    pub fn push(&mut self, pool: &mut MessagePool, payload: Box<[u8]>) {
        let idx = pool.acquire();
        self.size += payload.len();
        {
            let node = pool.node_mut(idx);
            node.buffer = payload;
            node.next = NIL;
        }
        if self.head == NIL {
            debug_assert_eq!(self.tail, NIL);
            self.head = idx;
            self.tail = idx;
        } else {
            pool.node_mut(self.tail).next = idx;
            self.tail = idx;
        }
    }

    /// Copy exactly `dst.len()` bytes out of the FIFO.
    ///
    /// Exhausted nodes return to the pool as the copy crosses them.
    ///
    /// # Panics
    /// Panics if fewer than `dst.len()` bytes are buffered. The framing
    /// layer must only read what [`read_header`](DataBuffer::read_header)
    /// has certified; violating that is a programming error upstream, not a
    /// recoverable condition.
    pub fn read(&mut self, pool: &mut MessagePool, dst: &mut [u8]) {
        let mut sz = dst.len();
        assert!(
            self.size >= sz,
            "databuffer underflow: reading {} of {} buffered bytes",
            sz,
            self.size
        );
        self.size -= sz;
        let mut out = 0usize;
        while sz > 0 {
            let (copied, exhausted) = {
                let node = pool.node(self.head);
                let avail = node.buffer.len() - self.offset;
                let take = avail.min(sz);
                dst[out..out + take]
                    .copy_from_slice(&node.buffer[self.offset..self.offset + take]);
                (take, take == avail)
            };
            out += copied;
            sz -= copied;
            if exhausted {
                self.offset = 0;
                self.return_head(pool);
            } else {
                self.offset += copied;
            }
        }
    }

    /// Drive the length-prefix state machine.
    ///
    /// `width` is the length field size in bytes, 2 or 4, big-endian, stated
    /// per call (streams may be configured either way).
    ///
    /// Returns `Some(payload_len)` once the header is decoded *and* the
    /// full payload is buffered; the payload itself is not consumed - the
    /// caller follows up with [`read`](DataBuffer::read) of exactly that
    /// length and then [`reset`](DataBuffer::reset). Returns `None` while
    /// more data is needed, consuming nothing beyond the header bytes.
    ///
    /// # Panics
    /// Panics if `width` is not 2 or 4.
    pub fn read_header(&mut self, pool: &mut MessagePool, width: usize) -> Option<usize> {
        assert!(width == 2 || width == 4, "header width must be 2 or 4");
        if self.expected_header == 0 {
            if self.size < width {
                return None;
            }
            let mut prefix = [0u8; 4];
            self.read(pool, &mut prefix[..width]);
            self.expected_header = if width == 2 {
                usize::from(u16::from_be_bytes([prefix[0], prefix[1]]))
            } else {
                u32::from_be_bytes(prefix) as usize
            };
        }
        if self.size < self.expected_header {
            return None;
        }
        Some(self.expected_header)
    }

    /// Forget the decoded header, making the buffer ready for the next
    /// frame. Bytes already buffered belong to subsequent frames.
    pub fn reset(&mut self) {
        self.expected_header = 0;
    }

    /// Return every node to the pool and zero all framing state.
    pub fn clear(&mut self, pool: &mut MessagePool) {
        while self.head != NIL {
            self.return_head(pool);
        }
        self.expected_header = 0;
        self.offset = 0;
        self.size = 0;
    }

    /// Unlink the head node and recycle it.
    fn return_head(&mut self, pool: &mut MessagePool) {
        let head = self.head;
        let next = pool.node(head).next;
        if next == NIL {
            debug_assert_eq!(self.tail, head);
            self.head = NIL;
            self.tail = NIL;
        } else {
            self.head = next;
        }
        pool.release(head);
    }
}

impl Default for DataBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_bytes(db: &mut DataBuffer, pool: &mut MessagePool, bytes: &[u8]) {
        db.push(pool, Box::from(bytes));
    }

    #[test]
    fn test_read_within_single_node() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, b"abcdef");

        let mut out = [0u8; 3];
        db.read(&mut pool, &mut out);
        assert_eq!(&out, b"abc");
        assert_eq!(db.len(), 3);

        db.read(&mut pool, &mut out);
        assert_eq!(&out, b"def");
        assert!(db.is_empty());
    }

    #[test]
    fn test_read_spans_nodes() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, b"ab");
        push_bytes(&mut db, &mut pool, b"cd");
        push_bytes(&mut db, &mut pool, b"ef");

        let mut out = [0u8; 5];
        db.read(&mut pool, &mut out);
        assert_eq!(&out, b"abcde");
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_exhausted_nodes_recycle() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, b"xy");
        push_bytes(&mut db, &mut pool, b"z");

        let mut out = [0u8; 3];
        db.read(&mut pool, &mut out);
        assert!(db.is_empty());
        assert_eq!(pool.free_nodes(), pool.total_nodes());
    }

    #[test]
    #[should_panic(expected = "databuffer underflow")]
    fn test_overread_asserts() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, b"ab");
        let mut out = [0u8; 3];
        db.read(&mut pool, &mut out);
    }

    #[test]
    fn test_header_width_2() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, &[0x00, 0x05]);
        push_bytes(&mut db, &mut pool, b"hello");

        assert_eq!(db.read_header(&mut pool, 2), Some(5));
        let mut out = [0u8; 5];
        db.read(&mut pool, &mut out);
        assert_eq!(&out, b"hello");
        db.reset();
        assert!(db.is_empty());
    }

    #[test]
    fn test_header_width_4() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, &[0x00, 0x00, 0x01, 0x00]);
        push_bytes(&mut db, &mut pool, &[0x7f; 256]);

        assert_eq!(db.read_header(&mut pool, 4), Some(256));
        let mut out = [0u8; 256];
        db.read(&mut pool, &mut out);
        assert_eq!(out, [0x7f; 256]);
    }

    #[test]
    fn test_header_needs_more_data() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();

        // Nothing buffered at all.
        assert_eq!(db.read_header(&mut pool, 2), None);

        // One header byte is not enough; state is untouched.
        push_bytes(&mut db, &mut pool, &[0x00]);
        assert_eq!(db.read_header(&mut pool, 2), None);
        assert_eq!(db.len(), 1);

        // Header complete but payload short: header is consumed and latched,
        // the answer is still "wait".
        push_bytes(&mut db, &mut pool, &[0x03, 0x41, 0x42]);
        assert_eq!(db.read_header(&mut pool, 2), None);
        assert_eq!(db.len(), 2);

        push_bytes(&mut db, &mut pool, &[0x43]);
        assert_eq!(db.read_header(&mut pool, 2), Some(3));
        let mut out = [0u8; 3];
        db.read(&mut pool, &mut out);
        assert_eq!(&out, b"ABC");
    }

    #[test]
    fn test_header_split_across_nodes() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, &[0x00, 0x00]);
        push_bytes(&mut db, &mut pool, &[0x00, 0x02]);
        push_bytes(&mut db, &mut pool, b"ok");

        assert_eq!(db.read_header(&mut pool, 4), Some(2));
        let mut out = [0u8; 2];
        db.read(&mut pool, &mut out);
        assert_eq!(&out, b"ok");
    }

    #[test]
    fn test_repeated_header_reads_idempotent() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, &[0x00, 0x04]);
        push_bytes(&mut db, &mut pool, b"data");

        // Once latched, re-asking does not consume anything further.
        assert_eq!(db.read_header(&mut pool, 2), Some(4));
        assert_eq!(db.read_header(&mut pool, 2), Some(4));
        assert_eq!(db.len(), 4);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, &[0x00, 0x09]);
        push_bytes(&mut db, &mut pool, b"partial");
        assert_eq!(db.read_header(&mut pool, 2), None);

        db.clear(&mut pool);
        assert!(db.is_empty());
        assert_eq!(pool.free_nodes(), pool.total_nodes());

        // Buffer is immediately reusable for a fresh stream.
        push_bytes(&mut db, &mut pool, &[0x00, 0x02]);
        push_bytes(&mut db, &mut pool, b"hi");
        assert_eq!(db.read_header(&mut pool, 2), Some(2));
    }

    #[test]
    fn test_zero_length_payload_node() {
        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();
        push_bytes(&mut db, &mut pool, b"a");
        push_bytes(&mut db, &mut pool, b"");
        push_bytes(&mut db, &mut pool, b"b");

        let mut out = [0u8; 2];
        db.read(&mut pool, &mut out);
        assert_eq!(&out, b"ab");
        assert_eq!(pool.free_nodes(), pool.total_nodes());
    }
}
