// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end framing scenarios: whole frames reassembled from arbitrary
//! fragmentation, with no node leaked back to the pool.

use skiff::{DataBuffer, MessagePool};

fn encode_len_be(len: usize, width: usize) -> Vec<u8> {
    match width {
        2 => (len as u16).to_be_bytes().to_vec(),
        4 => (len as u32).to_be_bytes().to_vec(),
        _ => unreachable!("unsupported width"),
    }
}

fn frame(payload: &[u8], width: usize) -> Vec<u8> {
    let mut out = encode_len_be(payload.len(), width);
    out.extend_from_slice(payload);
    out
}

/// Push `bytes` split into the given chunk sizes.
fn push_chunked(db: &mut DataBuffer, pool: &mut MessagePool, bytes: &[u8], chunks: &[usize]) {
    let mut offset = 0;
    for &sz in chunks {
        db.push(pool, Box::from(&bytes[offset..offset + sz]));
        offset += sz;
    }
    assert_eq!(offset, bytes.len(), "chunk plan must cover the input");
}

#[test]
fn test_single_frame_width_2() {
    let mut pool = MessagePool::new();
    let mut db = DataBuffer::new();

    db.push(&mut pool, Box::from(&[0x00, 0x05][..]));
    db.push(&mut pool, Box::from(&b"hello"[..]));

    assert_eq!(db.read_header(&mut pool, 2), Some(5));
    let mut out = vec![0u8; 5];
    db.read(&mut pool, &mut out);
    assert_eq!(&out, b"hello");
    db.reset();
    assert!(db.is_empty());
}

#[test]
fn test_incremental_arrival() {
    let mut pool = MessagePool::new();
    let mut db = DataBuffer::new();

    db.push(&mut pool, Box::from(&[0x00][..]));
    assert_eq!(db.read_header(&mut pool, 2), None);

    db.push(&mut pool, Box::from(&[0x03, 0x41, 0x42][..]));
    // Header now decodes to 3 but only 2 payload bytes are in.
    assert_eq!(db.read_header(&mut pool, 2), None);

    db.push(&mut pool, Box::from(&[0x43][..]));
    assert_eq!(db.read_header(&mut pool, 2), Some(3));
    let mut out = vec![0u8; 3];
    db.read(&mut pool, &mut out);
    assert_eq!(&out, b"ABC");
}

#[test]
fn test_every_split_of_small_frame() {
    // A frame of length L split across 1..=L+w pushes, every split point.
    let payload = b"fragmented";
    for width in [2usize, 4] {
        let wire = frame(payload, width);
        for cut in 1..wire.len() {
            let mut pool = MessagePool::new();
            let mut db = DataBuffer::new();
            push_chunked(&mut db, &mut pool, &wire, &[cut, wire.len() - cut]);

            assert_eq!(db.read_header(&mut pool, width), Some(payload.len()));
            let mut out = vec![0u8; payload.len()];
            db.read(&mut pool, &mut out);
            assert_eq!(&out, payload);
            db.reset();
            assert!(db.is_empty());
            assert_eq!(pool.free_nodes(), pool.total_nodes());
        }
    }
}

#[test]
fn test_byte_at_a_time_delivery() {
    let payload = b"one byte at a time";
    let wire = frame(payload, 4);

    let mut pool = MessagePool::new();
    let mut db = DataBuffer::new();
    for b in &wire {
        // The frame is incomplete until the last byte lands.
        assert_eq!(db.read_header(&mut pool, 4), None);
        db.push(&mut pool, Box::from(&[*b][..]));
    }

    assert_eq!(db.read_header(&mut pool, 4), Some(payload.len()));
    let mut out = vec![0u8; payload.len()];
    db.read(&mut pool, &mut out);
    assert_eq!(&out, payload);
}

#[test]
fn test_pipelined_frames_in_order() {
    let frames: Vec<Vec<u8>> = (0..16)
        .map(|i| (0..=i).map(|b| b as u8).collect())
        .collect();

    let mut wire = Vec::new();
    for f in &frames {
        wire.extend_from_slice(&frame(f, 2));
    }

    let mut pool = MessagePool::new();
    let mut db = DataBuffer::new();
    // Deliver the whole pipeline as one chunk, then extract in order.
    db.push(&mut pool, wire.into_boxed_slice());

    for expected in &frames {
        let len = db
            .read_header(&mut pool, 2)
            .expect("pipelined frame complete");
        assert_eq!(len, expected.len());
        let mut out = vec![0u8; len];
        db.read(&mut pool, &mut out);
        assert_eq!(&out, expected);
        db.reset();
    }
    assert!(db.is_empty());
    assert_eq!(pool.free_nodes(), pool.total_nodes());
}

#[test]
fn test_random_fragmentation_roundtrip() {
    fastrand::seed(0x5EED);

    for trial in 0..50 {
        let width = if trial % 2 == 0 { 2 } else { 4 };
        let len = fastrand::usize(0..2000);
        let payload: Vec<u8> = (0..len).map(|_| fastrand::u8(..)).collect();
        let wire = frame(&payload, width);

        let mut pool = MessagePool::new();
        let mut db = DataBuffer::new();

        let mut offset = 0;
        while offset < wire.len() {
            let take = fastrand::usize(1..=wire.len() - offset);
            db.push(&mut pool, Box::from(&wire[offset..offset + take]));
            offset += take;
        }

        assert_eq!(db.read_header(&mut pool, width), Some(payload.len()));
        let mut out = vec![0u8; payload.len()];
        db.read(&mut pool, &mut out);
        assert_eq!(out, payload, "trial {} corrupted the payload", trial);
        db.reset();
        assert!(db.is_empty());
        assert_eq!(pool.free_nodes(), pool.total_nodes());
    }
}

#[test]
fn test_interleaved_streams_share_pool() {
    // Two streams, one pool: recycled nodes flow between buffers without
    // mixing payloads.
    let mut pool = MessagePool::new();
    let mut a = DataBuffer::new();
    let mut b = DataBuffer::new();

    a.push(&mut pool, Box::from(&frame(b"stream-a", 2)[..]));
    b.push(&mut pool, Box::from(&frame(b"stream-b", 2)[..]));

    let la = a.read_header(&mut pool, 2).expect("a complete");
    let lb = b.read_header(&mut pool, 2).expect("b complete");
    let mut out_a = vec![0u8; la];
    let mut out_b = vec![0u8; lb];
    a.read(&mut pool, &mut out_a);
    b.read(&mut pool, &mut out_b);
    assert_eq!(&out_a, b"stream-a");
    assert_eq!(&out_b, b"stream-b");

    a.clear(&mut pool);
    b.clear(&mut pool);
    assert_eq!(pool.free_nodes(), pool.total_nodes());
}

#[test]
fn test_clear_mid_frame_then_reuse() {
    let mut pool = MessagePool::new();
    let mut db = DataBuffer::new();

    db.push(&mut pool, Box::from(&[0x00, 0x40][..]));
    db.push(&mut pool, Box::from(&[0xAA; 16][..]));
    assert_eq!(db.read_header(&mut pool, 2), None);

    // Connection dropped mid-frame; the buffer must come back clean.
    db.clear(&mut pool);
    assert!(db.is_empty());

    db.push(&mut pool, Box::from(&frame(b"fresh", 2)[..]));
    assert_eq!(db.read_header(&mut pool, 2), Some(5));
    let mut out = vec![0u8; 5];
    db.read(&mut pool, &mut out);
    assert_eq!(&out, b"fresh");
}
