//! `ring_buffer_contract` 集成测试：以外部调用方视角验证 `RingBuffer` 的公开契约。
//!
//! # 测试目标（Why）
//! - 固化收发路径最常见的两类序列：写满后扩容，以及回绕后扩容；
//! - 校验“越量取走等价于全部取走”“空缓冲重置幂等”等边界约定，防止重构时悄悄改变语义。

use spark_ringbuf::{GrowthPolicy, RingBuffer, RingBufferError};

fn occupied(ring: &RingBuffer) -> Vec<u8> {
    let (first, second) = ring.peek_all();
    [first, second].concat()
}

/// 写满、扩容、部分取走、读空的完整链路。
///
/// # 步骤说明（How）
/// 1. 容量 8 写入 8 字节，缓冲满，可写空间为 0；
/// 2. 再写 1 字节触发扩容，窥视结果为全部 9 字节；
/// 3. 取走 5 字节后读取 4 字节，读到 `FGHI` 且缓冲为空。
#[test]
fn full_buffer_grows_then_drains_in_order() {
    for policy in [GrowthPolicy::Exact, GrowthPolicy::Double] {
        let mut ring = RingBuffer::new(8).with_growth(policy);
        assert_eq!(ring.write(b"ABCDEFGH"), 8);
        assert!(ring.is_full());
        assert_eq!(ring.free_write_space(), 0);

        assert_eq!(ring.write(b"I"), 1);
        assert!(ring.capacity() >= 9);
        assert_eq!(occupied(&ring), b"ABCDEFGHI");

        ring.retrieve(5);
        assert_eq!(occupied(&ring), b"FGHI");

        let mut dst = [0u8; 4];
        assert_eq!(ring.read(&mut dst), Ok(4));
        assert_eq!(&dst, b"FGHI");
        assert!(ring.is_empty());
        assert_eq!(ring.read(&mut dst), Err(RingBufferError::Empty));
    }
}

/// 回绕状态下扩容仍保持字节顺序。
#[test]
fn wrapped_buffer_grows_without_reordering() {
    let mut ring = RingBuffer::new(4);
    ring.write(b"AB");
    ring.retrieve(2);
    assert!(ring.is_empty());

    ring.write(b"CDEF");
    assert!(ring.is_full());
    ring.write(b"GH");
    assert_eq!(occupied(&ring), b"CDEFGH");
}

/// 窥视不移动游标，且在回绕时返回两段。
#[test]
fn peek_all_returns_two_segments_when_wrapped() {
    let mut ring = RingBuffer::new(6);
    ring.write(b"012345");
    ring.retrieve(4);
    ring.write(b"678");
    let (first, second) = ring.peek_all();
    assert_eq!(first, b"45");
    assert_eq!(second, b"678");
    assert_eq!(ring.len(), 5, "窥视不得改变占用量");
    assert_eq!(ring.peek_all(), (first, second));
}

#[test]
fn over_discard_matches_retrieve_all() {
    let mut discarded = RingBuffer::new(8);
    let mut cleared = RingBuffer::new(8);
    for ring in [&mut discarded, &mut cleared] {
        ring.write(b"abcdefg");
        ring.retrieve(5);
        ring.write(b"hij");
    }
    discarded.retrieve(usize::MAX);
    cleared.retrieve_all();
    for ring in [&discarded, &cleared] {
        assert!(ring.is_empty());
        assert_eq!(ring.free_read_space(), 0);
        assert_eq!(ring.free_write_space(), 8);
        assert_eq!(ring.peek_all(), (&[][..], &[][..]));
    }

    // 归零后的写入从存储起点开始，只有一段。
    discarded.write(b"xyz");
    assert_eq!(discarded.peek_all(), (&b"xyz"[..], &[][..]));
}

#[test]
fn reset_keeps_capacity_and_is_idempotent() {
    let mut ring = RingBuffer::new(4);
    ring.write(b"abcdefgh");
    let grown = ring.capacity();
    ring.reset();
    ring.reset();
    assert!(ring.is_empty());
    assert_eq!(ring.capacity(), grown);
    assert_eq!(ring.free_write_space(), grown);
}

#[test]
fn from_bytes_treats_payload_as_unread() {
    let mut ring = RingBuffer::from_bytes(b"payload".to_vec());
    assert!(ring.is_full());
    assert_eq!(ring.free_read_space(), 7);
    assert_eq!(ring.free_write_space(), 0);

    ring.retrieve(3);
    ring.write(b"!!");
    assert_eq!(ring.capacity(), 7, "取走后腾出的空间足够，不应扩容");
    assert_eq!(occupied(&ring), b"load!!");
}

#[test]
fn with_data_repurposes_existing_instance() {
    let mut ring = RingBuffer::new(32);
    ring.write(b"previous connection");
    ring.with_data(vec![1, 2, 3]);
    assert_eq!(ring.capacity(), 3);
    assert_eq!(occupied(&ring), [1, 2, 3]);

    ring.with_data(Vec::new());
    assert!(ring.is_empty());
    assert_eq!(ring.capacity(), 0);
}

/// 保留 1 字节残留的“写入 -> 窥视 -> 取走”循环：游标持续前移并回绕，容量保持不变。
#[test]
fn residue_keeps_cursors_moving_through_wrap() {
    let payload = [7u8; 512];
    let mut ring = RingBuffer::new(1500);
    ring.write(&[0u8]);

    let mut wrapped = false;
    for _ in 0..10 {
        ring.write(&payload);
        let (first, second) = ring.peek_all();
        assert_eq!(first.len() + second.len(), 513);
        wrapped |= !second.is_empty();
        ring.retrieve(payload.len());
        assert_eq!(ring.len(), 1);
    }
    assert!(wrapped, "循环应至少经历一次回绕");
    assert_eq!(ring.capacity(), 1500);
}
