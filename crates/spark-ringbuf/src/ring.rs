use std::io::{self, IoSlice};

use bytes::Buf;
use tracing::debug;

use crate::{
    config::{GrowthPolicy, RingBufferConfig},
    error::{Result, RingBufferError},
};

/// `RingBuffer` 是连接收发路径上的可扩容环形字节缓冲。
///
/// # 设计动机（Why）
/// - 套接字读到的字节追加在写游标处，协议层从读游标消费，可以先零拷贝窥视（`peek_all`），
///   待报文处理或发送完成后再调用 `retrieve` 标记已取走；
/// - 空间不足时透明扩容，写入永不失败，也不会出现短写。
///
/// # 状态机（How）
/// - `rpos`/`wpos` 为 `[0, capacity)` 内的游标，按 `capacity` 取模推进；
/// - 游标相等既可能是“空”也可能是“满”，由 `is_empty` 唯一裁决，任何改变占用量的操作都会同步刷新它；
/// - 占用区间可能跨越存储末尾（回绕），读写、窥视都按“头段 + 尾段”两次切片处理。
///
/// # 契约说明（What）
/// - `free_read_space() + free_write_space() == capacity()` 在任意可达状态下成立；
/// - 扩容不会丢弃或重排未读字节；
/// - 不含任何内部同步：所有修改都经由 `&mut self`，单一所有者纪律由借用检查器保证，
///   跨连接复用请经由 [`crate::RingBufferPool`] 显式转移所有权。
#[derive(Clone, Debug)]
pub struct RingBuffer {
    buf: Vec<u8>,
    rpos: usize,
    wpos: usize,
    is_empty: bool,
    growth: GrowthPolicy,
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::with_config(&RingBufferConfig::default())
    }
}

impl RingBuffer {
    /// 创建容量为 `capacity` 的空缓冲，存储预先清零。
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            rpos: 0,
            wpos: 0,
            is_empty: true,
            growth: GrowthPolicy::default(),
        }
    }

    /// 按配置创建空缓冲。
    pub fn with_config(config: &RingBufferConfig) -> Self {
        Self::new(config.initial_capacity).with_growth(config.growth)
    }

    /// 以现有字节构造缓冲，全部字节视为未读数据，缓冲处于满状态。
    ///
    /// 传入空 `Vec` 时得到容量为 0 的空缓冲。
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mut ring = Self::new(0);
        ring.with_data(data);
        ring
    }

    /// 替换扩容策略。
    pub fn with_growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }

    pub fn growth_policy(&self) -> GrowthPolicy {
        self.growth
    }

    /// 以外部字节整体替换存储，供池化实例包装一段新分配的数据。
    ///
    /// # 契约说明（What）
    /// - 所有权随 `data` 转入，不发生拷贝；旧存储被释放；
    /// - 两个游标归零且标记为非空，即整段数据都是未读字节；
    /// - `data` 为空时缓冲退化为容量 0 的空缓冲，避免出现“容量为 0 却满”的矛盾状态。
    pub fn with_data(&mut self, data: Vec<u8>) {
        self.rpos = 0;
        self.wpos = 0;
        self.is_empty = data.is_empty();
        self.buf = data;
    }

    /// 底层存储的总字节数。
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// 当前未读字节数，等价于 [`RingBuffer::free_read_space`]。
    pub fn len(&self) -> usize {
        self.free_read_space()
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn is_full(&self) -> bool {
        !self.is_empty && self.rpos == self.wpos
    }

    /// 可读（可丢弃）的字节数。
    pub fn free_read_space(&self) -> usize {
        if self.wpos == self.rpos {
            return if self.is_empty { 0 } else { self.capacity() };
        }
        if self.wpos > self.rpos {
            self.wpos - self.rpos
        } else {
            self.capacity() - self.rpos + self.wpos
        }
    }

    /// 无需扩容即可写入的字节数。
    pub fn free_write_space(&self) -> usize {
        if self.wpos == self.rpos {
            return if self.is_empty { self.capacity() } else { 0 };
        }
        if self.wpos < self.rpos {
            self.rpos - self.wpos
        } else {
            self.capacity() - self.wpos + self.rpos
        }
    }

    /// 追加写入 `src`，空间不足时先扩容。
    ///
    /// # 执行逻辑（How）
    /// 1. 空输入直接返回 0；
    /// 2. `free_write_space() < src.len()` 时按扩容策略补足缺口；
    /// 3. 从写游标开始拷贝，跨越存储末尾时拆成头段与尾段；
    /// 4. 写游标按容量取模推进，并标记为非空。
    ///
    /// 返回值恒等于 `src.len()`。
    pub fn write(&mut self, src: &[u8]) -> usize {
        let n = src.len();
        if n == 0 {
            return 0;
        }
        let free = self.free_write_space();
        if free < n {
            self.make_space(n - free);
        }

        let capacity = self.capacity();
        let head = capacity - self.wpos;
        if head >= n {
            self.buf[self.wpos..self.wpos + n].copy_from_slice(src);
        } else {
            self.buf[self.wpos..].copy_from_slice(&src[..head]);
            self.buf[..n - head].copy_from_slice(&src[head..]);
        }
        self.wpos = (self.wpos + n) % capacity;
        self.is_empty = false;
        n
    }

    /// 拷贝并取走至多 `dst.len()` 个字节。
    ///
    /// # 契约说明（What）
    /// - `dst` 为空时返回 `Ok(0)`，不论缓冲状态；
    /// - 缓冲为空且 `dst` 非空时返回 [`RingBufferError::Empty`]；
    /// - 实际拷贝量为 `min(dst.len(), len())`；
    /// - 该读取具有破坏性：拷贝后读游标随之推进，追上写游标时缓冲变为空。
    ///   只想查看数据时请使用 [`RingBuffer::peek_all`]。
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        if self.is_empty {
            return Err(RingBufferError::Empty);
        }
        let n = self.copy_out(dst);
        self.rpos = (self.rpos + n) % self.capacity();
        if self.rpos == self.wpos {
            self.is_empty = true;
        }
        Ok(n)
    }

    /// 丢弃队首至多 `len` 个字节而不拷贝。
    ///
    /// `len` 不小于当前未读字节数时等价于 [`RingBuffer::retrieve_all`]，游标整体归零，
    /// 而不是把读游标推进到写游标处。
    pub fn retrieve(&mut self, len: usize) {
        if self.is_empty || len == 0 {
            return;
        }
        if len < self.free_read_space() {
            self.rpos = (self.rpos + len) % self.capacity();
            if self.rpos == self.wpos {
                self.is_empty = true;
            }
        } else {
            self.retrieve_all();
        }
    }

    /// 丢弃全部数据，游标归零。容量与存储保持不变。
    pub fn retrieve_all(&mut self) {
        self.rpos = 0;
        self.wpos = 0;
        self.is_empty = true;
    }

    /// 与 [`RingBuffer::retrieve_all`] 相同，池在复用前调用。
    pub fn reset(&mut self) {
        self.retrieve_all();
    }

    /// 以至多两段切片零拷贝地暴露全部未读数据，不移动游标。
    ///
    /// - 未回绕：`([rpos, wpos), [])`；
    /// - 回绕或已满：`([rpos, capacity), [0, wpos))`；
    /// - 空缓冲：两段皆空。
    pub fn peek_all(&self) -> (&[u8], &[u8]) {
        if self.is_empty {
            return (&[], &[]);
        }
        if self.wpos > self.rpos {
            return (&self.buf[self.rpos..self.wpos], &[]);
        }
        (&self.buf[self.rpos..], &self.buf[..self.wpos])
    }

    /// 从读游标开始把至多 `dst.len()` 个字节拷入 `dst`，不改动任何状态。
    fn copy_out(&self, dst: &mut [u8]) -> usize {
        let (first, second) = self.peek_all();
        let n = dst.len().min(first.len() + second.len());
        if n <= first.len() {
            dst[..n].copy_from_slice(&first[..n]);
        } else {
            let head = first.len();
            dst[..head].copy_from_slice(first);
            dst[head..n].copy_from_slice(&second[..n - head]);
        }
        n
    }

    /// 至少扩出 `deficit` 字节的可写空间，并把未读数据线性化到新存储起始处。
    fn make_space(&mut self, deficit: usize) {
        let old_capacity = self.capacity();
        let new_capacity = self.growth.next_capacity(old_capacity, deficit);
        let mut grown = vec![0; new_capacity];
        let occupied = self.copy_out(&mut grown);

        self.rpos = 0;
        self.wpos = occupied % new_capacity;
        self.buf = grown;
        debug!(
            old_capacity,
            new_capacity,
            occupied,
            policy = ?self.growth,
            "ring buffer grown"
        );
    }
}

impl io::Write for RingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(RingBuffer::write(self, buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        RingBuffer::write(self, buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 发送路径可以直接把缓冲当作 `bytes::Buf` 交给编码器或向量化写入，
/// 发送确认后由 `advance` 完成取走。
impl Buf for RingBuffer {
    fn remaining(&self) -> usize {
        self.free_read_space()
    }

    fn chunk(&self) -> &[u8] {
        self.peek_all().0
    }

    fn advance(&mut self, cnt: usize) {
        self.retrieve(cnt);
    }

    fn chunks_vectored<'a>(&'a self, dst: &mut [IoSlice<'a>]) -> usize {
        let (first, second) = self.peek_all();
        let mut filled = 0;
        for segment in [first, second] {
            if segment.is_empty() || filled == dst.len() {
                continue;
            }
            dst[filled] = IoSlice::new(segment);
            filled += 1;
        }
        filled
    }
}
