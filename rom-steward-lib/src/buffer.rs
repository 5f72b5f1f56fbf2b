//! Reusable read-buffer pool.
//!
//! Hash jobs churn through 64 KiB buffers; pooling them keeps allocation
//! out of the hot loop when many jobs run back to back. Buffers are
//! returned on release and handed out most-recently-used first.

use std::sync::Mutex;

pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    buf_size: usize,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(buf_size: usize, max_pooled: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            buf_size,
            max_pooled,
        }
    }

    /// Take a buffer of `buf_size` bytes, reusing a pooled one when
    /// available.
    pub fn acquire(&self) -> Vec<u8> {
        let mut pool = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        pool.pop().unwrap_or_else(|| vec![0u8; self.buf_size])
    }

    /// Return a buffer. Buffers beyond `max_pooled` are dropped.
    pub fn release(&self, buf: Vec<u8>) {
        if buf.len() != self.buf_size {
            return;
        }
        let mut pool = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        if pool.len() < self.max_pooled {
            pool.push(buf);
        }
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(crate::hasher::CHUNK_SIZE, 8)
    }
}
