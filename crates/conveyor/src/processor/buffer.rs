use core::ops::{Deref, DerefMut};
use parking_lot::Mutex;
use std::sync::Arc;

/// Initial capacity of every buffer the pool allocates.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Most idle buffers kept around; extras are freed on return.
const MAX_IDLE: usize = 64;

/// A shared free list of byte buffers.
///
/// Clones share the same free list. Buffers are cleared, but keep their
/// allocation, when they are returned.
#[derive(Clone, Debug)]
pub struct BufferPool {
    free: Arc<Mutex<Vec<Vec<u8>>>>,
    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Arc::new(Mutex::new(Vec::new())),
            capacity,
        }
    }

    /// Takes an idle buffer, or allocates a fresh one if none is idle.
    pub fn get(&self) -> PooledBuffer {
        let buf = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.capacity));

        PooledBuffer {
            buf,
            free: Arc::clone(&self.free),
        }
    }

    /// Number of buffers currently waiting to be reused.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

/// A buffer on loan from a [`BufferPool`]. Goes back to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    free: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buf = core::mem::take(&mut self.buf);
        buf.clear();

        let mut free = self.free.lock();
        if free.len() < MAX_IDLE {
            free.push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returned_buffers_are_reused_empty() {
        let pool = BufferPool::default();
        assert_eq!(pool.idle(), 0);

        {
            let mut buf = pool.get();
            assert!(buf.capacity() >= DEFAULT_BUFFER_CAPACITY);
            buf.extend_from_slice(b"scratch");
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= DEFAULT_BUFFER_CAPACITY);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = BufferPool::new(8);
        let loans: Vec<_> = (0..MAX_IDLE + 10).map(|_| pool.get()).collect();
        drop(loans);
        assert_eq!(pool.idle(), MAX_IDLE);
    }
}
