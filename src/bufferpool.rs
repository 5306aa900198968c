//! Fixed-cardinality reusable buffer pool for UDP receipt.
//!
//! A pool of `N` fixed-capacity byte buffers is preallocated at startup and
//! never grows or shrinks. `acquire()` blocks when the pool is empty — this
//! is the only backpressure inside the process ("buffer pool as
//! implicit backpressure"). Every buffer taken is returned exactly once on
//! every exit path; `Buffer`'s `Drop` impl enforces that even on early
//! return or panic-unwind in a dispatched task.

use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::Arc;

/// Default pool cardinality.
pub const DEFAULT_POOL_SIZE: usize = 1000;
/// Default per-buffer capacity in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// A buffer on loan from a [`BufferPool`]. Returned to the pool automatically
/// when dropped, regardless of which exit path released it.
pub struct Buffer {
    data: Vec<u8>,
    len: usize,
    release: Sender<Vec<u8>>,
}

impl Buffer {
    /// Number of bytes actually filled by the last receive.
    #[must_use]
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Total capacity of the underlying allocation.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Mutable access to the whole backing allocation, for the receive call.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Records how many bytes were actually filled by the last receive.
    pub fn set_filled(&mut self, len: usize) {
        self.len = len;
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        // The pool's receiving end only goes away at process exit; a full
        // channel never happens because exactly `N` buffers are ever live.
        let _ = self.release.send(data);
    }
}

/// A bounded pool of reusable byte buffers, implemented as a prefilled
/// `crossbeam` channel: `acquire` is a blocking `recv`, `release` happens
/// implicitly via `Buffer::drop`.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Inner>,
}

struct Inner {
    free: Receiver<Vec<u8>>,
    release: Sender<Vec<u8>>,
    capacity: usize,
}

impl BufferPool {
    /// Preallocates `size` buffers of `capacity` bytes each.
    #[must_use]
    pub fn new(size: usize, capacity: usize) -> Self {
        let (release, free) = bounded(size);
        for _ in 0..size {
            // Unwrap is safe: the channel was sized for exactly `size` sends
            // before any receive happens.
            release.send(vec![0u8; capacity]).ok();
        }
        Self {
            inner: Arc::new(Inner {
                free,
                release,
                capacity,
            }),
        }
    }

    /// Per-buffer capacity, fixed for the process lifetime.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Blocks until a buffer is available, then hands out ownership of it.
    #[must_use]
    pub fn acquire(&self) -> Buffer {
        // `recv` only errs if every sender is gone, which can't happen while
        // `self` (holding `release`) is alive.
        #[allow(clippy::expect_used)]
        let data = self
            .inner
            .free
            .recv()
            .expect("buffer pool sender outlives every receiver");
        Buffer {
            data,
            len: 0,
            release: self.inner.release.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardinality_is_preserved_across_a_batch() {
        let pool = BufferPool::new(4, 16);
        let mut held = Vec::new();
        for _ in 0..4 {
            held.push(pool.acquire());
        }
        // Pool is now empty; dropping returns every buffer.
        drop(held);
        for _ in 0..4 {
            let _ = pool.acquire();
        }
    }

    #[test]
    fn acquired_buffer_reports_configured_capacity() {
        let pool = BufferPool::new(1, 128);
        let buf = pool.acquire();
        assert_eq!(buf.capacity(), 128);
    }
}
