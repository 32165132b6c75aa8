//! # Buffer Pool
//!
//! Size-tiered pool of reusable byte buffers for formatting, implemented
//! with `crossbeam_channel` bounded queues rather than pulling in a
//! dedicated object-pool crate.

use crossbeam_channel::{bounded, Receiver, Sender};

const SMALL_CAPACITY: usize = 128;
const MEDIUM_CAPACITY: usize = 512;
const LARGE_CAPACITY: usize = 2048;
const MAX_RETAINED: usize = 32 * 1024;
const TIER_SLOTS: usize = 256;

struct Tier {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    capacity_hint: usize,
}

impl Tier {
    fn new(capacity_hint: usize) -> Self {
        let (tx, rx) = bounded(TIER_SLOTS);
        Tier {
            tx,
            rx,
            capacity_hint,
        }
    }

    fn acquire(&self) -> Vec<u8> {
        match self.rx.try_recv() {
            Ok(mut buf) => {
                buf.clear();
                buf
            }
            Err(_) => Vec::with_capacity(self.capacity_hint),
        }
    }

    fn release(&self, buf: Vec<u8>) {
        // Best-effort: if the tier's slot ring is full, just drop the buffer.
        let _ = self.tx.try_send(buf);
    }
}

/// Thread-safe pool of reusable `Vec<u8>` buffers plus a small pool of
/// reusable `String` accumulators.
///
/// Safe under concurrent acquire/release; no ordering between acquirers is
/// guaranteed.
pub struct BufferPool {
    small: Tier,
    medium: Tier,
    large: Tier,
    strings_tx: Sender<String>,
    strings_rx: Receiver<String>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        let (strings_tx, strings_rx) = bounded(TIER_SLOTS);
        BufferPool {
            small: Tier::new(SMALL_CAPACITY),
            medium: Tier::new(MEDIUM_CAPACITY),
            large: Tier::new(LARGE_CAPACITY),
            strings_tx,
            strings_rx,
        }
    }

    /// Acquires a buffer sized to fit `size_hint` bytes, reusing a pooled
    /// buffer from the appropriate tier when one is available.
    pub fn acquire(&self, size_hint: usize) -> Vec<u8> {
        if size_hint <= SMALL_CAPACITY {
            self.small.acquire()
        } else if size_hint <= MEDIUM_CAPACITY {
            self.medium.acquire()
        } else {
            self.large.acquire()
        }
    }

    /// Returns a buffer to the pool. Buffers whose capacity exceeds 32 KiB
    /// are discarded rather than retained, to prevent unbounded growth from
    /// one oversized record inflating the pool permanently.
    pub fn release(&self, buf: Vec<u8>) {
        let cap = buf.capacity();
        if cap > MAX_RETAINED {
            return;
        }
        if cap <= 256 {
            self.small.release(buf);
        } else if cap <= 1024 {
            self.medium.release(buf);
        } else {
            self.large.release(buf);
        }
    }

    pub fn acquire_string(&self) -> String {
        match self.strings_rx.try_recv() {
            Ok(mut s) => {
                s.clear();
                s
            }
            Err(_) => String::with_capacity(MEDIUM_CAPACITY),
        }
    }

    pub fn release_string(&self, s: String) {
        if s.capacity() > MAX_RETAINED {
            return;
        }
        let _ = self.strings_tx.try_send(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_resets_length() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire(64);
        buf.extend_from_slice(b"hello");
        pool.release(buf);
        let buf2 = pool.acquire(64);
        assert_eq!(buf2.len(), 0);
    }

    #[test]
    fn routes_release_by_capacity_tier() {
        let pool = BufferPool::new();
        let small = Vec::<u8>::with_capacity(200);
        let medium = Vec::<u8>::with_capacity(800);
        let large = Vec::<u8>::with_capacity(4000);
        pool.release(small);
        pool.release(medium);
        pool.release(large);

        // Each tier should now yield a reused buffer rather than allocate fresh.
        assert!(pool.small.rx.try_recv().is_ok());
        assert!(pool.medium.rx.try_recv().is_ok());
        assert!(pool.large.rx.try_recv().is_ok());
    }

    #[test]
    fn discards_oversized_buffers_on_release() {
        let pool = BufferPool::new();
        let huge = Vec::<u8>::with_capacity(64 * 1024);
        pool.release(huge);
        assert!(pool.large.rx.try_recv().is_err());
    }
}
