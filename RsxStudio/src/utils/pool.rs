//! Fixed-capacity pool of reusable scratch buffers
//!
//! A decode unit checks a slot out for its duration and the guard hands it
//! back on drop, including on early return and error paths.

use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Pool of equally sized byte buffers.
#[derive(Debug)]
pub struct ScratchPool {
    slots: Mutex<Vec<Vec<u8>>>,
    available: Condvar,
    slot_size: usize,
    capacity: usize,
}

impl ScratchPool {
    /// Create a pool with `slots` buffers of `slot_size` bytes each.
    #[must_use]
    pub fn new(slots: usize, slot_size: usize) -> Self {
        let slots = slots.max(1);
        Self {
            slots: Mutex::new((0..slots).map(|_| vec![0u8; slot_size]).collect()),
            available: Condvar::new(),
            slot_size,
            capacity: slots,
        }
    }

    /// Size of each slot in bytes.
    #[must_use]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots not currently checked out.
    #[must_use]
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    /// Check out a slot, blocking until one is free.
    pub fn checkout(&self) -> ScratchGuard<'_> {
        let mut slots = self.lock();
        loop {
            if let Some(buf) = slots.pop() {
                return ScratchGuard { pool: self, buf: Some(buf) };
            }
            slots = self
                .available
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Check out a slot without blocking.
    pub fn try_checkout(&self) -> Option<ScratchGuard<'_>> {
        self.lock()
            .pop()
            .map(|buf| ScratchGuard { pool: self, buf: Some(buf) })
    }

    /// Run `f` with a checked-out slot; the slot is returned afterwards.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.checkout();
        f(&mut guard)
    }

    fn give_back(&self, buf: Vec<u8>) {
        self.lock().push(buf);
        self.available.notify_one();
    }

    // A panic while holding the lock cannot leave the slot list inconsistent.
    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A checked-out scratch slot.
#[derive(Debug)]
pub struct ScratchGuard<'a> {
    pool: &'a ScratchPool,
    buf: Option<Vec<u8>>,
}

impl Deref for ScratchGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.give_back(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_checkout_and_return() {
        let pool = ScratchPool::new(2, 64);
        assert_eq!(pool.available(), 2);
        {
            let a = pool.checkout();
            let _b = pool.checkout();
            assert_eq!(a.len(), 64);
            assert_eq!(pool.available(), 0);
            assert!(pool.try_checkout().is_none());
        }
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_slot_returned_on_error_path() {
        let pool = ScratchPool::new(1, 16);
        let result: std::result::Result<(), &str> = pool.with_buffer(|buf| {
            buf[0] = 7;
            Err("decode failed")
        });
        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_slot_returned_on_panic() {
        let pool = Arc::new(ScratchPool::new(1, 16));
        let worker = Arc::clone(&pool);
        let joined = std::thread::spawn(move || {
            let _guard = worker.checkout();
            panic!("decode panicked");
        })
        .join();
        assert!(joined.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_one_owner_per_slot() {
        let pool = Arc::new(ScratchPool::new(2, 8));
        let in_use = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let in_use = Arc::clone(&in_use);
                let peak = Arc::clone(&peak);
                std::thread::spawn(move || {
                    pool.with_buffer(|_| {
                        let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(2));
                        in_use.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }
}
