//! Allocation facade for the VM's owned buffers.
//!
//! Every buffer the context owns goes through an [`Allocator`], which grants or
//! refuses byte budgets. The backing storage itself is a `Vec`, grown with
//! `try_reserve_exact` so that host allocation failure surfaces as an
//! [`AllocError`] instead of aborting the process.

use std::fmt;
use std::mem::size_of;
use std::ops::{Index, IndexMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("budget exceeded: {bytes} bytes requested, {in_use} of {limit} already in use")]
    BudgetExceeded { bytes: usize, in_use: usize, limit: usize },
    #[error("requested size is not representable")]
    SizeOverflow,
    #[error("host allocator could not provide {bytes} bytes")]
    Host { bytes: usize },
}

/// Strategy deciding whether a buffer may take more memory.
///
/// `acquire` is called before a buffer grows, `release` when the bytes are handed
/// back (on drop, or when a grow that was granted fails on the host side).
pub trait Allocator: fmt::Debug + Send + Sync {
    fn acquire(&self, bytes: usize) -> Result<(), AllocError>;
    fn release(&self, bytes: usize);
}

/// Grants every request; the host allocator is the only limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

impl Allocator for System {
    fn acquire(&self, _bytes: usize) -> Result<(), AllocError> {
        Ok(())
    }

    fn release(&self, _bytes: usize) {}
}

/// Byte ceiling shared by every buffer it is handed to.
///
/// `in_use` drops back to zero once all buffers are gone, which makes it usable as
/// a leak check.
#[derive(Debug)]
pub struct Budget {
    limit: usize,
    in_use: AtomicUsize,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Budget { limit, in_use: AtomicUsize::new(0) }
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }
}

impl Allocator for Budget {
    fn acquire(&self, bytes: usize) -> Result<(), AllocError> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= self.limit)
            })
            .map(|_| ())
            .map_err(|in_use| AllocError::BudgetExceeded { bytes, in_use, limit: self.limit })
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
    }
}

// ── Buffer ───────────────────────────────────────────────────────────

/// Owned growable array with an explicit capacity.
///
/// `len()` counts initialized elements; `capacity()` counts elements paid for
/// through the allocator. Slots in `[len, capacity)` are reserved but cannot be
/// read. Any growth may move the storage, so callers address elements by index
/// and never keep a slice across a call that can grow.
pub struct Buffer<T> {
    data: Vec<T>,
    capacity: usize,
    alloc: Arc<dyn Allocator>,
}

impl<T: Copy + Default> Buffer<T> {
    /// Reserves `capacity` elements without initializing any of them.
    pub fn with_capacity(alloc: Arc<dyn Allocator>, capacity: usize) -> Result<Self, AllocError> {
        let mut buf = Buffer { data: Vec::new(), capacity: 0, alloc };
        buf.grow(capacity)?;
        Ok(buf)
    }

    /// Allocates `len` elements, all set to `T::default()`.
    pub fn zeroed(alloc: Arc<dyn Allocator>, len: usize) -> Result<Self, AllocError> {
        let mut buf = Self::with_capacity(alloc, len)?;
        buf.data.resize(len, T::default());
        Ok(buf)
    }

    /// Raises capacity to `new_capacity`, keeping every initialized element.
    /// Does nothing if the buffer is already that large.
    pub fn grow(&mut self, new_capacity: usize) -> Result<(), AllocError> {
        if new_capacity <= self.capacity {
            return Ok(());
        }
        let bytes = (new_capacity - self.capacity)
            .checked_mul(size_of::<T>())
            .ok_or(AllocError::SizeOverflow)?;
        self.alloc.acquire(bytes)?;
        if self.data.try_reserve_exact(new_capacity - self.data.len()).is_err() {
            self.alloc.release(bytes);
            warn!(bytes, "host allocation failed");
            return Err(AllocError::Host { bytes });
        }
        self.capacity = new_capacity;
        Ok(())
    }

    /// Raises both capacity and length to `new_len`. Existing elements are kept;
    /// every element in `[old_len, new_len)` is `T::default()`.
    pub fn grow_zeroed(&mut self, new_len: usize) -> Result<(), AllocError> {
        self.grow(new_len)?;
        if new_len > self.data.len() {
            self.data.resize(new_len, T::default());
        }
        Ok(())
    }

    /// Appends within the reserved capacity. Callers grow first.
    pub fn push(&mut self, value: T) {
        debug_assert!(self.data.len() < self.capacity, "push past reserved capacity");
        self.data.push(value);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.data.pop()
    }

    pub fn last(&self) -> Option<T> {
        self.data.last().copied()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.data.get(index).copied()
    }
}

impl<T> Buffer<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Index<usize> for Buffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for Buffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.data.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> Drop for Buffer<T> {
    fn drop(&mut self) {
        self.alloc.release(self.capacity * size_of::<T>());
    }
}
