use std::sync::Arc;

use tracing::trace;

use super::alloc::{Allocator, Buffer};
use super::{Addr, Region, VmError, Word};

/// LIFO operand stack.
///
/// Slots past `len()` are reserved but never readable, so growth does not need to
/// zero them.
#[derive(Debug)]
pub struct OperandStack {
    slots: Buffer<Word>,
    limit: Addr,
}

impl OperandStack {
    pub(super) fn new(alloc: Arc<dyn Allocator>, capacity: Addr, limit: Addr) -> Result<Self, VmError> {
        let slots = Buffer::with_capacity(alloc, capacity as usize).map_err(|source| {
            VmError::Allocation { region: Region::Stack, cells: capacity as usize, source }
        })?;
        Ok(OperandStack { slots, limit })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn push(&mut self, value: Word) -> Result<(), VmError> {
        let len = self.slots.len() as u64;
        let limit = u64::from(self.limit);
        if len >= limit {
            // one more would not fit in the address type
            return Err(VmError::StackOverflow { limit: self.limit });
        }

        // capacity is checked against the size after the push
        let new_len = len + 1;
        let cap = self.slots.capacity() as u64;
        if cap <= new_len {
            let new_cap = cap.checked_mul(2).unwrap_or(limit).min(limit).max(new_len);
            if new_cap > cap {
                trace!(from = cap, to = new_cap, "growing operand stack");
                self.slots.grow(new_cap as usize).map_err(|source| VmError::Allocation {
                    region: Region::Stack,
                    cells: new_cap as usize,
                    source,
                })?;
            }
        }

        self.slots.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Word, VmError> {
        self.slots.pop().ok_or(VmError::StackUnderrun { action: "pop" })
    }

    pub fn peek(&self) -> Result<Word, VmError> {
        self.slots.last().ok_or(VmError::StackUnderrun { action: "read" })
    }

    /// Live values, bottom first.
    pub fn values(&self) -> &[Word] {
        self.slots.as_slice()
    }
}
