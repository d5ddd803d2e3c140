use std::sync::Arc;

use tracing::trace;

use super::alloc::{Allocator, Buffer};
use super::{Addr, Region, VmError};

/// Bookkeeping for one procedure invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    /// Instruction to resume at after the callee returns.
    pub return_addr: Addr,
    /// Operand stack depth when the call was made.
    pub stack_base: Addr,
}

/// Frame buffer sized at initialization.
///
/// Pushing never grows implicitly; the interpreter decides when to `reserve`.
#[derive(Debug)]
pub struct CallStack {
    frames: Buffer<Frame>,
}

impl CallStack {
    pub(super) fn new(alloc: Arc<dyn Allocator>, capacity: Addr) -> Result<Self, VmError> {
        let frames = Buffer::with_capacity(alloc, capacity as usize).map_err(|source| {
            VmError::Allocation { region: Region::CallStack, cells: capacity as usize, source }
        })?;
        Ok(CallStack { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.frames.capacity()
    }

    /// Live frames, outermost first.
    pub fn frames(&self) -> &[Frame] {
        self.frames.as_slice()
    }

    pub fn top(&self) -> Option<Frame> {
        self.frames.last()
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), VmError> {
        if self.frames.len() == self.frames.capacity() {
            return Err(VmError::CallStackOverflow { capacity: self.frames.capacity() });
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Grows to `capacity` frames, keeping live frames in place.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), VmError> {
        if capacity > self.frames.capacity() {
            trace!(from = self.frames.capacity(), to = capacity, "growing call stack");
        }
        self.frames.grow(capacity).map_err(|source| VmError::Allocation {
            region: Region::CallStack,
            cells: capacity,
            source,
        })
    }
}
