use std::sync::Arc;

use tracing::trace;

use super::alloc::{Allocator, Buffer};
use super::{Addr, Region, VmError, Word};

/// Flat, zero-defaulted word memory.
///
/// Only the prefix `[0, size())` is backed by storage. Every address at or past
/// the watermark reads as zero, so the heap behaves as if it were infinite and
/// zero-initialized.
#[derive(Debug)]
pub struct Heap {
    cells: Buffer<Word>,
    limit: Addr,
}

impl Heap {
    /// Zero-allocates `size` cells and copies `image` into the front.
    pub(super) fn with_image(
        alloc: Arc<dyn Allocator>,
        image: &[Word],
        size: usize,
        limit: Addr,
    ) -> Result<Self, VmError> {
        debug_assert!(image.len() <= size);
        let mut cells = Buffer::zeroed(alloc, size)
            .map_err(|source| VmError::Allocation { region: Region::Heap, cells: size, source })?;
        cells.as_mut_slice()[..image.len()].copy_from_slice(image);
        Ok(Heap { cells, limit })
    }

    /// Materialized length.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, location: Addr) -> Word {
        // never written past the watermark, so it's 0
        self.cells.get(location as usize).unwrap_or(0)
    }

    pub fn set(&mut self, location: Addr, value: Word) -> Result<(), VmError> {
        let index = location as usize;
        if index >= self.cells.len() {
            if value == 0 {
                return Ok(());
            }
            let new_size = grown_size(location, self.limit)
                .ok_or(VmError::CapacityOverflow { location })?;
            trace!(from = self.cells.len(), to = new_size, location, "growing heap");
            self.cells.grow_zeroed(new_size).map_err(|source| VmError::Allocation {
                region: Region::Heap,
                cells: new_size,
                source,
            })?;
        }
        self.cells[index] = value;
        Ok(())
    }

    /// Materialized cells, for bulk reads. Borrow ends before the next `set`.
    pub fn cells(&self) -> &[Word] {
        self.cells.as_slice()
    }
}

/// Smallest power of two strictly greater than `location`, if it fits under `limit`.
fn grown_size(location: Addr, limit: Addr) -> Option<usize> {
    let size = u64::from(location).checked_add(1)?.checked_next_power_of_two()?;
    if size > u64::from(limit) {
        return None;
    }
    usize::try_from(size).ok()
}
