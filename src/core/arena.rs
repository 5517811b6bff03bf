//! Per-frame bump allocator.
//!
//! [`FrameArena`] hands out [`ArenaBlock`]s from one fixed-capacity buffer.
//! Blocks are offsets, not pointers: reading and writing goes through the arena
//! with `bytemuck` conversions, so the arena itself needs no `unsafe`.
//!
//! The arena is reset once per frame with [`FrameArena::reset`], which takes
//! `&mut self`. Frame containers borrow the arena shared, so the borrow checker
//! rejects any container that would survive the reset.

use std::cell::{Cell, RefCell};

use bytemuck::Pod;

use crate::error::ArenaError;

/// Cumulative allocation statistics since the arena was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    pub allocation_count: u64,
    pub allocated_bytes: u64,
    pub deallocation_count: u64,
    pub deallocated_bytes: u64,
}

/// A region of arena memory valid until the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaBlock {
    offset: usize,
    size: usize,
    generation: u32,
}

impl ArenaBlock {
    /// Byte offset of the block inside the arena buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the block in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Reset generation the block was allocated in.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Fixed-capacity bump allocator reset once per frame.
pub struct FrameArena {
    buffer: RefCell<Box<[u8]>>,
    top: Cell<usize>,
    generation: Cell<u32>,
    high_water: Cell<usize>,
    stats: Cell<ArenaStats>,
}

impl FrameArena {
    /// Create an arena owning `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RefCell::new(vec![0u8; capacity].into_boxed_slice()),
            top: Cell::new(0),
            generation: Cell::new(0),
            high_water: Cell::new(0),
            stats: Cell::new(ArenaStats::default()),
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// Bytes currently in use (including alignment padding).
    pub fn allocated(&self) -> usize {
        self.top.get()
    }

    /// Bytes still available before the arena runs out.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.top.get()
    }

    /// Largest `allocated()` ever observed.
    pub fn high_water_mark(&self) -> usize {
        self.high_water.get()
    }

    pub fn stats(&self) -> ArenaStats {
        self.stats.get()
    }

    /// Current reset generation.
    pub fn generation(&self) -> u32 {
        self.generation.get()
    }

    /// Allocate `size` bytes aligned to `align` (a power of two).
    pub fn allocate(&self, size: usize, align: usize) -> Result<ArenaBlock, ArenaError> {
        if align == 0 || !align.is_power_of_two() {
            return Err(ArenaError::InvalidAlignment(align));
        }

        let capacity = self.capacity();
        let top = self.top.get();
        let start = top
            .checked_add(align - 1)
            .map(|padded| padded & !(align - 1));
        let end = start.and_then(|start| start.checked_add(size));

        let (start, end) = match (start, end) {
            (Some(start), Some(end)) if end <= capacity => (start, end),
            _ => {
                return Err(ArenaError::OutOfMemory {
                    requested: size,
                    remaining: capacity - top,
                    capacity,
                })
            }
        };

        self.top.set(end);
        if end > self.high_water.get() {
            self.high_water.set(end);
        }

        let mut stats = self.stats.get();
        stats.allocation_count += 1;
        stats.allocated_bytes += size as u64;
        self.stats.set(stats);

        Ok(ArenaBlock {
            offset: start,
            size,
            generation: self.generation.get(),
        })
    }

    /// Return a block to the arena.
    ///
    /// Only a block ending exactly at the current top rewinds the top; anything
    /// else is recorded in the statistics and otherwise ignored.
    pub fn deallocate(&self, block: ArenaBlock) {
        let mut stats = self.stats.get();
        stats.deallocation_count += 1;
        stats.deallocated_bytes += block.size as u64;
        self.stats.set(stats);

        if block.generation == self.generation.get() && block.end() == self.top.get() {
            self.top.set(block.offset);
        }
    }

    /// Resize a block. Grows in place when `block` is the most recent
    /// allocation; otherwise a fresh block is returned and the caller copies.
    ///
    /// On failure the arena is left exactly as before and `block` stays valid.
    pub fn reallocate(
        &self,
        block: ArenaBlock,
        size: usize,
        align: usize,
    ) -> Result<ArenaBlock, ArenaError> {
        let top = self.top.get();
        let stats = self.stats.get();
        self.deallocate(block);
        match self.allocate(size, align) {
            Ok(new_block) => Ok(new_block),
            Err(err) => {
                self.top.set(top);
                self.stats.set(stats);
                Err(err)
            }
        }
    }

    /// Invalidate every block; the next allocation starts at offset 0.
    pub fn reset(&mut self) {
        self.top.set(0);
        self.generation.set(self.generation.get().wrapping_add(1));
    }

    /// Whether `block` was allocated since the last reset and is still below the top.
    pub fn is_live(&self, block: &ArenaBlock) -> bool {
        block.generation == self.generation.get() && block.end() <= self.top.get()
    }

    /// Read the `index`-th `T` stored in `block`.
    pub fn read<T: Pod>(&self, block: &ArenaBlock, index: usize) -> T {
        let range = Self::element_range::<T>(block, index);
        bytemuck::pod_read_unaligned(&self.buffer.borrow()[range])
    }

    /// Write `value` as the `index`-th `T` stored in `block`.
    pub fn write<T: Pod>(&self, block: &ArenaBlock, index: usize, value: T) {
        let range = Self::element_range::<T>(block, index);
        self.buffer.borrow_mut()[range].copy_from_slice(bytemuck::bytes_of(&value));
    }

    /// Zero every byte of `block`.
    pub fn zero(&self, block: &ArenaBlock) {
        self.buffer.borrow_mut()[block.offset..block.end()].fill(0);
    }

    /// Copy the first `len` bytes of `from` into `to`.
    pub fn copy(&self, from: &ArenaBlock, to: &ArenaBlock, len: usize) {
        assert!(len <= from.size && len <= to.size, "copy exceeds block size");
        self.buffer
            .borrow_mut()
            .copy_within(from.offset..from.offset + len, to.offset);
    }

    fn element_range<T: Pod>(block: &ArenaBlock, index: usize) -> std::ops::Range<usize> {
        let size = std::mem::size_of::<T>();
        let start = index * size;
        assert!(
            start + size <= block.size,
            "element {index} out of bounds for block of {} bytes",
            block.size
        );
        block.offset + start..block.offset + start + size
    }
}

impl std::fmt::Debug for FrameArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameArena")
            .field("allocated", &self.allocated())
            .field("capacity", &self.capacity())
            .field("generation", &self.generation())
            .finish()
    }
}
