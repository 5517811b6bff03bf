//! Growable vector stored in a [`FrameArena`].

use std::marker::PhantomData;

use bytemuck::Pod;

use super::arena::{ArenaBlock, FrameArena};
use crate::error::ArenaError;

/// A vector of plain-old-data values living in frame memory.
///
/// Growth doubles the capacity through [`FrameArena::reallocate`]; when the
/// block cannot grow in place the elements are copied into the new block.
/// Dropping the vector hands its block back to the arena.
pub struct FrameVec<'a, T: Pod> {
    arena: &'a FrameArena,
    block: Option<ArenaBlock>,
    len: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Pod> FrameVec<'a, T> {
    /// An empty vector; no memory is taken until the first push.
    pub fn new(arena: &'a FrameArena) -> Self {
        Self {
            arena,
            block: None,
            len: 0,
            capacity: 0,
            _marker: PhantomData,
        }
    }

    pub fn with_capacity(arena: &'a FrameArena, capacity: usize) -> Result<Self, ArenaError> {
        let mut vec = Self::new(arena);
        if capacity > 0 {
            vec.grow_to(capacity)?;
        }
        Ok(vec)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, value: T) -> Result<(), ArenaError> {
        if self.len == self.capacity {
            self.grow_to((self.capacity * 2).max(1))?;
        }
        if let Some(block) = &self.block {
            self.arena.write(block, self.len, value);
        }
        self.len += 1;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        self.block.as_ref().map(|block| self.arena.read(block, index))
    }

    pub fn set(&mut self, index: usize, value: T) {
        assert!(index < self.len, "index {index} out of bounds ({})", self.len);
        if let Some(block) = &self.block {
            self.arena.write(block, index, value);
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    fn grow_to(&mut self, capacity: usize) -> Result<(), ArenaError> {
        let element = std::mem::size_of::<T>();
        let align = std::mem::align_of::<T>();
        let bytes = capacity * element;

        let block = match self.block {
            Some(old) => {
                let new = self.arena.reallocate(old, bytes, align)?;
                if new.offset() != old.offset() {
                    self.arena.copy(&old, &new, self.len * element);
                }
                new
            }
            None => self.arena.allocate(bytes, align)?,
        };

        self.block = Some(block);
        self.capacity = capacity;
        Ok(())
    }
}

impl<T: Pod> Drop for FrameVec<'_, T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.arena.deallocate(block);
        }
    }
}

impl<T: Pod + std::fmt::Debug> std::fmt::Debug for FrameVec<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_read_back() {
        let arena = FrameArena::new(1024);
        let mut vec = FrameVec::new(&arena);
        for i in 0..20u32 {
            vec.push(i * 3).unwrap();
        }
        assert_eq!(vec.len(), 20);
        assert!(vec.capacity() >= 20);
        assert_eq!(vec.iter().collect::<Vec<_>>(), (0..20).map(|i| i * 3).collect::<Vec<_>>());
        assert_eq!(vec.get(20), None);
    }

    #[test]
    fn test_growth_after_interleaved_allocation_copies() {
        let arena = FrameArena::new(1024);
        let mut vec = FrameVec::with_capacity(&arena, 2).unwrap();
        vec.push(1.5f32).unwrap();
        vec.push(2.5f32).unwrap();

        // Pin the vector's block so it can no longer grow in place.
        let _blocker = arena.allocate(8, 4).unwrap();
        vec.push(3.5).unwrap();

        assert_eq!(vec.iter().collect::<Vec<_>>(), vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_drop_returns_memory_lifo() {
        let arena = FrameArena::new(1024);
        {
            let mut outer = FrameVec::<u64>::new(&arena);
            outer.push(1).unwrap();
            {
                let mut inner = FrameVec::<u64>::new(&arena);
                inner.push(2).unwrap();
                assert_eq!(arena.allocated(), 16);
            }
            assert_eq!(arena.allocated(), 8);
        }
        assert_eq!(arena.allocated(), 0);
    }

    #[test]
    fn test_push_reports_out_of_memory() {
        let arena = FrameArena::new(16);
        let mut vec = FrameVec::<u64>::new(&arena);
        vec.push(1).unwrap();
        vec.push(2).unwrap();
        assert!(matches!(vec.push(3), Err(ArenaError::OutOfMemory { .. })));
        assert_eq!(vec.len(), 2);
        assert_eq!(vec.get(1), Some(2));
    }
}
