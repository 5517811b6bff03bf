//! Open-addressing hash set stored in a [`FrameArena`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use bytemuck::Pod;

use super::arena::{ArenaBlock, FrameArena};
use crate::error::ArenaError;

const MIN_SLOTS: usize = 8;

/// A hash set of plain-old-data values living in frame memory.
///
/// Slots are probed linearly. The all-zero bit pattern marks an empty slot, so
/// `T::zeroed()` itself can never be stored. Hashing uses the fixed-key
/// `DefaultHasher`, which makes iteration order reproducible for identical
/// inputs.
pub struct FrameSet<'a, T: Pod + Eq + Hash> {
    arena: &'a FrameArena,
    block: Option<ArenaBlock>,
    len: usize,
    slots: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Pod + Eq + Hash> FrameSet<'a, T> {
    pub fn new(arena: &'a FrameArena) -> Self {
        Self {
            arena,
            block: None,
            len: 0,
            slots: 0,
            _marker: PhantomData,
        }
    }

    /// A set able to hold `capacity` values before rehashing.
    pub fn with_capacity(arena: &'a FrameArena, capacity: usize) -> Result<Self, ArenaError> {
        let mut set = Self::new(arena);
        if capacity > 0 {
            set.rehash(Self::slots_for(capacity))?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `value`; returns `false` if an equal value was already present.
    pub fn insert(&mut self, value: T) -> Result<bool, ArenaError> {
        debug_assert!(!is_empty_slot(&value), "the zero value is reserved");

        if (self.len + 1) * 4 > self.slots * 3 {
            self.rehash(Self::slots_for(self.len + 1).max(self.slots * 2))?;
        }

        let Some(block) = self.block else {
            return Ok(false);
        };
        let mask = self.slots - 1;
        let mut index = hash_of(&value) & mask;
        loop {
            let slot: T = self.arena.read(&block, index);
            if is_empty_slot(&slot) {
                self.arena.write(&block, index, value);
                self.len += 1;
                return Ok(true);
            }
            if slot == value {
                return Ok(false);
            }
            index = (index + 1) & mask;
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        let Some(block) = &self.block else {
            return false;
        };
        let mask = self.slots - 1;
        let mut index = hash_of(value) & mask;
        for _ in 0..self.slots {
            let slot: T = self.arena.read(block, index);
            if is_empty_slot(&slot) {
                return false;
            }
            if slot == *value {
                return true;
            }
            index = (index + 1) & mask;
        }
        false
    }

    /// Values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.slots).filter_map(move |i| {
            let block = self.block.as_ref()?;
            let slot: T = self.arena.read(block, i);
            (!is_empty_slot(&slot)).then_some(slot)
        })
    }

    fn slots_for(capacity: usize) -> usize {
        (capacity * 4 / 3 + 1).next_power_of_two().max(MIN_SLOTS)
    }

    fn rehash(&mut self, slots: usize) -> Result<(), ArenaError> {
        let block = self
            .arena
            .allocate(slots * std::mem::size_of::<T>(), std::mem::align_of::<T>())?;
        self.arena.zero(&block);

        let mask = slots - 1;
        if let Some(old) = self.block {
            for i in 0..self.slots {
                let value: T = self.arena.read(&old, i);
                if is_empty_slot(&value) {
                    continue;
                }
                let mut index = hash_of(&value) & mask;
                while !is_empty_slot(&self.arena.read::<T>(&block, index)) {
                    index = (index + 1) & mask;
                }
                self.arena.write(&block, index, value);
            }
            self.arena.deallocate(old);
        }

        self.block = Some(block);
        self.slots = slots;
        Ok(())
    }
}

impl<T: Pod + Eq + Hash> Drop for FrameSet<'_, T> {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.arena.deallocate(block);
        }
    }
}

fn is_empty_slot<T: Pod>(value: &T) -> bool {
    bytemuck::bytes_of(value).iter().all(|&b| b == 0)
}

fn hash_of<T: Hash>(value: &T) -> usize {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish() as usize
}
