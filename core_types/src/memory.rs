//! # Memory Types
//!
//! Shared machine memory and the partitions carved out of it.
//!
//! ## Philosophy
//!
//! - **Memory is authority, not a side effect**: a process addresses memory
//!   only through its [`Partition`].
//! - **Partitions are handed out contiguously and never reclaimed**: the used
//!   region of [`SharedMemory`] only grows.
//! - **Bounds are checked on every translation**: partition disjointness is a
//!   loader invariant, address translation enforces it at run time.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A machine word
pub type Word = i32;

/// A contiguous `[base, limit)` range of shared memory
///
/// A partition is a capability over an index range, not a pointer. Logical
/// addresses are translated relative to `base` and rejected at `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    base: usize,
    limit: usize,
}

impl Partition {
    /// Creates a partition, rejecting `base > limit`
    pub fn new(base: usize, limit: usize) -> Result<Self, MemoryError> {
        if base > limit {
            return Err(MemoryError::InvalidPartition { base, limit });
        }
        Ok(Self { base, limit })
    }

    /// An empty partition at address zero
    pub const fn empty() -> Self {
        Self { base: 0, limit: 0 }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.limit - self.base
    }

    pub fn is_empty(&self) -> bool {
        self.base == self.limit
    }

    /// Checks whether a physical address lies inside the partition
    pub fn contains(&self, address: usize) -> bool {
        address >= self.base && address < self.limit
    }

    /// Translates a logical offset into a physical address
    pub fn translate(&self, offset: usize) -> Result<usize, MemoryError> {
        let address = self
            .base
            .checked_add(offset)
            .ok_or(MemoryError::OutOfBounds {
                address: usize::MAX,
                partition: *self,
            })?;
        if !self.contains(address) {
            return Err(MemoryError::OutOfBounds {
                address,
                partition: *self,
            });
        }
        Ok(address)
    }

    /// Checks whether two partitions share any address
    pub fn overlaps(&self, other: &Partition) -> bool {
        self.base < other.limit && other.base < self.limit
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.base, self.limit)
    }
}

/// Memory errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Address {address} outside partition {partition}")]
    OutOfBounds { address: usize, partition: Partition },

    #[error("Out of memory: requested {requested} words, {available} words remaining")]
    OutOfMemory { requested: usize, available: usize },

    #[error("Invalid partition: base {base} > limit {limit}")]
    InvalidPartition { base: usize, limit: usize },

    #[error("Address {address} outside machine memory of {size} words")]
    InvalidAddress { address: usize, size: usize },
}

/// The fixed-size memory array shared by every process
///
/// Partitions are allocated from the bottom; everything from `used()` to the
/// top of memory is the stack region.
#[derive(Debug, Clone)]
pub struct SharedMemory {
    words: Vec<Word>,
    used: usize,
}

impl SharedMemory {
    /// Creates zeroed memory of `size` words
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![0; size],
            used: 0,
        }
    }

    /// Total number of words
    pub fn size(&self) -> usize {
        self.words.len()
    }

    /// End of the highest allocated partition
    pub fn used(&self) -> usize {
        self.used
    }

    /// Words not yet handed out to a partition
    pub fn available(&self) -> usize {
        self.words.len() - self.used
    }

    /// Allocates the next contiguous partition of `len` words
    pub fn allocate(&mut self, len: usize) -> Result<Partition, MemoryError> {
        if len > self.available() {
            return Err(MemoryError::OutOfMemory {
                requested: len,
                available: self.available(),
            });
        }
        let partition = Partition::new(self.used, self.used + len)?;
        self.used += len;
        Ok(partition)
    }

    /// Copies `image` into the start of `partition`
    pub fn load(&mut self, partition: Partition, image: &[Word]) -> Result<(), MemoryError> {
        if image.len() > partition.len() || partition.limit() > self.size() {
            return Err(MemoryError::OutOfBounds {
                address: partition.base() + image.len(),
                partition,
            });
        }
        self.words[partition.base()..partition.base() + image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Reads one word by physical address
    pub fn read(&self, address: usize) -> Result<Word, MemoryError> {
        self.words
            .get(address)
            .copied()
            .ok_or(MemoryError::InvalidAddress {
                address,
                size: self.size(),
            })
    }

    /// Writes one word by physical address
    pub fn write(&mut self, address: usize, value: Word) -> Result<(), MemoryError> {
        let size = self.size();
        let slot = self
            .words
            .get_mut(address)
            .ok_or(MemoryError::InvalidAddress { address, size })?;
        *slot = value;
        Ok(())
    }

    /// Returns the words of a partition
    pub fn partition(&self, partition: Partition) -> &[Word] {
        &self.words[partition.base()..partition.limit().min(self.size())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_rejects_inverted_range() {
        assert_eq!(
            Partition::new(10, 5),
            Err(MemoryError::InvalidPartition { base: 10, limit: 5 })
        );
    }

    #[test]
    fn test_partition_translate() {
        let partition = Partition::new(20, 30).unwrap();
        assert_eq!(partition.translate(0), Ok(20));
        assert_eq!(partition.translate(9), Ok(29));
        assert!(matches!(
            partition.translate(10),
            Err(MemoryError::OutOfBounds { address: 30, .. })
        ));
    }

    #[test]
    fn test_allocate_is_contiguous_and_disjoint() {
        let mut memory = SharedMemory::new(64);
        let a = memory.allocate(10).unwrap();
        let b = memory.allocate(5).unwrap();

        assert_eq!(a, Partition::new(0, 10).unwrap());
        assert_eq!(b, Partition::new(10, 15).unwrap());
        assert!(!a.overlaps(&b));
        assert_eq!(memory.used(), 15);
        assert_eq!(memory.available(), 49);
    }

    #[test]
    fn test_allocate_out_of_memory() {
        let mut memory = SharedMemory::new(8);
        memory.allocate(6).unwrap();
        assert_eq!(
            memory.allocate(3),
            Err(MemoryError::OutOfMemory {
                requested: 3,
                available: 2
            })
        );
        assert_eq!(memory.used(), 6);
    }

    #[test]
    fn test_load_and_read() {
        let mut memory = SharedMemory::new(16);
        let partition = memory.allocate(3).unwrap();
        memory.load(partition, &[7, 8, 9]).unwrap();

        assert_eq!(memory.partition(partition), &[7, 8, 9]);
        assert_eq!(memory.read(1), Ok(8));
        assert!(memory.read(16).is_err());
    }

    #[test]
    fn test_write_outside_memory() {
        let mut memory = SharedMemory::new(4);
        assert_eq!(
            memory.write(4, 1),
            Err(MemoryError::InvalidAddress {
                address: 4,
                size: 4
            })
        );
    }
}
