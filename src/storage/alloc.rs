//! Off-Heap Allocator
//!
//! Every scalar value in EmberKV lives in memory obtained directly from the
//! operating system as an anonymous, private, read/write mapping. None of it
//! is allocated through the Rust global allocator.
//!
//! ## Ownership
//!
//! A mapping is handed out as a [`Region`]. A region is a move-only handle:
//! it cannot be cloned, and dropping it unmaps the memory and updates the
//! usage counters. Reading a region after release or releasing it twice is
//! therefore impossible to express.
//!
//! ## Accounting
//!
//! The [`Allocator`] keeps a running total of bytes currently mapped. The
//! eviction policy reads it through [`Allocator::used`].

use memmap2::MmapMut;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, trace};

/// Errors returned by [`Allocator::try_allocate`].
#[derive(Debug, Error)]
pub enum AllocError {
    /// Zero-length mappings are not supported by the OS.
    #[error("cannot allocate an empty region")]
    ZeroSize,

    /// The mapping system call failed.
    #[error("failed to map {size} bytes: {source}")]
    Map {
        size: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Hands out off-heap regions and tracks how much memory they hold.
///
/// The allocator is shared behind an `Arc`; every region keeps a reference
/// back to it so the counters stay correct no matter where the region is
/// dropped.
#[derive(Debug, Default)]
pub struct Allocator {
    /// Bytes currently mapped
    used: AtomicUsize,
    /// Regions currently alive
    regions: AtomicUsize,
    /// High-water mark of `used`
    peak: AtomicUsize,
}

impl Allocator {
    /// Creates an allocator with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a region of exactly `size` bytes.
    pub fn try_allocate(self: &Arc<Self>, size: usize) -> Result<Region, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let map = MmapMut::map_anon(size).map_err(|source| AllocError::Map { size, source })?;

        let used = self.used.fetch_add(size, Ordering::Relaxed) + size;
        self.peak.fetch_max(used, Ordering::Relaxed);
        self.regions.fetch_add(1, Ordering::Relaxed);
        trace!(size, "Mapped off-heap region");

        Ok(Region {
            map,
            allocator: Arc::clone(self),
        })
    }

    /// Maps a region of exactly `size` bytes, aborting the process on failure.
    pub fn allocate(self: &Arc<Self>, size: usize) -> Region {
        match self.try_allocate(size) {
            Ok(region) => region,
            Err(e) => {
                error!(size, error = %e, "Off-heap allocation failed, aborting");
                std::process::abort();
            }
        }
    }

    /// Returns a region to the operating system. Same as dropping it.
    pub fn release(&self, region: Region) {
        debug_assert!(std::ptr::eq(self, Arc::as_ptr(&region.allocator)));
        drop(region);
    }

    /// Bytes currently held by live regions.
    #[inline]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// Number of live regions.
    #[inline]
    pub fn regions(&self) -> usize {
        self.regions.load(Ordering::Relaxed)
    }

    /// The most bytes ever held at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

/// An owned off-heap memory block.
///
/// The mapping starts zero-filled. Its length always equals its capacity.
pub struct Region {
    map: MmapMut,
    allocator: Arc<Allocator>,
}

impl Region {
    /// Size of the region in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    /// Start address of the mapping.
    pub fn address(&self) -> usize {
        self.map.as_ptr() as usize
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.map
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        let size = self.capacity();
        self.allocator.used.fetch_sub(size, Ordering::Relaxed);
        self.allocator.regions.fetch_sub(1, Ordering::Relaxed);
        trace!(size, "Unmapped off-heap region");
        // the mapping itself is unmapped when `map` drops
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_tracks_usage() {
        let allocator = Arc::new(Allocator::new());

        let a = allocator.allocate(16);
        let b = allocator.allocate(100);
        assert_eq!(allocator.used(), 116);
        assert_eq!(allocator.regions(), 2);

        allocator.release(a);
        assert_eq!(allocator.used(), 100);
        assert_eq!(allocator.regions(), 1);

        drop(b);
        assert_eq!(allocator.used(), 0);
        assert_eq!(allocator.regions(), 0);
        assert_eq!(allocator.peak(), 116);
    }

    #[test]
    fn test_region_is_zeroed_and_writable() {
        let allocator = Arc::new(Allocator::new());
        let mut region = allocator.allocate(32);

        assert_eq!(region.capacity(), 32);
        assert!(region.as_slice().iter().all(|&b| b == 0));

        region.as_mut_slice()[..5].copy_from_slice(b"hello");
        assert_eq!(&region.as_slice()[..5], b"hello");
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let allocator = Arc::new(Allocator::new());
        assert!(matches!(
            allocator.try_allocate(0),
            Err(AllocError::ZeroSize)
        ));
        assert_eq!(allocator.used(), 0);
    }

    #[test]
    fn test_region_outlives_local_handle() {
        let allocator = Arc::new(Allocator::new());
        let region = allocator.allocate(8);
        let stats = Arc::clone(&allocator);
        drop(allocator);

        assert_eq!(stats.used(), 8);
        drop(region);
        assert_eq!(stats.used(), 0);
    }
}
