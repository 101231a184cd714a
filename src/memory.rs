//! Pixel storage allocation.
//!
//! Buffers are requested from a [`PixelAllocator`] with a [`MemoryPool`]
//! hint. Allocation is fallible: an exhausted pool yields `None` instead of
//! aborting, so callers can release partial state and report
//! `Error::Alloc`.

use alloc::boxed::Box;
use alloc::vec::Vec;

/// Where a buffer should live.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryPool {
    /// Large, slower external RAM (PSRAM).
    External,
    /// Fast on-chip RAM.
    Internal,
    /// On-chip RAM usable as a DMA source.
    Dma,
}

pub trait PixelAllocator {
    /// Whether an external pool is present.
    fn has_external(&self) -> bool;

    /// Zeroed pixel buffer of `pixels` RGB565 words.
    fn allocate(&mut self, pool: MemoryPool, pixels: usize) -> Option<Box<[u16]>>;

    /// Hand a buffer back. Every buffer owner returns its storage here on
    /// cleanup, so accounting allocators can reuse the bytes.
    fn release(&mut self, buf: Box<[u16]>) {
        drop(buf);
    }

    /// Free heap bytes, when the platform can tell.
    fn free_bytes(&self) -> Option<usize> {
        None
    }

    /// Pool used for full frames: external when available.
    fn frame_pool(&self) -> MemoryPool {
        if self.has_external() {
            MemoryPool::External
        } else {
            MemoryPool::Internal
        }
    }
}

/// Zeroed boxed slice, or `None` when the global heap cannot satisfy it.
pub fn try_zeroed<T: Copy + Default>(len: usize) -> Option<Box<[T]>> {
    let mut v: Vec<T> = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, T::default());
    Some(v.into_boxed_slice())
}

/// Global-heap allocator for hosts and single-region heaps; the pool is not
/// used for placement.
#[derive(Copy, Clone, Debug, Default)]
pub struct HeapAllocator {
    external: bool,
}

impl HeapAllocator {
    pub const fn new(external: bool) -> Self {
        Self { external }
    }
}

impl PixelAllocator for HeapAllocator {
    fn has_external(&self) -> bool {
        self.external
    }

    fn allocate(&mut self, _pool: MemoryPool, pixels: usize) -> Option<Box<[u16]>> {
        try_zeroed(pixels)
    }
}

/// Global heap capped at a fixed byte budget. Released buffers give their
/// bytes back to the budget.
#[derive(Clone, Debug)]
pub struct BudgetAllocator {
    remaining: usize,
    external: bool,
    granted: Vec<MemoryPool>,
}

impl BudgetAllocator {
    pub fn new(budget_bytes: usize, external: bool) -> Self {
        Self { remaining: budget_bytes, external, granted: Vec::new() }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Pools of every successful allocation, in order.
    pub fn granted(&self) -> &[MemoryPool] {
        &self.granted
    }
}

impl PixelAllocator for BudgetAllocator {
    fn has_external(&self) -> bool {
        self.external
    }

    fn allocate(&mut self, pool: MemoryPool, pixels: usize) -> Option<Box<[u16]>> {
        let bytes = pixels.checked_mul(2)?;
        if bytes > self.remaining {
            log::debug!("budget allocator refused {} bytes ({} left)", bytes, self.remaining);
            return None;
        }
        let buf = try_zeroed(pixels)?;
        self.remaining -= bytes;
        self.granted.push(pool);
        Some(buf)
    }

    fn release(&mut self, buf: Box<[u16]>) {
        self.remaining = self.remaining.saturating_add(buf.len() * 2);
    }

    fn free_bytes(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_allocator_zero_fills() {
        let mut a = HeapAllocator::new(false);
        let buf = a.allocate(MemoryPool::Internal, 64).unwrap();
        assert_eq!(buf.len(), 64);
        assert!(buf.iter().all(|&p| p == 0));
        assert_eq!(a.frame_pool(), MemoryPool::Internal);
        assert_eq!(HeapAllocator::new(true).frame_pool(), MemoryPool::External);
    }

    #[test]
    fn budget_allocator_refuses_past_budget() {
        let mut a = BudgetAllocator::new(100, false);
        assert!(a.allocate(MemoryPool::Dma, 40).is_some());
        assert_eq!(a.remaining(), 20);
        assert!(a.allocate(MemoryPool::Dma, 11).is_none());
        assert!(a.allocate(MemoryPool::Dma, 10).is_some());
        assert_eq!(a.free_bytes(), Some(0));
        assert_eq!(a.granted(), &[MemoryPool::Dma, MemoryPool::Dma]);
    }

    #[test]
    fn released_bytes_return_to_the_budget() {
        let mut a = BudgetAllocator::new(100, false);
        let buf = a.allocate(MemoryPool::Internal, 50).unwrap();
        assert!(a.allocate(MemoryPool::Internal, 1).is_none());
        a.release(buf);
        assert_eq!(a.remaining(), 100);
        assert!(a.allocate(MemoryPool::Internal, 50).is_some());
    }
}
