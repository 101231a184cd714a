//! Animation frames preloaded into memory.
//!
//! Frames live as numbered raw files, `dir/1.bin`, `dir/2.bin`, ..., each a
//! full panel of host-order RGB565 pixels.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Write as _;

use log::{error, info, warn};

use crate::memory::PixelAllocator;
use crate::storage::{read_full, Storage, StorageFile};

/// Room for `dir/NNNNN.bin` with a reasonable directory name.
pub const MAX_PATH: usize = 128;

pub type FramePath = heapless::String<MAX_PATH>;

/// Path of the 1-based frame `number` under `dir`.
pub fn frame_path(dir: &str, number: usize) -> Option<FramePath> {
    let mut path = FramePath::new();
    write!(path, "{}/{}.bin", dir, number).ok()?;
    Some(path)
}

#[derive(Default)]
pub struct PreloadedFrames {
    frames: Vec<Box<[u16]>>,
}

impl PreloadedFrames {
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Replace the set with up to `max` frames of `pixels` words each.
    ///
    /// Loading stops at the first file that is missing, is not exactly
    /// `pixels * 2` bytes or cannot be allocated. Returns how many
    /// frames were kept; 0 means nothing usable was found.
    pub fn preload<A, S>(
        &mut self,
        alloc: &mut A,
        storage: &mut S,
        dir: &str,
        max: usize,
        pixels: usize,
    ) -> usize
    where
        A: PixelAllocator,
        S: Storage,
    {
        self.clear(alloc);
        let pool = alloc.frame_pool();

        for number in 1..=max {
            let Some(path) = frame_path(dir, number) else {
                warn!("frame path too long under {}", dir);
                break;
            };
            let mut file = match storage.open(&path) {
                Ok(f) => f,
                Err(_) => {
                    warn!("not found: {}", path);
                    break;
                }
            };
            let want = pixels * 2;
            if file.size() != want {
                warn!("wrong size in {}: {}/{}", path, file.size(), want);
                break;
            }
            let Some(mut frame) = alloc.allocate(pool, pixels) else {
                error!("no memory for frame {}", number);
                break;
            };
            let read = read_full(&mut file, bytemuck::cast_slice_mut(&mut frame[..])).unwrap_or(0);
            if read != want {
                warn!("wrong size in {}: {}/{}", path, read, want);
                alloc.release(frame);
                break;
            }
            self.frames.push(frame);
            info!("preloaded {} ({}/{})", path, number, max);
        }

        if self.frames.is_empty() {
            error!("no frames loaded from {}", dir);
        }
        self.frames.len()
    }

    pub fn get(&self, index: usize) -> Option<&[u16]> {
        self.frames.get(index).map(|f| &f[..])
    }

    pub fn count(&self) -> usize {
        self.frames.len()
    }

    /// Return every frame to `alloc`.
    pub fn clear<A: PixelAllocator>(&mut self, alloc: &mut A) {
        self.frames.drain(..).for_each(|f| alloc.release(f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BudgetAllocator, HeapAllocator};
    use crate::storage::MemStorage;

    fn frame_bytes(pixels: usize, value: u16) -> Vec<u8> {
        (0..pixels).flat_map(|_| value.to_ne_bytes()).collect()
    }

    #[test]
    fn path_format() {
        assert_eq!(frame_path("/spiffs/anim", 12).unwrap().as_str(), "/spiffs/anim/12.bin");
    }

    #[test]
    fn stops_at_first_gap() {
        let mut storage = MemStorage::new();
        for n in [1, 2, 3, 5] {
            storage.insert(frame_path("a", n).unwrap().as_str(), frame_bytes(4, n as u16));
        }
        let mut frames = PreloadedFrames::new();
        assert_eq!(frames.preload(&mut HeapAllocator::new(false), &mut storage, "a", 5, 4), 3);
        assert_eq!(frames.get(2), Some(&[3u16; 4][..]));
        assert!(frames.get(3).is_none());
    }

    #[test]
    fn short_file_ends_the_set() {
        let mut storage = MemStorage::new();
        storage.insert("a/1.bin", frame_bytes(4, 1));
        storage.insert("a/2.bin", frame_bytes(3, 2));
        let mut frames = PreloadedFrames::new();
        assert_eq!(frames.preload(&mut HeapAllocator::new(false), &mut storage, "a", 2, 4), 1);
    }

    #[test]
    fn oversized_file_ends_the_set() {
        let mut storage = MemStorage::new();
        storage.insert("a/1.bin", frame_bytes(4, 1));
        storage.insert("a/2.bin", frame_bytes(5, 2));
        let mut frames = PreloadedFrames::new();
        assert_eq!(frames.preload(&mut HeapAllocator::new(false), &mut storage, "a", 2, 4), 1);
    }

    #[test]
    fn allocation_failure_keeps_earlier_frames() {
        let mut storage = MemStorage::new();
        storage.insert("a/1.bin", frame_bytes(4, 1));
        storage.insert("a/2.bin", frame_bytes(4, 2));
        let mut frames = PreloadedFrames::new();
        let mut alloc = BudgetAllocator::new(8, false);
        assert_eq!(frames.preload(&mut alloc, &mut storage, "a", 2, 4), 1);
    }

    #[test]
    fn reload_replaces_previous_set() {
        let mut storage = MemStorage::new();
        storage.insert("a/1.bin", frame_bytes(4, 1));
        storage.insert("a/2.bin", frame_bytes(4, 2));
        let mut frames = PreloadedFrames::new();
        let mut alloc = HeapAllocator::new(false);
        assert_eq!(frames.preload(&mut alloc, &mut storage, "a", 2, 4), 2);
        assert_eq!(frames.preload(&mut alloc, &mut storage, "missing", 2, 4), 0);
        assert_eq!(frames.count(), 0);
        frames.clear(&mut alloc);
    }

    #[test]
    fn reload_reuses_released_frames() {
        let mut storage = MemStorage::new();
        storage.insert("a/1.bin", frame_bytes(4, 1));
        storage.insert("a/2.bin", frame_bytes(4, 2));
        let mut frames = PreloadedFrames::new();
        let mut alloc = BudgetAllocator::new(16, false);
        assert_eq!(frames.preload(&mut alloc, &mut storage, "a", 2, 4), 2);
        assert_eq!(frames.preload(&mut alloc, &mut storage, "a", 2, 4), 2);
        frames.clear(&mut alloc);
        assert_eq!(alloc.remaining(), 16);
    }
}
