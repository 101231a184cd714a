//! Read-only file access used for frame files, fonts and images.
//!
//! Mounting a filesystem is the platform's business; the engine only needs
//! to open a path and read it sequentially. Two stores ship with the crate:
//! [`MemStorage`] (owned, insertable) and [`StaticStorage`] (a table of
//! `&'static` blobs, e.g. from `include_bytes!`).

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    /// The medium failed mid-read; returned by platform file handles.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => f.write_str("file not found"),
            StorageError::Io => f.write_str("read error"),
        }
    }
}

pub trait StorageFile {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Total size in bytes.
    fn size(&self) -> usize;
}

pub trait Storage {
    type File<'a>: StorageFile
    where
        Self: 'a;

    fn open(&mut self, path: &str) -> Result<Self::File<'_>, StorageError>;
}

/// Read until `buf` is full or the file ends; returns bytes read.
pub fn read_full<F: StorageFile>(file: &mut F, buf: &mut [u8]) -> Result<usize, StorageError> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Cursor over a borrowed byte slice.
pub struct SliceFile<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceFile<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl StorageFile for SliceFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemStorage {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(String::from(path), bytes);
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Storage for MemStorage {
    type File<'a> = SliceFile<'a>;

    fn open(&mut self, path: &str) -> Result<SliceFile<'_>, StorageError> {
        self.files
            .get(path)
            .map(|v| SliceFile::new(v))
            .ok_or(StorageError::NotFound)
    }
}

/// Fixed table of `(path, bytes)` pairs.
#[derive(Copy, Clone, Debug)]
pub struct StaticStorage {
    entries: &'static [(&'static str, &'static [u8])],
}

impl StaticStorage {
    pub const fn new(entries: &'static [(&'static str, &'static [u8])]) -> Self {
        Self { entries }
    }
}

impl Storage for StaticStorage {
    type File<'a> = SliceFile<'static>;

    fn open(&mut self, path: &str) -> Result<SliceFile<'static>, StorageError> {
        self.entries
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, bytes)| SliceFile::new(bytes))
            .ok_or(StorageError::NotFound)
    }
}
