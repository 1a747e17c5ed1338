//! Read-only providers of raw region blobs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
#[cfg(feature = "zip")]
use std::{
    io::{self, Read, Seek},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tilewalk_core::RegionId;

use crate::error::FetchError;
use crate::region::CollisionRegion;

/// A versioned, pre-built collision archive.
///
/// Implementations only hand out bytes; decoding and caching belong to
/// [`CollisionStore`](crate::CollisionStore).
pub trait RegionSource: Send + Sync {
    /// Fetch the raw blob for `id`.
    fn fetch_region(&self, id: RegionId) -> Result<Vec<u8>, FetchError>;
}

/// Regions held in memory. Useful for embedded data and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    regions: HashMap<RegionId, Vec<u8>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the raw blob for `id`, replacing any previous one.
    pub fn insert(&mut self, id: RegionId, data: Vec<u8>) {
        self.regions.insert(id, data);
    }

    /// Store an already built region.
    pub fn insert_region(&mut self, region: &CollisionRegion) {
        self.insert(region.id(), region.to_bytes());
    }

    /// Builder-style [`insert_region`](Self::insert_region).
    pub fn with_region(mut self, region: &CollisionRegion) -> Self {
        self.insert_region(region);
        self
    }

    /// Number of regions stored.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no region is stored.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl RegionSource for MemorySource {
    fn fetch_region(&self, id: RegionId) -> Result<Vec<u8>, FetchError> {
        self.regions.get(&id).cloned().ok_or(FetchError::NotFound)
    }
}

/// An unpacked collision archive: one file per region named `"{x}_{y}"`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Serve regions from the files in `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the region files.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RegionSource for DirectorySource {
    fn fetch_region(&self, id: RegionId) -> Result<Vec<u8>, FetchError> {
        let path = self.root.join(id.archive_name());
        Ok(fs::read(path)?)
    }
}

/// A packed collision archive read in place, entries named `"{x}_{y}"`.
#[cfg(feature = "zip")]
pub struct ZipSource<R = fs::File> {
    archive: Mutex<zip::ZipArchive<R>>,
}

#[cfg(feature = "zip")]
impl ZipSource<fs::File> {
    /// Open the archive file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FetchError> {
        Self::from_reader(fs::File::open(path)?)
    }
}

#[cfg(feature = "zip")]
impl<R: Read + Seek> ZipSource<R> {
    /// Read the archive directory from `reader`.
    pub fn from_reader(reader: R) -> Result<Self, FetchError> {
        let archive = zip::ZipArchive::new(reader).map_err(zip_error)?;
        Ok(Self {
            archive: Mutex::new(archive),
        })
    }

    /// Number of entries in the archive.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, zip::ZipArchive<R>> {
        self.archive.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(feature = "zip")]
impl<R: Read + Seek + Send> RegionSource for ZipSource<R> {
    fn fetch_region(&self, id: RegionId) -> Result<Vec<u8>, FetchError> {
        let mut archive = self.lock();
        let mut entry = archive.by_name(&id.archive_name()).map_err(zip_error)?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        Ok(data)
    }
}

#[cfg(feature = "zip")]
fn zip_error(e: zip::result::ZipError) -> FetchError {
    match e {
        zip::result::ZipError::FileNotFound => FetchError::NotFound,
        zip::result::ZipError::Io(e) => FetchError::Io(e),
        other => FetchError::Io(io::Error::other(other)),
    }
}


#[cfg(all(test, feature = "zip"))]
mod zip_tests {
    use std::io::{Cursor, Write};

    use super::*;
    use crate::{CollisionError, CollisionStore};

    fn archive(entries: &[(RegionId, Vec<u8>)]) -> Vec<u8> {
        let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (id, data) in entries {
            w.start_file(id.archive_name(), zip::write::SimpleFileOptions::default())
                .unwrap();
            w.write_all(data).unwrap();
        }
        w.finish().unwrap().into_inner()
    }

    #[test]
    fn zip_source_reads_named_entries() {
        let id = RegionId::new(48, 53);
        let bytes = archive(&[(id, CollisionRegion::open(id).to_bytes())]);
        let src = ZipSource::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(src.len(), 1);

        let store = CollisionStore::new(src);
        let region = store.load(id).unwrap();
        assert_eq!(*region, CollisionRegion::open(id));
        let missing = RegionId::new(1, 1);
        assert_eq!(
            store.load(missing).unwrap_err(),
            CollisionError::DataUnavailable(missing)
        );
    }

    #[test]
    fn garbage_is_not_an_archive() {
        assert!(ZipSource::from_reader(Cursor::new(vec![0u8; 16])).is_err());
    }
}
