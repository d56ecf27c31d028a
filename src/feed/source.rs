//! Table access for the two feed packagings: plain directories and zip
//! archives. The reader only ever asks for a named table, so both are hidden
//! behind the same trait.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::FeedError;

pub trait TableSource {
    /// Opens the named table for reading, or `None` when the feed does not
    /// contain it.
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>, FeedError>;
}

/// A feed unpacked into a directory of `.txt` tables.
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TableSource for DirSource {
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>, FeedError> {
        let path = self.dir.join(name);
        match File::open(&path) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FeedError::Io { path, source: e }),
        }
    }
}

/// A feed packaged as a GTFS `.zip` bundle.
pub struct ZipSource {
    path: PathBuf,
    archive: zip::ZipArchive<File>,
}

impl ZipSource {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FeedError> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| FeedError::Io {
            path: path.clone(),
            source: e,
        })?;
        let archive = zip::ZipArchive::new(file).map_err(|e| FeedError::Archive {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path, archive })
    }
}

impl TableSource for ZipSource {
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>, FeedError> {
        match self.archive.by_name(name) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(e) => Err(FeedError::Archive {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

/// Picks the source implementation from the path: directories are read as-is,
/// anything else is treated as a zip archive.
pub fn open_source(path: &Path) -> Result<Box<dyn TableSource>, FeedError> {
    if path.is_dir() {
        Ok(Box::new(DirSource::new(path)))
    } else {
        Ok(Box::new(ZipSource::open(path)?))
    }
}
