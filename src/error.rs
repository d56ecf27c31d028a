//! Per-operator fatal errors.
//!
//! Row-level problems (malformed rows, unresolvable shapes, unrecognized
//! route types) are recovered inline and tracked in the build summary; only
//! conditions that make a whole feed unusable surface as a [`FeedError`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("mandatory table {table:?} missing from feed at {}", path.display())]
    MissingFile { table: &'static str, path: PathBuf },

    #[error("unreadable feed archive {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("i/o error reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
