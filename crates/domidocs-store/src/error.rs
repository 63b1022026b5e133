use std::io;
use std::path::{Path, PathBuf};

use domidocs_core::ConfigError;
use thiserror::Error;

/// Store and migration failures
///
/// Every variant here is a data-integrity failure: the write did not happen
/// or did not complete. Cosmetic problems are reported as
/// [`CosmeticIssue`](crate::CosmeticIssue) values instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "workbook {} is locked or read-only; close it in your spreadsheet application and retry",
        .path.display()
    )]
    Locked {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read workbook {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },

    #[error("cannot write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("sheet '{0}' is missing from the workbook")]
    MissingSheet(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),
}

impl StoreError {
    /// Classify an IO error, singling out the "file open elsewhere" case
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            StoreError::Locked { path: path.to_path_buf(), source }
        } else {
            StoreError::Io { path: path.to_path_buf(), source }
        }
    }

    pub(crate) fn read(path: &Path, source: calamine::XlsxError) -> Self {
        match source {
            calamine::XlsxError::Io(io) => StoreError::io(path, io),
            other => StoreError::Read { path: path.to_path_buf(), source: other },
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, StoreError::Locked { .. })
    }
}
