use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure kinds shared by every loader.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("could not open {}: {source}", path.display())]
    ResourceNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{what} is corrupted: {reason}")]
    CorruptAsset { what: String, reason: String },
    #[error("{what} uses unsupported format {format}")]
    UnsupportedFormat { what: String, format: String },
    #[error("face on line {line} has {corners} corners, only triangles are supported")]
    UnsupportedGeometry { line: usize, corners: usize },
    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

pub type AssetResult<T> = Result<T, AssetError>;

impl AssetError {
    pub(crate) fn not_found(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ResourceNotFound {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(what: &str, reason: impl Into<String>) -> Self {
        Self::CorruptAsset {
            what: what.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(line_no: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line: line_no + 1,
            reason: reason.into(),
        }
    }
}
