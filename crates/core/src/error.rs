use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("source directory not found: {}", .0.display())]
    SourceDirectoryNotFound(PathBuf),
    #[error("source path is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    #[error("target directory could not be prepared: {}", .path.display())]
    TargetDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("target already exists: {}", .0.display())]
    TargetExists(PathBuf),
    #[error("failed to copy {} -> {}", .from.display(), .to.display())]
    CopyFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    CaptureTime,
    DeviceModel,
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaptureTime => f.write_str("capture time"),
            Self::DeviceModel => f.write_str("camera model"),
        }
    }
}

/// Why a source file was left out of the run.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("could not read file: {0}")]
    Unreadable(#[source] io::Error),
    #[error("no embedded XMP metadata")]
    MissingMetadata,
    #[error("{0} not found in XMP metadata")]
    MissingField(MetadataField),
    #[error("malformed capture time {raw:?}")]
    MalformedTimestamp {
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
}
