//! Crate-level error type for I/O, parsing and input-shape failures.
//!
//! Per-bone fitting failures are *not* reported through this type; they are
//! collected as [`crate::BoneFitFailure`] and the run continues.

use std::path::PathBuf;

/// Errors that abort a pipeline run.
#[derive(Debug)]
pub enum Error {
    /// Reading or writing a file failed.
    Io {
        /// File involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A JSON document could not be parsed or produced.
    Json {
        /// File involved in the failed operation.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// Skeleton table is inconsistent.
    Skeleton(String),
    /// A pose has fewer joint positions than the skeleton references.
    PoseShape {
        /// Index of the pose in the corpus.
        pose: usize,
        /// Number of joints the skeleton requires.
        needed: usize,
        /// Number of joints present in the pose.
        got: usize,
    },
    /// A results file parsed as JSON but is not in the expected format.
    Format {
        /// Offending file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },
    /// A diagnostic figure could not be encoded or written.
    Image {
        /// Destination of the figure.
        path: PathBuf,
        /// Underlying image error.
        source: image::ImageError,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o error on {}: {}", path.display(), source),
            Self::Json { path, source } => {
                write!(f, "json error on {}: {}", path.display(), source)
            }
            Self::Skeleton(msg) => write!(f, "invalid skeleton: {}", msg),
            Self::PoseShape { pose, needed, got } => write!(
                f,
                "pose {} has {} joints, skeleton needs at least {}",
                pose, got, needed
            ),
            Self::Format { path, message } => {
                write!(f, "unexpected format in {}: {}", path.display(), message)
            }
            Self::Image { path, source } => {
                write!(f, "failed to write figure {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Image { source, .. } => Some(source),
            Self::Skeleton(_) | Self::PoseShape { .. } | Self::Format { .. } => None,
        }
    }
}

/// Convenience alias for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
