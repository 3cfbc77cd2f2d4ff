use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, SceneCacheError>;

/// Error type for opening, indexing and decoding scene cache files.
#[derive(Debug)]
pub enum SceneCacheError {
    Io {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        context: &'static str,
        source: serde_json::Error,
    },
    InvalidHeader {
        path: PathBuf,
        reason: String,
    },
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
    },
    Empty(PathBuf),
    UnsortedTimes {
        index: usize,
        previous: f64,
        time: f64,
    },
    FrameOutOfRange {
        frame: usize,
        count: usize,
    },
    MissingBaseEntity {
        path: String,
    },
}

impl Display for SceneCacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::Json { context, source } => write!(f, "json error ({context}): {source}"),
            Self::InvalidHeader { path, reason } => {
                write!(f, "invalid scene cache header in {}: {reason}", path.display())
            }
            Self::UnsupportedVersion { path, found } => write!(
                f,
                "unsupported scene cache version {found}: {}",
                path.display()
            ),
            Self::Empty(path) => write!(f, "scene cache has no scenes: {}", path.display()),
            Self::UnsortedTimes {
                index,
                previous,
                time,
            } => write!(
                f,
                "scene {index} time {time} is not after previous scene time {previous}"
            ),
            Self::FrameOutOfRange { frame, count } => {
                write!(f, "frame {frame} is out of range (scene count {count})")
            }
            Self::MissingBaseEntity { path } => {
                write!(f, "entity {path} omits points but is not present in frame 0")
            }
        }
    }
}

impl std::error::Error for SceneCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}
