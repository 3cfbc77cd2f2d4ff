use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the player crate.
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors produced by playback, settings and authoring operations.
#[derive(Debug)]
pub enum PlayerError {
    CacheOpen {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    NotOpen,
    SettingsIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    SettingsSerialization {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidSettings {
        reason: String,
    },
    AssetInit {
        path: PathBuf,
        reason: String,
    },
}

impl Display for PlayerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CacheOpen { path, source } => {
                write!(f, "cache open failed ({}): {source}", path.display())
            }
            Self::NotOpen => write!(f, "no cache is open"),
            Self::SettingsIo {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::SettingsSerialization { path, source } => write!(
                f,
                "settings serialization/deserialization failed at {} ({source})",
                path.display()
            ),
            Self::InvalidSettings { reason } => write!(f, "invalid player settings: {reason}"),
            Self::AssetInit { path, reason } => write!(
                f,
                "failed to initialize animation asset {}: {reason}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for PlayerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CacheOpen { source, .. } => Some(source.as_ref()),
            Self::SettingsIo { source, .. } => Some(source),
            Self::SettingsSerialization { source, .. } => Some(source),
            _ => None,
        }
    }
}
