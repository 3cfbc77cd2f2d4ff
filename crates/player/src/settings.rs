use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};
use crate::time::{BaseFrame, TimeUnit};

/// Settings written before versioning existed.
pub const NO_VERSIONING: u32 = 0;
/// First version storing the cache location as a plain path string.
pub const STRING_PATH_VERSION: u32 = 2;
/// Version written by this build.
pub const CURRENT_SETTINGS_VERSION: u32 = STRING_PATH_VERSION;

/// Persisted player fields, in their current shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub version: u32,
    /// Full path of the cache file, using `/` separators.
    pub scene_cache_file_path: Option<String>,
    pub time_unit: TimeUnit,
    pub time: f64,
    pub interpolation: bool,
    pub base_frame: BaseFrame,
    pub frame: i64,
    pub preload_length: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: CURRENT_SETTINGS_VERSION,
            scene_cache_file_path: None,
            time_unit: TimeUnit::Seconds,
            time: 0.0,
            interpolation: false,
            base_frame: BaseFrame::One,
            frame: 1,
            preload_length: 1,
        }
    }
}

/// Root a legacy cache path was relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyPathRoot {
    Absolute,
    Project,
}

/// Structured cache path used before [`STRING_PATH_VERSION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCachePath {
    pub root: LegacyPathRoot,
    pub leaf_path: String,
}

impl LegacyCachePath {
    pub fn full_path(&self, project_dir: &Path) -> PathBuf {
        match self.root {
            LegacyPathRoot::Absolute => PathBuf::from(&self.leaf_path),
            LegacyPathRoot::Project => project_dir.join(&self.leaf_path),
        }
    }
}

/// On-disk settings of any version. A missing `version` means
/// [`NO_VERSIONING`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub scene_cache_file_path: Option<String>,
    #[serde(default)]
    pub cache_file_path: Option<LegacyCachePath>,
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub interpolation: bool,
    #[serde(default)]
    pub base_frame: BaseFrame,
    #[serde(default = "default_frame")]
    pub frame: i64,
    #[serde(default = "default_preload_length")]
    pub preload_length: usize,
}

impl Default for StoredSettings {
    fn default() -> Self {
        let current = PlayerSettings::default();
        Self {
            version: NO_VERSIONING,
            scene_cache_file_path: None,
            cache_file_path: None,
            time_unit: current.time_unit,
            time: current.time,
            interpolation: current.interpolation,
            base_frame: current.base_frame,
            frame: current.frame,
            preload_length: current.preload_length,
        }
    }
}

fn default_frame() -> i64 {
    PlayerSettings::default().frame
}

fn default_preload_length() -> usize {
    PlayerSettings::default().preload_length
}

/// Upgrades stored settings to the current shape.
///
/// Settings older than [`STRING_PATH_VERSION`] must carry the legacy
/// structured path; it is resolved against `project_dir` and replaces the
/// plain path. The legacy field is ignored for newer settings.
///
/// # Example
/// ```
/// use std::path::Path;
/// use player::{LegacyCachePath, LegacyPathRoot, StoredSettings, migrate};
///
/// let stored = StoredSettings {
///     cache_file_path: Some(LegacyCachePath {
///         root: LegacyPathRoot::Project,
///         leaf_path: "caches/shot.scache".to_string(),
///     }),
///     ..StoredSettings::default()
/// };
/// let settings = migrate(stored, Path::new("/work/project")).expect("migrates");
/// assert_eq!(
///     settings.scene_cache_file_path.as_deref(),
///     Some("/work/project/caches/shot.scache")
/// );
/// ```
pub fn migrate(stored: StoredSettings, project_dir: &Path) -> Result<PlayerSettings> {
    if stored.version > CURRENT_SETTINGS_VERSION {
        return Err(PlayerError::InvalidSettings {
            reason: format!("unsupported settings version {}", stored.version),
        });
    }

    let scene_cache_file_path = if stored.version < STRING_PATH_VERSION {
        let legacy = stored
            .cache_file_path
            .as_ref()
            .ok_or_else(|| PlayerError::InvalidSettings {
                reason: format!(
                    "settings version {} predates string paths but has no legacy cache path",
                    stored.version
                ),
            })?;
        if legacy.leaf_path.is_empty() {
            None
        } else {
            Some(normalize_path(&legacy.full_path(project_dir)))
        }
    } else {
        stored.scene_cache_file_path
    };

    Ok(PlayerSettings {
        version: CURRENT_SETTINGS_VERSION,
        scene_cache_file_path,
        time_unit: stored.time_unit,
        time: stored.time,
        interpolation: stored.interpolation,
        base_frame: stored.base_frame,
        frame: stored.frame,
        preload_length: stored.preload_length,
    })
}

/// Reads settings of any version and migrates them.
pub fn load_settings(path: &Path, project_dir: &Path) -> Result<PlayerSettings> {
    let text = fs::read_to_string(path).map_err(|source| PlayerError::SettingsIo {
        context: "read settings",
        path: path.to_path_buf(),
        source,
    })?;
    let stored: StoredSettings =
        serde_json::from_str(&text).map_err(|source| PlayerError::SettingsSerialization {
            path: path.to_path_buf(),
            source,
        })?;
    migrate(stored, project_dir)
}

/// Writes settings in the current version.
pub fn save_settings(path: &Path, settings: &PlayerSettings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings).map_err(|source| {
        PlayerError::SettingsSerialization {
            path: path.to_path_buf(),
            source,
        }
    })?;
    fs::write(path, json).map_err(|source| PlayerError::SettingsIo {
        context: "write settings",
        path: path.to_path_buf(),
        source,
    })
}

/// Renders a path as a string with `/` separators.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
