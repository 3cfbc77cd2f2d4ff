//! Playback engine for pre-baked scene caches.

pub mod api;
pub mod authoring;
pub mod cache;
pub mod config;
pub mod error;
pub mod preload;
pub mod profile;
pub mod resolver;
pub mod scene;
pub mod settings;
pub mod time;

#[cfg(test)]
mod test_support;

pub use api::{
    Command, Event, PlaybackEngine, PlayerErrorEvent, PlayerErrorKind, PlayerState, SnapshotOf,
};
pub use authoring::{
    AnimationClip, CurveBinding, InterpolationMode, Keyframe, TimeCurve, clip_path,
    reset_time_animation,
};
pub use cache::{CacheSession, CacheStore, SceneCacheStore, Snapshot};
pub use config::{EngineConfig, LogPolicy};
pub use error::{PlayerError, Result};
pub use preload::{PreloadController, PreloadSync};
pub use profile::{ProfileRecorder, ProfileSample, SnapshotProfile, render as render_profile};
pub use resolver::{ResolvedPosition, TimeResolver};
pub use scene::{NullReconciler, SceneReconciler};
pub use settings::{
    CURRENT_SETTINGS_VERSION, LegacyCachePath, LegacyPathRoot, NO_VERSIONING, PlayerSettings,
    STRING_PATH_VERSION, StoredSettings, load_settings, migrate, save_settings,
};
pub use time::{BaseFrame, PlaybackPosition, PositionRequest, TimeRange, TimeUnit};
