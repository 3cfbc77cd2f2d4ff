//! Authoring helpers that turn an opened cache into an animation clip driving
//! the player's time or frame field. Nothing here feeds back into playback.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CacheSession;
use crate::error::{PlayerError, Result};
use crate::time::{BaseFrame, TimeUnit};

/// How a curve is evaluated between keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    #[default]
    Constant,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f64,
    pub value: f64,
}

/// A time to value mapping sampled from keys sorted by time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeCurve {
    pub keys: Vec<Keyframe>,
    pub mode: InterpolationMode,
}

impl TimeCurve {
    pub fn new(mut keys: Vec<Keyframe>, mode: InterpolationMode) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys, mode }
    }

    /// Evaluates the curve at `time`, holding the first and last values
    /// outside the keyed span.
    ///
    /// # Example
    /// ```
    /// use player::{InterpolationMode, Keyframe, TimeCurve};
    ///
    /// let keys = vec![
    ///     Keyframe { time: 0.0, value: 1.0 },
    ///     Keyframe { time: 1.0, value: 3.0 },
    /// ];
    /// let constant = TimeCurve::new(keys.clone(), InterpolationMode::Constant);
    /// let linear = TimeCurve::new(keys, InterpolationMode::Linear);
    /// assert_eq!(constant.evaluate(0.5), Some(1.0));
    /// assert_eq!(linear.evaluate(0.5), Some(2.0));
    /// ```
    pub fn evaluate(&self, time: f64) -> Option<f64> {
        let first = self.keys.first()?;
        let next_index = self.keys.partition_point(|key| key.time <= time);
        if next_index == 0 {
            return Some(first.value);
        }
        let current = self.keys[next_index - 1];
        let Some(next) = self.keys.get(next_index) else {
            return Some(current.value);
        };

        match self.mode {
            InterpolationMode::Constant => Some(current.value),
            InterpolationMode::Linear => {
                let span = next.time - current.time;
                let t = if span > 0.0 {
                    (time - current.time) / span
                } else {
                    0.0
                };
                Some(current.value + (next.value - current.value) * t)
            }
        }
    }
}

/// Player field an animation clip drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveBinding {
    Time,
    Frame,
}

/// Animation asset persisted next to a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub frame_rate: Option<f64>,
    pub binding: Option<CurveBinding>,
    pub curve: TimeCurve,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame_rate: None,
            binding: None,
            curve: TimeCurve::default(),
        }
    }
}

/// Returns where the clip named `name` lives inside `assets_dir`.
pub fn clip_path(assets_dir: &Path, name: &str) -> PathBuf {
    assets_dir.join(format!("{name}.anim.json"))
}

/// Rebuilds the animation clip that drives the player from an opened cache.
///
/// Returns `Ok(None)` when the cache has fewer than two snapshots, since there
/// is nothing to animate. An existing clip at the same location is reused and
/// its curve replaced. Fails with [`PlayerError::AssetInit`] when the clip
/// cannot be created; nothing is written in that case.
pub fn reset_time_animation<S>(
    session: &S,
    unit: TimeUnit,
    base_frame: BaseFrame,
    assets_dir: &Path,
    name: &str,
) -> Result<Option<AnimationClip>>
where
    S: CacheSession + ?Sized,
{
    if session.snapshot_count() < 2 {
        return Ok(None);
    }

    let path = clip_path(assets_dir, name);
    let mut clip = match load_clip(&path) {
        Some(clip) => clip,
        None => AnimationClip::new(name),
    };

    let sample_rate = session.sample_rate();
    if sample_rate > 0.0 {
        clip.frame_rate = Some(sample_rate);
    }

    let (binding, curve) = match unit {
        TimeUnit::Seconds => (
            CurveBinding::Time,
            session.time_curve(InterpolationMode::Constant),
        ),
        TimeUnit::Frames => (CurveBinding::Frame, session.frame_curve(base_frame)),
    };
    clip.binding = Some(binding);
    clip.curve = curve;

    save_clip(&path, &clip)?;
    info!(path = ?path, keys = clip.curve.keys.len(), ?binding, "animation clip saved");
    Ok(Some(clip))
}

fn load_clip(path: &Path) -> Option<AnimationClip> {
    let text = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(clip) => Some(clip),
        Err(error) => {
            warn!(path = ?path, %error, "existing animation clip is unreadable, recreating");
            None
        }
    }
}

fn save_clip(path: &Path, clip: &AnimationClip) -> Result<()> {
    let json = serde_json::to_string_pretty(clip).map_err(|error| PlayerError::AssetInit {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| PlayerError::AssetInit {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
    }
    fs::write(path, json).map_err(|error| PlayerError::AssetInit {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}
