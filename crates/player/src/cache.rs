use std::path::Path;
use std::sync::Arc;

use scene_cache::{SceneCache, SceneData};

use crate::authoring::{InterpolationMode, Keyframe, TimeCurve};
use crate::error::{PlayerError, Result};
use crate::profile::SnapshotProfile;
use crate::time::{BaseFrame, TimeRange};

/// A decoded scene state handed to the scene reconciler.
pub trait Snapshot {
    /// Load and decode cost of this snapshot.
    fn profile(&self) -> SnapshotProfile;
}

/// An opened cache store.
///
/// Decoding may happen on worker threads inside the implementation, but every
/// call here must return without waiting on them indefinitely.
pub trait CacheSession {
    type Snapshot: Snapshot;

    fn time_range(&self) -> TimeRange;

    fn snapshot_count(&self) -> usize;

    /// Exporter sample rate in frames per second, or `0.0` when unknown.
    fn sample_rate(&self) -> f64;

    /// Zero-based index of the snapshot shown at `time`.
    fn time_to_frame(&self, time: f64) -> usize;

    /// Time of the zero-based snapshot `frame`.
    fn frame_to_time(&self, frame: usize) -> f64;

    /// Returns the snapshot at `time`, or `None` when it is not resolvable.
    fn fetch(&mut self, time: f64, interpolate: bool) -> Option<Self::Snapshot>;

    fn set_preload_length(&mut self, length: usize);

    /// Starts keeping `[from_frame, from_frame + preload_length]` decoded.
    fn preload(&mut self, from_frame: usize);

    /// Releases the store. Must not block on outstanding decodes.
    fn close(&mut self);

    /// Curve mapping playback time to itself, one key per snapshot.
    fn time_curve(&self, mode: InterpolationMode) -> TimeCurve {
        let keys = (0..self.snapshot_count())
            .map(|frame| {
                let time = self.frame_to_time(frame);
                Keyframe { time, value: time }
            })
            .collect();
        TimeCurve::new(keys, mode)
    }

    /// Curve mapping playback time to external frame numbers.
    fn frame_curve(&self, base: BaseFrame) -> TimeCurve {
        let keys = (0..self.snapshot_count())
            .map(|frame| Keyframe {
                time: self.frame_to_time(frame),
                value: (frame as i64 + base.offset()) as f64,
            })
            .collect();
        TimeCurve::new(keys, InterpolationMode::Constant)
    }
}

/// Opens cache sessions from paths.
pub trait CacheStore {
    type Session: CacheSession;

    /// Opens `path`. Fails with [`PlayerError::CacheOpen`] when the path is
    /// missing, unreadable or not a compatible cache.
    fn open(&self, path: &Path) -> Result<Self::Session>;
}

/// Store backed by the `scene-cache` file reader, used by production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneCacheStore;

impl CacheStore for SceneCacheStore {
    type Session = SceneCache;

    fn open(&self, path: &Path) -> Result<SceneCache> {
        SceneCache::open(path).map_err(|source| PlayerError::CacheOpen {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }
}

impl CacheSession for SceneCache {
    type Snapshot = Arc<SceneData>;

    fn time_range(&self) -> TimeRange {
        let (start, end) = SceneCache::time_range(self);
        TimeRange::new(start, end)
    }

    fn snapshot_count(&self) -> usize {
        self.scene_count()
    }

    fn sample_rate(&self) -> f64 {
        SceneCache::sample_rate(self)
    }

    fn time_to_frame(&self, time: f64) -> usize {
        self.frame_at(time)
    }

    fn frame_to_time(&self, frame: usize) -> f64 {
        self.time_at(frame)
    }

    fn fetch(&mut self, time: f64, interpolate: bool) -> Option<Arc<SceneData>> {
        self.scene_by_time(time, interpolate)
    }

    fn set_preload_length(&mut self, length: usize) {
        SceneCache::set_preload_length(self, length);
    }

    fn preload(&mut self, from_frame: usize) {
        SceneCache::preload(self, from_frame);
    }

    fn close(&mut self) {
        SceneCache::close(self);
    }
}

impl Snapshot for Arc<SceneData> {
    fn profile(&self) -> SnapshotProfile {
        let profile = self.profile;
        SnapshotProfile {
            encoded_bytes: profile.size_encoded,
            decoded_bytes: profile.size_decoded,
            vertex_count: profile.vertex_count,
            load_time_ms: profile.load_time_ms,
            read_time_ms: profile.read_time_ms,
            decode_time_ms: profile.decode_time_ms,
            setup_time_ms: profile.setup_time_ms,
            interpolate_time_ms: profile.lerp_time_ms,
        }
    }
}
