use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::{debug, info, warn};

use crate::decode::{SceneData, interpolate};
use crate::error::{Result, SceneCacheError};
use crate::preload::{PreloadJob, SharedScenes, spawn_preload_worker};
use crate::source::SceneSource;

/// An opened scene cache file.
///
/// Decoded scenes are owned by the cache; handles returned from
/// [`SceneCache::scene_by_time`] are reference counted snapshots.
#[derive(Debug)]
pub struct SceneCache {
    shared: Arc<SharedScenes>,
    preload_tx: Option<Sender<PreloadJob>>,
    preload_length: usize,
}

impl SceneCache {
    /// Opens and indexes a cache file, then starts its preload worker.
    ///
    /// # Example
    /// ```no_run
    /// use scene_cache::SceneCache;
    ///
    /// let cache = SceneCache::open("shot_010.scache").expect("open should succeed");
    /// let (start, end) = cache.time_range();
    /// assert!(start <= end);
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = SceneSource::open(path)?;
        let shared = Arc::new(SharedScenes::new(source));
        let preload_tx =
            spawn_preload_worker(Arc::clone(&shared)).map_err(|source| SceneCacheError::Io {
                context: "spawn preload worker",
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            path = ?path,
            scene_count = shared.source.entries.len(),
            "scene cache opened"
        );
        Ok(Self {
            shared,
            preload_tx: Some(preload_tx),
            preload_length: 0,
        })
    }

    pub fn is_open(&self) -> bool {
        self.preload_tx.is_some()
    }

    pub fn scene_count(&self) -> usize {
        self.shared.source.entries.len()
    }

    /// Sample rate recorded by the exporter, or `0.0` when unknown.
    pub fn sample_rate(&self) -> f64 {
        self.shared.source.header.sample_rate
    }

    /// Time of the first and last scene.
    pub fn time_range(&self) -> (f64, f64) {
        let entries = &self.shared.source.entries;
        let start = entries.first().map_or(0.0, |entry| entry.time);
        let end = entries.last().map_or(start, |entry| entry.time);
        (start, end)
    }

    /// Returns the index of the last scene at or before `time`.
    pub fn frame_at(&self, time: f64) -> usize {
        let entries = &self.shared.source.entries;
        entries
            .partition_point(|entry| entry.time <= time)
            .saturating_sub(1)
    }

    /// Returns the time of scene `frame`, clamped to the available scenes.
    pub fn time_at(&self, frame: usize) -> f64 {
        let entries = &self.shared.source.entries;
        let index = frame.min(entries.len().saturating_sub(1));
        entries.get(index).map_or(0.0, |entry| entry.time)
    }

    /// Returns the scene shown at `time`.
    ///
    /// With `interpolate`, a time strictly between two scenes is blended from
    /// both. Returns `None` when the cache is closed or the scene could not be
    /// decoded.
    pub fn scene_by_time(&self, time: f64, interpolate_scenes: bool) -> Option<Arc<SceneData>> {
        if !self.is_open() {
            return None;
        }
        let index = self.frame_at(time);
        let scene = self.load_logged(index)?;

        if interpolate_scenes && time > scene.time && index + 1 < self.scene_count() {
            let next = self.load_logged(index + 1)?;
            return Some(Arc::new(interpolate(&scene, &next, time)));
        }
        Some(scene)
    }

    pub fn set_preload_length(&mut self, length: usize) {
        self.preload_length = length;
    }

    /// Keeps `[from, from + preload_length]` decoded and drops everything else.
    ///
    /// Decoding happens on the preload worker; a newer request cancels the
    /// previous one.
    pub fn preload(&mut self, from: usize) {
        let Some(preload_tx) = self.preload_tx.as_ref() else {
            return;
        };
        let epoch = self.shared.increment_epoch();
        self.shared.evict_outside(from, self.preload_length);

        let job = PreloadJob {
            from,
            length: self.preload_length,
            epoch,
        };
        if preload_tx.send(job).is_err() {
            warn!(from, "preload worker is gone");
        }
    }

    /// Number of scenes currently resident, frame 0 included.
    pub fn decoded_count(&self) -> usize {
        self.shared.decoded_count()
    }

    /// Returns true when scene `frame` is resident.
    pub fn is_decoded(&self, frame: usize) -> bool {
        self.shared.is_decoded(frame)
    }

    /// Closes the cache. Outstanding preload work is abandoned, not awaited.
    pub fn close(&mut self) {
        if self.preload_tx.take().is_none() {
            return;
        }
        self.shared.increment_epoch();
        self.shared.clear();
        debug!(path = ?self.shared.source.path, "scene cache closed");
    }

    fn load_logged(&self, index: usize) -> Option<Arc<SceneData>> {
        match self.shared.load(index) {
            Ok(scene) => Some(scene),
            Err(error) => {
                warn!(index, %error, "scene decode failed");
                None
            }
        }
    }
}

impl Drop for SceneCache {
    fn drop(&mut self) {
        self.close();
    }
}
