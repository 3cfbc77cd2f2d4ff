use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread;

use tracing::{debug, warn};

use crate::decode::{SceneData, decode_scene};
use crate::error::{Result, SceneCacheError};
use crate::source::SceneSource;

/// Decode-ahead request handed to the preload worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PreloadJob {
    pub from: usize,
    pub length: usize,
    pub epoch: u64,
}

/// State shared between the cache handle and its preload worker.
#[derive(Debug)]
pub(crate) struct SharedScenes {
    pub source: SceneSource,
    base: OnceLock<Arc<SceneData>>,
    decoded: Mutex<HashMap<usize, Arc<SceneData>>>,
    epoch: AtomicU64,
}

impl SharedScenes {
    pub fn new(source: SceneSource) -> Self {
        Self {
            source,
            base: OnceLock::new(),
            decoded: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Bumps the epoch so that in-flight jobs stop at their next scene.
    pub fn increment_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_decoded(&self, index: usize) -> bool {
        (index == 0 && self.base.get().is_some()) || self.lock_decoded().contains_key(&index)
    }

    pub fn decoded_count(&self) -> usize {
        self.lock_decoded().len() + usize::from(self.base.get().is_some())
    }

    /// Drops decoded scenes outside `[from, from + length]`. Frame 0 is always kept.
    pub fn evict_outside(&self, from: usize, length: usize) {
        let last = from.saturating_add(length);
        self.lock_decoded()
            .retain(|index, _| (from..=last).contains(index));
    }

    pub fn clear(&self) {
        self.lock_decoded().clear();
    }

    /// Returns scene `index`, decoding it if it is not resident yet.
    pub fn load(&self, index: usize) -> Result<Arc<SceneData>> {
        if index == 0 {
            return self.base_scene();
        }
        if let Some(scene) = self.lock_decoded().get(&index) {
            return Ok(Arc::clone(scene));
        }

        let base = self.base_scene()?;
        let (line, read_time_ms) = self.source.read_scene(index)?;
        let scene = Arc::new(decode_scene(index, &line, Some(&base), read_time_ms)?);
        self.lock_decoded().insert(index, Arc::clone(&scene));
        Ok(scene)
    }

    /// Decodes scene `index` for preload job `epoch`.
    ///
    /// The scene is only inserted if no newer preload started while it was
    /// decoding; returns whether it was inserted.
    pub fn load_for_job(&self, index: usize, epoch: u64) -> Result<bool> {
        let base = self.base_scene()?;
        let (line, read_time_ms) = self.source.read_scene(index)?;
        let scene = Arc::new(decode_scene(index, &line, Some(&base), read_time_ms)?);

        let mut decoded = self.lock_decoded();
        if self.current_epoch() != epoch {
            return Ok(false);
        }
        decoded.insert(index, scene);
        Ok(true)
    }

    fn base_scene(&self) -> Result<Arc<SceneData>> {
        if let Some(base) = self.base.get() {
            return Ok(Arc::clone(base));
        }
        let (line, read_time_ms) = self.source.read_scene(0)?;
        let scene = Arc::new(decode_scene(0, &line, None, read_time_ms)?);
        let _ = self.base.set(scene);
        self.base
            .get()
            .cloned()
            .ok_or(SceneCacheError::FrameOutOfRange {
                frame: 0,
                count: self.source.entries.len(),
            })
    }

    fn lock_decoded(&self) -> std::sync::MutexGuard<'_, HashMap<usize, Arc<SceneData>>> {
        self.decoded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Starts the background decoder. The worker exits when the sender is dropped.
pub(crate) fn spawn_preload_worker(
    shared: Arc<SharedScenes>,
) -> std::io::Result<Sender<PreloadJob>> {
    let (job_tx, job_rx) = mpsc::channel::<PreloadJob>();
    thread::Builder::new()
        .name("scene-cache-preload".to_string())
        .spawn(move || run_preload_worker(&shared, job_rx))?;
    Ok(job_tx)
}

fn run_preload_worker(shared: &SharedScenes, jobs: Receiver<PreloadJob>) {
    while let Ok(mut job) = jobs.recv() {
        // Only the newest queued job matters.
        while let Ok(newer) = jobs.try_recv() {
            job = newer;
        }
        run_job(shared, job);
    }
    debug!(path = ?shared.source.path, "preload worker stopped");
}

fn run_job(shared: &SharedScenes, job: PreloadJob) {
    let count = shared.source.entries.len();
    let first = job.from.saturating_add(1);
    let last = job.from.saturating_add(job.length).min(count.saturating_sub(1));

    let mut decoded = 0usize;
    for index in first..=last {
        if shared.current_epoch() != job.epoch {
            debug!(from = job.from, decoded, "preload job cancelled");
            return;
        }
        if shared.is_decoded(index) {
            continue;
        }
        match shared.load_for_job(index, job.epoch) {
            Ok(true) => decoded += 1,
            Ok(false) => {
                debug!(from = job.from, decoded, "preload job superseded");
                return;
            }
            Err(error) => {
                warn!(index, %error, "preload decode failed");
            }
        }
    }
    if decoded > 0 {
        debug!(from = job.from, length = job.length, decoded, "preload job finished");
    }
}
