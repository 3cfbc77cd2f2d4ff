use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::cache::{CacheSession, CacheStore, Snapshot};
use crate::error::{PlayerError, Result};
use crate::profile::SnapshotProfile;
use crate::scene::SceneReconciler;
use crate::time::{PositionRequest, TimeRange};

/// Path prefix the fake store refuses to open.
pub(crate) const MISSING_PREFIX: &str = "missing";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Open(PathBuf),
    SetPreloadLength(usize),
    Preload(usize),
    Fetch { time: f64, interpolate: bool },
    Close,
    BeforeUpdate,
    UpdateScene { time: f64, update_non_material_assets: bool },
    AfterUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FakeSnapshot {
    pub time: f64,
    pub interpolated: bool,
}

impl Snapshot for FakeSnapshot {
    fn profile(&self) -> SnapshotProfile {
        SnapshotProfile {
            encoded_bytes: 1_200,
            decoded_bytes: 4_800,
            vertex_count: 100,
            load_time_ms: 0.5,
            read_time_ms: 0.25,
            decode_time_ms: 0.25,
            setup_time_ms: 0.0,
            interpolate_time_ms: if self.interpolated { 0.1 } else { 0.0 },
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeSession {
    times: Vec<f64>,
    pub sample_rate: f64,
    calls: Arc<Mutex<Vec<Call>>>,
    pending_misses: Arc<Mutex<usize>>,
}

impl FakeSession {
    pub fn new(times: Vec<f64>) -> Self {
        Self {
            times,
            sample_rate: 0.0,
            calls: Arc::new(Mutex::new(Vec::new())),
            pending_misses: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("lock calls").push(call);
    }
}

impl CacheSession for FakeSession {
    type Snapshot = FakeSnapshot;

    fn time_range(&self) -> TimeRange {
        let start = self.times.first().copied().unwrap_or(0.0);
        let end = self.times.last().copied().unwrap_or(start);
        TimeRange::new(start, end)
    }

    fn snapshot_count(&self) -> usize {
        self.times.len()
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn time_to_frame(&self, time: f64) -> usize {
        self.times
            .partition_point(|frame_time| *frame_time <= time)
            .saturating_sub(1)
    }

    fn frame_to_time(&self, frame: usize) -> f64 {
        let index = frame.min(self.times.len().saturating_sub(1));
        self.times.get(index).copied().unwrap_or(0.0)
    }

    fn fetch(&mut self, time: f64, interpolate: bool) -> Option<FakeSnapshot> {
        self.record(Call::Fetch { time, interpolate });
        let mut misses = self.pending_misses.lock().expect("lock misses");
        if *misses > 0 {
            *misses -= 1;
            return None;
        }
        Some(FakeSnapshot {
            time,
            interpolated: interpolate,
        })
    }

    fn set_preload_length(&mut self, length: usize) {
        self.record(Call::SetPreloadLength(length));
    }

    fn preload(&mut self, from_frame: usize) {
        self.record(Call::Preload(from_frame));
    }

    fn close(&mut self) {
        self.record(Call::Close);
    }
}

/// Store handing out [`FakeSession`]s that share one call log.
#[derive(Debug, Clone)]
pub(crate) struct FakeStore {
    times: Vec<f64>,
    calls: Arc<Mutex<Vec<Call>>>,
    pending_misses: Arc<Mutex<usize>>,
}

impl FakeStore {
    pub fn new(times: Vec<f64>) -> Self {
        Self {
            times,
            calls: Arc::new(Mutex::new(Vec::new())),
            pending_misses: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    /// Makes the next `count` fetches return nothing.
    pub fn miss_next_fetches(&self, count: usize) {
        *self.pending_misses.lock().expect("lock misses") = count;
    }
}

impl CacheStore for FakeStore {
    type Session = FakeSession;

    fn open(&self, path: &Path) -> Result<FakeSession> {
        if path.starts_with(MISSING_PREFIX) {
            return Err(PlayerError::CacheOpen {
                path: path.to_path_buf(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such cache",
                )),
            });
        }
        self.calls
            .lock()
            .expect("lock calls")
            .push(Call::Open(path.to_path_buf()));
        Ok(FakeSession {
            times: self.times.clone(),
            sample_rate: 24.0,
            calls: Arc::clone(&self.calls),
            pending_misses: Arc::clone(&self.pending_misses),
        })
    }
}

/// Reconciler logging hook calls into a shared call log.
#[derive(Debug)]
pub(crate) struct RecordingReconciler {
    calls: Arc<Mutex<Vec<Call>>>,
    pub defer_after_update: Option<PositionRequest>,
}

impl RecordingReconciler {
    pub fn new(calls: Arc<Mutex<Vec<Call>>>) -> Self {
        Self {
            calls,
            defer_after_update: None,
        }
    }
}

impl SceneReconciler<FakeSnapshot> for RecordingReconciler {
    fn before_update(&mut self) {
        self.calls.lock().expect("lock calls").push(Call::BeforeUpdate);
    }

    fn update_scene(&mut self, snapshot: &FakeSnapshot, update_non_material_assets: bool) {
        self.calls.lock().expect("lock calls").push(Call::UpdateScene {
            time: snapshot.time,
            update_non_material_assets,
        });
    }

    fn after_update(&mut self) -> Option<PositionRequest> {
        self.calls.lock().expect("lock calls").push(Call::AfterUpdate);
        self.defer_after_update.take()
    }
}

/// Counts how many calls match `predicate`.
pub(crate) fn count_calls(calls: &Arc<Mutex<Vec<Call>>>, predicate: impl Fn(&Call) -> bool) -> usize {
    calls
        .lock()
        .expect("lock calls")
        .iter()
        .filter(|call| predicate(call))
        .count()
}
