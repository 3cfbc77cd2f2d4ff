use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::authoring::{AnimationClip, InterpolationMode, TimeCurve, reset_time_animation};
use crate::cache::{CacheSession, CacheStore, SceneCacheStore, Snapshot};
use crate::config::EngineConfig;
use crate::error::{PlayerError, Result};
use crate::preload::{PreloadController, PreloadSync};
use crate::profile::{ProfileRecorder, ProfileSample};
use crate::resolver::TimeResolver;
use crate::scene::SceneReconciler;
use crate::settings::{PlayerSettings, normalize_path};
use crate::time::{BaseFrame, PlaybackPosition, PositionRequest, TimeRange, TimeUnit};

/// Snapshot type produced by the sessions of store `S`.
pub type SnapshotOf<S> = <<S as CacheStore>::Session as CacheSession>::Snapshot;

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Closed,
    /// A cache is open and the applied snapshot matches the position.
    OpenIdle,
    /// A cache is open and the next tick will fetch and apply a snapshot.
    OpenDirty,
}

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open {
        path: PathBuf,
    },
    Close,
    RequestTime {
        time: f64,
    },
    /// Requests `value * range.end` seconds.
    RequestNormalizedTime {
        value: f64,
    },
    RequestFrame {
        frame: i64,
    },
    SetTimeUnit {
        unit: TimeUnit,
    },
    SetBaseFrame {
        base_frame: BaseFrame,
    },
    SetInterpolation {
        enabled: bool,
    },
    SetPreloadLength {
        length: usize,
    },
    /// Applies pending position and preload changes.
    Tick,
    /// Makes the next tick reprocess the current position.
    Refresh,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Opened {
        path: String,
        range: TimeRange,
        snapshot_count: usize,
    },
    Closed,
    PositionChanged {
        time: f64,
        frame: i64,
    },
    SnapshotApplied {
        time: f64,
        frame: i64,
        profile: Option<ProfileSample>,
    },
    SnapshotMissed {
        time: f64,
    },
    PreloadSynced(PreloadSync),
    Error(PlayerErrorEvent),
}

/// Coarse error category for command-driven hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerErrorKind {
    CacheOpen,
    NotOpen,
    Settings,
    AssetInit,
}

impl From<&PlayerError> for PlayerErrorKind {
    fn from(value: &PlayerError) -> Self {
        match value {
            PlayerError::CacheOpen { .. } => Self::CacheOpen,
            PlayerError::NotOpen => Self::NotOpen,
            PlayerError::SettingsIo { .. }
            | PlayerError::SettingsSerialization { .. }
            | PlayerError::InvalidSettings { .. } => Self::Settings,
            PlayerError::AssetInit { .. } => Self::AssetInit,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerErrorEvent {
    pub kind: PlayerErrorKind,
    pub message: String,
}

impl PlayerErrorEvent {
    pub fn from_error(error: &PlayerError) -> Self {
        Self {
            kind: PlayerErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Plays back an opened scene cache.
///
/// Position requests only move the canonical position; the snapshot for it is
/// fetched and handed to the reconciler on the next [`tick`](Self::tick), at
/// most once per position change.
pub struct PlaybackEngine<S: CacheStore, R> {
    store: S,
    reconciler: R,
    config: EngineConfig,
    session: Option<S::Session>,
    file_path: Option<String>,
    range: Option<TimeRange>,
    position: PlaybackPosition,
    time_unit: TimeUnit,
    base_frame: BaseFrame,
    preload: PreloadController,
    last_applied_time: Option<f64>,
    deferred: Option<PositionRequest>,
    profile: ProfileRecorder,
}

impl<R> PlaybackEngine<SceneCacheStore, R>
where
    R: SceneReconciler<SnapshotOf<SceneCacheStore>>,
{
    /// Creates an engine reading scene cache files from disk.
    ///
    /// # Example
    /// ```
    /// use player::{NullReconciler, PlaybackEngine, PlayerState};
    ///
    /// let engine = PlaybackEngine::with_scene_cache(NullReconciler);
    /// assert_eq!(engine.state(), PlayerState::Closed);
    /// ```
    pub fn with_scene_cache(reconciler: R) -> Self {
        Self::new(SceneCacheStore, reconciler)
    }
}

impl<S, R> PlaybackEngine<S, R>
where
    S: CacheStore,
    R: SceneReconciler<SnapshotOf<S>>,
{
    pub fn new(store: S, reconciler: R) -> Self {
        Self::with_config(store, reconciler, EngineConfig::default())
    }

    pub fn with_config(store: S, reconciler: R, config: EngineConfig) -> Self {
        let defaults = PlayerSettings::default();
        Self {
            store,
            reconciler,
            config,
            session: None,
            file_path: None,
            range: None,
            position: PlaybackPosition {
                time: defaults.time,
                frame: defaults.frame,
                normalized_time: 0.0,
                interpolation: defaults.interpolation,
            },
            time_unit: defaults.time_unit,
            base_frame: defaults.base_frame,
            preload: PreloadController::new(defaults.preload_length),
            last_applied_time: None,
            deferred: None,
            profile: ProfileRecorder::new(),
        }
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::Open { path } => self.open(&path),
            Command::Close => Ok(self.close()),
            Command::RequestTime { time } => Ok(self.set_time(time)),
            Command::RequestNormalizedTime { value } => {
                Ok(self.request_position(PositionRequest::Normalized(value)))
            }
            Command::RequestFrame { frame } => Ok(self.set_frame(frame)),
            Command::SetTimeUnit { unit } => Ok(self.set_time_unit(unit)),
            Command::SetBaseFrame { base_frame } => Ok(self.set_base_frame(base_frame)),
            Command::SetInterpolation { enabled } => {
                self.set_interpolation(enabled);
                Ok(Vec::new())
            }
            Command::SetPreloadLength { length } => {
                self.set_preload_length(length);
                Ok(Vec::new())
            }
            Command::Tick => Ok(self.tick()),
            Command::Refresh => {
                self.refresh();
                Ok(Vec::new())
            }
        }
    }

    /// Like [`handle_command`](Self::handle_command), reporting failures as
    /// [`Event::Error`].
    ///
    /// An open closes the current cache before trying the new path, so a
    /// failed reopen still reports [`Event::Closed`] ahead of the error.
    pub fn dispatch(&mut self, command: Command) -> Vec<Event> {
        let mut events = match command {
            Command::Open { .. } => self.close(),
            _ => Vec::new(),
        };
        match self.handle_command(command) {
            Ok(emitted) => events.extend(emitted),
            Err(error) => events.push(Event::Error(PlayerErrorEvent::from_error(&error))),
        }
        events
    }

    /// Opens `path`, closing the current cache first.
    ///
    /// On success the snapshot at time zero is applied immediately. On failure
    /// the engine stays closed; callers that need the close reported should
    /// go through [`dispatch`](Self::dispatch) or call [`close`](Self::close)
    /// first.
    pub fn open(&mut self, path: &Path) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        if self.session.is_some() {
            events.extend(self.close());
        }

        let session = match self.store.open(path) {
            Ok(session) => session,
            Err(error) => {
                warn!(path = ?path, %error, "scene cache open failed");
                return Err(error);
            }
        };
        let range = session.time_range();
        let snapshot_count = session.snapshot_count();
        let full_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let file_path = normalize_path(&full_path);

        self.session = Some(session);
        self.range = Some(range);
        self.file_path = Some(file_path.clone());
        self.preload.reset();
        self.last_applied_time = None;
        self.deferred = None;
        self.profile.clear();

        if self.config.log_policy.cache_events() {
            info!(
                path = %file_path,
                start = range.start,
                end = range.end,
                snapshot_count,
                "scene cache opened"
            );
        }
        events.push(Event::Opened {
            path: file_path,
            range,
            snapshot_count,
        });

        events.extend(self.load(0.0, true));
        events.extend(self.resolve_current());
        Ok(events)
    }

    /// Releases the open cache. Outstanding decodes are abandoned.
    pub fn close(&mut self) -> Vec<Event> {
        let Some(mut session) = self.session.take() else {
            return Vec::new();
        };
        session.close();
        if self.config.log_policy.cache_events() {
            info!(path = ?self.file_path, "scene cache closed");
        }

        self.file_path = None;
        self.range = None;
        self.last_applied_time = None;
        self.deferred = None;
        self.preload.reset();
        self.profile.clear();
        vec![Event::Closed]
    }

    /// Moves the position. Ignored while no cache is open.
    pub fn request_position(&mut self, request: PositionRequest) -> Vec<Event> {
        let Some(session) = self.session.as_ref() else {
            debug!(?request, "position request ignored, no cache open");
            return Vec::new();
        };
        let range = self.range.unwrap_or_else(|| session.time_range());
        if let PositionRequest::Normalized(value) = request {
            self.position.normalized_time = value;
        }

        let resolved =
            TimeResolver::new(session, range, self.time_unit, self.base_frame).resolve(request);
        self.position.time = resolved.time;
        if let Some(frame) = resolved.frame {
            self.position.frame = frame;
        }
        vec![Event::PositionChanged {
            time: self.position.time,
            frame: self.position.frame,
        }]
    }

    pub fn set_time(&mut self, time: f64) -> Vec<Event> {
        self.request_position(PositionRequest::Time(time))
    }

    pub fn set_frame(&mut self, frame: i64) -> Vec<Event> {
        self.request_position(PositionRequest::Frame(frame))
    }

    /// Switching to frames turns interpolation off and snaps the position to
    /// a frame.
    pub fn set_time_unit(&mut self, unit: TimeUnit) -> Vec<Event> {
        self.time_unit = unit;
        if unit == TimeUnit::Frames {
            self.position.interpolation = false;
        }
        self.request_position(PositionRequest::Time(self.position.time))
    }

    /// Only takes effect while the unit is seconds.
    pub fn set_interpolation(&mut self, enabled: bool) {
        self.position.interpolation = enabled;
    }

    pub fn set_base_frame(&mut self, base_frame: BaseFrame) -> Vec<Event> {
        self.base_frame = base_frame;
        self.resolve_current()
    }

    /// Takes effect on the next tick, without refetching the snapshot.
    pub fn set_preload_length(&mut self, length: usize) {
        self.preload.set_length(length);
    }

    /// Applies pending changes.
    ///
    /// A position that differs from the last applied one is fetched and handed
    /// to the reconciler. Otherwise a changed preload length is pushed on its
    /// own. Requests returned by the reconciler during the previous tick are
    /// resolved first.
    pub fn tick(&mut self) -> Vec<Event> {
        if self.session.is_none() {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(request) = self.deferred.take() {
            events.extend(self.request_position(request));
        }

        let time = self.position.time;
        if self.last_applied_time != Some(time) {
            events.extend(self.load(time, false));
        } else if self.preload.needs_push()
            && let Some(session) = self.session.as_mut()
        {
            let current_frame = session.time_to_frame(time);
            let sync = self.preload.sync(session, current_frame);
            self.log_preload(&sync);
            events.push(Event::PreloadSynced(sync));
        }
        events
    }

    /// Forgets the last applied time so the next tick refetches.
    pub fn refresh(&mut self) {
        self.last_applied_time = None;
    }

    /// Restores a persisted state, opening or closing the cache to match.
    pub fn apply_settings(&mut self, settings: &PlayerSettings) -> Result<Vec<Event>> {
        self.time_unit = settings.time_unit;
        self.base_frame = settings.base_frame;
        self.position.interpolation =
            settings.interpolation && settings.time_unit == TimeUnit::Seconds;
        self.preload.set_length(settings.preload_length);

        let mut events = match settings.scene_cache_file_path.as_deref() {
            Some(path) => self.open(Path::new(path))?,
            None => self.close(),
        };

        self.position.time = settings.time;
        self.position.frame = settings.frame;
        let request = match settings.time_unit {
            TimeUnit::Seconds => PositionRequest::Time(settings.time),
            TimeUnit::Frames => PositionRequest::Frame(settings.frame),
        };
        events.extend(self.request_position(request));
        Ok(events)
    }

    /// Captures the persisted state.
    pub fn settings(&self) -> PlayerSettings {
        PlayerSettings {
            scene_cache_file_path: self.file_path.clone(),
            time_unit: self.time_unit,
            time: self.position.time,
            interpolation: self.position.interpolation,
            base_frame: self.base_frame,
            frame: self.position.frame,
            preload_length: self.preload.length(),
            ..PlayerSettings::default()
        }
    }

    pub fn state(&self) -> PlayerState {
        if self.session.is_none() {
            PlayerState::Closed
        } else if self.deferred.is_some() || self.last_applied_time != Some(self.position.time) {
            PlayerState::OpenDirty
        } else {
            PlayerState::OpenIdle
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn time(&self) -> f64 {
        self.position.time
    }

    pub fn frame(&self) -> i64 {
        self.position.frame
    }

    pub fn interpolation(&self) -> bool {
        self.position.interpolation
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    pub fn base_frame(&self) -> BaseFrame {
        self.base_frame
    }

    pub fn preload_length(&self) -> usize {
        self.preload.length()
    }

    pub fn requested_normalized_time(&self) -> f64 {
        self.position.normalized_time
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        self.range
    }

    pub fn snapshot_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.snapshot_count())
    }

    /// Full path of the open cache, with `/` separators.
    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    /// Latest profile sample, if profiling is enabled.
    pub fn profile(&self) -> Option<&ProfileSample> {
        self.profile.latest()
    }

    pub fn profile_report(&self) -> Option<String> {
        self.profile.report()
    }

    /// Curve mapping time to itself over the open cache, for authoring.
    pub fn time_curve(&self, mode: InterpolationMode) -> Option<TimeCurve> {
        self.session
            .as_ref()
            .map(|session| session.time_curve(mode))
    }

    /// Rebuilds the animation clip driving this player from the open cache.
    pub fn reset_time_animation(
        &self,
        assets_dir: &Path,
        name: &str,
    ) -> Result<Option<AnimationClip>> {
        let session = self.session.as_ref().ok_or(PlayerError::NotOpen)?;
        reset_time_animation(session, self.time_unit, self.base_frame, assets_dir, name)
    }

    pub fn reconciler(&self) -> &R {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut R {
        &mut self.reconciler
    }

    /// Re-resolves the stored position under the current unit and base frame.
    fn resolve_current(&mut self) -> Vec<Event> {
        let request = match self.time_unit {
            TimeUnit::Seconds => PositionRequest::Time(self.position.time),
            TimeUnit::Frames => PositionRequest::Frame(self.position.frame),
        };
        self.request_position(request)
    }

    fn load(&mut self, time: f64, update_non_material_assets: bool) -> Vec<Event> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let mut events = Vec::with_capacity(2);
        let current_frame = session.time_to_frame(time);
        let sync = self.preload.sync(session, current_frame);
        events.push(Event::PreloadSynced(sync));
        self.last_applied_time = Some(time);

        let interpolate = self.position.interpolation && self.time_unit == TimeUnit::Seconds;
        let fetch_started = Instant::now();
        let snapshot = session.fetch(time, interpolate);
        let fetch_time_ms = elapsed_ms(fetch_started);
        self.log_preload(&sync);

        let Some(snapshot) = snapshot else {
            warn!(time, "no snapshot resolvable at time");
            events.push(Event::SnapshotMissed { time });
            return events;
        };

        let update_started = Instant::now();
        self.reconciler.before_update();
        self.reconciler
            .update_scene(&snapshot, update_non_material_assets);
        if let Some(request) = self.reconciler.after_update() {
            debug!(?request, "position request from scene update deferred to next tick");
            self.deferred = Some(request);
        }
        let update_time_ms = elapsed_ms(update_started);

        let profile = if self.config.profiling {
            self.profile
                .record(fetch_time_ms, update_time_ms, snapshot.profile());
            self.profile.latest().copied()
        } else {
            None
        };
        debug!(time, frame = self.position.frame, fetch_time_ms, "snapshot applied");
        events.push(Event::SnapshotApplied {
            time,
            frame: self.position.frame,
            profile,
        });
        events
    }

    fn log_preload(&self, sync: &PreloadSync) {
        if self.config.log_policy.cache_events() {
            debug!(
                from_frame = sync.from_frame,
                pushed_length = ?sync.pushed_length,
                "preload window synced"
            );
        }
    }
}

impl<S: CacheStore, R> fmt::Debug for PlaybackEngine<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("file_path", &self.file_path)
            .field("range", &self.range)
            .field("position", &self.position)
            .field("time_unit", &self.time_unit)
            .field("base_frame", &self.base_frame)
            .field("preload", &self.preload)
            .field("last_applied_time", &self.last_applied_time)
            .field("deferred", &self.deferred)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use super::{Command, Event, PlaybackEngine, PlayerErrorKind, PlayerState};
    use crate::authoring::InterpolationMode;
    use crate::config::{EngineConfig, LogPolicy};
    use crate::error::PlayerError;
    use crate::settings::{PlayerSettings, normalize_path};
    use crate::test_support::{Call, FakeStore, RecordingReconciler, count_calls};
    use crate::time::{BaseFrame, PositionRequest, TimeRange, TimeUnit};

    type TestEngine = PlaybackEngine<FakeStore, RecordingReconciler>;

    fn engine_with(times: Vec<f64>) -> (TestEngine, FakeStore, Arc<Mutex<Vec<Call>>>) {
        let store = FakeStore::new(times);
        let calls = store.calls();
        let reconciler = RecordingReconciler::new(store.calls());
        (PlaybackEngine::new(store.clone(), reconciler), store, calls)
    }

    fn five_frames() -> Vec<f64> {
        vec![0.0, 0.25, 0.5, 0.75, 1.0]
    }

    fn open(engine: &mut TestEngine) -> Vec<Event> {
        engine
            .open(Path::new("caches/shot.scache"))
            .expect("open should succeed")
    }

    fn full_path(path: &str) -> String {
        normalize_path(&std::path::absolute(path).expect("absolute test path"))
    }

    fn fetches_at(calls: &Arc<Mutex<Vec<Call>>>, time: f64) -> usize {
        count_calls(calls, |call| matches!(call, Call::Fetch { time: t, .. } if *t == time))
    }

    fn clear(calls: &Arc<Mutex<Vec<Call>>>) {
        calls.lock().expect("lock calls").clear();
    }

    #[test]
    fn normalized_request_scales_by_range_end() {
        let (mut engine, _, calls) = engine_with(vec![0.0, 5.0, 10.0]);
        open(&mut engine);

        engine.request_position(PositionRequest::Normalized(0.5));
        engine.tick();

        assert_eq!(engine.time(), 5.0);
        assert_eq!(engine.requested_normalized_time(), 0.5);
        assert_eq!(fetches_at(&calls, 5.0), 1);
    }

    #[test]
    fn frames_clamp_to_base_one_bounds() {
        let (mut engine, _, _) = engine_with(five_frames());
        open(&mut engine);
        engine.set_time_unit(TimeUnit::Frames);

        engine.set_frame(0);
        assert_eq!(engine.frame(), 1);
        assert_eq!(engine.time(), 0.0);

        engine.set_frame(10);
        assert_eq!(engine.frame(), 5);
        assert_eq!(engine.time(), 1.0);
    }

    #[test]
    fn failed_open_stays_closed_and_ignores_requests() {
        let (mut engine, _, calls) = engine_with(five_frames());

        let result = engine.open(Path::new("missing/shot.scache"));

        assert!(matches!(result, Err(PlayerError::CacheOpen { .. })));
        assert_eq!(engine.state(), PlayerState::Closed);
        assert_eq!(engine.time_range(), None);
        assert!(engine.set_time(0.5).is_empty());
        assert!(engine.tick().is_empty());
        assert!(calls.lock().expect("lock calls").is_empty());
    }

    #[test]
    fn reopen_after_close_primes_frame_zero_again() {
        let (mut engine, _, calls) = engine_with(five_frames());
        open(&mut engine);
        engine.set_time(0.5);
        engine.tick();

        assert_eq!(engine.close(), vec![Event::Closed]);
        assert_eq!(engine.state(), PlayerState::Closed);
        assert_eq!(engine.time_range(), None);
        open(&mut engine);

        assert_eq!(count_calls(&calls, |call| *call == Call::Close), 1);
        assert_eq!(fetches_at(&calls, 0.0), 2);
    }

    #[test]
    fn open_primes_frame_zero_with_non_material_assets() {
        let (mut engine, _, calls) = engine_with(five_frames());

        let events = open(&mut engine);

        assert!(matches!(
            events.first(),
            Some(Event::Opened { snapshot_count: 5, .. })
        ));
        assert!(events.iter().any(|event| matches!(
            event,
            Event::SnapshotApplied { time, .. } if *time == 0.0
        )));
        assert!(calls.lock().expect("lock calls").contains(&Call::UpdateScene {
            time: 0.0,
            update_non_material_assets: true,
        }));
        assert_eq!(engine.time_range(), Some(TimeRange::new(0.0, 1.0)));
        assert_eq!(engine.file_path(), Some(full_path("caches/shot.scache").as_str()));
        assert_eq!(engine.state(), PlayerState::OpenIdle);
    }

    #[test]
    fn repeated_ticks_apply_a_position_once() {
        let (mut engine, _, calls) = engine_with(five_frames());
        open(&mut engine);

        engine.set_time(0.6);
        assert_eq!(engine.state(), PlayerState::OpenDirty);
        engine.tick();
        engine.tick();
        engine.set_time(0.6);
        engine.tick();

        assert_eq!(fetches_at(&calls, 0.6), 1);
        assert_eq!(count_calls(&calls, |call| *call == Call::BeforeUpdate), 2);
        assert_eq!(count_calls(&calls, |call| *call == Call::AfterUpdate), 2);
        assert_eq!(engine.state(), PlayerState::OpenIdle);
    }

    #[test]
    fn hooks_run_in_order_after_preload_and_fetch() {
        let (mut engine, _, calls) = engine_with(five_frames());
        open(&mut engine);
        clear(&calls);

        engine.set_time(0.5);
        engine.tick();

        assert_eq!(
            *calls.lock().expect("lock calls"),
            vec![
                Call::Preload(2),
                Call::Fetch {
                    time: 0.5,
                    interpolate: false,
                },
                Call::BeforeUpdate,
                Call::UpdateScene {
                    time: 0.5,
                    update_non_material_assets: false,
                },
                Call::AfterUpdate,
            ]
        );
    }

    #[test]
    fn preload_change_without_position_change_only_syncs() {
        let (mut engine, _, calls) = engine_with(five_frames());
        open(&mut engine);
        let profile_before = engine.profile().copied();
        clear(&calls);

        engine.set_preload_length(3);
        let events = engine.tick();

        assert_eq!(
            *calls.lock().expect("lock calls"),
            vec![Call::SetPreloadLength(3), Call::Preload(0)]
        );
        assert!(matches!(
            events.as_slice(),
            [Event::PreloadSynced(sync)] if sync.pushed_length == Some(3)
        ));
        assert_eq!(engine.profile().copied(), profile_before);
        assert!(engine.tick().is_empty());
    }

    #[test]
    fn switching_to_frames_forces_interpolation_off() {
        let (mut engine, _, _) = engine_with(five_frames());
        open(&mut engine);
        engine.set_interpolation(true);
        engine.set_time(0.6);

        engine.set_time_unit(TimeUnit::Frames);

        assert!(!engine.interpolation());
        assert_eq!(engine.time(), 0.25);
        assert_eq!(engine.frame(), 2);
    }

    #[test]
    fn interpolation_reaches_fetch_only_in_seconds() {
        let (mut engine, _, calls) = engine_with(five_frames());
        open(&mut engine);
        engine.set_interpolation(true);
        engine.set_time(0.6);
        engine.tick();

        assert!(calls.lock().expect("lock calls").contains(&Call::Fetch {
            time: 0.6,
            interpolate: true,
        }));

        engine.set_time_unit(TimeUnit::Frames);
        engine.set_interpolation(true);
        engine.set_frame(5);
        engine.tick();

        assert!(calls.lock().expect("lock calls").contains(&Call::Fetch {
            time: 1.0,
            interpolate: false,
        }));
    }

    #[test]
    fn fetch_miss_skips_hooks_and_returns_to_idle() {
        let (mut engine, store, calls) = engine_with(five_frames());
        open(&mut engine);
        let hooks_before = count_calls(&calls, |call| *call == Call::BeforeUpdate);
        store.miss_next_fetches(1);

        engine.set_time(0.75);
        let events = engine.tick();

        assert!(events.contains(&Event::SnapshotMissed { time: 0.75 }));
        assert_eq!(
            count_calls(&calls, |call| *call == Call::BeforeUpdate),
            hooks_before
        );
        assert_eq!(engine.state(), PlayerState::OpenIdle);
        engine.tick();
        assert_eq!(fetches_at(&calls, 0.75), 1);

        engine.handle_command(Command::Refresh).expect("refresh");
        let events = engine.tick();

        assert_eq!(fetches_at(&calls, 0.75), 2);
        assert!(events.iter().any(|event| matches!(
            event,
            Event::SnapshotApplied { time, .. } if *time == 0.75
        )));
    }

    #[test]
    fn position_requested_by_reconciler_waits_for_next_tick() {
        let (mut engine, _, calls) = engine_with(five_frames());
        open(&mut engine);
        engine.reconciler_mut().defer_after_update = Some(PositionRequest::Time(1.0));

        engine.set_time(0.25);
        engine.tick();

        assert_eq!(engine.time(), 0.25);
        assert_eq!(fetches_at(&calls, 1.0), 0);
        assert_eq!(engine.state(), PlayerState::OpenDirty);

        engine.tick();

        assert_eq!(engine.time(), 1.0);
        assert_eq!(fetches_at(&calls, 1.0), 1);
    }

    #[test]
    fn commands_while_closed_do_nothing() {
        let (mut engine, _, calls) = engine_with(five_frames());

        for command in [
            Command::RequestTime { time: 0.5 },
            Command::RequestNormalizedTime { value: 0.5 },
            Command::RequestFrame { frame: 3 },
            Command::Tick,
            Command::Close,
        ] {
            let events = engine.handle_command(command).expect("command is a no-op");
            assert!(events.is_empty());
        }
        assert_eq!(engine.state(), PlayerState::Closed);
        assert_eq!(engine.time(), 0.0);
        assert!(calls.lock().expect("lock calls").is_empty());
    }

    #[test]
    fn opening_a_second_cache_closes_the_first() {
        let (mut engine, _, calls) = engine_with(five_frames());
        open(&mut engine);

        let events = engine
            .handle_command(Command::Open {
                path: PathBuf::from("caches/other.scache"),
            })
            .expect("second open should succeed");

        assert_eq!(events.first(), Some(&Event::Closed));
        let calls = calls.lock().expect("lock calls");
        let close_index = calls
            .iter()
            .position(|call| *call == Call::Close)
            .expect("first session closed");
        let open_index = calls
            .iter()
            .position(|call| *call == Call::Open(PathBuf::from("caches/other.scache")))
            .expect("second session opened");
        assert!(close_index < open_index);
        assert_eq!(engine.file_path(), Some(full_path("caches/other.scache").as_str()));
    }

    #[test]
    fn dispatch_reports_open_failures_as_events() {
        let (mut engine, _, _) = engine_with(five_frames());

        let events = engine.dispatch(Command::Open {
            path: PathBuf::from("missing/shot.scache"),
        });

        let [Event::Error(error)] = events.as_slice() else {
            panic!("open failure must emit a single error event");
        };
        assert_eq!(error.kind, PlayerErrorKind::CacheOpen);
        assert!(error.message.contains("missing/shot.scache"));
    }

    #[test]
    fn failed_reopen_still_reports_the_close() {
        let (mut engine, _, calls) = engine_with(five_frames());
        engine
            .open(Path::new("caches/a.scache"))
            .expect("first open should succeed");

        let events = engine.dispatch(Command::Open {
            path: PathBuf::from("missing/b.scache"),
        });

        let [Event::Closed, Event::Error(error)] = events.as_slice() else {
            panic!("failed reopen must report the close, then the error: {events:?}");
        };
        assert_eq!(error.kind, PlayerErrorKind::CacheOpen);
        assert_eq!(engine.state(), PlayerState::Closed);
        assert_eq!(engine.file_path(), None);
        assert_eq!(count_calls(&calls, |call| *call == Call::Close), 1);
    }

    #[test]
    fn stored_path_is_absolute_with_forward_slashes() {
        let (mut engine, _, _) = engine_with(five_frames());
        open(&mut engine);

        let stored = engine.file_path().expect("open cache has a path");

        assert!(Path::new(stored).is_absolute());
        assert!(stored.ends_with("caches/shot.scache"));
        assert!(!stored.contains('\\'));
        assert!(matches!(
            engine.settings().scene_cache_file_path.as_deref(),
            Some(path) if path == stored
        ));
    }

    #[test]
    fn profiling_disabled_records_nothing() {
        let store = FakeStore::new(five_frames());
        let reconciler = RecordingReconciler::new(store.calls());
        let mut engine = PlaybackEngine::with_config(
            store,
            reconciler,
            EngineConfig {
                log_policy: LogPolicy::Verbose,
                profiling: false,
            },
        );
        open(&mut engine);
        engine.set_time(0.5);
        let events = engine.tick();

        assert!(engine.profile().is_none());
        assert!(events.iter().any(|event| matches!(
            event,
            Event::SnapshotApplied { profile: None, .. }
        )));
    }

    #[test]
    fn applied_snapshot_profile_is_reported() {
        let (mut engine, _, _) = engine_with(five_frames());
        open(&mut engine);

        let report = engine.profile_report().expect("primed frame is profiled");

        assert!(report.contains("Cache: 1.2KB encoded, 4.8KB decoded, 100 verts"));
    }

    #[test]
    fn base_frame_change_reclamps_frame() {
        let (mut engine, _, _) = engine_with(five_frames());
        open(&mut engine);
        engine.set_time_unit(TimeUnit::Frames);
        engine.set_frame(5);

        engine.set_base_frame(BaseFrame::Zero);

        assert_eq!(engine.frame(), 4);
        assert_eq!(engine.time(), 1.0);
    }

    #[test]
    fn settings_restore_position_and_capture_it_back() {
        let (mut engine, _, calls) = engine_with(five_frames());
        let settings = PlayerSettings {
            scene_cache_file_path: Some("caches/shot.scache".to_string()),
            time_unit: TimeUnit::Frames,
            frame: 3,
            interpolation: true,
            preload_length: 4,
            ..PlayerSettings::default()
        };

        engine.apply_settings(&settings).expect("settings apply");
        engine.tick();

        assert!(engine.is_open());
        assert_eq!(engine.frame(), 3);
        assert_eq!(engine.time(), 0.5);
        assert!(!engine.interpolation());
        assert_eq!(fetches_at(&calls, 0.5), 1);
        assert!(calls
            .lock()
            .expect("lock calls")
            .contains(&Call::SetPreloadLength(4)));

        let captured = engine.settings();
        assert_eq!(
            captured.scene_cache_file_path,
            Some(full_path("caches/shot.scache"))
        );
        assert_eq!(captured.frame, 3);
        assert_eq!(captured.time, 0.5);
        assert_eq!(captured.preload_length, 4);
        assert!(!captured.interpolation);
    }

    #[test]
    fn settings_without_path_close_the_engine() {
        let (mut engine, _, _) = engine_with(five_frames());
        open(&mut engine);

        let events = engine
            .apply_settings(&PlayerSettings::default())
            .expect("settings apply");

        assert_eq!(events, vec![Event::Closed]);
        assert_eq!(engine.state(), PlayerState::Closed);
        assert_eq!(engine.settings().scene_cache_file_path, None);
    }

    #[test]
    fn animation_reset_requires_an_open_cache() {
        let (engine, _, _) = engine_with(five_frames());

        let result = engine.reset_time_animation(Path::new("assets"), "shot");

        assert!(matches!(result, Err(PlayerError::NotOpen)));
    }

    #[test]
    fn time_curve_is_available_only_while_open() {
        let (mut engine, _, _) = engine_with(five_frames());
        assert!(engine.time_curve(InterpolationMode::Constant).is_none());

        open(&mut engine);
        let curve = engine
            .time_curve(InterpolationMode::Constant)
            .expect("open cache has a curve");

        assert_eq!(curve.keys.len(), 5);
        assert_eq!(curve.evaluate(0.6), Some(0.5));
    }
}
