use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand, ValueEnum};
use player::{
    BaseFrame, Command as PlayerCommand, EngineConfig, Event, LogPolicy, NullReconciler,
    PlaybackEngine, SceneCacheStore, SceneReconciler, TimeUnit, load_settings,
    save_settings,
};
use scene_cache::{EntityRecord, SceneCache, SceneData, SceneRecord, write_cache};
use tracing::{debug, info};

const DEFAULT_LOG_FILTER: &str = "warn,player=info,scene_cache=info";

#[derive(Parser, Debug)]
#[command(name = "scene-cache-player", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a small demo cache.
    Generate(GenerateArgs),
    /// Print the time range and snapshot count of a cache.
    Inspect(InspectArgs),
    /// Sweep playback across a cache and report what was applied.
    Play(PlayArgs),
    /// Upgrade a settings file to the current version.
    MigrateSettings(MigrateArgs),
    /// Write the animation clip that drives playback of a cache.
    Animate(AnimateArgs),
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Output cache path.
    #[arg(long)]
    out: PathBuf,

    /// Number of snapshots.
    #[arg(long, default_value_t = 24)]
    frames: usize,

    /// Snapshots per second.
    #[arg(long, default_value_t = 24.0)]
    sample_rate: f64,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[arg(long)]
    cache: PathBuf,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Cache to open. Overrides the path stored in `--settings`.
    #[arg(long)]
    cache: Option<PathBuf>,

    #[arg(long, value_enum)]
    unit: Option<UnitArg>,

    #[arg(long, value_enum)]
    base_frame: Option<BaseFrameArg>,

    /// Snapshots kept decoded ahead of the playhead.
    #[arg(long)]
    preload: Option<usize>,

    /// Blend between snapshots (seconds only).
    #[arg(long, default_value_t = false)]
    interpolate: bool,

    /// Number of ticks across the normalized range.
    #[arg(long, default_value_t = 10)]
    steps: u32,

    /// Settings file restored before playing and written back afterwards.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print the profile report of the last applied snapshot.
    #[arg(long, default_value_t = false)]
    profile: bool,

    /// Log cache open, close and preload activity.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct MigrateArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long)]
    out: PathBuf,

    /// Directory project-relative legacy paths are resolved against.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct AnimateArgs {
    #[arg(long)]
    cache: PathBuf,

    /// Directory the clip is written to.
    #[arg(long)]
    assets: PathBuf,

    /// Clip name; the file is `<name>.anim.json`.
    #[arg(long)]
    name: String,

    #[arg(long, value_enum, default_value_t = UnitArg::Seconds)]
    unit: UnitArg,

    #[arg(long, value_enum, default_value_t = BaseFrameArg::One)]
    base_frame: BaseFrameArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UnitArg {
    Seconds,
    Frames,
}

impl From<UnitArg> for TimeUnit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Seconds => Self::Seconds,
            UnitArg::Frames => Self::Frames,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BaseFrameArg {
    Zero,
    One,
}

impl From<BaseFrameArg> for BaseFrame {
    fn from(value: BaseFrameArg) -> Self {
        match value {
            BaseFrameArg::Zero => Self::Zero,
            BaseFrameArg::One => Self::One,
        }
    }
}

/// Summary of the last snapshot handed to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AppliedScene {
    index: usize,
    entities: usize,
    vertices: u64,
    non_material_assets: bool,
}

/// Reconciler that records what it was given instead of building a scene.
#[derive(Debug, Default)]
struct SceneSummary {
    last: Option<AppliedScene>,
    applied: usize,
}

impl SceneReconciler<Arc<SceneData>> for SceneSummary {
    fn update_scene(&mut self, snapshot: &Arc<SceneData>, update_non_material_assets: bool) {
        let applied = AppliedScene {
            index: snapshot.index,
            entities: snapshot.entities.len(),
            vertices: snapshot.vertex_count(),
            non_material_assets: update_non_material_assets,
        };
        debug!(?applied, "scene updated");
        self.last = Some(applied);
        self.applied += 1;
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Play(args) => cmd_play(args),
        Command::MigrateSettings(args) => cmd_migrate_settings(args),
        Command::Animate(args) => cmd_animate(args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    if args.frames == 0 {
        bail!("--frames must be at least 1");
    }
    if args.sample_rate <= 0.0 {
        bail!("--sample-rate must be positive");
    }
    if let Some(parent) = args.out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let scenes = demo_scenes(args.frames, args.sample_rate);
    write_cache(&args.out, args.sample_rate, &scenes)
        .with_context(|| format!("write cache '{}'", args.out.display()))?;

    info!(path = ?args.out, frames = args.frames, "demo cache written");
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let cache = SceneCache::open(&args.cache)
        .with_context(|| format!("open cache '{}'", args.cache.display()))?;
    let (start, end) = cache.time_range();

    println!("path: {}", args.cache.display());
    println!("snapshots: {}", cache.scene_count());
    println!("time range: {start}s .. {end}s");
    if cache.sample_rate() > 0.0 {
        println!("sample rate: {}fps", cache.sample_rate());
    } else {
        println!("sample rate: unknown");
    }
    Ok(())
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let config = EngineConfig {
        log_policy: if args.verbose {
            LogPolicy::Verbose
        } else {
            LogPolicy::Quiet
        },
        profiling: true,
    };
    let mut engine = PlaybackEngine::with_config(SceneCacheStore, SceneSummary::default(), config);

    if let Some(settings_path) = args.settings.as_deref().filter(|path| path.exists()) {
        let settings = load_settings(settings_path, &settings_base_dir(settings_path))
            .with_context(|| format!("load settings '{}'", settings_path.display()))?;
        engine
            .apply_settings(&settings)
            .with_context(|| format!("apply settings '{}'", settings_path.display()))?;
    }

    if let Some(base_frame) = args.base_frame {
        engine.set_base_frame(base_frame.into());
    }
    if let Some(unit) = args.unit {
        engine.set_time_unit(unit.into());
    }
    if args.interpolate {
        engine.set_interpolation(true);
    }
    if let Some(length) = args.preload {
        engine.set_preload_length(length);
    }
    if let Some(cache) = args.cache.as_deref() {
        engine
            .open(cache)
            .with_context(|| format!("open cache '{}'", cache.display()))?;
    }
    if !engine.is_open() {
        bail!("nothing to play: pass --cache or a settings file naming a cache");
    }

    for step in 0..=args.steps {
        let value = if args.steps == 0 {
            0.0
        } else {
            f64::from(step) / f64::from(args.steps)
        };
        let mut events = engine.dispatch(PlayerCommand::RequestNormalizedTime { value });
        events.extend(engine.dispatch(PlayerCommand::Tick));
        for event in &events {
            report_event(event, engine.reconciler());
        }
    }

    println!(
        "applied {} snapshots, final time {}s, frame {}",
        engine.reconciler().applied,
        engine.time(),
        engine.frame()
    );
    if args.profile {
        match engine.profile_report() {
            Some(report) => print!("{report}"),
            None => println!("no snapshot was applied"),
        }
    }

    if let Some(settings_path) = args.settings.as_deref() {
        save_settings(settings_path, &engine.settings())
            .with_context(|| format!("save settings '{}'", settings_path.display()))?;
    }
    engine.close();
    Ok(())
}

fn cmd_migrate_settings(args: MigrateArgs) -> anyhow::Result<()> {
    let settings = load_settings(&args.in_path, &args.base_dir)
        .with_context(|| format!("migrate settings '{}'", args.in_path.display()))?;
    save_settings(&args.out, &settings)
        .with_context(|| format!("write settings '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_animate(args: AnimateArgs) -> anyhow::Result<()> {
    let mut engine = PlaybackEngine::with_scene_cache(NullReconciler);
    engine.set_base_frame(args.base_frame.into());
    engine.set_time_unit(args.unit.into());
    engine
        .open(&args.cache)
        .with_context(|| format!("open cache '{}'", args.cache.display()))?;

    let clip = engine
        .reset_time_animation(&args.assets, &args.name)
        .with_context(|| format!("write animation clip '{}'", args.name))?;
    match clip {
        Some(clip) => println!(
            "wrote {} ({} keys)",
            player::clip_path(&args.assets, &args.name).display(),
            clip.curve.keys.len()
        ),
        None => println!("cache has fewer than two snapshots, nothing to animate"),
    }
    engine.close();
    Ok(())
}

fn report_event(event: &Event, scene: &SceneSummary) {
    match event {
        Event::SnapshotApplied { time, frame, .. } => match scene.last {
            Some(applied) => println!(
                "t={time:.3}s frame={frame} snapshot={} entities={} verts={}{}",
                applied.index,
                applied.entities,
                applied.vertices,
                if applied.non_material_assets {
                    " (full rebuild)"
                } else {
                    ""
                }
            ),
            None => println!("t={time:.3}s frame={frame}"),
        },
        Event::SnapshotMissed { time } => println!("t={time:.3}s no snapshot"),
        Event::Error(error) => eprintln!("error: {}", error.message),
        _ => {}
    }
}

/// Legacy project-relative paths resolve against the settings file's folder.
fn settings_base_dir(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// A cube orbiting the origin plus a static ground plane written only once.
fn demo_scenes(frames: usize, sample_rate: f64) -> Vec<SceneRecord> {
    const CUBE: [[f32; 3]; 8] = [
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ];
    const GROUND: [[f32; 3]; 4] = [
        [-5.0, -1.0, -5.0],
        [5.0, -1.0, -5.0],
        [5.0, -1.0, 5.0],
        [-5.0, -1.0, 5.0],
    ];

    (0..frames)
        .map(|index| {
            let time = index as f64 / sample_rate;
            let angle = (index as f32 / frames as f32) * std::f32::consts::TAU;
            let (dx, dz) = (angle.cos() * 2.0, angle.sin() * 2.0);
            let cube = CUBE
                .iter()
                .map(|[x, y, z]| [x + dx, *y, z + dz])
                .collect();

            let ground = if index == 0 {
                EntityRecord {
                    path: "/world/ground".to_string(),
                    points: Some(GROUND.to_vec()),
                    material: Some("concrete".to_string()),
                }
            } else {
                EntityRecord {
                    path: "/world/ground".to_string(),
                    points: None,
                    material: None,
                }
            };

            SceneRecord {
                time,
                entities: vec![
                    EntityRecord {
                        path: "/world/cube".to_string(),
                        points: Some(cube),
                        material: (index == 0).then(|| "painted".to_string()),
                    },
                    ground,
                ],
            }
        })
        .collect()
}
