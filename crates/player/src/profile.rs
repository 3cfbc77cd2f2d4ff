use std::fmt::Write as _;

const KB: u64 = 1_000;
const MB: u64 = 1_000_000;

/// Load and decode cost reported by the cache store for one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnapshotProfile {
    pub encoded_bytes: u64,
    pub decoded_bytes: u64,
    pub vertex_count: u64,
    pub load_time_ms: f64,
    pub read_time_ms: f64,
    pub decode_time_ms: f64,
    pub setup_time_ms: f64,
    pub interpolate_time_ms: f64,
}

/// Timings of one applied position update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfileSample {
    /// Time spent in the cache fetch.
    pub fetch_time_ms: f64,
    /// Time spent applying the snapshot to the scene, hooks included.
    pub update_time_ms: f64,
    pub snapshot: SnapshotProfile,
}

/// Keeps the sample of the latest applied update. Purely diagnostic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileRecorder {
    latest: Option<ProfileSample>,
}

impl ProfileRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the previous sample.
    pub fn record(&mut self, fetch_time_ms: f64, update_time_ms: f64, snapshot: SnapshotProfile) {
        self.latest = Some(ProfileSample {
            fetch_time_ms,
            update_time_ms,
            snapshot,
        });
    }

    pub fn latest(&self) -> Option<&ProfileSample> {
        self.latest.as_ref()
    }

    pub fn clear(&mut self) {
        self.latest = None;
    }

    /// Formats the latest sample, if any.
    pub fn report(&self) -> Option<String> {
        self.latest.as_ref().map(render)
    }
}

/// Formats a sample as a multi-line report.
///
/// # Example
/// ```
/// use player::{ProfileSample, SnapshotProfile, render_profile};
///
/// let sample = ProfileSample {
///     fetch_time_ms: 1.5,
///     update_time_ms: 0.25,
///     snapshot: SnapshotProfile {
///         encoded_bytes: 2_500,
///         decoded_bytes: 10_000,
///         ..SnapshotProfile::default()
///     },
/// };
/// let report = render_profile(&sample);
/// assert!(report.starts_with("Scene Get: 1.5ms\n"));
/// assert!(report.contains("Cache: 2.5KB encoded, 10KB decoded"));
/// ```
pub fn render(sample: &ProfileSample) -> String {
    let profile = &sample.snapshot;
    let mut out = String::new();

    let _ = writeln!(out, "Scene Get: {}ms", format_ms(sample.fetch_time_ms));
    let _ = writeln!(out, "Scene Update: {}ms", format_ms(sample.update_time_ms));
    out.push('\n');

    let _ = writeln!(
        out,
        "Cache: {} encoded, {} decoded, {} verts",
        format_size(profile.encoded_bytes, profile.encoded_bytes),
        format_size(profile.decoded_bytes, profile.encoded_bytes),
        profile.vertex_count
    );
    let _ = writeln!(out, "Cache Load: {}ms", format_ms(profile.load_time_ms));
    let _ = writeln!(
        out,
        "  Cache Read: {}ms ({}MB/sec)",
        format_ms(profile.read_time_ms),
        format_ms(read_throughput_mb_per_sec(profile))
    );
    let _ = writeln!(
        out,
        "  Cache Decode: {}ms (total of worker threads)",
        format_ms(profile.decode_time_ms)
    );
    if profile.setup_time_ms > 0.0 {
        let _ = writeln!(out, "Setup Scene: {}ms", format_ms(profile.setup_time_ms));
    }
    if profile.interpolate_time_ms > 0.0 {
        let _ = writeln!(
            out,
            "Interpolate Scene: {}ms",
            format_ms(profile.interpolate_time_ms)
        );
    }
    out
}

/// The unit is picked from the encoded size so both figures share it.
fn format_size(bytes: u64, unit_basis: u64) -> String {
    if unit_basis > MB {
        format!("{}MB", format_ms(bytes as f64 / MB as f64))
    } else if unit_basis > KB {
        format!("{}KB", format_ms(bytes as f64 / KB as f64))
    } else {
        format!("{bytes}B")
    }
}

fn read_throughput_mb_per_sec(profile: &SnapshotProfile) -> f64 {
    if profile.read_time_ms <= 0.0 {
        return 0.0;
    }
    (profile.encoded_bytes as f64 / MB as f64) / (profile.read_time_ms / 1000.0)
}

/// At most two decimals, trailing zeros dropped.
fn format_ms(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
