use std::sync::Arc;
use std::time::Instant;

use crate::error::{Result, SceneCacheError};
use crate::format::SceneRecord;

const POINT_BYTES: u64 = 12;

/// A decoded scene ready to be applied to a live scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneData {
    pub index: usize,
    pub time: f64,
    pub entities: Vec<Entity>,
    pub profile: SceneProfile,
}

/// One decoded entity.
///
/// Points inherited from frame 0 share the same allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub path: String,
    pub points: Arc<[[f32; 3]]>,
    pub material: Option<String>,
}

/// Load and decode cost of one scene.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SceneProfile {
    pub size_encoded: u64,
    pub size_decoded: u64,
    pub vertex_count: u64,
    pub load_time_ms: f64,
    pub read_time_ms: f64,
    pub decode_time_ms: f64,
    pub setup_time_ms: f64,
    pub lerp_time_ms: f64,
}

impl SceneData {
    /// Returns the entity at `path`, if present.
    pub fn entity(&self, path: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.path == path)
    }

    /// Total number of points across all entities.
    pub fn vertex_count(&self) -> u64 {
        self.entities
            .iter()
            .map(|entity| entity.points.len() as u64)
            .sum()
    }
}

/// Decodes one encoded scene line.
///
/// Entities that omit their points are resolved against `base`, the decoded
/// frame 0. Frame 0 itself must carry full geometry.
pub(crate) fn decode_scene(
    index: usize,
    line: &[u8],
    base: Option<&SceneData>,
    read_time_ms: f64,
) -> Result<SceneData> {
    let decode_begin = Instant::now();
    let record: SceneRecord =
        serde_json::from_slice(line).map_err(|source| SceneCacheError::Json {
            context: "decode scene",
            source,
        })?;
    let decode_time_ms = elapsed_ms(decode_begin);

    let setup_begin = Instant::now();
    let mut entities = Vec::with_capacity(record.entities.len());
    for entity in record.entities {
        let points: Arc<[[f32; 3]]> = match entity.points {
            Some(points) => Arc::from(points),
            None => base
                .and_then(|base| base.entity(&entity.path))
                .map(|inherited| Arc::clone(&inherited.points))
                .ok_or_else(|| SceneCacheError::MissingBaseEntity {
                    path: entity.path.clone(),
                })?,
        };
        entities.push(Entity {
            path: entity.path,
            points,
            material: entity.material,
        });
    }
    let setup_time_ms = elapsed_ms(setup_begin);

    let size_decoded = entities
        .iter()
        .map(|entity| {
            entity.points.len() as u64 * POINT_BYTES
                + entity.path.len() as u64
                + entity.material.as_ref().map_or(0, |m| m.len() as u64)
        })
        .sum();

    let mut scene = SceneData {
        index,
        time: record.time,
        entities,
        profile: SceneProfile {
            size_encoded: line.len() as u64,
            size_decoded,
            vertex_count: 0,
            load_time_ms: read_time_ms + decode_time_ms,
            read_time_ms,
            decode_time_ms,
            setup_time_ms,
            lerp_time_ms: 0.0,
        },
    };
    scene.profile.vertex_count = scene.vertex_count();
    Ok(scene)
}

/// Blends `from` towards `to` at `time`.
///
/// Only entities present in both scenes with the same point count are
/// blended; everything else is taken from `from`.
pub(crate) fn interpolate(from: &SceneData, to: &SceneData, time: f64) -> SceneData {
    let begin = Instant::now();
    let span = to.time - from.time;
    let t = if span > 0.0 {
        ((time - from.time) / span).clamp(0.0, 1.0) as f32
    } else {
        0.0
    };

    let entities = from
        .entities
        .iter()
        .map(|entity| match to.entity(&entity.path) {
            Some(next) if next.points.len() == entity.points.len() => Entity {
                path: entity.path.clone(),
                points: entity
                    .points
                    .iter()
                    .zip(next.points.iter())
                    .map(|(a, b)| lerp_point(*a, *b, t))
                    .collect(),
                material: entity.material.clone(),
            },
            _ => entity.clone(),
        })
        .collect();

    let mut profile = from.profile;
    profile.lerp_time_ms = elapsed_ms(begin);
    SceneData {
        index: from.index,
        time,
        entities,
        profile,
    }
}

fn lerp_point(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

pub(crate) fn elapsed_ms(begin: Instant) -> f64 {
    begin.elapsed().as_secs_f64() * 1000.0
}
