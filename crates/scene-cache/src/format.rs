use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneCacheError};

/// Value of the `format` field every cache header must carry.
pub const FORMAT_TAG: &str = "scene-cache";

/// Latest cache file version understood by the reader.
pub const FORMAT_VERSION: u32 = 1;

/// First line of a cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHeader {
    pub format: String,
    pub version: u32,
    pub sample_rate: f64,
}

/// One encoded scene, stored as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub time: f64,
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

/// One entity inside a scene record.
///
/// `points: None` means the entity geometry is unchanged from frame 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<[f32; 3]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

/// Time-only view of a scene line, used while indexing without a full decode.
#[derive(Debug, Deserialize)]
pub(crate) struct SceneTime {
    pub time: f64,
}

/// Writes a cache file containing `scenes` in order.
///
/// # Example
/// ```no_run
/// use scene_cache::{EntityRecord, SceneRecord, write_cache};
///
/// let scenes = vec![SceneRecord {
///     time: 0.0,
///     entities: vec![EntityRecord {
///         path: "/root/cube".to_string(),
///         points: Some(vec![[0.0, 0.0, 0.0]]),
///         material: None,
///     }],
/// }];
/// write_cache("demo.scache", 30.0, &scenes).expect("write should succeed");
/// ```
pub fn write_cache(path: impl AsRef<Path>, sample_rate: f64, scenes: &[SceneRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| SceneCacheError::Io {
        context: "create scene cache",
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let header = CacheHeader {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        sample_rate,
    };
    write_json_line(&mut writer, path, &header)?;
    for scene in scenes {
        write_json_line(&mut writer, path, scene)?;
    }

    writer.flush().map_err(|source| SceneCacheError::Io {
        context: "flush scene cache",
        path: path.to_path_buf(),
        source,
    })
}

fn write_json_line<W: Write, T: Serialize>(writer: &mut W, path: &Path, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, value).map_err(|source| SceneCacheError::Json {
        context: "encode scene cache line",
        source,
    })?;
    writer.write_all(b"\n").map_err(|source| SceneCacheError::Io {
        context: "write scene cache",
        path: path.to_path_buf(),
        source,
    })
}
