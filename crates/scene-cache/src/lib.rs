//! Reference scene cache store: a line-oriented JSON cache file with
//! on-demand decoding and a background preload worker.

mod cache;
mod decode;
mod error;
mod format;
mod preload;
mod source;

pub use cache::SceneCache;
pub use decode::{Entity, SceneData, SceneProfile};
pub use error::{Result, SceneCacheError};
pub use format::{
    CacheHeader, EntityRecord, FORMAT_TAG, FORMAT_VERSION, SceneRecord, write_cache,
};
