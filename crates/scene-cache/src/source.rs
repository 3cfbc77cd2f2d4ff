use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::decode::elapsed_ms;
use crate::error::{Result, SceneCacheError};
use crate::format::{CacheHeader, FORMAT_TAG, FORMAT_VERSION, SceneTime};

/// Byte location and time of one encoded scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SceneEntry {
    pub offset: u64,
    pub len: usize,
    pub time: f64,
}

/// Indexed cache file. Scene lines are read on demand.
#[derive(Debug)]
pub(crate) struct SceneSource {
    pub path: PathBuf,
    pub header: CacheHeader,
    pub entries: Vec<SceneEntry>,
    file: Mutex<File>,
}

impl SceneSource {
    /// Reads the header and indexes every scene line without decoding it.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| SceneCacheError::Io {
            context: "open scene cache",
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut offset = 0u64;

        let header_len = read_line(&mut reader, &mut line, path)?;
        offset += header_len as u64;
        let header = parse_header(path, trim_line(&line))?;

        let mut entries = Vec::new();
        loop {
            let read = read_line(&mut reader, &mut line, path)?;
            if read == 0 {
                break;
            }
            let content = trim_line(&line);
            if !content.is_empty() {
                let scene: SceneTime =
                    serde_json::from_slice(content).map_err(|source| SceneCacheError::Json {
                        context: "index scene time",
                        source,
                    })?;
                if let Some(previous) = entries.last().map(|entry: &SceneEntry| entry.time) {
                    if scene.time <= previous {
                        return Err(SceneCacheError::UnsortedTimes {
                            index: entries.len(),
                            previous,
                            time: scene.time,
                        });
                    }
                }
                entries.push(SceneEntry {
                    offset,
                    len: content.len(),
                    time: scene.time,
                });
            }
            offset += read as u64;
        }

        if entries.is_empty() {
            return Err(SceneCacheError::Empty(path.to_path_buf()));
        }

        let file = reader.into_inner();
        Ok(Self {
            path: path.to_path_buf(),
            header,
            entries,
            file: Mutex::new(file),
        })
    }

    /// Reads the encoded bytes of scene `index`, returning them with the read time in ms.
    pub fn read_scene(&self, index: usize) -> Result<(Vec<u8>, f64)> {
        let entry = self
            .entries
            .get(index)
            .copied()
            .ok_or(SceneCacheError::FrameOutOfRange {
                frame: index,
                count: self.entries.len(),
            })?;

        let begin = Instant::now();
        let mut bytes = vec![0; entry.len];
        {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            file.seek(SeekFrom::Start(entry.offset))
                .and_then(|_| file.read_exact(&mut bytes))
                .map_err(|source| SceneCacheError::Io {
                    context: "read scene",
                    path: self.path.clone(),
                    source,
                })?;
        }
        Ok((bytes, elapsed_ms(begin)))
    }
}

fn read_line(reader: &mut BufReader<File>, line: &mut Vec<u8>, path: &Path) -> Result<usize> {
    line.clear();
    reader
        .read_until(b'\n', line)
        .map_err(|source| SceneCacheError::Io {
            context: "index scene cache",
            path: path.to_path_buf(),
            source,
        })
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r' | b' ' | b'\t') {
        end -= 1;
    }
    &line[..end]
}

fn parse_header(path: &Path, line: &[u8]) -> Result<CacheHeader> {
    if line.is_empty() {
        return Err(SceneCacheError::Empty(path.to_path_buf()));
    }
    let header: CacheHeader =
        serde_json::from_slice(line).map_err(|error| SceneCacheError::InvalidHeader {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
    if header.format != FORMAT_TAG {
        return Err(SceneCacheError::InvalidHeader {
            path: path.to_path_buf(),
            reason: format!("unexpected format tag {:?}", header.format),
        });
    }
    if header.version == 0 || header.version > FORMAT_VERSION {
        return Err(SceneCacheError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: header.version,
        });
    }
    Ok(header)
}
