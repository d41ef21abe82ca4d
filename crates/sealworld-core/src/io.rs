//! JSON / JSONL file helpers
//!
//! Initial load and final artifact write are the only I/O the pipeline
//! performs. Handles are opened, buffered, flushed and dropped inside each
//! call.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File-level I/O failure
#[derive(Debug, thiserror::Error)]
pub enum ArtifactIoError {
    /// Filesystem error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// (De)serialization error
    #[error("JSON error on {path} line {line}: {source}")]
    Json {
        /// File involved
        path: PathBuf,
        /// 1-based line (0 for whole-file documents)
        line: usize,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactIoError + '_ {
    move |source| ArtifactIoError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize values as JSONL lines, without trailing newlines
///
/// # Errors
/// Returns the serializer error for the first failing value
pub fn to_jsonl_lines<T: Serialize>(items: &[T]) -> Result<Vec<Vec<u8>>, serde_json::Error> {
    items.iter().map(serde_json::to_vec).collect()
}

/// Read every non-blank JSONL line as `T`
///
/// # Errors
/// Fails on the first unreadable or unparsable line
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ArtifactIoError> {
    let file = File::open(path).map_err(io_err(path))?;
    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err(path))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| ArtifactIoError::Json {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        out.push(item);
    }
    Ok(out)
}

/// Write pre-serialized lines, newline-terminated
///
/// # Errors
/// Returns the first filesystem error
pub fn write_lines(path: &Path, lines: &[Vec<u8>]) -> Result<(), ArtifactIoError> {
    let file = File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line).map_err(io_err(path))?;
        writer.write_all(b"\n").map_err(io_err(path))?;
    }
    writer.flush().map_err(io_err(path))
}

/// Write one pretty-printed JSON document
///
/// # Errors
/// Returns serialization or filesystem errors
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactIoError> {
    let file = File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ArtifactIoError::Json {
        path: path.to_path_buf(),
        line: 0,
        source,
    })?;
    writer.write_all(b"\n").map_err(io_err(path))?;
    writer.flush().map_err(io_err(path))
}

/// Read one JSON document
///
/// # Errors
/// Returns parse or filesystem errors
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactIoError> {
    let file = File::open(path).map_err(io_err(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactIoError::Json {
        path: path.to_path_buf(),
        line: 0,
        source,
    })
}
