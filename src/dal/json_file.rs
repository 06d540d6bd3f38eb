use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} has unexpected structure: {source}")]
    Shape {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a whole JSON file.
///
/// A missing, empty or syntactically broken file yields `T::default()`.
/// Valid JSON of the wrong shape is an error so a hand-edited file is never
/// silently overwritten.
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, PersistError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("{} not found, starting empty", path.display());
            return Ok(T::default());
        }
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(T::default());
    }

    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            log::error!("{} is not valid JSON ({}), starting empty", path.display(), e);
            return Ok(T::default());
        }
    };

    serde_json::from_value(value).map_err(|source| PersistError::Shape {
        path: path.to_path_buf(),
        source,
    })
}

/// Replaces the file with the pretty-printed value through a temp file + rename.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| PersistError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file_mut().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
