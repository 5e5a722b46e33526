//!
//! sossbox filesystem primitives
//! -----------------------------
//! Thin async wrappers over `tokio::fs` used by every tenant store. Absence is
//! a normal outcome here: existence checks return `false`, reads return `None`
//! and deletes report whether anything was removed. Only invalid input and real
//! IO failures surface as `AppError`.
//!
//! Non-JSON payloads written through `file_put` always travel with a JSON
//! sidecar (`<stem>.json`) describing them, so a collection listing can be
//! interpreted without sniffing binary content.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult};

pub mod tolerant_json;

pub use tolerant_json::parse_tolerant;

#[cfg(unix)]
const FOLDER_MODE: u32 = 0o770;
#[cfg(unix)]
const FILE_MODE: u32 = 0o660;

/// How `file_get` should hand back content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    pub fn as_text(&self) -> Option<&str> {
        match self { FileContent::Text(s) => Some(s.as_str()), FileContent::Bytes(_) => None }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self { FileContent::Text(s) => s.into_bytes(), FileContent::Bytes(b) => b }
    }
}

/// Descriptor written next to every non-JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sidecar {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

fn require_path(op: &str, path: &Path) -> AppResult<()> {
    if path.as_os_str().is_empty() {
        warn!(target: "sossbox::io", "{}: refused empty path", op);
        return Err(AppError::invalid("invalid_path", format!("{}: path cannot be empty", op)));
    }
    Ok(())
}

fn log_io_failure(op: &str, path: &Path, e: &std::io::Error) -> AppError {
    error!(target: "sossbox::io", "{}: '{}' failed: {}", op, path.display(), e);
    AppError::from(std::io::Error::new(e.kind(), format!("{} '{}': {}", op, path.display(), e)))
}

/// True when `path` is an existing directory. Symlinks are followed.
pub async fn folder_exists(path: &Path) -> AppResult<bool> {
    require_path("folder_exists", path)?;
    Ok(matches!(tokio::fs::metadata(path).await, Ok(m) if m.is_dir()))
}

pub async fn file_exists(path: &Path) -> AppResult<bool> {
    require_path("file_exists", path)?;
    Ok(matches!(tokio::fs::metadata(path).await, Ok(m) if m.is_file()))
}

/// True when a directory entry exists at `path` without following links.
pub async fn link_exists(path: &Path) -> AppResult<bool> {
    require_path("link_exists", path)?;
    Ok(tokio::fs::symlink_metadata(path).await.is_ok())
}

/// Recursive, idempotent mkdir. Returns whether the folder had to be created.
pub async fn folder_create(path: &Path) -> AppResult<bool> {
    require_path("folder_create", path)?;
    if folder_exists(path).await? {
        return Ok(false);
    }
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(FOLDER_MODE);
    builder.create(path).await.map_err(|e| log_io_failure("folder_create", path, &e))?;
    debug!(target: "sossbox::io", "folder_create: '{}'", path.display());
    Ok(true)
}

/// Recursive delete. `Ok(false)` when there was nothing to remove.
pub async fn folder_delete(path: &Path) -> AppResult<bool> {
    require_path("folder_delete", path)?;
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(target: "sossbox::io", "folder_delete: '{}'", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(log_io_failure("folder_delete", path, &e)),
    }
}

/// Sorted entry names of a folder, or `None` when it does not exist.
pub async fn folder_get(path: &Path) -> AppResult<Option<Vec<String>>> {
    require_path("folder_get", path)?;
    let mut rd = match tokio::fs::read_dir(path).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(log_io_failure("folder_get", path, &e)),
    };
    let mut names: Vec<String> = Vec::new();
    while let Some(entry) = rd.next_entry().await.map_err(|e| log_io_failure("folder_get", path, &e))? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(Some(names))
}

pub async fn file_get(path: &Path, encoding: Encoding) -> AppResult<Option<FileContent>> {
    require_path("file_get", path)?;
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(log_io_failure("file_get", path, &e)),
    };
    match encoding {
        Encoding::Binary => Ok(Some(FileContent::Bytes(bytes))),
        Encoding::Utf8 => String::from_utf8(bytes)
            .map(|s| Some(FileContent::Text(s)))
            .map_err(|e| AppError::parse("invalid_utf8", format!("'{}': {}", path.display(), e))),
    }
}

fn is_json_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Path of the sidecar that describes `path`.
pub fn sidecar_path(path: &Path) -> Option<PathBuf> {
    if is_json_name(path) {
        return None;
    }
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    Some(path.with_file_name(format!("{}.json", stem)))
}

async fn write_file(path: &Path, payload: &[u8]) -> AppResult<()> {
    let mut opts = tokio::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(FILE_MODE);
    let mut f = opts.open(path).await.map_err(|e| log_io_failure("file_put", path, &e))?;
    tokio::io::AsyncWriteExt::write_all(&mut f, payload).await.map_err(|e| log_io_failure("file_put", path, &e))?;
    tokio::io::AsyncWriteExt::flush(&mut f).await.map_err(|e| log_io_failure("file_put", path, &e))?;
    Ok(())
}

/// Write `payload` to `path`, replacing any previous content. For non-JSON
/// targets a `{id, type, name}` sidecar is written next to it and returned.
pub async fn file_put(path: &Path, payload: &[u8]) -> AppResult<Option<Sidecar>> {
    require_path("file_put", path)?;
    write_file(path, payload).await?;
    debug!(target: "sossbox::io", "file_put: '{}' ({} bytes)", path.display(), payload.len());
    let Some(side) = sidecar_path(path) else { return Ok(None) };
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let meta = Sidecar {
        id: path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
        kind: path.extension().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
        name,
    };
    write_file(&side, &serde_json::to_vec(&meta)?).await?;
    Ok(Some(meta))
}

pub async fn file_delete(path: &Path) -> AppResult<bool> {
    require_path("file_delete", path)?;
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(log_io_failure("file_delete", path, &e)),
    }
}

/// Create a directory alias at `dest` pointing to `src`. Fails with
/// `Conflict` when `dest` already exists; link creation is atomic so this
/// doubles as create-if-absent.
pub async fn sym_link(src: &Path, dest: &Path) -> AppResult<()> {
    require_path("sym_link", src)?;
    require_path("sym_link", dest)?;
    #[cfg(unix)]
    let res = tokio::fs::symlink(src, dest).await;
    #[cfg(windows)]
    let res = tokio::fs::symlink_dir(src, dest).await;
    match res {
        Ok(()) => {
            debug!(target: "sossbox::io", "sym_link: '{}' -> '{}'", dest.display(), src.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(AppError::conflict("already_exists", format!("'{}' already exists", dest.display())))
        }
        Err(e) => Err(log_io_failure("sym_link", dest, &e)),
    }
}

/// Remove the link itself (never its target).
pub async fn sym_unlink(path: &Path) -> AppResult<bool> {
    require_path("sym_unlink", path)?;
    #[cfg(windows)]
    let res = tokio::fs::remove_dir(path).await;
    #[cfg(not(windows))]
    let res = tokio::fs::remove_file(path).await;
    match res {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(log_io_failure("sym_unlink", path, &e)),
    }
}

pub async fn read_link(path: &Path) -> AppResult<Option<PathBuf>> {
    require_path("read_link", path)?;
    match tokio::fs::read_link(path).await {
        Ok(p) => Ok(Some(p)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(log_io_failure("read_link", path, &e)),
    }
}

/// Load `folder/name` as comment-tolerant JSON. `None` when the file does not
/// exist; any other failure is logged and returned.
pub async fn json_get(folder: &Path, name: &str) -> AppResult<Option<Value>> {
    let path = folder.join(name);
    require_path("json_get", &path)?;
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(log_io_failure("json_get", &path, &e)),
    };
    match parse_tolerant(&text) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            error!(target: "sossbox::io", "json_get: '{}' is not valid JSON: {}", path.display(), e);
            Err(AppError::parse("json_error", format!("'{}': {}", path.display(), e)))
        }
    }
}

/// Serialize `value` as JSON and write it to `path`.
pub async fn json_put(path: &Path, value: &Value) -> AppResult<()> {
    require_path("json_put", path)?;
    write_file(path, &serde_json::to_vec(value)?).await
}
