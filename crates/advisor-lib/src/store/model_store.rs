//! Filesystem store for model units
//!
//! A persisted unit is one file: a JSON header line carrying the format
//! version and the SHA256 checksum of the payload, followed by the JSON
//! payload itself. Files are written to a temporary sibling and renamed
//! into place so a reader never observes a partial unit.

use super::unit::ModelUnit;
use crate::error::{AdvisorError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Format identifier written into every header
pub const MODEL_FORMAT: &str = "crop-advisor-model";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Configuration for the model store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum accepted model file size in bytes
    pub max_model_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_model_size: 256 * 1024 * 1024,
        }
    }
}

/// Location of a persisted model unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    path: PathBuf,
}

impl ModelHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for ModelHandle {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelHeader {
    format: String,
    format_version: u32,
    version: String,
    checksum: String,
    size_bytes: usize,
    saved_at: i64,
}

/// Description of a unit on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    pub version: String,
    pub path: PathBuf,
    pub checksum: String,
    pub size_bytes: usize,
    pub saved_at: i64,
}

/// Saves and loads model units as whole files
#[derive(Debug, Clone, Default)]
pub struct ModelStore {
    config: StoreConfig,
}

impl ModelStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Persist a unit at `handle`, replacing whatever was there
    pub fn save(&self, handle: &ModelHandle, unit: &ModelUnit) -> Result<StoredModel> {
        let payload = serde_json::to_vec(unit)
            .map_err(|e| AdvisorError::corrupt(handle.path(), format!("serialization failed: {}", e)))?;

        let header = ModelHeader {
            format: MODEL_FORMAT.to_string(),
            format_version: FORMAT_VERSION,
            version: unit.version().to_string(),
            checksum: compute_checksum(&payload),
            size_bytes: payload.len(),
            saved_at: Utc::now().timestamp(),
        };
        let mut bytes = serde_json::to_vec(&header)
            .map_err(|e| AdvisorError::corrupt(handle.path(), format!("serialization failed: {}", e)))?;
        bytes.push(b'\n');
        bytes.extend_from_slice(&payload);

        if let Some(parent) = handle.path().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.write_atomic(handle, &bytes)?;

        info!(
            path = %handle,
            version = %header.version,
            size = bytes.len(),
            checksum = %header.checksum,
            "Model unit saved"
        );

        Ok(StoredModel {
            version: header.version,
            path: handle.path().to_path_buf(),
            checksum: header.checksum,
            size_bytes: bytes.len(),
            saved_at: header.saved_at,
        })
    }

    fn write_atomic(&self, handle: &ModelHandle, bytes: &[u8]) -> Result<()> {
        let temp_path = handle.temp_path();
        let result = (|| -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, handle.path())
        })();

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!(path = %temp_path.display(), error = %cleanup, "No temp file to clean up");
            }
            warn!(path = %handle, error = %e, "Failed to write model unit");
            return Err(e.into());
        }
        Ok(())
    }

    /// Load and verify the unit at `handle`
    pub fn load(&self, handle: &ModelHandle) -> Result<ModelUnit> {
        let bytes = self.read_file(handle)?;
        let (header, payload) = split_verified(handle, &bytes)?;

        let unit: ModelUnit = serde_json::from_slice(payload)
            .map_err(|e| AdvisorError::corrupt(handle.path(), format!("invalid payload: {}", e)))?;
        unit.validate()
            .map_err(|reason| AdvisorError::corrupt(handle.path(), reason))?;

        if unit.version() != header.version {
            return Err(AdvisorError::corrupt(
                handle.path(),
                "header version does not match payload",
            ));
        }

        info!(path = %handle, version = %unit.version(), "Model unit loaded");
        Ok(unit)
    }

    /// Describe the unit at `handle` after verifying its checksum
    pub fn describe(&self, handle: &ModelHandle) -> Result<StoredModel> {
        let bytes = self.read_file(handle)?;
        let (header, _) = split_verified(handle, &bytes)?;
        Ok(StoredModel {
            version: header.version,
            path: handle.path().to_path_buf(),
            checksum: header.checksum,
            size_bytes: bytes.len(),
            saved_at: header.saved_at,
        })
    }

    fn read_file(&self, handle: &ModelHandle) -> Result<Vec<u8>> {
        let not_found = |e: std::io::Error| match e.kind() {
            ErrorKind::NotFound => AdvisorError::ModelNotFound(handle.path().to_path_buf()),
            _ => AdvisorError::Io(e),
        };
        let too_large = |size: u64| {
            AdvisorError::corrupt(
                handle.path(),
                format!(
                    "size {} exceeds maximum {}",
                    size, self.config.max_model_size
                ),
            )
        };

        let limit = self.config.max_model_size as u64;
        let size = fs::metadata(handle.path()).map_err(not_found)?.len();
        if size > limit {
            return Err(too_large(size));
        }

        // The file may grow between the size check and the read
        let mut bytes = Vec::with_capacity(size as usize);
        File::open(handle.path())
            .map_err(not_found)?
            .take(limit + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() as u64 > limit {
            return Err(too_large(bytes.len() as u64));
        }
        Ok(bytes)
    }
}

fn split_verified<'a>(handle: &ModelHandle, bytes: &'a [u8]) -> Result<(ModelHeader, &'a [u8])> {
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| AdvisorError::corrupt(handle.path(), "missing header"))?;
    let (header_bytes, rest) = bytes.split_at(newline);
    let payload = &rest[1..];

    let header: ModelHeader = serde_json::from_slice(header_bytes)
        .map_err(|e| AdvisorError::corrupt(handle.path(), format!("invalid header: {}", e)))?;

    if header.format != MODEL_FORMAT {
        return Err(AdvisorError::corrupt(
            handle.path(),
            format!("unknown format {:?}", header.format),
        ));
    }
    if header.format_version != FORMAT_VERSION {
        return Err(AdvisorError::corrupt(
            handle.path(),
            format!("unsupported format version {}", header.format_version),
        ));
    }

    let checksum = compute_checksum(payload);
    if payload.len() != header.size_bytes || checksum != header.checksum {
        return Err(AdvisorError::corrupt(
            handle.path(),
            format!(
                "checksum mismatch: expected {}, got {}",
                header.checksum, checksum
            ),
        ));
    }

    Ok((header, payload))
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
