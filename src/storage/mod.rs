//! Storage layer for published package data
//!
//! Provides the on-disk layout, FNV-1a chunk addressing, the chunk set
//! writer and reader, and the per-ecosystem summary files.

pub mod cache;
pub mod hash;
pub mod reader;
pub mod summary;
pub mod writer;

use crate::error::{PkgriskError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub use cache::CoalescingCache;
pub use hash::{chunk_for, fnv1a_32, ChunkId, NUM_CHUNKS};
pub use reader::{ChunkReader, ChunkSource, FsChunkSource, LookupOutcome};
pub use summary::{EcosystemStats, SummaryWriter};
pub use writer::{
    verify_chunk_set, ChunkFile, ChunkManifest, ChunkSetStats, ChunkWriter, ManifestEntry,
    VerifyReport,
};

/// Directory layout under the data root
///
/// ```text
/// {root}/chunks/{ecosystem}/chunk_000.json .. chunk_099.json
/// {root}/chunks/{ecosystem}/manifest.json
/// {root}/{ecosystem}.json
/// {root}/{ecosystem}_stats.json
/// ```
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunks_root(&self) -> PathBuf {
        self.root.join("chunks")
    }

    pub fn chunks_dir(&self, ecosystem: &str) -> PathBuf {
        self.chunks_root().join(ecosystem)
    }

    pub fn chunk_path(&self, ecosystem: &str, id: ChunkId) -> PathBuf {
        self.root.join(chunk_rel_path(ecosystem, id))
    }

    pub fn manifest_path(&self, ecosystem: &str) -> PathBuf {
        self.chunks_dir(ecosystem).join("manifest.json")
    }

    /// Sibling of the live chunk directory, so the swap is a same-filesystem rename
    pub fn staging_dir(&self, ecosystem: &str, run_id: Uuid) -> PathBuf {
        self.chunks_root()
            .join(format!(".{}.staging-{}", ecosystem, run_id.simple()))
    }

    pub fn retired_dir(&self, ecosystem: &str, run_id: Uuid) -> PathBuf {
        self.chunks_root()
            .join(format!(".{}.retired-{}", ecosystem, run_id.simple()))
    }

    pub fn summary_path(&self, ecosystem: &str) -> PathBuf {
        self.root.join(format!("{}.json", ecosystem))
    }

    pub fn stats_path(&self, ecosystem: &str) -> PathBuf {
        self.root.join(format!("{}_stats.json", ecosystem))
    }
}

/// Chunk path relative to the data root, as used by every chunk source
pub fn chunk_rel_path(ecosystem: &str, id: ChunkId) -> String {
    format!("chunks/{}/{}", ecosystem, id.file_name())
}

/// Ecosystem names become directory and file names
pub fn validate_ecosystem(ecosystem: &str) -> Result<()> {
    let valid = !ecosystem.is_empty()
        && ecosystem
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PkgriskError::InvalidConfigValue {
            path: "ecosystem".to_string(),
            message: format!(
                "'{}' must be non-empty lowercase ASCII letters, digits, '-' or '_'",
                ecosystem
            ),
        })
    }
}

pub(crate) fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| PkgriskError::io(e, format!("Failed to create directory: {}", path.display())))
}

/// Write bytes to a file and sync it to disk
pub(crate) fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .map_err(|e| PkgriskError::io(e, format!("Failed to create file: {}", path.display())))?;
    file.write_all(data)
        .map_err(|e| PkgriskError::io(e, format!("Failed to write file: {}", path.display())))?;
    file.sync_all()
        .map_err(|e| PkgriskError::io(e, format!("Failed to sync file: {}", path.display())))
}

/// Replace a file atomically: write a temp sibling, sync, then rename
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PkgriskError::Config(format!("Invalid output path: {}", path.display())))?;
    create_dir(parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| PkgriskError::Config(format!("Invalid output path: {}", path.display())))?;
    let temp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

    write_synced(&temp_path, data)?;
    fs::rename(&temp_path, path).map_err(|e| {
        PkgriskError::io(
            e,
            format!(
                "Failed to rename temp file into place: {} -> {}",
                temp_path.display(),
                path.display()
            ),
        )
    })
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T, pretty: bool, what: &str) -> Result<Vec<u8>> {
    let result = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    result.map_err(|e| PkgriskError::json(e, format!("Failed to serialize {}", what)))
}

/// Format a byte count as a human-readable string
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = DataLayout::new("/srv/data");
        let id = chunk_for("react");
        assert_eq!(
            layout.chunk_path("npm", id),
            PathBuf::from("/srv/data/chunks/npm/chunk_052.json")
        );
        assert_eq!(layout.summary_path("npm"), PathBuf::from("/srv/data/npm.json"));
        assert_eq!(
            layout.stats_path("pypi"),
            PathBuf::from("/srv/data/pypi_stats.json")
        );
    }

    #[test]
    fn test_validate_ecosystem() {
        assert!(validate_ecosystem("npm").is_ok());
        assert!(validate_ecosystem("crates_io").is_ok());
        assert!(validate_ecosystem("").is_err());
        assert!(validate_ecosystem("../etc").is_err());
        assert!(validate_ecosystem("NPM").is_err());
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("out.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
    }
}
