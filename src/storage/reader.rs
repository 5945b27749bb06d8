//! Read-only package lookup over a published chunk set
//!
//! A lookup hashes the name to its chunk, loads that chunk once through
//! the coalescing cache, and picks the record out of it.

use super::cache::CoalescingCache;
use super::hash::{chunk_for, ChunkId};
use super::writer::ChunkFile;
use super::{chunk_rel_path, validate_ecosystem};
use crate::error::{PkgriskError, Result};
use crate::models::PackageRecord;
use std::path::PathBuf;
use std::sync::Arc;

/// Transport for raw chunk bytes
pub trait ChunkSource: Send + Sync {
    /// Fetch the bytes at a path relative to the data root
    fn fetch(&self, rel_path: &str) -> std::io::Result<Vec<u8>>;
}

/// Chunk source backed by a local data directory
#[derive(Debug, Clone)]
pub struct FsChunkSource {
    root: PathBuf,
}

impl FsChunkSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ChunkSource for FsChunkSource {
    fn fetch(&self, rel_path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.root.join(rel_path))
    }
}

/// Result of resolving one package
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(Box<PackageRecord>),
    /// The chunk loaded but does not contain the name
    NotFound,
    /// The chunk could not be fetched; retrying may succeed
    Unavailable { reason: String },
}

impl LookupOutcome {
    pub fn record(&self) -> Option<&PackageRecord> {
        match self {
            LookupOutcome::Found(record) => Some(record),
            _ => None,
        }
    }
}

pub struct ChunkReader {
    source: Arc<dyn ChunkSource>,
    cache: CoalescingCache<ChunkFile>,
}

impl ChunkReader {
    pub fn new(source: Arc<dyn ChunkSource>) -> Self {
        Self {
            source,
            cache: CoalescingCache::new("chunk"),
        }
    }

    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FsChunkSource::new(root)))
    }

    /// Resolve a package by ecosystem and exact name
    pub async fn lookup(&self, ecosystem: &str, name: &str) -> Result<LookupOutcome> {
        let id = chunk_for(name);
        match self.load_chunk(ecosystem, id).await {
            Ok(chunk) => Ok(match chunk.packages.get(name) {
                Some(record) => LookupOutcome::Found(Box::new(record.clone())),
                None => LookupOutcome::NotFound,
            }),
            Err(PkgriskError::Io { source, context }) => {
                tracing::warn!("Chunk {} for {} unavailable: {}", id, ecosystem, source);
                Ok(LookupOutcome::Unavailable {
                    reason: format!("{}: {}", context, source),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Parsed chunk, fetched at most once while cached
    pub async fn load_chunk(&self, ecosystem: &str, id: ChunkId) -> Result<Arc<ChunkFile>> {
        validate_ecosystem(ecosystem)?;
        let rel_path = chunk_rel_path(ecosystem, id);
        let source = self.source.clone();

        self.cache
            .get_or_try_load(&rel_path, || {
                let rel_path = rel_path.clone();
                async move {
                    let fetch_path = rel_path.clone();
                    let bytes = tokio::task::spawn_blocking(move || source.fetch(&fetch_path))
                        .await
                        .unwrap_or_else(|e| Err(std::io::Error::new(std::io::ErrorKind::Other, e)))
                        .map_err(|e| {
                            PkgriskError::io(e, format!("Failed to fetch chunk {}", rel_path))
                        })?;
                    serde_json::from_slice::<ChunkFile>(&bytes).map_err(|source| {
                        PkgriskError::CorruptChunk {
                            path: rel_path,
                            source,
                        }
                    })
                }
            })
            .await
    }

    /// Drop every cached chunk
    pub async fn clear(&self) {
        self.cache.clear().await;
    }

    pub async fn evict(&self, ecosystem: &str, id: ChunkId) -> bool {
        self.cache.evict(&chunk_rel_path(ecosystem, id)).await
    }

    pub async fn cached_chunks(&self) -> usize {
        self.cache.len().await
    }
}
