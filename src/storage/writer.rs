//! Chunk set publication
//!
//! All records of one ecosystem are grouped by chunk id and written as a
//! complete set of [`NUM_CHUNKS`] files into a staging directory, which
//! then replaces the live directory. Nothing from the previous cycle
//! survives the swap.
//!
//! The swap is two renames (live to retired, staging to live), so for the
//! instant between them the live directory does not exist. A reader that
//! lands in that window gets a retryable `Unavailable` outcome, never a
//! mix of two cycles.

use super::hash::{chunk_for, ChunkId, NUM_CHUNKS};
use super::{create_dir, to_json, validate_ecosystem, write_synced, DataLayout};
use crate::error::{PkgriskError, Result};
use crate::models::PackageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use uuid::Uuid;

pub const HASH_ALGORITHM: &str = "fnv1a32-mod";

/// One chunk file: package name to record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkFile {
    pub packages: BTreeMap<String, PackageRecord>,
}

#[derive(Serialize)]
struct ChunkFileRef<'a> {
    packages: BTreeMap<&'a str, &'a PackageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub packages: usize,
    /// BLAKE3 hex digest of the chunk file bytes
    pub digest: String,
}

/// Describes a published chunk set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub num_chunks: u32,
    pub hash_algorithm: String,
    pub run_id: Uuid,
    pub published_at: DateTime<Utc>,
    pub package_count: usize,
    pub chunks: BTreeMap<String, ManifestEntry>,
}

impl ChunkManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read(path).map_err(|e| {
            PkgriskError::io(e, format!("Failed to read chunk manifest: {}", path.display()))
        })?;
        serde_json::from_slice(&content).map_err(|e| {
            PkgriskError::json(e, format!("Failed to parse chunk manifest: {}", path.display()))
        })
    }
}

/// Size statistics for one written chunk set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSetStats {
    pub ecosystem: String,
    pub package_count: usize,
    pub chunks_written: usize,
    pub non_empty_chunks: usize,
    pub max_chunk_packages: usize,
    pub total_bytes: u64,
}

impl ChunkSetStats {
    /// Largest chunk relative to the mean chunk size
    pub fn imbalance(&self) -> f64 {
        if self.package_count == 0 {
            return 0.0;
        }
        let mean = self.package_count as f64 / f64::from(NUM_CHUNKS);
        self.max_chunk_packages as f64 / mean
    }
}

/// Single-writer publisher of chunk sets
#[derive(Debug, Clone)]
pub struct ChunkWriter {
    layout: DataLayout,
    pretty: bool,
}

impl ChunkWriter {
    pub fn new(layout: DataLayout, pretty: bool) -> Self {
        Self { layout, pretty }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Group records by chunk id, rejecting duplicates and foreign records
    pub fn partition<'a>(
        ecosystem: &str,
        records: &'a [PackageRecord],
    ) -> Result<Vec<BTreeMap<&'a str, &'a PackageRecord>>> {
        let mut chunks: Vec<BTreeMap<&str, &PackageRecord>> =
            (0..NUM_CHUNKS).map(|_| BTreeMap::new()).collect();
        let mut seen = HashSet::with_capacity(records.len());

        for record in records {
            if record.ecosystem != ecosystem {
                return Err(PkgriskError::EcosystemMismatch {
                    name: record.name.clone(),
                    expected: ecosystem.to_string(),
                    found: record.ecosystem.clone(),
                });
            }
            if !seen.insert(record.name.as_str()) {
                return Err(PkgriskError::DuplicatePackage {
                    ecosystem: ecosystem.to_string(),
                    name: record.name.clone(),
                });
            }
            chunks[chunk_for(&record.name).index()].insert(record.name.as_str(), record);
        }

        Ok(chunks)
    }

    /// Publish the complete chunk set for one ecosystem
    pub fn write_ecosystem(
        &self,
        ecosystem: &str,
        records: &[PackageRecord],
        run_id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<ChunkSetStats> {
        self.write_with(ecosystem, records, run_id, published_at, rename)
    }

    fn write_with(
        &self,
        ecosystem: &str,
        records: &[PackageRecord],
        run_id: Uuid,
        published_at: DateTime<Utc>,
        rename: impl Fn(&Path, &Path) -> std::io::Result<()>,
    ) -> Result<ChunkSetStats> {
        validate_ecosystem(ecosystem)?;
        let chunks = Self::partition(ecosystem, records)?;

        let staging = self.layout.staging_dir(ecosystem, run_id);
        if staging.exists() {
            remove_dir(&staging)?;
        }
        create_dir(&staging)?;

        let result = self
            .write_staged(&staging, &chunks, run_id, published_at)
            .and_then(|written| {
                self.swap_into_place(ecosystem, &staging, run_id, &rename)?;
                Ok(written)
            });
        let (manifest, total_bytes) = match result {
            Ok(written) => written,
            Err(e) => {
                discard_staging(&staging);
                return Err(e);
            }
        };

        let stats = ChunkSetStats {
            ecosystem: ecosystem.to_string(),
            package_count: manifest.package_count,
            chunks_written: chunks.len(),
            non_empty_chunks: chunks.iter().filter(|c| !c.is_empty()).count(),
            max_chunk_packages: chunks.iter().map(BTreeMap::len).max().unwrap_or(0),
            total_bytes,
        };
        tracing::info!(
            "Published {} packages for {} across {} chunks ({} non-empty, {})",
            stats.package_count,
            ecosystem,
            stats.chunks_written,
            stats.non_empty_chunks,
            super::format_size(stats.total_bytes)
        );
        Ok(stats)
    }

    fn write_staged(
        &self,
        staging: &Path,
        chunks: &[BTreeMap<&str, &PackageRecord>],
        run_id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<(ChunkManifest, u64)> {
        let mut entries = BTreeMap::new();
        let mut total_bytes = 0u64;

        for (id, packages) in ChunkId::all().zip(chunks) {
            let file = ChunkFileRef {
                packages: packages.clone(),
            };
            let bytes = to_json(&file, self.pretty, &format!("chunk {}", id))?;
            write_synced(&staging.join(id.file_name()), &bytes)?;

            total_bytes += bytes.len() as u64;
            entries.insert(
                id.to_string(),
                ManifestEntry {
                    packages: packages.len(),
                    digest: blake3::hash(&bytes).to_hex().to_string(),
                },
            );
        }

        let manifest = ChunkManifest {
            num_chunks: NUM_CHUNKS,
            hash_algorithm: HASH_ALGORITHM.to_string(),
            run_id,
            published_at,
            package_count: chunks.iter().map(BTreeMap::len).sum(),
            chunks: entries,
        };
        let bytes = to_json(&manifest, true, "chunk manifest")?;
        write_synced(&staging.join("manifest.json"), &bytes)?;

        Ok((manifest, total_bytes))
    }

    fn swap_into_place(
        &self,
        ecosystem: &str,
        staging: &Path,
        run_id: Uuid,
        rename: impl Fn(&Path, &Path) -> std::io::Result<()>,
    ) -> Result<()> {
        let live = self.layout.chunks_dir(ecosystem);
        let retired = self.layout.retired_dir(ecosystem, run_id);

        let had_previous = live.exists();
        if had_previous {
            rename(&live, &retired).map_err(|e| {
                PkgriskError::io(
                    e,
                    format!("Failed to retire previous chunk set: {}", live.display()),
                )
            })?;
        }

        if let Err(e) = rename(staging, &live) {
            if !had_previous {
                return Err(PkgriskError::io(
                    e,
                    format!("Failed to move staged chunk set into place: {}", live.display()),
                ));
            }
            // Put the previous set back so readers keep a complete set
            return match rename(&retired, &live) {
                Ok(()) => {
                    tracing::warn!(
                        "Restored previous chunk set for {} after failed swap: {}",
                        ecosystem,
                        e
                    );
                    Err(PkgriskError::io(
                        e,
                        format!(
                            "Failed to move staged chunk set into place: {}",
                            live.display()
                        ),
                    ))
                }
                Err(rollback) => {
                    tracing::error!(
                        "Chunk set for {} has no live directory: swap failed ({}) and restoring {} to {} failed ({})",
                        ecosystem,
                        e,
                        retired.display(),
                        live.display(),
                        rollback
                    );
                    Err(PkgriskError::io(
                        rollback,
                        format!(
                            "Failed to restore previous chunk set from {} to {} after swap failed ({})",
                            retired.display(),
                            live.display(),
                            e
                        ),
                    ))
                }
            };
        }
        tracing::debug!("Swapped chunk set for {} into {}", ecosystem, live.display());

        if had_previous {
            if let Err(e) = remove_dir(&retired) {
                tracing::warn!("Previous chunk set left behind: {}", e);
            }
        }
        Ok(())
    }
}

fn rename(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::rename(from, to)
}

fn discard_staging(staging: &Path) {
    if !staging.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(staging) {
        tracing::warn!(
            "Failed to remove staging directory {}: {}",
            staging.display(),
            e
        );
    }
}

fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir_all(path)
        .map_err(|e| PkgriskError::io(e, format!("Failed to remove directory: {}", path.display())))
}

/// Result of checking a published chunk set against its manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    pub ecosystem: String,
    pub run_id: Uuid,
    pub chunks_checked: usize,
    pub package_count: usize,
}

/// Re-read every chunk, check digests, and check that each name lives in its own chunk
pub fn verify_chunk_set(layout: &DataLayout, ecosystem: &str) -> Result<VerifyReport> {
    validate_ecosystem(ecosystem)?;
    let manifest = ChunkManifest::load(&layout.manifest_path(ecosystem))?;
    let mut problems = Vec::new();

    if manifest.num_chunks != NUM_CHUNKS {
        problems.push(format!(
            "Manifest declares {} chunks, expected {}",
            manifest.num_chunks, NUM_CHUNKS
        ));
    }
    if manifest.hash_algorithm != HASH_ALGORITHM {
        problems.push(format!(
            "Unsupported hash algorithm '{}'",
            manifest.hash_algorithm
        ));
    }

    let mut package_count = 0;
    for id in ChunkId::all() {
        let key = id.to_string();
        let path = layout.chunk_path(ecosystem, id);
        let Some(entry) = manifest.chunks.get(&key) else {
            problems.push(format!("Chunk {} missing from manifest", key));
            continue;
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                problems.push(format!("Chunk {} unreadable: {}", key, e));
                continue;
            }
        };
        let digest = blake3::hash(&bytes).to_hex().to_string();
        if digest != entry.digest {
            problems.push(format!("Chunk {} digest mismatch", key));
        }

        let file: ChunkFile = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => {
                problems.push(format!("Chunk {} does not parse: {}", key, e));
                continue;
            }
        };
        if file.packages.len() != entry.packages {
            problems.push(format!(
                "Chunk {} holds {} packages, manifest says {}",
                key,
                file.packages.len(),
                entry.packages
            ));
        }
        for name in file.packages.keys() {
            let expected = chunk_for(name);
            if expected != id {
                problems.push(format!(
                    "Package '{}' found in chunk {} but hashes to {}",
                    name, key, expected
                ));
            }
        }
        package_count += file.packages.len();
    }

    if package_count != manifest.package_count {
        problems.push(format!(
            "Found {} packages, manifest says {}",
            package_count, manifest.package_count
        ));
    }

    if problems.is_empty() {
        Ok(VerifyReport {
            ecosystem: ecosystem.to_string(),
            run_id: manifest.run_id,
            chunks_checked: NUM_CHUNKS as usize,
            package_count,
        })
    } else {
        Err(PkgriskError::ManifestMismatch {
            ecosystem: ecosystem.to_string(),
            problems,
        })
    }
}
