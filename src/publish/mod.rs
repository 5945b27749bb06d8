//! Publish pipeline: score every collected package, rank, then write
//!
//! Phase 1 scores and classifies packages in parallel. Phase 2 waits for
//! the whole batch and assigns ecosystem-local percentiles. Phase 3 writes
//! the chunk set, then the summary and stats files from the same records.

use crate::analysis::Analyzer;
use crate::error::{PkgriskError, Result};
use crate::models::{CollectedPackage, PackageRecord};
use crate::scoring::percentile_ranks;
use crate::storage::{
    validate_ecosystem, ChunkSetStats, ChunkWriter, DataLayout, EcosystemStats, SummaryWriter,
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Outcome of one publish run
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub run_id: Uuid,
    pub ecosystem: String,
    pub published_at: DateTime<Utc>,
    pub package_count: usize,
    pub chunks: ChunkSetStats,
    pub stats: EcosystemStats,
    pub duration_ms: u128,
}

pub struct Publisher {
    analyzer: Analyzer,
    layout: DataLayout,
    pretty: bool,
}

impl Publisher {
    pub fn new(analyzer: Analyzer, layout: DataLayout, pretty: bool) -> Self {
        Self {
            analyzer,
            layout,
            pretty,
        }
    }

    /// Load every `*.json` collected package in a directory and publish them
    pub fn publish_dir(&self, ecosystem: &str, input: &Path) -> Result<PublishReport> {
        let packages = load_collected(input)?;
        self.publish(ecosystem, packages)
    }

    pub fn publish(&self, ecosystem: &str, packages: Vec<CollectedPackage>) -> Result<PublishReport> {
        validate_ecosystem(ecosystem)?;
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let published_at = Utc::now();
        tracing::info!(
            "Publish {} started for {} ({} packages)",
            run_id,
            ecosystem,
            packages.len()
        );

        let mut records = self.score_all(ecosystem, packages, published_at)?;
        tracing::info!("Scored {} packages", records.len());

        assign_percentiles(&mut records);

        let chunks = ChunkWriter::new(self.layout.clone(), self.pretty).write_ecosystem(
            ecosystem,
            &records,
            run_id,
            published_at,
        )?;
        let stats = SummaryWriter::new(self.layout.clone(), self.pretty).write(
            ecosystem,
            &records,
            run_id,
            published_at,
        )?;

        let report = PublishReport {
            run_id,
            ecosystem: ecosystem.to_string(),
            published_at,
            package_count: records.len(),
            chunks,
            stats,
            duration_ms: started.elapsed().as_millis(),
        };
        tracing::info!(
            "Publish {} finished in {}ms",
            report.run_id,
            report.duration_ms
        );
        Ok(report)
    }

    fn score_all(
        &self,
        ecosystem: &str,
        packages: Vec<CollectedPackage>,
        analyzed_at: DateTime<Utc>,
    ) -> Result<Vec<PackageRecord>> {
        packages
            .into_par_iter()
            .map(|package| {
                if package.ecosystem() != ecosystem {
                    return Err(PkgriskError::EcosystemMismatch {
                        name: package.name().to_string(),
                        expected: ecosystem.to_string(),
                        found: package.ecosystem().to_string(),
                    });
                }
                self.analyzer.analyze_package(package, analyzed_at)
            })
            .collect()
    }
}

/// Rank every record's overall score within the batch
pub fn assign_percentiles(records: &mut [PackageRecord]) {
    let overall: Vec<f64> = records
        .iter()
        .map(|r| r.composite_score.overall)
        .collect();
    for (record, rank) in records.iter_mut().zip(percentile_ranks(&overall)) {
        record.composite_score.percentile = Some(rank);
    }
}

/// Read collected packages from `*.json` files, in file name order
pub fn load_collected(dir: &Path) -> Result<Vec<CollectedPackage>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        PkgriskError::io(e, format!("Failed to read input directory: {}", dir.display()))
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            PkgriskError::io(e, format!("Failed to read entry in {}", dir.display()))
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path).map_err(|e| {
                PkgriskError::io(e, format!("Failed to read collected package: {}", path.display()))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                PkgriskError::json(
                    e,
                    format!("Failed to parse collected package: {}", path.display()),
                )
            })
        })
        .collect()
}
