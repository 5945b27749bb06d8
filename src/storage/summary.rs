//! Ecosystem summary list and aggregate statistics files

use super::{to_json, validate_ecosystem, write_atomic, DataLayout};
use crate::error::{PkgriskError, Result};
use crate::models::{PackageRecord, PackageSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

const HISTOGRAM_BUCKETS: usize = 10;

/// Aggregate distributions for one ecosystem's published population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcosystemStats {
    pub ecosystem: String,
    pub run_id: Uuid,
    pub published_at: DateTime<Utc>,
    pub package_count: usize,
    pub mean_overall: Option<f64>,
    pub median_overall: Option<f64>,
    pub grades: BTreeMap<String, usize>,
    pub risk_tiers: BTreeMap<String, usize>,
    pub update_urgency: BTreeMap<String, usize>,
    pub confidence: BTreeMap<String, usize>,
    /// Counts for [0,10), [10,20) .. [90,100]
    pub score_histogram: Vec<usize>,
}

impl EcosystemStats {
    pub fn from_records(
        ecosystem: &str,
        records: &[PackageRecord],
        run_id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Self {
        let mut grades = BTreeMap::new();
        let mut risk_tiers = BTreeMap::new();
        let mut update_urgency = BTreeMap::new();
        let mut confidence = BTreeMap::new();
        let mut score_histogram = vec![0; HISTOGRAM_BUCKETS];
        let mut scores = Vec::with_capacity(records.len());

        for record in records {
            let score = &record.composite_score;
            *grades.entry(score.grade.to_string()).or_insert(0) += 1;
            *risk_tiers.entry(score.risk_tier.to_string()).or_insert(0) += 1;
            *update_urgency
                .entry(score.update_urgency.to_string())
                .or_insert(0) += 1;
            *confidence.entry(score.confidence.to_string()).or_insert(0) += 1;

            let bucket = ((score.overall / 10.0).floor() as usize).min(HISTOGRAM_BUCKETS - 1);
            score_histogram[bucket] += 1;
            scores.push(score.overall);
        }

        scores.sort_by(f64::total_cmp);
        let mean_overall = (!scores.is_empty())
            .then(|| crate::models::round1(scores.iter().sum::<f64>() / scores.len() as f64));
        let median_overall = median(&scores).map(crate::models::round1);

        Self {
            ecosystem: ecosystem.to_string(),
            run_id,
            published_at,
            package_count: records.len(),
            mean_overall,
            median_overall,
            grades,
            risk_tiers,
            update_urgency,
            confidence,
            score_histogram,
        }
    }
}

fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Browse-view ordering: install count descending, unknown counts last, then name
pub fn summary_order(a: &PackageSummary, b: &PackageSummary) -> Ordering {
    match (a.install_count, b.install_count) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.name.cmp(&b.name))
}

/// Writes `{ecosystem}.json` and `{ecosystem}_stats.json`
#[derive(Debug, Clone)]
pub struct SummaryWriter {
    layout: DataLayout,
    pretty: bool,
}

impl SummaryWriter {
    pub fn new(layout: DataLayout, pretty: bool) -> Self {
        Self { layout, pretty }
    }

    pub fn write(
        &self,
        ecosystem: &str,
        records: &[PackageRecord],
        run_id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<EcosystemStats> {
        validate_ecosystem(ecosystem)?;

        let mut summaries: Vec<PackageSummary> = records.iter().map(PackageRecord::summary).collect();
        summaries.sort_by(summary_order);
        let bytes = to_json(&summaries, self.pretty, "ecosystem summary")?;
        write_atomic(&self.layout.summary_path(ecosystem), &bytes)?;

        let stats = EcosystemStats::from_records(ecosystem, records, run_id, published_at);
        let bytes = to_json(&stats, true, "ecosystem stats")?;
        write_atomic(&self.layout.stats_path(ecosystem), &bytes)?;

        tracing::debug!(
            "Wrote summary and stats for {} ({} packages)",
            ecosystem,
            summaries.len()
        );
        Ok(stats)
    }

    pub fn read_summaries(&self, ecosystem: &str) -> Result<Vec<PackageSummary>> {
        validate_ecosystem(ecosystem)?;
        let path = self.layout.summary_path(ecosystem);
        let bytes = std::fs::read(&path).map_err(|e| {
            PkgriskError::io(e, format!("Failed to read summary file: {}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PkgriskError::json(e, format!("Failed to parse summary file: {}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::writer::test_support::record;
    use tempfile::TempDir;

    #[test]
    fn test_summary_ordering() {
        let mut big = record("npm", "zeta");
        big.raw_metrics.community.install_count = Some(5_000_000);
        let mut small = record("npm", "alpha");
        small.raw_metrics.community.install_count = Some(10);
        let mut unknown_b = record("npm", "beta");
        unknown_b.raw_metrics.community.install_count = None;
        let mut unknown_a = record("npm", "aardvark");
        unknown_a.raw_metrics.community.install_count = None;

        let temp_dir = TempDir::new().unwrap();
        let writer = SummaryWriter::new(DataLayout::new(temp_dir.path()), false);
        writer
            .write("npm", &[unknown_b, small, big, unknown_a], Uuid::new_v4(), Utc::now())
            .unwrap();

        let names: Vec<_> = writer
            .read_summaries("npm")
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "aardvark", "beta"]);
    }

    #[test]
    fn test_stats_distributions() {
        let mut low = record("npm", "low");
        low.composite_score.overall = 42.0;
        low.composite_score.grade = crate::models::Grade::F;
        let records = vec![record("npm", "a"), record("npm", "b"), low];

        let stats = EcosystemStats::from_records("npm", &records, Uuid::new_v4(), Utc::now());
        assert_eq!(stats.package_count, 3);
        assert_eq!(stats.grades.get("A"), Some(&2));
        assert_eq!(stats.grades.get("F"), Some(&1));
        assert_eq!(stats.median_overall, Some(99.5));
        assert_eq!(stats.score_histogram[4], 1);
        assert_eq!(stats.score_histogram[9], 2);
        assert_eq!(stats.score_histogram.iter().sum::<usize>(), 3);
    }

    #[test]
    fn test_empty_population() {
        let stats = EcosystemStats::from_records("npm", &[], Uuid::new_v4(), Utc::now());
        assert_eq!(stats.mean_overall, None);
        assert_eq!(stats.median_overall, None);
        assert_eq!(stats.score_histogram, vec![0; 10]);
    }
}
