use super::{CompositeScore, Confidence, Grade, RepoRef, RiskTier, UpdateUrgency};
use crate::metrics::RawMetricsBundle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A package as handed over by the collectors, before scoring.
/// Identity (ecosystem, name, repository) lives in the metrics bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedPackage {
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub metrics: RawMetricsBundle,
}

impl CollectedPackage {
    pub fn name(&self) -> &str {
        &self.metrics.name
    }

    pub fn ecosystem(&self) -> &str {
        &self.metrics.ecosystem
    }
}

/// Fully analyzed package, the unit stored in chunk files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub ecosystem: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub repository_ref: Option<RepoRef>,
    pub raw_metrics: RawMetricsBundle,
    pub composite_score: CompositeScore,
    pub analyzed_at: DateTime<Utc>,
}

impl PackageRecord {
    pub fn summary(&self) -> PackageSummary {
        let metrics = &self.raw_metrics;
        let score = &self.composite_score;
        PackageSummary {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            repository_ref: self.repository_ref.clone(),
            install_count: metrics.community.install_count,
            overall: score.overall,
            grade: score.grade,
            percentile: score.percentile,
            risk_tier: score.risk_tier,
            update_urgency: score.update_urgency,
            confidence: score.confidence,
            analyzed_at: self.analyzed_at,
            last_commit_at: metrics.maintenance.last_commit_at,
            cve_count: metrics.security.cve_count(),
            has_unpatched_cves: metrics.security.has_unpatched(),
            top_contributor_share: metrics.bus_factor.top_contributor_share,
            has_security_policy: metrics.security.has_security_policy,
        }
    }
}

/// Lightweight row for list and browse views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSummary {
    pub name: String,
    pub version: String,
    pub description: String,
    pub repository_ref: Option<RepoRef>,
    pub install_count: Option<u64>,
    pub overall: f64,
    pub grade: Grade,
    pub percentile: Option<f64>,
    pub risk_tier: RiskTier,
    pub update_urgency: UpdateUrgency,
    pub confidence: Confidence,
    pub analyzed_at: DateTime<Utc>,
    // Risk indicators for dashboards
    pub last_commit_at: Option<DateTime<Utc>>,
    pub cve_count: u32,
    pub has_unpatched_cves: bool,
    pub top_contributor_share: Option<f64>,
    pub has_security_policy: bool,
}
