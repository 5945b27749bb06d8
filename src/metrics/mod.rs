//! Raw metrics bundle: the normalized per-package signal snapshot
//!
//! Collectors fill in six signal groups. Every group must be present, but
//! every field inside a group is optional and falls back to a neutral
//! default, so a sparse bundle still scores (with reduced confidence).

use crate::error::{PkgriskError, Result, ValidationError};
use crate::models::RepoRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CVE severity as reported by the advisory source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" | "MODERATE" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

impl Severity {
    /// High or critical
    pub fn is_high(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

/// A single known vulnerability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CveRecord {
    pub id: String,
    pub severity: Severity,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub fixed_version: Option<String>,
    #[serde(default)]
    pub days_to_patch: Option<u32>,
}

impl CveRecord {
    pub fn is_patched(&self) -> bool {
        self.fixed_version.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySignals {
    pub cves: Vec<CveRecord>,
    /// Used only when no per-CVE detail is available
    pub known_cve_count: u32,
    pub vulnerable_dependencies: u32,
    pub has_security_policy: bool,
    pub security_tools: Vec<String>,
    pub signed_commit_ratio: f64,
}

impl SecuritySignals {
    pub fn cve_count(&self) -> u32 {
        if self.cves.is_empty() {
            self.known_cve_count
        } else {
            u32::try_from(self.cves.len()).unwrap_or(u32::MAX)
        }
    }

    pub fn has_unpatched(&self) -> bool {
        self.cves.iter().any(|cve| !cve.is_patched())
    }

    pub fn has_high_unpatched(&self) -> bool {
        self.cves
            .iter()
            .any(|cve| !cve.is_patched() && cve.severity.is_high())
    }

    /// Any vulnerability that has a fixed release
    pub fn has_patched_history(&self) -> bool {
        self.cves.iter().any(CveRecord::is_patched)
    }

    /// Mean days-to-patch over CVEs that report it
    pub fn mean_days_to_patch(&self) -> Option<f64> {
        let days: Vec<f64> = self
            .cves
            .iter()
            .filter_map(|cve| cve.days_to_patch.map(f64::from))
            .collect();
        if days.is_empty() {
            None
        } else {
            Some(days.iter().sum::<f64>() / days.len() as f64)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceSignals {
    pub last_commit_at: Option<DateTime<Utc>>,
    pub commits_last_6mo: u32,
    pub open_issues: u32,
    pub closed_issues_6mo: u32,
    pub avg_issue_response_hours: Option<f64>,
    pub stale_pull_requests: u32,
    pub releases_last_year: u32,
    pub is_archived: bool,
    pub is_deprecated: bool,
}

impl MaintenanceSignals {
    /// Closed share of issues, None when there is no issue history
    pub fn close_rate(&self) -> Option<f64> {
        let total = self.open_issues + self.closed_issues_6mo;
        if total == 0 {
            None
        } else {
            Some(f64::from(self.closed_issues_6mo) / f64::from(total))
        }
    }

    pub fn issue_history(&self) -> u32 {
        self.open_issues + self.closed_issues_6mo
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunitySignals {
    pub stars: u32,
    pub forks: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub total_contributors: u32,
    pub good_first_issues: u32,
    pub has_discussions: bool,
    pub install_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusFactorSignals {
    pub contributors_over_5pct: u32,
    /// Commit share of the single largest contributor, in [0, 1]
    pub top_contributor_share: Option<f64>,
    /// Per-contributor commit shares, in [0, 1]
    pub commit_shares: Vec<f64>,
    pub active_contributors_6mo: u32,
    pub has_codeowners: bool,
    pub has_governance: bool,
}

/// LLM-assessed README ratings, each 0 to 10
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityRatings {
    pub clarity: f64,
    pub installation: f64,
    pub quick_start: f64,
    pub examples: f64,
}

impl QualityRatings {
    pub fn mean(&self) -> f64 {
        (self.clarity + self.installation + self.quick_start + self.examples) / 4.0
    }

    fn values(&self) -> [(&'static str, f64); 4] {
        [
            ("clarity", self.clarity),
            ("installation", self.installation),
            ("quick_start", self.quick_start),
            ("examples", self.examples),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentationSignals {
    pub has_readme: bool,
    pub has_docs_dir: bool,
    pub has_examples_dir: bool,
    pub has_changelog: bool,
    pub has_contributing: bool,
    pub quality: Option<QualityRatings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilitySignals {
    pub latest_version: Option<String>,
    pub prerelease_ratio: f64,
    pub has_tests: bool,
    pub has_ci: bool,
    pub ci_pass_rate: Option<f64>,
    pub regression_issues: u32,
}

/// A suspicious construct found in an install script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousPattern {
    pub id: String,
    pub severity: Severity,
    #[serde(default)]
    pub location: Option<String>,
}

/// Install-time and publishing signals from the package artifact itself.
/// Only collected for ecosystems with install hooks; absent otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyChainSignals {
    /// Install hooks the package declares, e.g. `preinstall`, `postinstall`
    pub install_scripts: Vec<String>,
    pub suspicious_patterns: Vec<SuspiciousPattern>,
    pub has_obfuscation: bool,
    pub has_credential_access: bool,
    pub has_network_calls: bool,
    /// An install script downloads or installs a language runtime
    pub installs_runtime: bool,
    /// Files in the published artifact that do not belong in a package
    pub suspicious_files: Vec<String>,
    /// Major version jumped by more than five or went backwards
    pub suspicious_version_jump: bool,
    /// Install hooks added since the previous release
    pub new_install_scripts: u32,
    /// Well-known package whose name this one closely imitates
    pub typosquat_of: Option<String>,
    pub maintainer_count: Option<u32>,
    pub publisher_is_maintainer: Option<bool>,
    pub has_provenance: bool,
    pub recent_maintainer_change: bool,
}

impl SupplyChainSignals {
    /// Runtime installs, credential exfiltration, or planted files
    pub fn has_attack_indicators(&self) -> bool {
        self.installs_runtime
            || (self.has_credential_access && self.has_network_calls)
            || !self.suspicious_files.is_empty()
    }
}

/// Immutable per-package signal snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricsBundle {
    pub ecosystem: String,
    pub name: String,
    /// Reference time for every age computation
    pub collected_at: DateTime<Utc>,
    #[serde(default)]
    pub repository: Option<RepoRef>,
    pub security: SecuritySignals,
    pub maintenance: MaintenanceSignals,
    pub community: CommunitySignals,
    pub bus_factor: BusFactorSignals,
    pub documentation: DocumentationSignals,
    pub stability: StabilitySignals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_chain: Option<SupplyChainSignals>,
}

impl RawMetricsBundle {
    /// Bundle with every signal at its neutral default
    pub fn new(
        ecosystem: impl Into<String>,
        name: impl Into<String>,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            name: name.into(),
            collected_at,
            repository: None,
            security: SecuritySignals::default(),
            maintenance: MaintenanceSignals::default(),
            community: CommunitySignals::default(),
            bus_factor: BusFactorSignals::default(),
            documentation: DocumentationSignals::default(),
            stability: StabilitySignals::default(),
            supply_chain: None,
        }
    }

    /// Parse and validate a bundle from JSON
    pub fn from_json(content: &str) -> Result<Self> {
        let bundle: Self = serde_json::from_str(content)
            .map_err(|e| PkgriskError::json(e, "Failed to parse metrics bundle"))?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn has_repository(&self) -> bool {
        self.repository.is_some()
    }

    /// Whole days between `at` and collection time, never negative
    pub fn days_since(&self, at: DateTime<Utc>) -> i64 {
        (self.collected_at - at).num_days().max(0)
    }

    pub fn days_since_last_commit(&self) -> Option<i64> {
        self.maintenance.last_commit_at.map(|at| self.days_since(at))
    }

    pub fn age_days(&self) -> Option<i64> {
        self.community.created_at.map(|at| self.days_since(at))
    }

    /// Structural checks; absent optional data is never an error here
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.ecosystem.trim().is_empty() {
            errors.push(ValidationError::new("ecosystem", "Ecosystem cannot be empty"));
        }
        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "Package name cannot be empty"));
        }

        check_ratio(
            "security.signed_commit_ratio",
            Some(self.security.signed_commit_ratio),
            &mut errors,
        );
        check_ratio(
            "bus_factor.top_contributor_share",
            self.bus_factor.top_contributor_share,
            &mut errors,
        );
        for (idx, share) in self.bus_factor.commit_shares.iter().enumerate() {
            check_ratio(
                &format!("bus_factor.commit_shares[{}]", idx),
                Some(*share),
                &mut errors,
            );
        }
        check_ratio(
            "stability.prerelease_ratio",
            Some(self.stability.prerelease_ratio),
            &mut errors,
        );
        check_ratio(
            "stability.ci_pass_rate",
            self.stability.ci_pass_rate,
            &mut errors,
        );

        if let Some(hours) = self.maintenance.avg_issue_response_hours {
            if !hours.is_finite() || hours < 0.0 {
                errors.push(ValidationError::new(
                    "maintenance.avg_issue_response_hours",
                    format!("Must be a non-negative number, got {}", hours),
                ));
            }
        }

        if let Some(quality) = &self.documentation.quality {
            for (field, value) in quality.values() {
                if !(0.0..=10.0).contains(&value) {
                    errors.push(ValidationError::new(
                        format!("documentation.quality.{}", field),
                        format!("Rating must be between 0 and 10, got {}", value),
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PkgriskError::InvalidBundle {
                package: format!("{}/{}", self.ecosystem, self.name),
                errors,
            })
        }
    }
}

fn check_ratio(path: &str, value: Option<f64>, errors: &mut Vec<ValidationError>) {
    if let Some(value) = value {
        // NaN fails the range check too
        if !(0.0..=1.0).contains(&value) {
            errors.push(ValidationError::new(
                path,
                format!("Ratio must be between 0.0 and 1.0, got {}", value),
            ));
        }
    }
}
