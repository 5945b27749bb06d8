//! Shared data model: classifications, composite scores, and package records

mod record;
mod score;

pub use record::{CollectedPackage, PackageRecord, PackageSummary};
pub(crate) use score::round1;
pub use score::{ComponentKind, ComponentScores, CompositeScore, ScoreComponent};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source code hosting platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Gitlab,
    Bitbucket,
    Other,
}

/// Reference to a source code repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub platform: Platform,
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
}

impl RepoRef {
    /// Full repository URL, empty host for unknown platforms
    pub fn url(&self) -> String {
        let base = match self.platform {
            Platform::Github => "https://github.com",
            Platform::Gitlab => "https://gitlab.com",
            Platform::Bitbucket => "https://bitbucket.org",
            Platform::Other => "",
        };
        format!("{}/{}/{}", base, self.owner, self.repo)
    }
}

/// Letter grade derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

/// Enterprise actionability classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Approved,
    Conditional,
    Restricted,
    Prohibited,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTier::Approved => "approved",
            RiskTier::Conditional => "conditional",
            RiskTier::Restricted => "restricted",
            RiskTier::Prohibited => "prohibited",
        };
        f.write_str(s)
    }
}

/// Recommended remediation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateUrgency {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for UpdateUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateUrgency::Low => "low",
            UpdateUrgency::Medium => "medium",
            UpdateUrgency::High => "high",
            UpdateUrgency::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// How much underlying data backs a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(s)
    }
}

/// Install-time and publishing risk of the package artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyChainLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for SupplyChainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SupplyChainLevel::Low => "low",
            SupplyChainLevel::Medium => "medium",
            SupplyChainLevel::High => "high",
            SupplyChainLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Assessed supply chain risk, 0 (clean) to 100
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyChainRisk {
    pub score: u32,
    pub level: SupplyChainLevel,
    #[serde(default)]
    pub factors: Vec<String>,
}

/// Project age bucket, from repository creation date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectAgeBand {
    New,
    Established,
    Mature,
    Legacy,
}

impl fmt::Display for ProjectAgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectAgeBand::New => "new",
            ProjectAgeBand::Established => "established",
            ProjectAgeBand::Mature => "mature",
            ProjectAgeBand::Legacy => "legacy",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_url() {
        let repo = RepoRef {
            platform: Platform::Github,
            owner: "BurntSushi".to_string(),
            repo: "ripgrep".to_string(),
            subpath: None,
        };
        assert_eq!(repo.url(), "https://github.com/BurntSushi/ripgrep");
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&Grade::B).unwrap(), "\"B\"");
        assert_eq!(
            serde_json::to_string(&RiskTier::Prohibited).unwrap(),
            "\"prohibited\""
        );
        assert_eq!(
            serde_json::to_string(&SupplyChainLevel::High).unwrap(),
            "\"high\""
        );
        assert_eq!(
            serde_json::to_string(&ProjectAgeBand::Established).unwrap(),
            "\"established\""
        );
    }
}
