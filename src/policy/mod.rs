//! Scoring policy: the single rule table shared by scoring and explanation
//!
//! Every threshold and point value used to score a package lives here.
//! The table is plain data, loaded from TOML (or the built-in defaults)
//! and validated once before any package is scored.

use crate::error::{PkgriskError, Result};
use crate::metrics::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

mod validator;

pub use validator::PolicyValidator;

/// How a step compares the measured value with its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cmp {
    AtLeast,
    Above,
    AtMost,
    Below,
}

impl Cmp {
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Cmp::AtLeast => value >= threshold,
            Cmp::Above => value > threshold,
            Cmp::AtMost => value <= threshold,
            Cmp::Below => value < threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Cmp::AtLeast => ">=",
            Cmp::Above => ">",
            Cmp::AtMost => "<=",
            Cmp::Below => "<",
        }
    }

    fn descending(&self) -> bool {
        matches!(self, Cmp::AtLeast | Cmp::Above)
    }
}

/// One row of a step table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub when: Cmp,
    pub threshold: f64,
    pub points: f64,
}

impl Step {
    pub const fn new(when: Cmp, threshold: f64, points: f64) -> Self {
        Self {
            when,
            threshold,
            points,
        }
    }
}

/// Ordered step table; the first matching row wins
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepTable(pub Vec<Step>);

impl StepTable {
    pub fn lookup(&self, value: f64) -> Option<&Step> {
        self.0.iter().find(|step| step.when.matches(value, step.threshold))
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    /// Index of the first row that can never match because an earlier row
    /// with the same comparison already covers it
    pub(crate) fn first_shadowed(&self) -> Option<usize> {
        self.0.windows(2).position(|pair| {
            let (prev, next) = (pair[0], pair[1]);
            prev.when == next.when
                && if prev.when.descending() {
                    next.threshold >= prev.threshold
                } else {
                    next.threshold <= prev.threshold
                }
        })
        .map(|idx| idx + 1)
    }
}

macro_rules! steps {
    ($(($when:ident, $threshold:expr, $points:expr)),* $(,)?) => {
        StepTable(vec![$(Step::new(Cmp::$when, $threshold as f64, $points as f64)),*])
    };
}

/// Percentage weights of the six components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weights {
    pub security: u8,
    pub maintenance: u8,
    pub community: u8,
    pub bus_factor: u8,
    pub documentation: u8,
    pub stability: u8,
}

impl Weights {
    pub fn sum(&self) -> u32 {
        [
            self.security,
            self.maintenance,
            self.community,
            self.bus_factor,
            self.documentation,
            self.stability,
        ]
        .iter()
        .map(|w| u32::from(*w))
        .sum()
    }
}

/// Minimum overall score for each passing grade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeThresholds {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityPenalties {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub unknown: f64,
}

impl SeverityPenalties {
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Unknown => self.unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityRules {
    pub base: f64,
    pub cve_penalty: SeverityPenalties,
    pub cve_penalty_cap: f64,
    /// Per CVE when only a count is known
    pub undetailed_cve_penalty: f64,
    pub patch_days: StepTable,
    pub stale_unpatched_days: i64,
    pub stale_unpatched_penalty: f64,
    pub vulnerable_dependency_penalty: f64,
    pub vulnerable_dependency_cap: f64,
    pub no_policy_penalty: f64,
    pub security_tools: StepTable,
    pub signed_commits: StepTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRules {
    pub base: f64,
    pub archived_penalty: f64,
    pub deprecated_penalty: f64,
    /// Keyed by days since the last commit
    pub commit_recency: StepTable,
    pub commit_volume: StepTable,
    pub close_rate: StepTable,
    /// Bonus when the average response beats the ecosystem's good hours
    pub fast_response_bonus: f64,
    /// Applied when the ecosystem bonus does not
    pub response_hours: StepTable,
    pub stale_pr_threshold: u32,
    pub stale_pr_penalty: f64,
    pub stale_pr_cap: f64,
    pub release_sweet_spot_bonus: f64,
    pub release_below_sweet_spot_bonus: f64,
    pub no_release_active_penalty: f64,
    pub no_release_inactive_penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRules {
    pub base: f64,
    pub star_velocity: StepTable,
    pub fork_ratio: StepTable,
    pub contributors: StepTable,
    pub good_first_issues: StepTable,
    pub discussions_bonus: f64,
    pub install_high_bonus: f64,
    pub install_medium_bonus: f64,
}

/// Contributor concentration measure used by the bus factor component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationModel {
    /// Step tables over contributors above 5% and the top contributor share
    TopShare,
    /// Normalized Shannon entropy over per-contributor commit shares
    Entropy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusFactorRules {
    pub base: f64,
    pub model: ConcentrationModel,
    pub contributor_spread: StepTable,
    pub top_share: StepTable,
    /// Points at zero entropy
    pub entropy_floor: f64,
    /// Points added at maximum normalized entropy
    pub entropy_span: f64,
    pub active_contributors: StepTable,
    pub codeowners_bonus: f64,
    pub governance_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationRules {
    pub readme_points: f64,
    pub docs_dir_points: f64,
    pub examples_dir_points: f64,
    pub changelog_points: f64,
    pub contributing_points: f64,
    pub presence_weight: f64,
    pub quality_weight: f64,
    /// Quality sub-score without an assessment when a README exists
    pub unassessed_readme_quality: f64,
}

impl DocumentationRules {
    pub fn presence_max(&self) -> f64 {
        self.readme_points
            + self.docs_dir_points
            + self.examples_dir_points
            + self.changelog_points
            + self.contributing_points
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityRules {
    pub base: f64,
    pub mature_version_bonus: f64,
    pub prerelease_ratio: StepTable,
    pub tests_bonus: f64,
    pub ci_bonus: f64,
    pub no_ci_penalty: f64,
    pub ci_pass_rate: StepTable,
    pub regressions: StepTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRules {
    pub approved_min: f64,
    pub conditional_min: f64,
    /// Security component below this forces at least restricted
    pub security_floor: f64,
    /// Approved requires a commit within this many days
    pub active_days: i64,
    pub abandoned_days: i64,
    pub stale_days: i64,
    pub single_maintainer_max: u32,
}

/// Points for install-time and publishing findings. Sub-scores for
/// scripts, planted files, release history, and publishing are each
/// capped at 100; the package gets the highest of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyChainRules {
    pub preinstall_points: u32,
    pub install_points: u32,
    pub postinstall_points: u32,
    pub critical_pattern_points: u32,
    pub high_pattern_points: u32,
    pub medium_pattern_points: u32,
    pub low_pattern_points: u32,
    pub obfuscation_points: u32,
    pub credential_access_points: u32,
    pub runtime_install_points: u32,
    /// Credential access combined with network calls
    pub exfiltration_points: u32,
    pub suspicious_file_points: u32,
    pub version_jump_points: u32,
    pub new_install_script_points: u32,
    pub typosquat_points: u32,
    pub no_provenance_points: u32,
    pub unlisted_publisher_points: u32,
    pub single_maintainer_points: u32,
    pub no_maintainer_points: u32,
    pub maintainer_change_points: u32,
    /// Added when at least two sub-scores reach `high_min`
    pub multiple_high_bonus: u32,
    pub medium_min: u32,
    pub high_min: u32,
    pub critical_min: u32,
}

impl Default for SupplyChainRules {
    fn default() -> Self {
        Self {
            preinstall_points: 30,
            install_points: 15,
            postinstall_points: 20,
            critical_pattern_points: 25,
            high_pattern_points: 15,
            medium_pattern_points: 8,
            low_pattern_points: 3,
            obfuscation_points: 20,
            credential_access_points: 25,
            runtime_install_points: 30,
            exfiltration_points: 20,
            suspicious_file_points: 25,
            version_jump_points: 30,
            new_install_script_points: 25,
            typosquat_points: 50,
            no_provenance_points: 10,
            unlisted_publisher_points: 25,
            single_maintainer_points: 5,
            no_maintainer_points: 15,
            maintainer_change_points: 15,
            multiple_high_bonus: 20,
            medium_min: 25,
            high_min: 50,
            critical_min: 75,
        }
    }
}

impl SupplyChainRules {
    pub fn pattern_points(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical_pattern_points,
            Severity::High => self.high_pattern_points,
            Severity::Medium => self.medium_pattern_points,
            Severity::Low | Severity::Unknown => self.low_pattern_points,
        }
    }

    /// Points for declaring an install hook; other scripts are free
    pub fn hook_points(&self, hook: &str) -> u32 {
        match hook {
            "preinstall" => self.preinstall_points,
            "install" => self.install_points,
            "postinstall" => self.postinstall_points,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRules {
    pub new_package_days: i64,
    pub min_contributors: u32,
    pub min_issues: u32,
    /// Factor counts at or above this are low confidence
    pub low_factor_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBands {
    pub established_days: i64,
    pub mature_days: i64,
    pub legacy_days: i64,
}

/// Thresholds that vary per ecosystem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EcosystemThresholds {
    pub release_min: u32,
    pub release_max: u32,
    pub good_response_hours: f64,
    pub install_high: u64,
    pub install_medium: u64,
}

/// Complete scoring and classification policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Component score used for every component when no repository is linked
    pub no_repository_score: f64,
    pub weights: Weights,
    pub grades: GradeThresholds,
    pub security: SecurityRules,
    pub maintenance: MaintenanceRules,
    pub community: CommunityRules,
    pub bus_factor: BusFactorRules,
    pub documentation: DocumentationRules,
    pub stability: StabilityRules,
    pub risk: RiskRules,
    #[serde(default)]
    pub supply_chain: SupplyChainRules,
    pub confidence: ConfidenceRules,
    pub age_bands: AgeBands,
    pub default_ecosystem: EcosystemThresholds,
    #[serde(default)]
    pub ecosystems: BTreeMap<String, EcosystemThresholds>,
}

impl ScoringPolicy {
    /// Load and validate a policy file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PkgriskError::io(e, format!("Failed to read policy file: {:?}", path))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let policy: ScoringPolicy = toml::from_str(content)?;
        PolicyValidator::validate(&policy)?;
        Ok(policy)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Thresholds for an ecosystem, falling back to the default set
    pub fn thresholds_for(&self, ecosystem: &str) -> &EcosystemThresholds {
        self.ecosystems
            .get(&ecosystem.to_ascii_lowercase())
            .unwrap_or(&self.default_ecosystem)
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let mut ecosystems = BTreeMap::new();
        ecosystems.insert(
            "npm".to_string(),
            EcosystemThresholds {
                release_min: 12,
                release_max: 52,
                good_response_hours: 24.0,
                install_high: 1_000_000,
                install_medium: 100_000,
            },
        );

        Self {
            no_repository_score: 50.0,
            weights: Weights {
                security: 30,
                maintenance: 25,
                community: 15,
                bus_factor: 10,
                documentation: 10,
                stability: 10,
            },
            grades: GradeThresholds {
                a: 90.0,
                b: 80.0,
                c: 70.0,
                d: 60.0,
            },
            security: SecurityRules {
                base: 100.0,
                cve_penalty: SeverityPenalties {
                    critical: 20.0,
                    high: 15.0,
                    medium: 8.0,
                    low: 3.0,
                    unknown: 10.0,
                },
                cve_penalty_cap: 60.0,
                undetailed_cve_penalty: 10.0,
                patch_days: steps![(Below, 7, 10), (Below, 30, 5), (Above, 90, -10)],
                stale_unpatched_days: 30,
                stale_unpatched_penalty: 15.0,
                vulnerable_dependency_penalty: 5.0,
                vulnerable_dependency_cap: 20.0,
                no_policy_penalty: 10.0,
                security_tools: steps![(AtLeast, 3, 10), (AtLeast, 2, 5), (AtMost, 0, -10)],
                signed_commits: steps![(AtLeast, 0.8, 10), (AtLeast, 0.5, 5)],
            },
            maintenance: MaintenanceRules {
                base: 100.0,
                archived_penalty: 40.0,
                deprecated_penalty: 30.0,
                commit_recency: steps![
                    (AtMost, 30, 0),
                    (AtMost, 90, -10),
                    (AtMost, 180, -25),
                    (Above, 180, -40)
                ],
                commit_volume: steps![(AtLeast, 10, 8), (AtLeast, 1, 5), (AtMost, 0, -20)],
                close_rate: steps![(Below, 0.3, -15), (Above, 0.7, 5)],
                fast_response_bonus: 10.0,
                response_hours: steps![(Below, 168, 5), (Above, 720, -10)],
                stale_pr_threshold: 5,
                stale_pr_penalty: 2.0,
                stale_pr_cap: 15.0,
                release_sweet_spot_bonus: 10.0,
                release_below_sweet_spot_bonus: 5.0,
                no_release_active_penalty: 5.0,
                no_release_inactive_penalty: 10.0,
            },
            community: CommunityRules {
                base: 70.0,
                star_velocity: steps![(AtLeast, 1000, 15), (AtLeast, 100, 10), (AtLeast, 10, 5)],
                fork_ratio: steps![(AtLeast, 0.1, 5)],
                contributors: steps![(AtLeast, 20, 5), (AtLeast, 5, 2)],
                good_first_issues: steps![(AtLeast, 5, 5), (AtLeast, 1, 2)],
                discussions_bonus: 5.0,
                install_high_bonus: 10.0,
                install_medium_bonus: 5.0,
            },
            bus_factor: BusFactorRules {
                base: 50.0,
                model: ConcentrationModel::TopShare,
                contributor_spread: steps![(AtLeast, 3, 25), (AtLeast, 2, 15), (AtLeast, 1, -10)],
                top_share: steps![(AtLeast, 0.9, -20), (AtLeast, 0.75, -10), (Below, 0.5, 10)],
                entropy_floor: -20.0,
                entropy_span: 55.0,
                active_contributors: steps![(AtLeast, 5, 10), (AtLeast, 2, 5), (AtLeast, 1, -10)],
                codeowners_bonus: 5.0,
                governance_bonus: 5.0,
            },
            documentation: DocumentationRules {
                readme_points: 40.0,
                docs_dir_points: 20.0,
                examples_dir_points: 20.0,
                changelog_points: 10.0,
                contributing_points: 10.0,
                presence_weight: 0.4,
                quality_weight: 0.6,
                unassessed_readme_quality: 50.0,
            },
            stability: StabilityRules {
                base: 60.0,
                mature_version_bonus: 15.0,
                prerelease_ratio: steps![(Above, 0.5, -10), (Below, 0.1, 5)],
                tests_bonus: 5.0,
                ci_bonus: 5.0,
                no_ci_penalty: 5.0,
                ci_pass_rate: steps![(AtLeast, 0.95, 5), (Below, 0.7, -10)],
                regressions: steps![(AtLeast, 6, -10), (AtLeast, 1, -5)],
            },
            risk: RiskRules {
                approved_min: 80.0,
                conditional_min: 60.0,
                security_floor: 40.0,
                active_days: 180,
                abandoned_days: 365,
                stale_days: 180,
                single_maintainer_max: 1,
            },
            supply_chain: SupplyChainRules::default(),
            confidence: ConfidenceRules {
                new_package_days: 180,
                min_contributors: 2,
                min_issues: 5,
                low_factor_count: 3,
            },
            age_bands: AgeBands {
                established_days: 365,
                mature_days: 3 * 365,
                legacy_days: 7 * 365,
            },
            default_ecosystem: EcosystemThresholds {
                release_min: 4,
                release_max: 12,
                good_response_hours: 48.0,
                install_high: 100_000,
                install_medium: 10_000,
            },
            ecosystems,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = ScoringPolicy::default();
        assert!(PolicyValidator::validate(&policy).is_ok());
        assert_eq!(policy.weights.sum(), 100);
    }

    #[test]
    fn test_toml_roundtrip_preserves_rules() {
        let policy = ScoringPolicy::default();
        let text = policy.to_toml().unwrap();
        let reloaded = ScoringPolicy::from_toml(&text).unwrap();
        assert_eq!(reloaded, policy);
    }

    #[test]
    fn test_step_lookup_first_match_wins() {
        let table = steps![(AtLeast, 10, 8), (AtLeast, 1, 5), (AtMost, 0, -20)];
        assert_eq!(table.lookup(47.0).map(|s| s.points), Some(8.0));
        assert_eq!(table.lookup(3.0).map(|s| s.points), Some(5.0));
        assert_eq!(table.lookup(0.0).map(|s| s.points), Some(-20.0));

        let gaps = steps![(Below, 0.3, -15), (Above, 0.7, 5)];
        assert!(gaps.lookup(0.5).is_none());
    }

    #[test]
    fn test_ecosystem_thresholds_fallback() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.thresholds_for("NPM").release_min, 12);
        assert_eq!(policy.thresholds_for("pypi").release_min, 4);
        assert_eq!(policy.thresholds_for("pypi").install_high, 100_000);
    }

    #[test]
    fn test_shadowed_step_detection() {
        let ok = steps![(AtLeast, 3, 25), (AtLeast, 2, 15), (AtLeast, 1, -10)];
        assert_eq!(ok.first_shadowed(), None);

        let shadowed = steps![(AtLeast, 2, 15), (AtLeast, 3, 25)];
        assert_eq!(shadowed.first_shadowed(), Some(1));
    }
}
