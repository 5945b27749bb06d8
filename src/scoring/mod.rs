//! Rule-based component scoring
//!
//! The calculator turns one metrics bundle into six clamped component
//! scores, a weighted overall, and a grade. Each component records the
//! trail of rules that fired so explanations never recompute thresholds
//! on their own.

use crate::error::Result;
use crate::metrics::RawMetricsBundle;
use crate::models::{ComponentKind, ComponentScores, Grade, ScoreComponent};
use crate::policy::{GradeThresholds, PolicyValidator, ScoringPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

mod bus_factor;
mod community;
mod documentation;
mod maintenance;
mod percentile;
mod security;
mod stability;

pub use percentile::percentile_ranks;

/// Identifies the rule behind a score adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    KnownCves,
    PatchSpeed,
    StaleUnpatchedCve,
    VulnerableDependencies,
    NoSecurityPolicy,
    SecurityTooling,
    SignedCommits,
    Archived,
    Deprecated,
    CommitRecency,
    CommitVolume,
    IssueCloseRate,
    IssueResponse,
    StalePullRequests,
    ReleaseCadence,
    StarVelocity,
    ForkRatio,
    Contributors,
    GoodFirstIssues,
    Discussions,
    InstallVolume,
    ContributorSpread,
    TopContributorShare,
    ContributorEntropy,
    ActiveContributors,
    Codeowners,
    Governance,
    DocPresence,
    DocQuality,
    VersionMaturity,
    PrereleaseRatio,
    Tests,
    ContinuousIntegration,
    CiPassRate,
    Regressions,
}

impl Rule {
    pub fn label(&self) -> &'static str {
        match self {
            Rule::KnownCves => "known vulnerabilities",
            Rule::PatchSpeed => "time to patch",
            Rule::StaleUnpatchedCve => "stale unpatched vulnerability",
            Rule::VulnerableDependencies => "vulnerable dependencies",
            Rule::NoSecurityPolicy => "security policy",
            Rule::SecurityTooling => "security tooling",
            Rule::SignedCommits => "signed commits",
            Rule::Archived => "archived repository",
            Rule::Deprecated => "deprecated package",
            Rule::CommitRecency => "commit recency",
            Rule::CommitVolume => "commit volume",
            Rule::IssueCloseRate => "issue close rate",
            Rule::IssueResponse => "issue response time",
            Rule::StalePullRequests => "stale pull requests",
            Rule::ReleaseCadence => "release cadence",
            Rule::StarVelocity => "star velocity",
            Rule::ForkRatio => "fork ratio",
            Rule::Contributors => "contributor count",
            Rule::GoodFirstIssues => "good first issues",
            Rule::Discussions => "discussions",
            Rule::InstallVolume => "install volume",
            Rule::ContributorSpread => "contributor spread",
            Rule::TopContributorShare => "top contributor share",
            Rule::ContributorEntropy => "contributor entropy",
            Rule::ActiveContributors => "active contributors",
            Rule::Codeowners => "CODEOWNERS",
            Rule::Governance => "governance",
            Rule::DocPresence => "documentation files",
            Rule::DocQuality => "documentation quality",
            Rule::VersionMaturity => "version maturity",
            Rule::PrereleaseRatio => "prerelease ratio",
            Rule::Tests => "tests",
            Rule::ContinuousIntegration => "continuous integration",
            Rule::CiPassRate => "CI pass rate",
            Rule::Regressions => "regressions",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One fired rule and its effect on a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub rule: Rule,
    pub points: f64,
    pub detail: String,
}

/// How a single component score was reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentBreakdown {
    pub kind: ComponentKind,
    pub base: f64,
    pub adjustments: Vec<Adjustment>,
    /// Base plus adjustments, clamped to [0, 100]
    pub score: f64,
}

impl ComponentBreakdown {
    pub(crate) fn new(kind: ComponentKind, base: f64) -> Self {
        Self {
            kind,
            base,
            adjustments: Vec::new(),
            score: base,
        }
    }

    /// Record a fired rule; zero-point rules leave no trace
    pub(crate) fn add(&mut self, rule: Rule, points: f64, detail: impl Into<String>) {
        if points != 0.0 {
            self.adjustments.push(Adjustment {
                rule,
                points,
                detail: detail.into(),
            });
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.score = self.unclamped().clamp(0.0, 100.0);
        self
    }

    pub fn unclamped(&self) -> f64 {
        self.base + self.adjustments.iter().map(|a| a.points).sum::<f64>()
    }
}

/// Full scoring result for one bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub has_repository: bool,
    pub breakdowns: Vec<ComponentBreakdown>,
    pub components: ComponentScores,
    pub overall: f64,
    pub grade: Grade,
}

impl ScoreCard {
    pub fn breakdown(&self, kind: ComponentKind) -> Option<&ComponentBreakdown> {
        self.breakdowns.iter().find(|b| b.kind == kind)
    }
}

/// Letter grade for an overall score
pub fn grade_for(overall: f64, thresholds: &GradeThresholds) -> Grade {
    if overall >= thresholds.a {
        Grade::A
    } else if overall >= thresholds.b {
        Grade::B
    } else if overall >= thresholds.c {
        Grade::C
    } else if overall >= thresholds.d {
        Grade::D
    } else {
        Grade::F
    }
}

/// Computes component scores from a validated policy
#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    policy: Arc<ScoringPolicy>,
}

impl ScoreCalculator {
    pub fn new(policy: ScoringPolicy) -> Result<Self> {
        PolicyValidator::validate(&policy)?;
        Ok(Self {
            policy: Arc::new(policy),
        })
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score a bundle after validating its structure
    pub fn score(&self, bundle: &RawMetricsBundle) -> Result<ScoreCard> {
        bundle.validate()?;
        Ok(self.score_unchecked(bundle))
    }

    /// Score a bundle that is already known to be valid
    pub fn score_unchecked(&self, bundle: &RawMetricsBundle) -> ScoreCard {
        let policy = &*self.policy;
        let breakdowns = if bundle.has_repository() {
            let thresholds = policy.thresholds_for(&bundle.ecosystem);
            vec![
                security::score(bundle, &policy.security),
                maintenance::score(bundle, &policy.maintenance, thresholds),
                community::score(bundle, &policy.community, thresholds),
                bus_factor::score(bundle, &policy.bus_factor),
                documentation::score(bundle, &policy.documentation),
                stability::score(bundle, &policy.stability),
            ]
        } else {
            ComponentKind::ALL
                .iter()
                .map(|kind| ComponentBreakdown::new(*kind, policy.no_repository_score).finish())
                .collect()
        };

        let weights = &policy.weights;
        let component = |idx: usize, weight: u8| ScoreComponent {
            score: breakdowns[idx].score,
            weight,
        };
        let components = ComponentScores {
            security: component(0, weights.security),
            maintenance: component(1, weights.maintenance),
            community: component(2, weights.community),
            bus_factor: component(3, weights.bus_factor),
            documentation: component(4, weights.documentation),
            stability: component(5, weights.stability),
        };
        let overall = components.overall();

        ScoreCard {
            has_repository: bundle.has_repository(),
            grade: grade_for(overall, &policy.grades),
            breakdowns,
            components,
            overall,
        }
    }
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self {
            policy: Arc::new(ScoringPolicy::default()),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::metrics::RawMetricsBundle;
    use crate::models::{Platform, RepoRef};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    pub fn collected_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    /// A healthy, well-documented package with a linked repository
    pub fn healthy_bundle() -> RawMetricsBundle {
        let now = collected_at();
        let mut bundle = RawMetricsBundle::new("pypi", "requests", now);
        bundle.repository = Some(RepoRef {
            platform: Platform::Github,
            owner: "psf".to_string(),
            repo: "requests".to_string(),
            subpath: None,
        });

        bundle.security.has_security_policy = true;
        bundle.security.security_tools = vec!["dependabot".to_string(), "codeql".to_string()];

        let m = &mut bundle.maintenance;
        m.last_commit_at = Some(now - Duration::days(3));
        m.commits_last_6mo = 47;
        m.open_issues = 10;
        m.closed_issues_6mo = 40;
        m.avg_issue_response_hours = Some(12.0);
        m.releases_last_year = 6;

        let c = &mut bundle.community;
        c.stars = 50_000;
        c.forks = 9_000;
        c.created_at = Some(now - Duration::days(10 * 365));
        c.total_contributors = 700;
        c.good_first_issues = 12;
        c.has_discussions = true;
        c.install_count = Some(250_000_000);

        let b = &mut bundle.bus_factor;
        b.contributors_over_5pct = 4;
        b.top_contributor_share = Some(0.3);
        b.commit_shares = vec![0.3, 0.25, 0.25, 0.2];
        b.active_contributors_6mo = 12;
        b.has_codeowners = true;
        b.has_governance = true;

        let d = &mut bundle.documentation;
        d.has_readme = true;
        d.has_docs_dir = true;
        d.has_examples_dir = true;
        d.has_changelog = true;
        d.has_contributing = true;
        d.quality = Some(crate::metrics::QualityRatings {
            clarity: 10.0,
            installation: 10.0,
            quick_start: 10.0,
            examples: 10.0,
        });

        let s = &mut bundle.stability;
        s.latest_version = Some("2.32.3".to_string());
        s.prerelease_ratio = 0.05;
        s.has_tests = true;
        s.has_ci = true;
        s.ci_pass_rate = Some(0.98);

        bundle
    }
}
