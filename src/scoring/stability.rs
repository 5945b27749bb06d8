use super::{ComponentBreakdown, Rule};
use crate::metrics::RawMetricsBundle;
use crate::models::ComponentKind;
use crate::policy::StabilityRules;
use regex::Regex;
use std::sync::OnceLock;

fn major_version(version: &str) -> Option<u64> {
    static MAJOR: OnceLock<Option<Regex>> = OnceLock::new();
    MAJOR
        .get_or_init(|| Regex::new(r"^\s*[vV]?(\d+)").ok())
        .as_ref()?
        .captures(version)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

pub(super) fn score(bundle: &RawMetricsBundle, rules: &StabilityRules) -> ComponentBreakdown {
    let signals = &bundle.stability;
    let mut breakdown = ComponentBreakdown::new(ComponentKind::Stability, rules.base);

    if let Some(version) = &signals.latest_version {
        if major_version(version).is_some_and(|major| major >= 1) {
            breakdown.add(
                Rule::VersionMaturity,
                rules.mature_version_bonus,
                format!("Stable major version ({})", version),
            );
        }
    }

    if let Some(step) = rules.prerelease_ratio.lookup(signals.prerelease_ratio) {
        breakdown.add(
            Rule::PrereleaseRatio,
            step.points,
            format!(
                "{:.0}% of releases are prereleases",
                signals.prerelease_ratio * 100.0
            ),
        );
    }

    if signals.has_tests {
        breakdown.add(Rule::Tests, rules.tests_bonus, "Test suite present");
    }

    if signals.has_ci {
        breakdown.add(Rule::ContinuousIntegration, rules.ci_bonus, "CI configured");
    } else {
        breakdown.add(
            Rule::ContinuousIntegration,
            -rules.no_ci_penalty,
            "No CI configured",
        );
    }

    if let Some(rate) = signals.ci_pass_rate {
        if let Some(step) = rules.ci_pass_rate.lookup(rate) {
            breakdown.add(
                Rule::CiPassRate,
                step.points,
                format!("CI passes {:.0}% of runs", rate * 100.0),
            );
        }
    }

    if let Some(step) = rules
        .regressions
        .lookup(f64::from(signals.regression_issues))
    {
        breakdown.add(
            Rule::Regressions,
            step.points,
            format!("{} regression issues", signals.regression_issues),
        );
    }

    breakdown.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ScoringPolicy;
    use crate::scoring::fixtures::healthy_bundle;

    #[test]
    fn test_major_version_parsing() {
        assert_eq!(major_version("2.32.3"), Some(2));
        assert_eq!(major_version("v1.0.0-rc.1"), Some(1));
        assert_eq!(major_version("0.9.1"), Some(0));
        assert_eq!(major_version("latest"), None);
    }

    #[test]
    fn test_unstable_package() {
        let rules = ScoringPolicy::default().stability;
        let mut bundle = healthy_bundle();
        let s = &mut bundle.stability;
        s.latest_version = Some("0.3.0".to_string());
        s.prerelease_ratio = 0.6;
        s.has_tests = false;
        s.has_ci = false;
        s.ci_pass_rate = None;
        s.regression_issues = 8;

        // 60 - 10 - 5 - 10
        assert_eq!(score(&bundle, &rules).score, 35.0);
    }
}
