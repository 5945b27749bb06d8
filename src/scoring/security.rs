use super::{ComponentBreakdown, Rule};
use crate::metrics::RawMetricsBundle;
use crate::models::ComponentKind;
use crate::policy::SecurityRules;

pub(super) fn score(bundle: &RawMetricsBundle, rules: &SecurityRules) -> ComponentBreakdown {
    let signals = &bundle.security;
    let mut breakdown = ComponentBreakdown::new(ComponentKind::Security, rules.base);

    if !signals.cves.is_empty() {
        let raw: f64 = signals
            .cves
            .iter()
            .map(|cve| rules.cve_penalty.for_severity(cve.severity))
            .sum();
        let capped = if raw > rules.cve_penalty_cap {
            " (penalty capped)"
        } else {
            ""
        };
        breakdown.add(
            Rule::KnownCves,
            -raw.min(rules.cve_penalty_cap),
            format!("{} known CVE(s){}", signals.cves.len(), capped),
        );
    } else if signals.known_cve_count > 0 {
        let raw = f64::from(signals.known_cve_count) * rules.undetailed_cve_penalty;
        breakdown.add(
            Rule::KnownCves,
            -raw.min(rules.cve_penalty_cap),
            format!(
                "{} known CVE(s) without severity detail",
                signals.known_cve_count
            ),
        );
    }

    if let Some(mean) = signals.mean_days_to_patch() {
        if let Some(step) = rules.patch_days.lookup(mean) {
            breakdown.add(
                Rule::PatchSpeed,
                step.points,
                format!("Vulnerabilities patched in {:.0} days on average", mean),
            );
        }
    }

    let stale = signals.cves.iter().any(|cve| {
        !cve.is_patched() && bundle.days_since(cve.published_at) > rules.stale_unpatched_days
    });
    if stale {
        breakdown.add(
            Rule::StaleUnpatchedCve,
            -rules.stale_unpatched_penalty,
            format!(
                "Unpatched vulnerability open for more than {} days",
                rules.stale_unpatched_days
            ),
        );
    }

    if signals.vulnerable_dependencies > 0 {
        let penalty = (f64::from(signals.vulnerable_dependencies)
            * rules.vulnerable_dependency_penalty)
            .min(rules.vulnerable_dependency_cap);
        breakdown.add(
            Rule::VulnerableDependencies,
            -penalty,
            format!(
                "{} dependencies with known vulnerabilities",
                signals.vulnerable_dependencies
            ),
        );
    }

    if !signals.has_security_policy {
        breakdown.add(
            Rule::NoSecurityPolicy,
            -rules.no_policy_penalty,
            "No security policy published",
        );
    }

    let tools = signals.security_tools.len();
    if let Some(step) = rules.security_tools.lookup(tools as f64) {
        let detail = if tools == 0 {
            "No automated security tooling".to_string()
        } else {
            format!("Security tooling: {}", signals.security_tools.join(", "))
        };
        breakdown.add(Rule::SecurityTooling, step.points, detail);
    }

    if let Some(step) = rules.signed_commits.lookup(signals.signed_commit_ratio) {
        breakdown.add(
            Rule::SignedCommits,
            step.points,
            format!(
                "{:.0}% of commits are signed",
                signals.signed_commit_ratio * 100.0
            ),
        );
    }

    breakdown.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CveRecord, Severity};
    use crate::policy::ScoringPolicy;
    use crate::scoring::fixtures::{collected_at, healthy_bundle};
    use chrono::Duration;

    fn cve(severity: Severity, age_days: i64, fixed: bool) -> CveRecord {
        CveRecord {
            id: format!("CVE-2025-{:04}", age_days),
            severity,
            published_at: collected_at() - Duration::days(age_days),
            fixed_version: fixed.then(|| "9.9.9".to_string()),
            days_to_patch: fixed.then_some(5),
        }
    }

    #[test]
    fn test_cve_penalty_is_capped() {
        let rules = ScoringPolicy::default().security;
        let mut bundle = healthy_bundle();
        bundle.security.cves = (0..5).map(|i| cve(Severity::Critical, i, true)).collect();

        let breakdown = score(&bundle, &rules);
        let penalty = breakdown
            .adjustments
            .iter()
            .find(|a| a.rule == Rule::KnownCves)
            .unwrap();
        assert_eq!(penalty.points, -60.0);
        assert!(penalty.detail.contains("capped"));
    }

    #[test]
    fn test_stale_unpatched_cve_penalized_once() {
        let rules = ScoringPolicy::default().security;
        let mut bundle = healthy_bundle();
        bundle.security.cves = vec![cve(Severity::Low, 45, false), cve(Severity::Low, 60, false)];

        let breakdown = score(&bundle, &rules);
        let stale: Vec<_> = breakdown
            .adjustments
            .iter()
            .filter(|a| a.rule == Rule::StaleUnpatchedCve)
            .collect();
        assert_eq!(stale.len(), 1);
        // 100 - 6 (two low) - 15 (stale) + 5 (two tools)
        assert_eq!(breakdown.score, 84.0);
    }

    #[test]
    fn test_undetailed_cve_count() {
        let rules = ScoringPolicy::default().security;
        let mut bundle = healthy_bundle();
        bundle.security.known_cve_count = 2;
        bundle.security.has_security_policy = false;
        bundle.security.security_tools.clear();

        // 100 - 20 - 10 (no policy) - 10 (no tools)
        assert_eq!(score(&bundle, &rules).score, 60.0);
    }

    #[test]
    fn test_fast_patching_and_signed_commits() {
        let rules = ScoringPolicy::default().security;
        let mut bundle = healthy_bundle();
        bundle.security.cves = vec![cve(Severity::Medium, 200, true)];
        bundle.security.signed_commit_ratio = 0.6;
        bundle.security.security_tools.clear();

        // 100 - 8 + 10 (5 days to patch) - 10 (no tools) + 5 (signed)
        assert_eq!(score(&bundle, &rules).score, 97.0);
    }
}
