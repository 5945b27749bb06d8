use super::{ComponentBreakdown, Rule};
use crate::metrics::RawMetricsBundle;
use crate::models::ComponentKind;
use crate::policy::{EcosystemThresholds, MaintenanceRules};

pub(super) fn score(
    bundle: &RawMetricsBundle,
    rules: &MaintenanceRules,
    thresholds: &EcosystemThresholds,
) -> ComponentBreakdown {
    let signals = &bundle.maintenance;
    let mut breakdown = ComponentBreakdown::new(ComponentKind::Maintenance, rules.base);

    if signals.is_archived {
        breakdown.add(Rule::Archived, -rules.archived_penalty, "Repository is archived");
    }
    if signals.is_deprecated {
        breakdown.add(
            Rule::Deprecated,
            -rules.deprecated_penalty,
            "Package is marked deprecated",
        );
    }

    if let Some(days) = bundle.days_since_last_commit() {
        if let Some(step) = rules.commit_recency.lookup(days as f64) {
            breakdown.add(
                Rule::CommitRecency,
                step.points,
                format!("Last commit {} days ago", days),
            );
        }
    }

    if let Some(step) = rules.commit_volume.lookup(f64::from(signals.commits_last_6mo)) {
        let detail = if signals.commits_last_6mo == 0 {
            "No commits in the last six months".to_string()
        } else {
            format!("{} commits in the last six months", signals.commits_last_6mo)
        };
        breakdown.add(Rule::CommitVolume, step.points, detail);
    }

    if let Some(rate) = signals.close_rate() {
        if let Some(step) = rules.close_rate.lookup(rate) {
            breakdown.add(
                Rule::IssueCloseRate,
                step.points,
                format!("{:.0}% of recent issues closed", rate * 100.0),
            );
        }
    }

    if let Some(hours) = signals.avg_issue_response_hours {
        let detail = format!("Issues get a first response in {:.0} hours on average", hours);
        if hours < thresholds.good_response_hours {
            breakdown.add(Rule::IssueResponse, rules.fast_response_bonus, detail);
        } else if let Some(step) = rules.response_hours.lookup(hours) {
            breakdown.add(Rule::IssueResponse, step.points, detail);
        }
    }

    if signals.stale_pull_requests > rules.stale_pr_threshold {
        let penalty = (f64::from(signals.stale_pull_requests) * rules.stale_pr_penalty)
            .min(rules.stale_pr_cap);
        breakdown.add(
            Rule::StalePullRequests,
            -penalty,
            format!("{} stale pull requests", signals.stale_pull_requests),
        );
    }

    let releases = signals.releases_last_year;
    let cadence = format!("{} releases in the last year", releases);
    if (thresholds.release_min..=thresholds.release_max).contains(&releases) {
        breakdown.add(Rule::ReleaseCadence, rules.release_sweet_spot_bonus, cadence);
    } else if releases >= 1 && releases < thresholds.release_min {
        breakdown.add(
            Rule::ReleaseCadence,
            rules.release_below_sweet_spot_bonus,
            cadence,
        );
    } else if releases == 0 {
        if signals.commits_last_6mo > 0 {
            breakdown.add(
                Rule::ReleaseCadence,
                -rules.no_release_active_penalty,
                "No releases in the last year despite commit activity",
            );
        } else {
            breakdown.add(
                Rule::ReleaseCadence,
                -rules.no_release_inactive_penalty,
                "No releases in the last year",
            );
        }
    }

    breakdown.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ScoringPolicy;
    use crate::scoring::fixtures::{collected_at, healthy_bundle};
    use chrono::Duration;

    fn points_for(breakdown: &ComponentBreakdown, rule: Rule) -> Option<f64> {
        breakdown
            .adjustments
            .iter()
            .find(|a| a.rule == rule)
            .map(|a| a.points)
    }

    #[test]
    fn test_commit_recency_buckets() {
        let policy = ScoringPolicy::default();
        let thresholds = policy.thresholds_for("pypi");
        let mut bundle = healthy_bundle();

        for (days, expected) in [(30, None), (31, Some(-10.0)), (180, Some(-25.0)), (181, Some(-40.0))] {
            bundle.maintenance.last_commit_at = Some(collected_at() - Duration::days(days));
            let breakdown = score(&bundle, &policy.maintenance, thresholds);
            assert_eq!(points_for(&breakdown, Rule::CommitRecency), expected, "days={}", days);
        }
    }

    #[test]
    fn test_abandoned_project() {
        let policy = ScoringPolicy::default();
        let thresholds = policy.thresholds_for("pypi");
        let mut bundle = healthy_bundle();
        let m = &mut bundle.maintenance;
        m.is_archived = true;
        m.last_commit_at = Some(collected_at() - Duration::days(800));
        m.commits_last_6mo = 0;
        m.open_issues = 40;
        m.closed_issues_6mo = 2;
        m.avg_issue_response_hours = Some(1000.0);
        m.stale_pull_requests = 30;
        m.releases_last_year = 0;

        let breakdown = score(&bundle, &policy.maintenance, thresholds);
        // 100 - 40 - 40 - 20 - 15 - 10 - 15 - 10
        assert_eq!(breakdown.unclamped(), -50.0);
        assert_eq!(breakdown.score, 0.0);
    }

    #[test]
    fn test_release_sweet_spot_depends_on_ecosystem() {
        let policy = ScoringPolicy::default();
        let mut bundle = healthy_bundle();
        bundle.maintenance.releases_last_year = 6;

        let pypi = score(&bundle, &policy.maintenance, policy.thresholds_for("pypi"));
        let npm = score(&bundle, &policy.maintenance, policy.thresholds_for("npm"));
        assert_eq!(points_for(&pypi, Rule::ReleaseCadence), Some(10.0));
        assert_eq!(points_for(&npm, Rule::ReleaseCadence), Some(5.0));

        bundle.maintenance.releases_last_year = 30;
        let pypi = score(&bundle, &policy.maintenance, policy.thresholds_for("pypi"));
        assert_eq!(points_for(&pypi, Rule::ReleaseCadence), None);
    }

    #[test]
    fn test_response_time_uses_ecosystem_threshold() {
        let policy = ScoringPolicy::default();
        let mut bundle = healthy_bundle();
        bundle.maintenance.avg_issue_response_hours = Some(36.0);

        let pypi = score(&bundle, &policy.maintenance, policy.thresholds_for("pypi"));
        let npm = score(&bundle, &policy.maintenance, policy.thresholds_for("npm"));
        assert_eq!(points_for(&pypi, Rule::IssueResponse), Some(10.0));
        assert_eq!(points_for(&npm, Rule::IssueResponse), Some(5.0));
    }
}
