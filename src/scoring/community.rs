use super::{ComponentBreakdown, Rule};
use crate::metrics::RawMetricsBundle;
use crate::models::ComponentKind;
use crate::policy::{CommunityRules, EcosystemThresholds};

pub(super) fn score(
    bundle: &RawMetricsBundle,
    rules: &CommunityRules,
    thresholds: &EcosystemThresholds,
) -> ComponentBreakdown {
    let signals = &bundle.community;
    let mut breakdown = ComponentBreakdown::new(ComponentKind::Community, rules.base);

    // Young projects are measured as if they were one year old
    if let Some(age_days) = bundle.age_days() {
        let years = (age_days as f64 / 365.0).max(1.0);
        let velocity = f64::from(signals.stars) / years;
        if let Some(step) = rules.star_velocity.lookup(velocity) {
            breakdown.add(
                Rule::StarVelocity,
                step.points,
                format!("{:.0} stars per year", velocity),
            );
        }
    }

    if signals.stars > 0 {
        let ratio = f64::from(signals.forks) / f64::from(signals.stars);
        if let Some(step) = rules.fork_ratio.lookup(ratio) {
            breakdown.add(
                Rule::ForkRatio,
                step.points,
                format!("{} forks for {} stars", signals.forks, signals.stars),
            );
        }
    }

    if let Some(step) = rules
        .contributors
        .lookup(f64::from(signals.total_contributors))
    {
        breakdown.add(
            Rule::Contributors,
            step.points,
            format!("{} contributors", signals.total_contributors),
        );
    }

    if let Some(step) = rules
        .good_first_issues
        .lookup(f64::from(signals.good_first_issues))
    {
        breakdown.add(
            Rule::GoodFirstIssues,
            step.points,
            format!("{} good first issues", signals.good_first_issues),
        );
    }

    if signals.has_discussions {
        breakdown.add(
            Rule::Discussions,
            rules.discussions_bonus,
            "Discussions enabled",
        );
    }

    if let Some(installs) = signals.install_count {
        let points = if installs > thresholds.install_high {
            rules.install_high_bonus
        } else if installs > thresholds.install_medium {
            rules.install_medium_bonus
        } else {
            0.0
        };
        breakdown.add(
            Rule::InstallVolume,
            points,
            format!("{} installs", installs),
        );
    }

    breakdown.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ScoringPolicy;
    use crate::scoring::fixtures::{collected_at, healthy_bundle};
    use chrono::Duration;

    #[test]
    fn test_young_project_age_is_floored() {
        let policy = ScoringPolicy::default();
        let mut bundle = healthy_bundle();
        let c = &mut bundle.community;
        c.created_at = Some(collected_at() - Duration::days(30));
        c.stars = 150;
        c.forks = 0;
        c.total_contributors = 1;
        c.good_first_issues = 0;
        c.has_discussions = false;
        c.install_count = None;

        // 150 stars over a floored year is only +10, not +15
        let breakdown = score(&bundle, &policy.community, policy.thresholds_for("pypi"));
        assert_eq!(breakdown.score, 80.0);
    }

    #[test]
    fn test_install_tiers_follow_ecosystem() {
        let policy = ScoringPolicy::default();
        let mut bundle = healthy_bundle();
        let c = &mut bundle.community;
        c.created_at = None;
        c.stars = 0;
        c.total_contributors = 0;
        c.good_first_issues = 0;
        c.has_discussions = false;
        c.install_count = Some(500_000);

        let pypi = score(&bundle, &policy.community, policy.thresholds_for("pypi"));
        let npm = score(&bundle, &policy.community, policy.thresholds_for("npm"));
        assert_eq!(pypi.score, 80.0);
        assert_eq!(npm.score, 75.0);
    }
}
