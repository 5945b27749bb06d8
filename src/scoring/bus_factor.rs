use super::{ComponentBreakdown, Rule};
use crate::metrics::RawMetricsBundle;
use crate::models::ComponentKind;
use crate::policy::{BusFactorRules, ConcentrationModel};

pub(super) fn score(bundle: &RawMetricsBundle, rules: &BusFactorRules) -> ComponentBreakdown {
    let signals = &bundle.bus_factor;
    let mut breakdown = ComponentBreakdown::new(ComponentKind::BusFactor, rules.base);

    match rules.model {
        ConcentrationModel::TopShare => {
            if let Some(step) = rules
                .contributor_spread
                .lookup(f64::from(signals.contributors_over_5pct))
            {
                breakdown.add(
                    Rule::ContributorSpread,
                    step.points,
                    format!(
                        "{} contributors above 5% of commits",
                        signals.contributors_over_5pct
                    ),
                );
            }
            if let Some(share) = signals.top_contributor_share {
                if let Some(step) = rules.top_share.lookup(share) {
                    breakdown.add(
                        Rule::TopContributorShare,
                        step.points,
                        format!("Top contributor wrote {:.0}% of commits", share * 100.0),
                    );
                }
            }
        }
        ConcentrationModel::Entropy => {
            if let Some(evenness) = normalized_entropy(&signals.commit_shares) {
                breakdown.add(
                    Rule::ContributorEntropy,
                    rules.entropy_floor + rules.entropy_span * evenness,
                    format!(
                        "Commit distribution evenness {:.2} across {} contributors",
                        evenness,
                        signals.commit_shares.len()
                    ),
                );
            }
        }
    }

    if let Some(step) = rules
        .active_contributors
        .lookup(f64::from(signals.active_contributors_6mo))
    {
        breakdown.add(
            Rule::ActiveContributors,
            step.points,
            format!(
                "{} active contributors in the last six months",
                signals.active_contributors_6mo
            ),
        );
    }

    if signals.has_codeowners {
        breakdown.add(Rule::Codeowners, rules.codeowners_bonus, "CODEOWNERS file present");
    }
    if signals.has_governance {
        breakdown.add(Rule::Governance, rules.governance_bonus, "Governance document present");
    }

    breakdown.finish()
}

/// Shannon entropy of the shares divided by its maximum, ln(n).
///
/// Shares are renormalized to sum to one. A single contributor is
/// maximally concentrated (0.0); no data yields `None`.
pub(crate) fn normalized_entropy(shares: &[f64]) -> Option<f64> {
    let positive: Vec<f64> = shares.iter().copied().filter(|s| *s > 0.0).collect();
    let total: f64 = positive.iter().sum();
    if positive.is_empty() || total <= 0.0 {
        return None;
    }
    if positive.len() == 1 {
        return Some(0.0);
    }

    let entropy: f64 = positive
        .iter()
        .map(|s| {
            let p = s / total;
            -p * p.ln()
        })
        .sum();
    let max = (positive.len() as f64).ln();
    Some((entropy / max).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ScoringPolicy;
    use crate::scoring::fixtures::healthy_bundle;

    #[test]
    fn test_single_maintainer_penalized() {
        let rules = ScoringPolicy::default().bus_factor;
        let mut bundle = healthy_bundle();
        let b = &mut bundle.bus_factor;
        b.contributors_over_5pct = 1;
        b.top_contributor_share = Some(0.95);
        b.active_contributors_6mo = 1;
        b.has_codeowners = false;
        b.has_governance = false;

        // 50 - 10 - 20 - 10
        assert_eq!(score(&bundle, &rules).score, 10.0);
    }

    #[test]
    fn test_entropy_model_replaces_concentration_rules() {
        let mut rules = ScoringPolicy::default().bus_factor;
        rules.model = ConcentrationModel::Entropy;
        let mut bundle = healthy_bundle();
        bundle.bus_factor.commit_shares = vec![0.25, 0.25, 0.25, 0.25];
        bundle.bus_factor.has_codeowners = false;
        bundle.bus_factor.has_governance = false;

        let breakdown = score(&bundle, &rules);
        assert!(breakdown
            .adjustments
            .iter()
            .all(|a| a.rule != Rule::ContributorSpread && a.rule != Rule::TopContributorShare));
        // 50 - 20 + 55 (perfectly even) + 10 (active)
        assert!((breakdown.unclamped() - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalized_entropy_bounds() {
        assert_eq!(normalized_entropy(&[]), None);
        assert_eq!(normalized_entropy(&[1.0]), Some(0.0));
        let even = normalized_entropy(&[0.5, 0.5]).unwrap();
        assert!((even - 1.0).abs() < 1e-12);
        let skewed = normalized_entropy(&[0.9, 0.05, 0.05]).unwrap();
        assert!(skewed > 0.0 && skewed < 0.5);
    }
}
