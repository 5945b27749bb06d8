use super::{ComponentBreakdown, Rule};
use crate::metrics::RawMetricsBundle;
use crate::models::ComponentKind;
use crate::policy::DocumentationRules;

/// Presence sub-score, scaled to 0..=100
pub(crate) fn presence_score(bundle: &RawMetricsBundle, rules: &DocumentationRules) -> f64 {
    let docs = &bundle.documentation;
    let earned: f64 = [
        (docs.has_readme, rules.readme_points),
        (docs.has_docs_dir, rules.docs_dir_points),
        (docs.has_examples_dir, rules.examples_dir_points),
        (docs.has_changelog, rules.changelog_points),
        (docs.has_contributing, rules.contributing_points),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|(_, points)| points)
    .sum();
    earned / rules.presence_max() * 100.0
}

/// Quality sub-score, scaled to 0..=100
pub(crate) fn quality_score(bundle: &RawMetricsBundle, rules: &DocumentationRules) -> f64 {
    let docs = &bundle.documentation;
    match &docs.quality {
        Some(ratings) => ratings.mean() * 10.0,
        None if docs.has_readme => rules.unassessed_readme_quality,
        None => 0.0,
    }
}

/// Starts from a perfect score; each sub-score's shortfall is a deduction
pub(super) fn score(bundle: &RawMetricsBundle, rules: &DocumentationRules) -> ComponentBreakdown {
    let docs = &bundle.documentation;
    let mut breakdown = ComponentBreakdown::new(ComponentKind::Documentation, 100.0);

    let presence = presence_score(bundle, rules);
    let missing: Vec<&str> = [
        (docs.has_readme, "README"),
        (docs.has_docs_dir, "docs"),
        (docs.has_examples_dir, "examples"),
        (docs.has_changelog, "CHANGELOG"),
        (docs.has_contributing, "CONTRIBUTING"),
    ]
    .iter()
    .filter(|(present, _)| !*present)
    .map(|(_, name)| *name)
    .collect();
    breakdown.add(
        Rule::DocPresence,
        -rules.presence_weight * (100.0 - presence),
        format!("Missing documentation: {}", missing.join(", ")),
    );

    let quality = quality_score(bundle, rules);
    let quality_detail = match &docs.quality {
        Some(ratings) => format!("README rated {:.1}/10 on average", ratings.mean()),
        None => "No qualitative README assessment".to_string(),
    };
    breakdown.add(
        Rule::DocQuality,
        -rules.quality_weight * (100.0 - quality),
        quality_detail,
    );

    breakdown.finish()
}
