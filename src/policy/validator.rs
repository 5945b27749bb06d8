use super::{ScoringPolicy, StepTable};
use crate::error::{PkgriskError, Result, ValidationError};

/// Scoring policy validator
pub struct PolicyValidator;

impl PolicyValidator {
    /// Validate the policy, reporting every problem at once
    pub fn validate(policy: &ScoringPolicy) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_weights(policy, &mut errors);
        Self::validate_grades(policy, &mut errors);
        Self::validate_step_tables(policy, &mut errors);
        Self::validate_scalars(policy, &mut errors);
        Self::validate_documentation(policy, &mut errors);
        Self::validate_risk(policy, &mut errors);
        Self::validate_supply_chain(policy, &mut errors);
        Self::validate_ecosystems(policy, &mut errors);

        if !(0.0..=100.0).contains(&policy.no_repository_score) {
            errors.push(ValidationError::new(
                "no_repository_score",
                format!("Must be within [0, 100], got {}", policy.no_repository_score),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PkgriskError::PolicyValidation { errors })
        }
    }

    fn validate_weights(policy: &ScoringPolicy, errors: &mut Vec<ValidationError>) {
        let sum = policy.weights.sum();
        if sum != 100 {
            errors.push(ValidationError::new(
                "weights",
                format!("Component weights must sum to 100, got {}", sum),
            ));
        }
    }

    fn validate_grades(policy: &ScoringPolicy, errors: &mut Vec<ValidationError>) {
        let g = &policy.grades;
        let ordered = [g.a, g.b, g.c, g.d];
        if !ordered.windows(2).all(|pair| pair[0] > pair[1]) {
            errors.push(ValidationError::new(
                "grades",
                format!(
                    "Grade thresholds must be strictly descending, got a={} b={} c={} d={}",
                    g.a, g.b, g.c, g.d
                ),
            ));
        }
        if ordered.iter().any(|t| !(0.0..=100.0).contains(t)) {
            errors.push(ValidationError::new(
                "grades",
                "Grade thresholds must lie within [0, 100]",
            ));
        }
    }

    fn validate_step_tables(policy: &ScoringPolicy, errors: &mut Vec<ValidationError>) {
        let tables: [(&str, &StepTable); 17] = [
            ("security.patch_days", &policy.security.patch_days),
            ("security.security_tools", &policy.security.security_tools),
            ("security.signed_commits", &policy.security.signed_commits),
            ("maintenance.commit_recency", &policy.maintenance.commit_recency),
            ("maintenance.commit_volume", &policy.maintenance.commit_volume),
            ("maintenance.close_rate", &policy.maintenance.close_rate),
            ("maintenance.response_hours", &policy.maintenance.response_hours),
            ("community.star_velocity", &policy.community.star_velocity),
            ("community.fork_ratio", &policy.community.fork_ratio),
            ("community.contributors", &policy.community.contributors),
            ("community.good_first_issues", &policy.community.good_first_issues),
            ("bus_factor.contributor_spread", &policy.bus_factor.contributor_spread),
            ("bus_factor.top_share", &policy.bus_factor.top_share),
            ("bus_factor.active_contributors", &policy.bus_factor.active_contributors),
            ("stability.prerelease_ratio", &policy.stability.prerelease_ratio),
            ("stability.ci_pass_rate", &policy.stability.ci_pass_rate),
            ("stability.regressions", &policy.stability.regressions),
        ];

        for (path, table) in tables {
            if let Some(idx) = table.first_shadowed() {
                errors.push(ValidationError::new(
                    format!("{}[{}]", path, idx),
                    "Step can never match; thresholds must be ordered from most to least strict",
                ));
            }
            for (idx, step) in table.steps().iter().enumerate() {
                if !step.threshold.is_finite() || !step.points.is_finite() {
                    errors.push(ValidationError::new(
                        format!("{}[{}]", path, idx),
                        "Threshold and points must be finite numbers",
                    ));
                }
            }
        }
    }

    fn validate_scalars(policy: &ScoringPolicy, errors: &mut Vec<ValidationError>) {
        let (sec, mnt, com, bus, doc, stb) = (
            &policy.security,
            &policy.maintenance,
            &policy.community,
            &policy.bus_factor,
            &policy.documentation,
            &policy.stability,
        );
        let penalties = &sec.cve_penalty;
        let values = [
            ("no_repository_score", policy.no_repository_score),
            ("security.base", sec.base),
            ("security.cve_penalty.critical", penalties.critical),
            ("security.cve_penalty.high", penalties.high),
            ("security.cve_penalty.medium", penalties.medium),
            ("security.cve_penalty.low", penalties.low),
            ("security.cve_penalty.unknown", penalties.unknown),
            ("security.cve_penalty_cap", sec.cve_penalty_cap),
            ("security.undetailed_cve_penalty", sec.undetailed_cve_penalty),
            ("security.stale_unpatched_penalty", sec.stale_unpatched_penalty),
            ("security.vulnerable_dependency_penalty", sec.vulnerable_dependency_penalty),
            ("security.vulnerable_dependency_cap", sec.vulnerable_dependency_cap),
            ("security.no_policy_penalty", sec.no_policy_penalty),
            ("maintenance.base", mnt.base),
            ("maintenance.archived_penalty", mnt.archived_penalty),
            ("maintenance.deprecated_penalty", mnt.deprecated_penalty),
            ("maintenance.fast_response_bonus", mnt.fast_response_bonus),
            ("maintenance.stale_pr_penalty", mnt.stale_pr_penalty),
            ("maintenance.stale_pr_cap", mnt.stale_pr_cap),
            ("maintenance.release_sweet_spot_bonus", mnt.release_sweet_spot_bonus),
            ("maintenance.release_below_sweet_spot_bonus", mnt.release_below_sweet_spot_bonus),
            ("maintenance.no_release_active_penalty", mnt.no_release_active_penalty),
            ("maintenance.no_release_inactive_penalty", mnt.no_release_inactive_penalty),
            ("community.base", com.base),
            ("community.discussions_bonus", com.discussions_bonus),
            ("community.install_high_bonus", com.install_high_bonus),
            ("community.install_medium_bonus", com.install_medium_bonus),
            ("bus_factor.base", bus.base),
            ("bus_factor.entropy_floor", bus.entropy_floor),
            ("bus_factor.entropy_span", bus.entropy_span),
            ("bus_factor.codeowners_bonus", bus.codeowners_bonus),
            ("bus_factor.governance_bonus", bus.governance_bonus),
            ("documentation.readme_points", doc.readme_points),
            ("documentation.docs_dir_points", doc.docs_dir_points),
            ("documentation.examples_dir_points", doc.examples_dir_points),
            ("documentation.changelog_points", doc.changelog_points),
            ("documentation.contributing_points", doc.contributing_points),
            ("documentation.presence_weight", doc.presence_weight),
            ("documentation.quality_weight", doc.quality_weight),
            ("documentation.unassessed_readme_quality", doc.unassessed_readme_quality),
            ("stability.base", stb.base),
            ("stability.mature_version_bonus", stb.mature_version_bonus),
            ("stability.tests_bonus", stb.tests_bonus),
            ("stability.ci_bonus", stb.ci_bonus),
            ("stability.no_ci_penalty", stb.no_ci_penalty),
            ("risk.approved_min", policy.risk.approved_min),
            ("risk.conditional_min", policy.risk.conditional_min),
            ("risk.security_floor", policy.risk.security_floor),
            ("grades.a", policy.grades.a),
            ("grades.b", policy.grades.b),
            ("grades.c", policy.grades.c),
            ("grades.d", policy.grades.d),
        ];

        for (path, value) in values {
            if !value.is_finite() {
                errors.push(ValidationError::new(
                    path,
                    format!("Must be a finite number, got {}", value),
                ));
            }
        }

        let ecosystems = std::iter::once(("default_ecosystem".to_string(), &policy.default_ecosystem))
            .chain(
                policy
                    .ecosystems
                    .iter()
                    .map(|(name, t)| (format!("ecosystems.{}", name), t)),
            );
        for (path, thresholds) in ecosystems {
            if !thresholds.good_response_hours.is_finite() {
                errors.push(ValidationError::new(
                    format!("{}.good_response_hours", path),
                    "Must be a finite number",
                ));
            }
        }
    }

    fn validate_documentation(policy: &ScoringPolicy, errors: &mut Vec<ValidationError>) {
        let docs = &policy.documentation;
        let weight_sum = docs.presence_weight + docs.quality_weight;
        if (weight_sum - 1.0).abs() > 1e-9 {
            errors.push(ValidationError::new(
                "documentation",
                format!(
                    "presence_weight and quality_weight must sum to 1.0, got {}",
                    weight_sum
                ),
            ));
        }
        if docs.presence_max() <= 0.0 {
            errors.push(ValidationError::new(
                "documentation",
                "Presence points must add up to a positive total",
            ));
        }
    }

    fn validate_risk(policy: &ScoringPolicy, errors: &mut Vec<ValidationError>) {
        let risk = &policy.risk;
        if risk.approved_min <= risk.conditional_min {
            errors.push(ValidationError::new(
                "risk.approved_min",
                format!(
                    "Must be greater than conditional_min ({}), got {}",
                    risk.conditional_min, risk.approved_min
                ),
            ));
        }
        if risk.active_days > risk.abandoned_days {
            errors.push(ValidationError::new(
                "risk.active_days",
                "Active window cannot exceed the abandoned threshold",
            ));
        }

        let bands = &policy.age_bands;
        if !(bands.established_days < bands.mature_days && bands.mature_days < bands.legacy_days) {
            errors.push(ValidationError::new(
                "age_bands",
                "Age band boundaries must be strictly increasing",
            ));
        }
    }

    fn validate_supply_chain(policy: &ScoringPolicy, errors: &mut Vec<ValidationError>) {
        let rules = &policy.supply_chain;
        if !(rules.medium_min < rules.high_min
            && rules.high_min < rules.critical_min
            && rules.critical_min <= 100)
        {
            errors.push(ValidationError::new(
                "supply_chain",
                format!(
                    "Level thresholds must satisfy medium_min < high_min < critical_min <= 100, got {} {} {}",
                    rules.medium_min, rules.high_min, rules.critical_min
                ),
            ));
        }
    }

    fn validate_ecosystems(policy: &ScoringPolicy, errors: &mut Vec<ValidationError>) {
        let all = std::iter::once(("default_ecosystem".to_string(), &policy.default_ecosystem))
            .chain(
                policy
                    .ecosystems
                    .iter()
                    .map(|(name, t)| (format!("ecosystems.{}", name), t)),
            );

        for (path, thresholds) in all {
            if thresholds.release_min == 0 || thresholds.release_min > thresholds.release_max {
                errors.push(ValidationError::new(
                    path.clone(),
                    format!(
                        "Release sweet spot must satisfy 1 <= release_min <= release_max, got {}..{}",
                        thresholds.release_min, thresholds.release_max
                    ),
                ));
            }
            if thresholds.install_medium >= thresholds.install_high {
                errors.push(ValidationError::new(
                    path,
                    "install_medium must be below install_high",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Cmp, Step};

    #[test]
    fn test_bad_weights_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.weights.security = 35;
        match PolicyValidator::validate(&policy) {
            Err(PkgriskError::PolicyValidation { errors }) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "weights");
            }
            other => panic!("expected PolicyValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_collects_every_problem() {
        let mut policy = ScoringPolicy::default();
        policy.grades.b = 95.0;
        policy.documentation.quality_weight = 0.7;
        policy.community.star_velocity.0.push(Step::new(Cmp::AtLeast, 5000.0, 20.0));

        match PolicyValidator::validate(&policy) {
            Err(PkgriskError::PolicyValidation { errors }) => {
                let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
                assert!(paths.contains(&"grades"));
                assert!(paths.contains(&"documentation"));
                assert!(paths.contains(&"community.star_velocity[3]"));
            }
            other => panic!("expected PolicyValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_sweet_spot_rejected() {
        let mut policy = ScoringPolicy::default();
        if let Some(npm) = policy.ecosystems.get_mut("npm") {
            npm.release_min = 60;
        }
        assert!(PolicyValidator::validate(&policy).is_err());
    }

    #[test]
    fn test_non_finite_scalars_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.security.base = f64::NAN;
        policy.maintenance.archived_penalty = f64::INFINITY;
        policy.bus_factor.entropy_span = f64::NEG_INFINITY;

        match PolicyValidator::validate(&policy) {
            Err(PkgriskError::PolicyValidation { errors }) => {
                let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
                assert!(paths.contains(&"security.base"));
                assert!(paths.contains(&"maintenance.archived_penalty"));
                assert!(paths.contains(&"bus_factor.entropy_span"));
            }
            other => panic!("expected PolicyValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_base_in_toml_rejected() {
        let toml = ScoringPolicy::default()
            .to_toml()
            .unwrap()
            .replacen("base = 100.0", "base = nan", 1);
        assert!(toml.contains("base = nan"));
        assert!(matches!(
            ScoringPolicy::from_toml(&toml),
            Err(PkgriskError::PolicyValidation { .. })
        ));
    }

    #[test]
    fn test_supply_chain_levels_must_ascend() {
        let mut policy = ScoringPolicy::default();
        policy.supply_chain.high_min = 80;
        match PolicyValidator::validate(&policy) {
            Err(PkgriskError::PolicyValidation { errors }) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "supply_chain");
            }
            other => panic!("expected PolicyValidation, got {:?}", other),
        }
    }
}
