//! Risk classification: tier, update urgency, confidence, and age band
//!
//! Classification is a total function over a small set of signals derived
//! from the bundle and its score card, so every combination of overall
//! score and vulnerability flags lands in exactly one tier. Supply chain
//! findings can only push a package toward a stricter tier or a more
//! urgent update, never relax either.

use crate::metrics::{RawMetricsBundle, SupplyChainSignals};
use crate::models::{
    Confidence, ProjectAgeBand, RiskTier, SupplyChainLevel, SupplyChainRisk, UpdateUrgency,
};
use crate::policy::{AgeBands, ConfidenceRules, RiskRules, ScoringPolicy, SupplyChainRules};
use crate::scoring::ScoreCard;
use serde::{Deserialize, Serialize};

/// Inputs the classifier looks at
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RiskSignals {
    pub overall: f64,
    pub security_score: f64,
    pub has_repository: bool,
    pub has_unpatched_cves: bool,
    pub has_high_unpatched: bool,
    pub has_patched_history: bool,
    pub is_archived: bool,
    pub is_deprecated: bool,
    pub days_since_last_commit: Option<i64>,
    pub commits_last_6mo: u32,
    pub active_contributors: u32,
    pub has_quality_assessment: bool,
    pub age_days: Option<i64>,
    pub contributor_count: u32,
    pub issue_history: u32,
    pub supply_chain: Option<SupplyChainSignals>,
}

impl RiskSignals {
    pub fn from_bundle(bundle: &RawMetricsBundle, card: &ScoreCard) -> Self {
        Self {
            overall: card.overall,
            security_score: card.components.security.score,
            has_repository: bundle.has_repository(),
            has_unpatched_cves: bundle.security.has_unpatched(),
            has_high_unpatched: bundle.security.has_high_unpatched(),
            has_patched_history: bundle.security.has_patched_history(),
            is_archived: bundle.maintenance.is_archived,
            is_deprecated: bundle.maintenance.is_deprecated,
            days_since_last_commit: bundle.days_since_last_commit(),
            commits_last_6mo: bundle.maintenance.commits_last_6mo,
            active_contributors: bundle.bus_factor.active_contributors_6mo,
            has_quality_assessment: bundle.documentation.quality.is_some(),
            age_days: bundle.age_days(),
            contributor_count: bundle.community.total_contributors,
            issue_history: bundle.maintenance.issue_history(),
            supply_chain: bundle.supply_chain.clone(),
        }
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub risk_tier: RiskTier,
    pub update_urgency: UpdateUrgency,
    pub confidence: Confidence,
    pub confidence_factors: Vec<String>,
    pub project_age_band: Option<ProjectAgeBand>,
    pub supply_chain: Option<SupplyChainRisk>,
}

#[derive(Debug, Clone)]
pub struct RiskClassifier {
    risk: RiskRules,
    supply_chain: SupplyChainRules,
    confidence: ConfidenceRules,
    age_bands: AgeBands,
}

impl RiskClassifier {
    pub fn new(policy: &ScoringPolicy) -> Self {
        Self {
            risk: policy.risk.clone(),
            supply_chain: policy.supply_chain.clone(),
            confidence: policy.confidence.clone(),
            age_bands: policy.age_bands.clone(),
        }
    }

    pub fn classify(&self, signals: &RiskSignals) -> Classification {
        let (confidence, confidence_factors) = self.confidence(signals);
        Classification {
            risk_tier: self.risk_tier(signals),
            update_urgency: self.update_urgency(signals),
            confidence,
            confidence_factors,
            project_age_band: self.age_band(signals.age_days),
            supply_chain: signals
                .supply_chain
                .as_ref()
                .map(|supply| self.supply_chain_risk(supply)),
        }
    }

    /// Score install-time and publishing findings into a risk level
    pub fn supply_chain_risk(&self, signals: &SupplyChainSignals) -> SupplyChainRisk {
        let rules = &self.supply_chain;
        let mut factors = Vec::new();

        let mut scripts = 0;
        for hook in &signals.install_scripts {
            let points = rules.hook_points(hook);
            if points > 0 {
                scripts += points;
                factors.push(format!("Has {} script", hook));
            }
        }
        for pattern in &signals.suspicious_patterns {
            scripts += rules.pattern_points(pattern.severity);
            factors.push(format!("Suspicious install pattern: {}", pattern.id));
        }
        if signals.has_obfuscation {
            scripts += rules.obfuscation_points;
            factors.push("Obfuscated install code".to_string());
        }
        if signals.has_credential_access {
            scripts += rules.credential_access_points;
            factors.push("Install code reads credentials".to_string());
        }
        if signals.installs_runtime {
            scripts += rules.runtime_install_points;
            factors.push("Install code fetches a runtime".to_string());
        }
        if signals.has_credential_access && signals.has_network_calls {
            scripts += rules.exfiltration_points;
            factors.push("Credential access combined with network calls".to_string());
        }

        let files = rules
            .suspicious_file_points
            .saturating_mul(count(signals.suspicious_files.len()));
        if !signals.suspicious_files.is_empty() {
            factors.push(format!(
                "{} suspicious files in the published artifact",
                signals.suspicious_files.len()
            ));
        }

        let mut release = rules
            .new_install_script_points
            .saturating_mul(signals.new_install_scripts);
        if signals.suspicious_version_jump {
            release += rules.version_jump_points;
            factors.push("Suspicious version jump".to_string());
        }
        if signals.new_install_scripts > 0 {
            factors.push(format!(
                "{} install hooks added since the previous release",
                signals.new_install_scripts
            ));
        }

        let mut publishing = 0;
        if let Some(target) = &signals.typosquat_of {
            publishing += rules.typosquat_points;
            factors.push(format!("Name imitates '{}'", target));
        }
        if !signals.has_provenance {
            publishing += rules.no_provenance_points;
        }
        if signals.publisher_is_maintainer == Some(false) {
            publishing += rules.unlisted_publisher_points;
            factors.push("Publisher is not a listed maintainer".to_string());
        }
        match signals.maintainer_count {
            Some(0) => publishing += rules.no_maintainer_points,
            Some(1) => publishing += rules.single_maintainer_points,
            _ => {}
        }
        if signals.recent_maintainer_change {
            publishing += rules.maintainer_change_points;
            factors.push("Maintainers changed recently".to_string());
        }

        let parts = [scripts, files, release, publishing].map(|points| points.min(100));
        let mut score = parts.iter().copied().max().unwrap_or(0);
        if parts.iter().filter(|points| **points >= rules.high_min).count() >= 2 {
            score = score.saturating_add(rules.multiple_high_bonus).min(100);
        }

        let level = if score >= rules.critical_min {
            SupplyChainLevel::Critical
        } else if score >= rules.high_min {
            SupplyChainLevel::High
        } else if score >= rules.medium_min {
            SupplyChainLevel::Medium
        } else {
            SupplyChainLevel::Low
        };

        SupplyChainRisk {
            score,
            level,
            factors,
        }
    }

    fn supply_chain_level(&self, signals: &RiskSignals) -> Option<SupplyChainLevel> {
        signals
            .supply_chain
            .as_ref()
            .map(|supply| self.supply_chain_risk(supply).level)
    }

    fn is_abandoned(&self, signals: &RiskSignals) -> bool {
        signals.is_archived
            || signals
                .days_since_last_commit
                .is_some_and(|days| days > self.risk.abandoned_days)
    }

    fn is_active(&self, signals: &RiskSignals) -> bool {
        !signals.is_archived
            && signals
                .days_since_last_commit
                .is_some_and(|days| days <= self.risk.active_days)
    }

    pub fn risk_tier(&self, signals: &RiskSignals) -> RiskTier {
        let supply_level = self.supply_chain_level(signals);
        if supply_level == Some(SupplyChainLevel::Critical)
            || signals
                .supply_chain
                .as_ref()
                .is_some_and(SupplyChainSignals::has_attack_indicators)
        {
            return RiskTier::Prohibited;
        }

        let tier = if signals.has_high_unpatched
            || (signals.has_unpatched_cves && self.is_abandoned(signals))
        {
            RiskTier::Prohibited
        } else if signals.has_unpatched_cves
            || signals.overall < self.risk.conditional_min
            || signals.security_score < self.risk.security_floor
        {
            RiskTier::Restricted
        } else if signals.overall >= self.risk.approved_min && self.is_active(signals) {
            RiskTier::Approved
        } else {
            RiskTier::Conditional
        };

        match supply_level {
            Some(SupplyChainLevel::High) => tier.max(RiskTier::Restricted),
            Some(SupplyChainLevel::Medium) => tier.max(RiskTier::Conditional),
            _ => tier,
        }
    }

    pub fn update_urgency(&self, signals: &RiskSignals) -> UpdateUrgency {
        let supply_level = self.supply_chain_level(signals);
        let attack = signals.supply_chain.as_ref().is_some_and(|supply| {
            supply.has_attack_indicators() || supply.has_credential_access
        });
        if signals.has_unpatched_cves
            || attack
            || supply_level == Some(SupplyChainLevel::Critical)
        {
            return UpdateUrgency::Critical;
        }
        if signals.has_patched_history
            || supply_level.is_some_and(|level| level >= SupplyChainLevel::Medium)
        {
            return UpdateUrgency::High;
        }
        if !signals.has_repository {
            return UpdateUrgency::Low;
        }

        let stale = signals
            .days_since_last_commit
            .is_some_and(|days| days > self.risk.stale_days);
        let maintenance_concern = signals.is_archived
            || signals.is_deprecated
            || signals.commits_last_6mo == 0
            || stale
            || signals.active_contributors <= self.risk.single_maintainer_max;

        if maintenance_concern {
            UpdateUrgency::Medium
        } else {
            UpdateUrgency::Low
        }
    }

    pub fn confidence(&self, signals: &RiskSignals) -> (Confidence, Vec<String>) {
        let rules = &self.confidence;
        let mut factors = Vec::new();

        if !signals.has_repository {
            factors.push("No linked repository".to_string());
        }
        if !signals.has_quality_assessment {
            factors.push("No qualitative assessment available".to_string());
        }

        let very_new = signals
            .age_days
            .is_some_and(|days| days < rules.new_package_days);
        let limited_issues = signals.issue_history < rules.min_issues;
        if signals.has_repository {
            if very_new {
                factors.push(format!(
                    "Very new package (<{} months)",
                    rules.new_package_days / 30
                ));
            }
            if signals.contributor_count < rules.min_contributors {
                factors.push("Limited contributor data".to_string());
            }
            if limited_issues {
                factors.push("Limited issue history".to_string());
            }
        }

        let confidence = if !signals.has_repository || (very_new && limited_issues) {
            Confidence::Low
        } else if factors.is_empty() {
            Confidence::High
        } else if factors.len() < rules.low_factor_count {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        (confidence, factors)
    }

    pub fn age_band(&self, age_days: Option<i64>) -> Option<ProjectAgeBand> {
        let days = age_days?;
        let bands = &self.age_bands;
        Some(if days < bands.established_days {
            ProjectAgeBand::New
        } else if days < bands.mature_days {
            ProjectAgeBand::Established
        } else if days < bands.legacy_days {
            ProjectAgeBand::Mature
        } else {
            ProjectAgeBand::Legacy
        })
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(&ScoringPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(overall: f64) -> RiskSignals {
        RiskSignals {
            overall,
            security_score: 100.0,
            has_repository: true,
            days_since_last_commit: Some(3),
            commits_last_6mo: 40,
            active_contributors: 6,
            has_quality_assessment: true,
            age_days: Some(2000),
            contributor_count: 30,
            issue_history: 50,
            ..RiskSignals::default()
        }
    }

    #[test]
    fn test_tier_is_total_over_score_and_cve_flag() {
        let classifier = RiskClassifier::default();
        for tenth in 0..=1000 {
            let overall = f64::from(tenth) / 10.0;
            for unpatched in [false, true] {
                let mut signals = active(overall);
                signals.has_unpatched_cves = unpatched;
                let tier = classifier.risk_tier(&signals);
                let expected = match (unpatched, overall) {
                    (true, _) => RiskTier::Restricted,
                    (false, o) if o < 60.0 => RiskTier::Restricted,
                    (false, o) if o < 80.0 => RiskTier::Conditional,
                    _ => RiskTier::Approved,
                };
                assert_eq!(tier, expected, "overall={} unpatched={}", overall, unpatched);
            }
        }
    }

    #[test]
    fn test_prohibited_cases() {
        let classifier = RiskClassifier::default();

        let mut high = active(95.0);
        high.has_unpatched_cves = true;
        high.has_high_unpatched = true;
        assert_eq!(classifier.risk_tier(&high), RiskTier::Prohibited);

        let mut abandoned = active(95.0);
        abandoned.has_unpatched_cves = true;
        abandoned.days_since_last_commit = Some(400);
        assert_eq!(classifier.risk_tier(&abandoned), RiskTier::Prohibited);
    }

    #[test]
    fn test_approval_requires_recent_activity_and_security_floor() {
        let classifier = RiskClassifier::default();

        let mut quiet = active(92.0);
        quiet.days_since_last_commit = Some(200);
        assert_eq!(classifier.risk_tier(&quiet), RiskTier::Conditional);

        let mut weak_security = active(85.0);
        weak_security.security_score = 35.0;
        assert_eq!(classifier.risk_tier(&weak_security), RiskTier::Restricted);
    }

    #[test]
    fn test_urgency_ordering() {
        let classifier = RiskClassifier::default();

        let mut signals = active(90.0);
        assert_eq!(classifier.update_urgency(&signals), UpdateUrgency::Low);

        signals.active_contributors = 1;
        assert_eq!(classifier.update_urgency(&signals), UpdateUrgency::Medium);

        signals.has_patched_history = true;
        assert_eq!(classifier.update_urgency(&signals), UpdateUrgency::High);

        signals.has_unpatched_cves = true;
        assert_eq!(classifier.update_urgency(&signals), UpdateUrgency::Critical);
    }

    #[test]
    fn test_confidence_levels() {
        let classifier = RiskClassifier::default();

        let (level, factors) = classifier.confidence(&active(90.0));
        assert_eq!(level, Confidence::High);
        assert!(factors.is_empty());

        let mut unassessed = active(90.0);
        unassessed.has_quality_assessment = false;
        assert_eq!(classifier.confidence(&unassessed).0, Confidence::Medium);

        let mut fresh = active(90.0);
        fresh.age_days = Some(40);
        fresh.issue_history = 1;
        let (level, factors) = classifier.confidence(&fresh);
        assert_eq!(level, Confidence::Low);
        assert!(factors.contains(&"Very new package (<6 months)".to_string()));

        let mut orphan = active(90.0);
        orphan.has_repository = false;
        let (level, factors) = classifier.confidence(&orphan);
        assert_eq!(level, Confidence::Low);
        assert_eq!(factors[0], "No linked repository");
    }

    #[test]
    fn test_age_bands() {
        let classifier = RiskClassifier::default();
        assert_eq!(classifier.age_band(None), None);
        assert_eq!(classifier.age_band(Some(100)), Some(ProjectAgeBand::New));
        assert_eq!(classifier.age_band(Some(365)), Some(ProjectAgeBand::Established));
        assert_eq!(classifier.age_band(Some(4 * 365)), Some(ProjectAgeBand::Mature));
        assert_eq!(classifier.age_band(Some(7 * 365)), Some(ProjectAgeBand::Legacy));
    }

    fn vetted_supply() -> SupplyChainSignals {
        SupplyChainSignals {
            has_provenance: true,
            maintainer_count: Some(3),
            publisher_is_maintainer: Some(true),
            ..SupplyChainSignals::default()
        }
    }

    fn with_supply(supply: SupplyChainSignals) -> RiskSignals {
        RiskSignals {
            supply_chain: Some(supply),
            ..active(95.0)
        }
    }

    #[test]
    fn test_clean_supply_chain_keeps_approval() {
        let classifier = RiskClassifier::default();
        let signals = with_supply(vetted_supply());
        let risk = classifier.supply_chain_risk(signals.supply_chain.as_ref().unwrap());
        assert_eq!(risk.score, 0);
        assert_eq!(risk.level, SupplyChainLevel::Low);
        assert_eq!(classifier.risk_tier(&signals), RiskTier::Approved);
        assert_eq!(classifier.update_urgency(&signals), UpdateUrgency::Low);

        let classification = classifier.classify(&signals);
        assert_eq!(classification.supply_chain.map(|r| r.score), Some(0));
        assert_eq!(classifier.classify(&active(95.0)).supply_chain, None);
    }

    #[test]
    fn test_install_hooks_cap_the_tier() {
        let classifier = RiskClassifier::default();

        // postinstall 20 + medium pattern 8
        let mut supply = vetted_supply();
        supply.install_scripts = vec!["postinstall".to_string(), "prepare".to_string()];
        supply.suspicious_patterns.push(crate::metrics::SuspiciousPattern {
            id: "curl_download".to_string(),
            severity: crate::metrics::Severity::Medium,
            location: Some("scripts.postinstall".to_string()),
        });
        let signals = with_supply(supply);
        let risk = classifier.supply_chain_risk(signals.supply_chain.as_ref().unwrap());
        assert_eq!(risk.score, 28);
        assert_eq!(risk.level, SupplyChainLevel::Medium);
        assert_eq!(classifier.risk_tier(&signals), RiskTier::Conditional);
        assert_eq!(classifier.update_urgency(&signals), UpdateUrgency::High);

        let mut typosquat = vetted_supply();
        typosquat.typosquat_of = Some("lodash".to_string());
        let signals = with_supply(typosquat);
        assert_eq!(classifier.risk_tier(&signals), RiskTier::Restricted);
    }

    #[test]
    fn test_attack_indicators_are_prohibited() {
        let classifier = RiskClassifier::default();

        // Only 30 points, but a runtime download at install time is an attack signature
        let mut runtime = vetted_supply();
        runtime.installs_runtime = true;
        let signals = with_supply(runtime);
        assert_eq!(
            classifier.supply_chain_risk(signals.supply_chain.as_ref().unwrap()).level,
            SupplyChainLevel::Medium
        );
        assert_eq!(classifier.risk_tier(&signals), RiskTier::Prohibited);
        assert_eq!(classifier.update_urgency(&signals), UpdateUrgency::Critical);

        let mut planted = vetted_supply();
        planted.suspicious_files = vec!["bundle.js.bak".to_string()];
        assert_eq!(classifier.risk_tier(&with_supply(planted)), RiskTier::Prohibited);
    }

    #[test]
    fn test_several_high_findings_compound() {
        let classifier = RiskClassifier::default();
        let mut supply = vetted_supply();
        // scripts 30 + 20, release 30 + 25
        supply.install_scripts = vec!["preinstall".to_string(), "postinstall".to_string()];
        supply.suspicious_version_jump = true;
        supply.new_install_scripts = 1;

        let risk = classifier.supply_chain_risk(&supply);
        assert_eq!(risk.score, 75);
        assert_eq!(risk.level, SupplyChainLevel::Critical);
        assert_eq!(classifier.risk_tier(&with_supply(supply)), RiskTier::Prohibited);
    }
}
