//! Per-package analysis: scoring followed by classification

use crate::error::Result;
use crate::metrics::RawMetricsBundle;
use crate::models::{CollectedPackage, CompositeScore, PackageRecord};
use crate::policy::ScoringPolicy;
use crate::risk::{RiskClassifier, RiskSignals};
use crate::scoring::{ScoreCalculator, ScoreCard};
use chrono::{DateTime, Utc};

/// Scores and classifies packages under one policy
#[derive(Debug, Clone)]
pub struct Analyzer {
    calculator: ScoreCalculator,
    classifier: RiskClassifier,
}

impl Analyzer {
    pub fn new(policy: ScoringPolicy) -> Result<Self> {
        let classifier = RiskClassifier::new(&policy);
        Ok(Self {
            calculator: ScoreCalculator::new(policy)?,
            classifier,
        })
    }

    pub fn calculator(&self) -> &ScoreCalculator {
        &self.calculator
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Composite score for one bundle; percentile stays unset
    pub fn analyze(&self, bundle: &RawMetricsBundle) -> Result<CompositeScore> {
        let card = self.calculator.score(bundle)?;
        Ok(self.composite(bundle, &card))
    }

    pub fn composite(&self, bundle: &RawMetricsBundle, card: &ScoreCard) -> CompositeScore {
        let classification = self
            .classifier
            .classify(&RiskSignals::from_bundle(bundle, card));
        CompositeScore {
            overall: card.overall,
            grade: card.grade,
            percentile: None,
            risk_tier: classification.risk_tier,
            update_urgency: classification.update_urgency,
            confidence: classification.confidence,
            confidence_factors: classification.confidence_factors,
            project_age_band: classification.project_age_band,
            supply_chain: classification.supply_chain,
            components: card.components,
        }
    }

    /// Full record for a collected package
    pub fn analyze_package(
        &self,
        package: CollectedPackage,
        analyzed_at: DateTime<Utc>,
    ) -> Result<PackageRecord> {
        let composite_score = self.analyze(&package.metrics)?;
        Ok(PackageRecord {
            ecosystem: package.metrics.ecosystem.clone(),
            name: package.metrics.name.clone(),
            version: package.version,
            description: package.description,
            repository_ref: package.metrics.repository.clone(),
            raw_metrics: package.metrics,
            composite_score,
            analyzed_at,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            calculator: ScoreCalculator::default(),
            classifier: RiskClassifier::default(),
        }
    }
}
