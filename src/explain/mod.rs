//! Human-readable justification for a composite score
//!
//! Factors come from the same adjustment trail the calculator produced,
//! so an explanation can never disagree with the rule table that scored
//! the package.

use crate::error::Result;
use crate::metrics::RawMetricsBundle;
use crate::models::{ComponentKind, CompositeScore, Confidence, Grade, RiskTier, SupplyChainRisk};
use crate::scoring::{Rule, ScoreCalculator, ScoreCard};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Tolerance for stored vs recomputed overall scores
const OVERALL_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorKind {
    Concern,
    Strength,
    Note,
}

/// One line of justification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub kind: FactorKind,
    pub component: Option<ComponentKind>,
    pub rule: Option<Rule>,
    /// Effect on the component score
    pub points: f64,
    /// Effect on the overall score
    pub weighted: f64,
    pub message: String,
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.kind {
            FactorKind::Concern => "-",
            FactorKind::Strength => "+",
            FactorKind::Note => "*",
        };
        write!(f, "{} {}", marker, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub overall: f64,
    pub grade: Grade,
    pub factors: Vec<Factor>,
    /// Set when the stored score no longer matches the current policy
    pub warnings: Vec<String>,
}

impl Explanation {
    pub fn concerns(&self) -> impl Iterator<Item = &Factor> {
        self.factors.iter().filter(|f| f.kind == FactorKind::Concern)
    }

    pub fn strengths(&self) -> impl Iterator<Item = &Factor> {
        self.factors.iter().filter(|f| f.kind == FactorKind::Strength)
    }
}

#[derive(Debug, Clone, Default)]
pub struct JustificationExplainer {
    calculator: ScoreCalculator,
}

impl JustificationExplainer {
    pub fn new(calculator: ScoreCalculator) -> Self {
        Self { calculator }
    }

    /// Ordered factors: concerns by weighted impact, then strengths, then notes
    pub fn explain(&self, bundle: &RawMetricsBundle, score: &CompositeScore) -> Result<Explanation> {
        let card = self.calculator.score(bundle)?;
        let mut warnings = Vec::new();
        if (card.overall - score.overall).abs() > OVERALL_TOLERANCE {
            tracing::warn!(
                "Stored overall {} for {} differs from recomputed {}",
                score.overall,
                bundle.name,
                card.overall
            );
            warnings.push(format!(
                "Stored overall {:.1} differs from recomputed {:.1}; the scoring policy may have changed",
                score.overall, card.overall
            ));
        }

        let (mut concerns, mut strengths): (Vec<Factor>, Vec<Factor>) = rule_factors(&card)
            .into_iter()
            .partition(|f| f.kind == FactorKind::Concern);
        concerns.sort_by(by_weighted_magnitude);
        strengths.sort_by(by_weighted_magnitude);

        let mut factors = concerns;
        factors.append(&mut strengths);
        if !card.has_repository {
            factors.push(note(
                "No linked repository; every component was scored at the neutral default",
            ));
        }
        factors.push(note(tier_note(score.risk_tier)));
        if let Some(supply) = &score.supply_chain {
            factors.push(note(supply_chain_note(supply)));
        }
        factors.push(note(confidence_note(score.confidence, &score.confidence_factors)));

        Ok(Explanation {
            overall: score.overall,
            grade: score.grade,
            factors,
            warnings,
        })
    }
}

fn rule_factors(card: &ScoreCard) -> Vec<Factor> {
    card.breakdowns
        .iter()
        .flat_map(|breakdown| {
            let weight = f64::from(card.components.get(breakdown.kind).weight);
            breakdown.adjustments.iter().map(move |adj| Factor {
                kind: if adj.points < 0.0 {
                    FactorKind::Concern
                } else {
                    FactorKind::Strength
                },
                component: Some(breakdown.kind),
                rule: Some(adj.rule),
                points: adj.points,
                weighted: adj.points * weight / 100.0,
                message: format!("{}: {} ({:+.0})", breakdown.kind, adj.detail, adj.points),
            })
        })
        .collect()
}

// Stable sort keeps component order for equal impact
fn by_weighted_magnitude(a: &Factor, b: &Factor) -> Ordering {
    b.weighted.abs().total_cmp(&a.weighted.abs())
}

fn note(message: impl Into<String>) -> Factor {
    Factor {
        kind: FactorKind::Note,
        component: None,
        rule: None,
        points: 0.0,
        weighted: 0.0,
        message: message.into(),
    }
}

fn tier_note(tier: RiskTier) -> String {
    let reason = match tier {
        RiskTier::Approved => "strong score with active maintenance and no open vulnerabilities",
        RiskTier::Conditional => "acceptable score; review before adopting",
        RiskTier::Restricted => {
            "low score, weak security, an open vulnerability, or high supply chain risk"
        }
        RiskTier::Prohibited => {
            "unpatched high-severity vulnerability, open vulnerabilities in an abandoned project, or supply chain attack indicators"
        }
    };
    format!("Risk tier {}: {}", tier, reason)
}

fn supply_chain_note(risk: &SupplyChainRisk) -> String {
    if risk.factors.is_empty() {
        format!("Supply chain risk {} ({})", risk.level, risk.score)
    } else {
        format!(
            "Supply chain risk {} ({}): {}",
            risk.level,
            risk.score,
            risk.factors.join("; ")
        )
    }
}

fn confidence_note(confidence: Confidence, factors: &[String]) -> String {
    if factors.is_empty() {
        format!("Confidence {}", confidence)
    } else {
        format!("Confidence {} ({})", confidence, factors.join("; "))
    }
}
