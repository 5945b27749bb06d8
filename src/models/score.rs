use super::{Confidence, Grade, ProjectAgeBand, RiskTier, SupplyChainRisk, UpdateUrgency};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six scored dimensions of package health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Security,
    Maintenance,
    Community,
    BusFactor,
    Documentation,
    Stability,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Security,
        ComponentKind::Maintenance,
        ComponentKind::Community,
        ComponentKind::BusFactor,
        ComponentKind::Documentation,
        ComponentKind::Stability,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Security => "Security",
            ComponentKind::Maintenance => "Maintenance",
            ComponentKind::Community => "Community",
            ComponentKind::BusFactor => "Bus factor",
            ComponentKind::Documentation => "Documentation",
            ComponentKind::Stability => "Stability",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Individual score component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    /// Clamped to [0, 100]
    pub score: f64,
    /// Percentage weight (e.g. 30 for 30%)
    pub weight: u8,
}

impl ScoreComponent {
    /// Contribution of this component to the overall score
    pub fn weighted(&self) -> f64 {
        self.score * f64::from(self.weight) / 100.0
    }
}

/// All six components of a composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub security: ScoreComponent,
    pub maintenance: ScoreComponent,
    pub community: ScoreComponent,
    pub bus_factor: ScoreComponent,
    pub documentation: ScoreComponent,
    pub stability: ScoreComponent,
}

impl ComponentScores {
    pub fn get(&self, kind: ComponentKind) -> &ScoreComponent {
        match kind {
            ComponentKind::Security => &self.security,
            ComponentKind::Maintenance => &self.maintenance,
            ComponentKind::Community => &self.community,
            ComponentKind::BusFactor => &self.bus_factor,
            ComponentKind::Documentation => &self.documentation,
            ComponentKind::Stability => &self.stability,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentKind, &ScoreComponent)> {
        ComponentKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    pub fn weight_sum(&self) -> u32 {
        self.iter().map(|(_, c)| u32::from(c.weight)).sum()
    }

    /// Weighted overall, rounded to one decimal and clamped to [0, 100]
    pub fn overall(&self) -> f64 {
        let total: f64 = self
            .iter()
            .map(|(_, c)| c.score * f64::from(c.weight))
            .sum();
        round1(total / 100.0).clamp(0.0, 100.0)
    }
}

/// Composite package health score with its classifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub overall: f64,
    pub grade: Grade,
    /// Ecosystem-local rank, assigned once the whole publish batch is scored
    pub percentile: Option<f64>,
    pub risk_tier: RiskTier,
    pub update_urgency: UpdateUrgency,
    pub confidence: Confidence,
    #[serde(default)]
    pub confidence_factors: Vec<String>,
    pub project_age_band: Option<ProjectAgeBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_chain: Option<SupplyChainRisk>,
    pub components: ComponentScores,
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(score: f64, weight: u8) -> ScoreComponent {
        ScoreComponent { score, weight }
    }

    #[test]
    fn test_overall_is_rounded_weighted_sum() {
        let scores = ComponentScores {
            security: component(83.0, 30),
            maintenance: component(71.0, 25),
            community: component(64.0, 15),
            bus_factor: component(55.0, 10),
            documentation: component(47.3, 10),
            stability: component(80.0, 10),
        };
        // 2490 + 1775 + 960 + 550 + 473 + 800 = 7048
        assert_eq!(scores.weight_sum(), 100);
        assert_eq!(scores.overall(), 70.5);
    }

    #[test]
    fn test_iter_order_matches_kinds() {
        let scores = ComponentScores {
            security: component(1.0, 30),
            maintenance: component(2.0, 25),
            community: component(3.0, 15),
            bus_factor: component(4.0, 10),
            documentation: component(5.0, 10),
            stability: component(6.0, 10),
        };
        let kinds: Vec<_> = scores.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, ComponentKind::ALL.to_vec());
        assert_eq!(scores.get(ComponentKind::BusFactor).score, 4.0);
    }
}
