use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
    error::Result,
    pipeline::LesionDescriptors,
    types::{
        BoundingBox, ClassifierPrediction, ColorDescriptor, LesionAnalysis, MorphologyDescriptor,
    },
};

pub const HIGH_RISK_PERCENTAGE: u8 = 20;
pub const MODERATE_RISK_PERCENTAGE: u8 = 15;

/// Coarse banding of the cancer-risk percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_percentage(cancer_percentage: u8) -> Self {
        if cancer_percentage >= HIGH_RISK_PERCENTAGE {
            Self::High
        } else if cancer_percentage >= MODERATE_RISK_PERCENTAGE {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk indicators. Keep monitoring the spot for changes in size, shape or colour.",
            Self::Moderate => "Some risk indicators detected. Consider having this spot checked by a dermatologist.",
            Self::High => "High risk indicators detected. Schedule an appointment with a dermatologist as soon as possible.",
        }
    }
}

/// Text guidance derived from an analysis
pub fn recommendations(analysis: &LesionAnalysis) -> Vec<String> {
    let level = RiskLevel::from_percentage(analysis.risk.cancer_percentage);
    let patterns = &analysis.risk.patterns;
    let mut out = vec![level.description().to_string()];

    if patterns.asymmetry {
        out.push("The spot is noticeably asymmetric.".to_string());
    }
    if patterns.border {
        out.push("The border of the spot is irregular.".to_string());
    }
    if patterns.color {
        out.push("The spot shows several different colours.".to_string());
    }
    if patterns.diameter {
        out.push("The spot's diameter is above the configured size threshold.".to_string());
    }
    if level != RiskLevel::Low {
        out.push("Photograph the spot again in a few weeks; a single image cannot show change over time.".to_string());
    }

    let condition = &analysis.condition;
    if condition.has_condition {
        out.push(format!(
            "Findings are most consistent with: {} ({}% of the condition estimate). A healthcare provider can confirm and advise on treatment.",
            condition.primary_condition.description(),
            condition.confidence
        ));
    }

    out.push("This analysis is not a medical diagnosis.".to_string());
    out
}

/// Full output of one analysis: both assessments plus the evidence behind them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub analysis: LesionAnalysis,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    pub bounding_box: Option<BoundingBox>,
    pub morphology: MorphologyDescriptor,
    pub color: ColorDescriptor,
    pub predictions: Vec<ClassifierPrediction>,
}

impl AnalysisReport {
    pub fn new(
        analysis: LesionAnalysis,
        descriptors: &LesionDescriptors,
        predictions: Vec<ClassifierPrediction>,
    ) -> Self {
        Self {
            risk_level: RiskLevel::from_percentage(analysis.risk.cancer_percentage),
            recommendations: recommendations(&analysis),
            bounding_box: descriptors.mask.bbox(),
            morphology: descriptors.morphology.clone(),
            color: descriptors.color.clone(),
            predictions,
            analysis,
        }
    }

    /// Get the JSON schema of the report
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisReport)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ConditionScorer;
    use crate::types::{RiskAssessment, RiskPatterns};

    fn analysis(cancer_percentage: u8, patterns: RiskPatterns, label: &str) -> LesionAnalysis {
        LesionAnalysis {
            risk: RiskAssessment {
                cancer_percentage,
                confidence: 0.5,
                patterns,
            },
            condition: ConditionScorer::default().score(&[ClassifierPrediction::new(label, 0.8)]),
        }
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_percentage(5), RiskLevel::Low);
        assert_eq!(RiskLevel::from_percentage(14), RiskLevel::Low);
        assert_eq!(RiskLevel::from_percentage(15), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_percentage(19), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_percentage(20), RiskLevel::High);
        assert_eq!(RiskLevel::from_percentage(95), RiskLevel::High);
    }

    #[test]
    fn test_recommendations_follow_flags_and_condition() {
        let patterns = RiskPatterns {
            asymmetry: true,
            diameter: true,
            ..RiskPatterns::default()
        };
        let recs = recommendations(&analysis(90, patterns, "rash"));
        assert!(recs[0].starts_with("High risk"));
        assert!(recs.iter().any(|r| r.contains("asymmetric")));
        assert!(recs.iter().any(|r| r.contains("size threshold")));
        assert!(!recs.iter().any(|r| r.contains(" mm")));
        assert!(!recs.iter().any(|r| r.contains("border")));
        assert!(recs.iter().any(|r| r.contains("Eczema")));
        assert_eq!(recs.last().map(String::as_str), Some("This analysis is not a medical diagnosis."));
    }

    #[test]
    fn test_low_risk_normal_skin() {
        let recs = recommendations(&analysis(6, RiskPatterns::default(), "teapot"));
        assert_eq!(recs.len(), 2);
        assert!(recs[0].starts_with("Low risk"));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let analysis = analysis(90, RiskPatterns::default(), "rash");
        let value = serde_json::to_value(&analysis).expect("serializable");
        assert_eq!(value["risk"]["cancerPercentage"], 90);
        assert_eq!(value["condition"]["primaryCondition"], "Eczema");
        assert_eq!(value["condition"]["allConditions"]["Eczema"], 100);
        assert_eq!(value["condition"]["hasCondition"], true);
        assert_eq!(value["risk"]["patterns"]["evolving"], false);
    }

    #[test]
    fn test_schema_lists_report_fields() {
        let schema = serde_json::to_value(AnalysisReport::schema()).expect("schema serializes");
        let properties = &schema["properties"];
        for field in ["risk", "condition", "riskLevel", "recommendations", "morphology", "color"] {
            assert!(properties.get(field).is_some(), "missing {field}");
        }
    }
}
