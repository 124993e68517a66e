use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{LesionError, Result},
    types::Condition,
};

/// Lowercase alphanumeric tokens of a free-form classifier label
pub fn tokenize(label: &str) -> Vec<String> {
    label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// How a classifier label reads against the risk keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelCategory {
    Cancer,
    Skin,
    Other,
}

/// Keyword lists consulted by the risk scorer; matched as case-insensitive substrings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLexicon {
    pub cancer_keywords: Vec<String>,
    pub skin_keywords: Vec<String>,
}

impl Default for RiskLexicon {
    fn default() -> Self {
        Self {
            cancer_keywords: to_strings(&["cancer", "tumor", "malignant", "melanoma", "carcinoma"]),
            skin_keywords: to_strings(&[
                "skin", "lesion", "mole", "spot", "rash", "dermatitis", "eczema",
            ]),
        }
    }
}

impl RiskLexicon {
    pub fn categorize(&self, label: &str) -> LabelCategory {
        let label = label.to_lowercase();
        let hit = |keywords: &[String]| keywords.iter().any(|k| label.contains(&k.to_lowercase()));

        if hit(&self.cancer_keywords) {
            LabelCategory::Cancer
        } else if hit(&self.skin_keywords) {
            LabelCategory::Skin
        } else {
            LabelCategory::Other
        }
    }
}

/// One row of the condition rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    pub condition: Condition,
    pub keywords: Vec<String>,
    #[serde(default = "default_rule_weight")]
    pub weight: f64,
}

fn default_rule_weight() -> f64 {
    1.0
}

impl ConditionRule {
    pub fn new(condition: Condition, keywords: &[&str]) -> Self {
        Self {
            condition,
            keywords: to_strings(keywords),
            weight: default_rule_weight(),
        }
    }

    /// Share of label tokens that are keywords of this rule
    pub fn match_fraction(&self, tokens: &[String]) -> f64 {
        if tokens.is_empty() {
            return 0.0;
        }
        let matched = tokens
            .iter()
            .filter(|token| self.keywords.iter().any(|k| k.eq_ignore_ascii_case(token)))
            .count();
        matched as f64 / tokens.len() as f64
    }
}

/// Condition rule table: condition, keyword list and weight per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionLexicon {
    pub rules: Vec<ConditionRule>,
}

impl Default for ConditionLexicon {
    fn default() -> Self {
        Self {
            rules: vec![
                ConditionRule::new(
                    Condition::BacterialInfection,
                    &["bacterial", "bacteria", "infection", "impetigo", "cellulitis", "abscess", "boil", "pus", "folliculitis"],
                ),
                ConditionRule::new(
                    Condition::FungalInfection,
                    &["fungal", "fungus", "ringworm", "tinea", "candida", "candidiasis", "yeast", "athlete"],
                ),
                ConditionRule::new(
                    Condition::ViralInfection,
                    &["viral", "virus", "wart", "warts", "herpes", "shingles", "chickenpox", "measles", "blister", "molluscum"],
                ),
                ConditionRule::new(
                    Condition::Eczema,
                    &["eczema", "dermatitis", "rash", "atopic", "dry", "itchy", "hives"],
                ),
                ConditionRule::new(
                    Condition::Psoriasis,
                    &["psoriasis", "plaque", "plaques", "scaly", "scale", "flaky"],
                ),
                ConditionRule::new(
                    Condition::NormalSkin,
                    &["normal", "healthy", "clear", "smooth"],
                ),
            ],
        }
    }
}

impl ConditionLexicon {
    pub fn rules_for(&self, condition: Condition) -> impl Iterator<Item = &ConditionRule> {
        self.rules.iter().filter(move |rule| rule.condition == condition)
    }
}

/// Both keyword tables, loadable from configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringLexicon {
    pub risk: RiskLexicon,
    pub conditions: ConditionLexicon,
}

impl ScoringLexicon {
    pub fn from_toml(content: &str) -> Result<Self> {
        let lexicon: ScoringLexicon = toml::from_str(content)?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.risk.cancer_keywords.is_empty() || self.risk.skin_keywords.is_empty() {
            return Err(LesionError::InvalidConfig(
                "risk keyword lists must not be empty".into(),
            ));
        }
        if self
            .risk
            .cancer_keywords
            .iter()
            .chain(&self.risk.skin_keywords)
            .any(|k| k.trim().is_empty())
        {
            return Err(LesionError::InvalidConfig("blank risk keyword".into()));
        }

        for rule in &self.conditions.rules {
            if !(rule.weight.is_finite() && rule.weight >= 0.0) {
                return Err(LesionError::InvalidConfig(format!(
                    "{} rule weight must be a non-negative number, got {}",
                    rule.condition, rule.weight
                )));
            }
            if rule.keywords.is_empty() {
                return Err(LesionError::InvalidConfig(format!(
                    "{} rule has no keywords",
                    rule.condition
                )));
            }
            // keywords are compared against single label tokens
            if let Some(bad) = rule.keywords.iter().find(|k| tokenize(k).len() != 1) {
                return Err(LesionError::InvalidConfig(format!(
                    "{} keyword '{bad}' must be a single word",
                    rule.condition
                )));
            }
        }
        Ok(())
    }
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Atopic-Dermatitis (severe)"), vec!["atopic", "dermatitis", "severe"]);
        assert!(tokenize("  --  ").is_empty());
    }

    #[test]
    fn test_risk_categories() {
        let lexicon = RiskLexicon::default();
        assert_eq!(lexicon.categorize("Malignant Melanoma"), LabelCategory::Cancer);
        assert_eq!(lexicon.categorize("melanoma"), LabelCategory::Cancer);
        assert_eq!(lexicon.categorize("skin mole"), LabelCategory::Skin);
        assert_eq!(lexicon.categorize("rash"), LabelCategory::Skin);
        assert_eq!(lexicon.categorize("golden retriever"), LabelCategory::Other);
    }

    #[test]
    fn test_match_fraction_counts_label_tokens() {
        let rule = ConditionRule::new(Condition::Eczema, &["eczema", "rash"]);
        assert_eq!(rule.match_fraction(&tokenize("rash")), 1.0);
        assert_eq!(rule.match_fraction(&tokenize("Heat Rash")), 0.5);
        assert_eq!(rule.match_fraction(&tokenize("wart")), 0.0);
        assert_eq!(rule.match_fraction(&[]), 0.0);
    }

    #[test]
    fn test_default_lexicon_is_valid_and_complete() {
        let lexicon = ScoringLexicon::default();
        lexicon.validate().expect("defaults validate");
        for condition in <Condition as strum::IntoEnumIterator>::iter() {
            assert_eq!(lexicon.conditions.rules_for(condition).count(), 1, "{condition}");
        }
    }

    #[test]
    fn test_lexicon_from_toml() {
        let lexicon = ScoringLexicon::from_toml(
            r#"
            [risk]
            cancer_keywords = ["melanoma"]
            skin_keywords = ["mole"]

            [[conditions]]
            condition = "Psoriasis"
            keywords = ["psoriasis", "plaque"]
            weight = 1.5
            "#,
        )
        .expect("valid lexicon");

        assert_eq!(lexicon.risk.cancer_keywords, vec!["melanoma"]);
        assert_eq!(lexicon.conditions.rules.len(), 1);
        assert_eq!(lexicon.conditions.rules[0].weight, 1.5);
    }

    #[test]
    fn test_lexicon_rejects_bad_rules() {
        let negative = r#"
            [[conditions]]
            condition = "Eczema"
            keywords = ["rash"]
            weight = -1.0
        "#;
        assert!(ScoringLexicon::from_toml(negative).is_err());

        let phrase = r#"
            [[conditions]]
            condition = "FungalInfection"
            keywords = ["athlete's foot"]
        "#;
        assert!(ScoringLexicon::from_toml(phrase).is_err());
    }
}
