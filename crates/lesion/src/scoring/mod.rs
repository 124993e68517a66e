pub mod lexicon;
pub mod risk;
pub mod condition;

pub use lexicon::{tokenize, ConditionLexicon, ConditionRule, LabelCategory, RiskLexicon, ScoringLexicon};
pub use risk::{RiskScorer, RiskThresholds, MAX_CANCER_PERCENTAGE, MIN_CANCER_PERCENTAGE};
pub use condition::{normalize_shares, ConditionScorer, HAS_CONDITION_SHARE};
