use std::collections::BTreeMap;

use strum::IntoEnumIterator;
use tracing::debug;

use super::lexicon::{tokenize, ConditionLexicon};
use crate::types::{ClassifierPrediction, Condition, ConditionAssessment};

/// Number of ranked predictions that contribute to the condition scores
pub const RANKED_PREDICTIONS: usize = 3;

/// Per-unit weight credited to normal skin for a prediction no rule matches
pub const UNMATCHED_NORMAL_WEIGHT: f64 = 10.0;

/// Minimum share of a non-normal primary condition for `has_condition`
pub const HAS_CONDITION_SHARE: u8 = 30;

/// Maps free-form classifier labels onto the fixed condition set
#[derive(Debug, Clone, Default)]
pub struct ConditionScorer {
    pub lexicon: ConditionLexicon,
}

impl ConditionScorer {
    pub fn new(lexicon: ConditionLexicon) -> Self {
        Self { lexicon }
    }

    pub fn score(&self, predictions: &[ClassifierPrediction]) -> ConditionAssessment {
        let scores = self.raw_scores(predictions);
        let (primary_condition, all_conditions) = normalize_shares(&scores);
        let confidence = all_conditions.get(&primary_condition).copied().unwrap_or(0);
        let has_condition =
            primary_condition != Condition::NormalSkin && confidence > HAS_CONDITION_SHARE;

        debug!(%primary_condition, confidence, ?all_conditions, "Scored skin condition");

        ConditionAssessment {
            primary_condition,
            confidence,
            all_conditions,
            has_condition,
        }
    }

    /// Weighted keyword evidence per condition, before normalization
    pub fn raw_scores(&self, predictions: &[ClassifierPrediction]) -> BTreeMap<Condition, f64> {
        let mut scores: BTreeMap<Condition, f64> = Condition::iter().map(|c| (c, 0.0)).collect();
        let k = RANKED_PREDICTIONS as f64;

        for (index, prediction) in predictions.iter().take(RANKED_PREDICTIONS).enumerate() {
            let confidence = if prediction.confidence.is_finite() {
                prediction.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let weight = confidence * (k - index as f64) / k;
            let tokens = tokenize(&prediction.label);

            let mut matched = false;
            for rule in &self.lexicon.rules {
                let fraction = rule.match_fraction(&tokens);
                if fraction > 0.0 {
                    matched = true;
                    *scores.entry(rule.condition).or_insert(0.0) +=
                        weight * rule.weight * fraction * 100.0;
                }
            }

            if !matched {
                *scores.entry(Condition::NormalSkin).or_insert(0.0) +=
                    weight * UNMATCHED_NORMAL_WEIGHT;
            }
        }

        scores
    }
}

/// Integer shares summing to exactly 100: each share is floored and the residue
/// is folded into the winning condition. No evidence at all means normal skin.
pub fn normalize_shares(scores: &BTreeMap<Condition, f64>) -> (Condition, BTreeMap<Condition, u8>) {
    let total: f64 = scores.values().filter(|s| s.is_finite() && **s > 0.0).sum();

    if total <= 0.0 || !total.is_finite() {
        let shares = Condition::iter()
            .map(|c| (c, if c == Condition::NormalSkin { 100 } else { 0 }))
            .collect();
        return (Condition::NormalSkin, shares);
    }

    let value = |c: Condition| {
        scores
            .get(&c)
            .copied()
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(0.0)
    };

    // first condition wins ties
    let mut primary = Condition::NormalSkin;
    let mut best = f64::NEG_INFINITY;
    for c in Condition::iter() {
        if value(c) > best {
            best = value(c);
            primary = c;
        }
    }

    // floored so the residue is never negative and the winner stays the largest share
    let mut shares: BTreeMap<Condition, i64> = Condition::iter()
        .map(|c| (c, (value(c) / total * 100.0).floor() as i64))
        .collect();
    let residue = 100 - shares.values().sum::<i64>();
    if let Some(share) = shares.get_mut(&primary) {
        *share += residue;
    }

    let shares = shares
        .into_iter()
        .map(|(c, share)| (c, share.clamp(0, 100) as u8))
        .collect();
    (primary, shares)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(assessment: &ConditionAssessment) -> u32 {
        assessment.all_conditions.values().map(|&v| v as u32).sum()
    }

    #[test]
    fn test_rash_favours_eczema_over_normal_skin() {
        let assessment = ConditionScorer::default().score(&[ClassifierPrediction::new("rash", 0.8)]);
        let eczema = assessment.all_conditions[&Condition::Eczema];
        let normal = assessment.all_conditions[&Condition::NormalSkin];
        assert!(eczema > normal);
        assert_eq!(total(&assessment), 100);
        assert_eq!(assessment.primary_condition, Condition::Eczema);
        assert!(assessment.has_condition);
    }

    #[test]
    fn test_no_predictions_means_normal_skin() {
        let assessment = ConditionScorer::default().score(&[]);
        assert_eq!(assessment.primary_condition, Condition::NormalSkin);
        assert_eq!(assessment.confidence, 100);
        assert!(!assessment.has_condition);
        assert_eq!(total(&assessment), 100);
        assert_eq!(assessment.all_conditions.len(), 6);
    }

    #[test]
    fn test_unmatched_labels_accrue_normal_skin() {
        let scorer = ConditionScorer::default();
        let scores = scorer.raw_scores(&[ClassifierPrediction::new("teapot", 0.9)]);
        assert!((scores[&Condition::NormalSkin] - 9.0).abs() < 1e-9);

        let assessment = scorer.score(&[ClassifierPrediction::new("teapot", 0.9)]);
        assert_eq!(assessment.primary_condition, Condition::NormalSkin);
        assert!(!assessment.has_condition);
    }

    #[test]
    fn test_rank_weights_decay() {
        let scores = ConditionScorer::default().raw_scores(&[
            ClassifierPrediction::new("ringworm", 0.6),
            ClassifierPrediction::new("rash", 0.6),
            ClassifierPrediction::new("wart", 0.6),
            ClassifierPrediction::new("psoriasis", 0.9),
        ]);
        assert!((scores[&Condition::FungalInfection] - 60.0).abs() < 1e-9);
        assert!((scores[&Condition::Eczema] - 40.0).abs() < 1e-9);
        assert!((scores[&Condition::ViralInfection] - 20.0).abs() < 1e-9);
        // fourth prediction is ignored
        assert_eq!(scores[&Condition::Psoriasis], 0.0);
    }

    #[test]
    fn test_rounding_residue_goes_to_winner() {
        let mut scores: BTreeMap<Condition, f64> = Condition::iter().map(|c| (c, 0.0)).collect();
        scores.insert(Condition::Eczema, 1.0);
        scores.insert(Condition::Psoriasis, 1.0);
        scores.insert(Condition::ViralInfection, 1.0);

        let (primary, shares) = normalize_shares(&scores);
        assert_eq!(primary, Condition::ViralInfection);
        assert_eq!(shares[&Condition::ViralInfection], 34);
        assert_eq!(shares[&Condition::Eczema], 33);
        assert_eq!(shares.values().map(|&v| v as u32).sum::<u32>(), 100);
    }

    #[test]
    fn test_six_way_tie_keeps_winner_largest() {
        let assessment = ConditionScorer::default().score(&[ClassifierPrediction::new(
            "impetigo ringworm wart eczema psoriasis healthy",
            0.9,
        )]);
        let largest = assessment.all_conditions.values().copied().max();

        assert_eq!(assessment.primary_condition, Condition::BacterialInfection);
        assert_eq!(assessment.confidence, 20);
        assert_eq!(Some(assessment.confidence), largest);
        assert!(assessment
            .all_conditions
            .iter()
            .filter(|(c, _)| **c != Condition::BacterialInfection)
            .all(|(_, &share)| share == 16));
        assert_eq!(total(&assessment), 100);
    }

    #[test]
    fn test_primary_share_is_never_exceeded() {
        let labels = ["rash ringworm", "wart tinea", "psoriasis dry itchy", "impetigo viral", "banana"];
        let scorer = ConditionScorer::default();
        for a in labels {
            for b in labels {
                for c in labels {
                    let assessment = scorer.score(&[
                        ClassifierPrediction::new(a, 0.77),
                        ClassifierPrediction::new(b, 0.61),
                        ClassifierPrediction::new(c, 0.29),
                    ]);
                    let largest = assessment.all_conditions.values().copied().max();
                    assert_eq!(Some(assessment.confidence), largest, "{a} / {b} / {c}");
                }
            }
        }
    }

    #[test]
    fn test_shares_always_sum_to_100() {
        let labels = [
            "rash", "ringworm", "wart", "psoriasis plaque", "impetigo", "healthy skin",
            "banana", "dry itchy eczema", "viral blister", "tinea corporis",
        ];
        let scorer = ConditionScorer::default();
        for (i, a) in labels.iter().enumerate() {
            for (j, b) in labels.iter().enumerate() {
                for c in labels.iter().skip((i + j) % labels.len()).take(2) {
                    let predictions = [
                        ClassifierPrediction::new(*a, 0.31 + i as f64 * 0.05),
                        ClassifierPrediction::new(*b, 0.17 + j as f64 * 0.03),
                        ClassifierPrediction::new(*c, 0.07),
                    ];
                    let assessment = scorer.score(&predictions);
                    assert_eq!(total(&assessment), 100, "{predictions:?}");
                    assert!(assessment.confidence <= 100);
                }
            }
        }
    }

    #[test]
    fn test_has_condition_requires_share_above_threshold() {
        let assessment = ConditionScorer::default().score(&[
            ClassifierPrediction::new("rash", 0.3),
            ClassifierPrediction::new("ringworm", 0.4),
            ClassifierPrediction::new("wart", 0.6),
        ]);
        // eczema 30, fungal 26.7, viral 20 of 76.7; floored 39 + 34 + 26, residue 1
        assert_eq!(assessment.primary_condition, Condition::Eczema);
        assert_eq!(assessment.confidence, 40);
        assert_eq!(assessment.all_conditions[&Condition::FungalInfection], 34);
        assert!(assessment.has_condition);
    }
}
