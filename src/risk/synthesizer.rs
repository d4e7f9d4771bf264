use crate::config::RiskConfig;
use crate::data::types::SentimentLabel;
use crate::risk::types::{Action, Prescription, RiskAssessment, RiskLevel};

/// Composite risk and prescription strategy
///
/// Implementations must be pure and total over finite inputs: higher growth
/// or more positive sentiment never raises the score, higher volatility
/// never lowers it.
pub trait RiskScorer: Send + Sync {
    fn analyze_risk(
        &self,
        current_price: f64,
        growth_rate: f64,
        volatility: f64,
        sentiment_label: SentimentLabel,
        sentiment_score: f64,
        location_factor: f64,
    ) -> RiskAssessment;

    fn get_prescription(&self, score: f64, growth_rate: f64) -> Prescription;
}

/// Weighted blend of growth, volatility and sentiment risk, scaled by locality
#[derive(Debug, Clone)]
pub struct WeightedRiskScorer {
    config: RiskConfig,
}

impl WeightedRiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    fn level_for(&self, score: f64) -> RiskLevel {
        if score < self.config.low_threshold {
            RiskLevel::Low
        } else if score < self.config.high_threshold {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }

    fn growth_risk(&self, growth_rate: f64) -> f64 {
        (0.5 - growth_rate * self.config.growth_sensitivity).clamp(0.0, 1.0)
    }

    fn volatility_risk(&self, volatility: f64) -> f64 {
        if self.config.volatility_ceiling <= 0.0 {
            return if volatility > 0.0 { 1.0 } else { 0.0 };
        }
        (volatility / self.config.volatility_ceiling).clamp(0.0, 1.0)
    }

    fn sentiment_risk(label: SentimentLabel, score: f64) -> f64 {
        let bias = match label {
            SentimentLabel::Positive => -0.1,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Negative => 0.1,
        };
        (1.0 - score / 100.0 + bias).clamp(0.0, 1.0)
    }
}

impl Default for WeightedRiskScorer {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

impl RiskScorer for WeightedRiskScorer {
    fn analyze_risk(
        &self,
        current_price: f64,
        growth_rate: f64,
        volatility: f64,
        sentiment_label: SentimentLabel,
        sentiment_score: f64,
        location_factor: f64,
    ) -> RiskAssessment {
        let growth_rate = finite_or(growth_rate, 0.0);
        let volatility = finite_or(volatility, 0.0).max(0.0);
        let sentiment_score = finite_or(sentiment_score, 50.0).clamp(0.0, 100.0);
        let location_factor = if location_factor.is_finite() && location_factor > 0.0 {
            location_factor
        } else {
            1.0
        };

        let weights = [
            self.config.growth_weight.max(0.0),
            self.config.volatility_weight.max(0.0),
            self.config.sentiment_weight.max(0.0),
        ];
        let components = [
            self.growth_risk(growth_rate),
            self.volatility_risk(volatility),
            Self::sentiment_risk(sentiment_label, sentiment_score),
        ];
        let total_weight: f64 = weights.iter().sum();
        let blended = if total_weight > 0.0 {
            weights.iter().zip(&components).map(|(w, c)| w * c).sum::<f64>() / total_weight
        } else {
            0.5
        };

        let score = (100.0 * blended / location_factor).clamp(0.0, 100.0);
        let level = self.level_for(score);

        let message = format!(
            "{} risk ({:.1}/100) for a property valued at {:.2}: expected growth {:.2}%, volatility {:.2}%, {} sentiment ({:.0}), location factor {:.2}",
            level,
            score,
            finite_or(current_price, 0.0),
            growth_rate * 100.0,
            volatility * 100.0,
            sentiment_label,
            sentiment_score,
            location_factor
        );

        RiskAssessment {
            score,
            level,
            category: level.category().to_string(),
            message,
        }
    }

    fn get_prescription(&self, score: f64, growth_rate: f64) -> Prescription {
        let score = finite_or(score, 100.0);
        let growth_rate = finite_or(growth_rate, 0.0);
        let level = self.level_for(score);

        let (action, explanation) = if level == RiskLevel::Low && growth_rate > 0.05 {
            (
                Action::Buy,
                format!(
                    "Low composite risk ({:.1}) with {:.2}% expected growth favours buying now.",
                    score,
                    growth_rate * 100.0
                ),
            )
        } else if level != RiskLevel::High && growth_rate > 0.02 {
            (
                Action::ConsiderHold,
                format!(
                    "Growth of {:.2}% is positive but risk is {} ({:.1}); hold or buy selectively.",
                    growth_rate * 100.0,
                    level.as_str().to_lowercase(),
                    score
                ),
            )
        } else {
            (
                Action::Avoid,
                format!(
                    "Expected growth of {:.2}% does not compensate for {} risk ({:.1}).",
                    growth_rate * 100.0,
                    level.as_str().to_lowercase(),
                    score
                ),
            )
        };

        Prescription { action, explanation }
    }
}

fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(growth: f64, vol: f64, label: SentimentLabel, sentiment: f64, factor: f64) -> f64 {
        WeightedRiskScorer::default()
            .analyze_risk(100.0, growth, vol, label, sentiment, factor)
            .score
    }

    #[test]
    fn test_neutral_inputs() {
        // growth 0.5, volatility 0.2, sentiment 0.5 → (0.225 + 0.07 + 0.1) = 0.395
        let s = score(0.0, 0.01, SentimentLabel::Neutral, 50.0, 1.0);
        assert!((s - 39.5).abs() < 1e-9);
    }

    #[test]
    fn test_higher_growth_never_raises_score() {
        let mut previous = f64::INFINITY;
        for growth in [-0.2, -0.05, 0.0, 0.03, 0.08, 0.2] {
            let s = score(growth, 0.02, SentimentLabel::Neutral, 50.0, 1.0);
            assert!(s <= previous);
            previous = s;
        }
    }

    #[test]
    fn test_higher_volatility_never_lowers_score() {
        let mut previous = f64::NEG_INFINITY;
        for vol in [0.0, 0.01, 0.03, 0.05, 0.2] {
            let s = score(0.03, vol, SentimentLabel::Neutral, 50.0, 1.0);
            assert!(s >= previous);
            previous = s;
        }
    }

    #[test]
    fn test_positive_sentiment_never_raises_score() {
        let negative = score(0.03, 0.02, SentimentLabel::Negative, 20.0, 1.0);
        let neutral = score(0.03, 0.02, SentimentLabel::Neutral, 50.0, 1.0);
        let positive = score(0.03, 0.02, SentimentLabel::Positive, 80.0, 1.0);

        assert!(negative >= neutral);
        assert!(neutral >= positive);
    }

    #[test]
    fn test_location_factor_scales_risk() {
        let premium = score(0.0, 0.02, SentimentLabel::Neutral, 50.0, 1.10);
        let base = score(0.0, 0.02, SentimentLabel::Neutral, 50.0, 1.0);
        let weaker = score(0.0, 0.02, SentimentLabel::Neutral, 50.0, 0.95);

        assert!(premium < base);
        assert!(weaker > base);
    }

    #[test]
    fn test_total_over_odd_inputs() {
        let scorer = WeightedRiskScorer::default();
        let assessment = scorer.analyze_risk(
            f64::NAN,
            f64::INFINITY,
            f64::NAN,
            SentimentLabel::Negative,
            500.0,
            0.0,
        );

        assert!(assessment.score.is_finite());
        assert!((0.0..=100.0).contains(&assessment.score));
        assert!(!assessment.message.is_empty());

        let prescription = scorer.get_prescription(f64::NAN, f64::NEG_INFINITY);
        assert_eq!(prescription.action, Action::Avoid);
    }

    #[test]
    fn test_levels_and_categories() {
        let scorer = WeightedRiskScorer::default();

        let low = scorer.analyze_risk(100.0, 0.15, 0.0, SentimentLabel::Positive, 90.0, 1.0);
        assert_eq!(low.level, RiskLevel::Low);
        assert_eq!(low.category, "Stable Market");

        let high = scorer.analyze_risk(100.0, -0.15, 0.08, SentimentLabel::Negative, 10.0, 1.0);
        assert_eq!(high.level, RiskLevel::High);
        assert_eq!(high.category, "Speculative Market");
    }

    #[test]
    fn test_prescriptions() {
        let scorer = WeightedRiskScorer::default();

        assert_eq!(scorer.get_prescription(20.0, 0.08).action, Action::Buy);
        assert_eq!(scorer.get_prescription(20.0, 0.05).action, Action::ConsiderHold);
        assert_eq!(scorer.get_prescription(50.0, 0.03).action, Action::ConsiderHold);
        assert_eq!(scorer.get_prescription(50.0, 0.01).action, Action::Avoid);
        assert_eq!(scorer.get_prescription(80.0, 0.10).action, Action::Avoid);
        assert_eq!(Action::ConsiderHold.as_str(), "Consider Hold");
    }
}
