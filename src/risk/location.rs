use std::collections::HashMap;
use crate::config::LocationFactorConfig;
use crate::data::artifacts::normalize_location;

/// Demand multipliers keyed by normalized locality name
#[derive(Debug, Clone)]
pub struct LocationFactors {
    factors: HashMap<String, f64>,
    default_factor: f64,
}

impl LocationFactors {
    pub fn new(entries: &[LocationFactorConfig], default_factor: f64) -> Self {
        let factors = entries
            .iter()
            .filter(|e| e.factor.is_finite() && e.factor > 0.0)
            .map(|e| (normalize_location(&e.name), e.factor))
            .collect();

        Self {
            factors,
            default_factor: if default_factor.is_finite() && default_factor > 0.0 {
                default_factor
            } else {
                1.0
            },
        }
    }

    /// Exact match on the normalized name; no substring guessing
    pub fn factor_for(&self, location: &str) -> f64 {
        self.factors
            .get(&normalize_location(location))
            .copied()
            .unwrap_or(self.default_factor)
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}
