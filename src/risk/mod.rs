pub mod location;
pub mod synthesizer;
pub mod types;

pub use location::LocationFactors;
pub use synthesizer::{RiskScorer, WeightedRiskScorer};
pub use types::{Action, Prescription, RiskAssessment, RiskLevel};
