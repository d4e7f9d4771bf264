use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low = 1,
    Moderate = 2,
    High = 3,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Stable Market",
            RiskLevel::Moderate => "Balanced Market",
            RiskLevel::High => "Speculative Market",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    pub category: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Buy,
    ConsiderHold,
    Avoid,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "Buy",
            Action::ConsiderHold => "Consider Hold",
            Action::Avoid => "Avoid",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prescription {
    pub action: Action,
    pub explanation: String,
}
