//! The four-level confidence scale used throughout the crate.
//!
//! Every conversion between the discrete levels and numeric scores goes
//! through this module so that aggregation, analysis, and synthesis all agree
//! on the same thresholds.

use serde::{Deserialize, Serialize};

/// Qualitative confidence attached to agent outputs, evidence, and insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    /// Numeric value of a level: low=0.25, medium=0.5, high=0.75,
    /// very_high=1.0.
    pub fn as_score(self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::VeryHigh => 1.0,
        }
    }

    /// Nearest discrete level for a score in [0, 1].
    ///
    /// Thresholds: >= 0.9 very_high, >= 0.7 high, >= 0.4 medium, else low.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::VeryHigh
        } else if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Mean of a set of levels, mapped back to the nearest level.
    /// Returns `Medium` for an empty set.
    pub fn mean_of(levels: impl IntoIterator<Item = ConfidenceLevel>) -> Self {
        let mut sum = 0.0;
        let mut count = 0usize;
        for level in levels {
            sum += level.as_score();
            count += 1;
        }
        if count == 0 {
            return Self::Medium;
        }
        Self::from_score(sum / count as f64)
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::VeryHigh => write!(f, "very_high"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_round_trips() {
        for level in [
            ConfidenceLevel::Low,
            ConfidenceLevel::Medium,
            ConfidenceLevel::High,
            ConfidenceLevel::VeryHigh,
        ] {
            assert_eq!(ConfidenceLevel::from_score(level.as_score()), level);
        }
    }

    #[test]
    fn very_high_boundary_is_point_nine() {
        assert_eq!(ConfidenceLevel::from_score(0.9), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_score(0.89), ConfidenceLevel::High);
    }

    #[test]
    fn mean_of_mixed_levels() {
        let mean = ConfidenceLevel::mean_of([ConfidenceLevel::Low, ConfidenceLevel::VeryHigh]);
        // (0.25 + 1.0) / 2 = 0.625
        assert_eq!(mean, ConfidenceLevel::Medium);
    }

    #[test]
    fn mean_of_empty_is_medium() {
        assert_eq!(ConfidenceLevel::mean_of([]), ConfidenceLevel::Medium);
    }

    #[test]
    fn ordering_matches_score() {
        assert!(ConfidenceLevel::Low < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::High < ConfidenceLevel::VeryHigh);
    }
}
