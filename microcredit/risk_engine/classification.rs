use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered risk bands, each with an inclusive upper score bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    /// Score up to 16.
    VeryLow,
    /// Score up to 33.
    Low,
    /// Score up to 50.
    Medium,
    /// Score up to 67.
    SomewhatHigh,
    /// Score up to 84.
    High,
    /// Anything above 84.
    VeryHigh,
}

impl RiskBand {
    /// Bands paired with their inclusive upper bound; the last band is open.
    pub const THRESHOLDS: [(f64, Self); 5] = [
        (16.0, Self::VeryLow),
        (33.0, Self::Low),
        (50.0, Self::Medium),
        (67.0, Self::SomewhatHigh),
        (84.0, Self::High),
    ];

    /// Maps a crisp score to its band; boundary values belong to the lower band.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(upper, _)| score <= *upper)
            .map_or(Self::VeryHigh, |(_, band)| *band)
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::VeryLow => "very low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::SomewhatHigh => "somewhat high",
            Self::High => "high",
            Self::VeryHigh => "very high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_belong_to_lower_band() {
        assert_eq!(RiskBand::from_score(16.0), RiskBand::VeryLow);
        assert_eq!(RiskBand::from_score(16.01), RiskBand::Low);
        assert_eq!(RiskBand::from_score(33.0), RiskBand::Low);
        assert_eq!(RiskBand::from_score(50.0), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(67.0), RiskBand::SomewhatHigh);
        assert_eq!(RiskBand::from_score(84.0), RiskBand::High);
        assert_eq!(RiskBand::from_score(84.000_001), RiskBand::VeryHigh);
    }

    #[test]
    fn covers_whole_output_range() {
        assert_eq!(RiskBand::from_score(0.0), RiskBand::VeryLow);
        assert_eq!(RiskBand::from_score(100.0), RiskBand::VeryHigh);
        let mut previous = RiskBand::VeryLow;
        for tenth in 0..=1000 {
            let band = RiskBand::from_score(f64::from(tenth) / 10.0);
            assert!(band >= previous);
            previous = band;
        }
    }

    #[test]
    fn labels_and_serde_names() {
        assert_eq!(RiskBand::SomewhatHigh.to_string(), "somewhat high");
        assert_eq!(
            serde_json::to_string(&RiskBand::VeryHigh).unwrap(),
            "\"very_high\""
        );
    }
}
