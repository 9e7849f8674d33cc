//! Glucose bands and clinical targets
//!
//! Partition of the concentration axis into the five consensus bands used for
//! Time-in-Range reporting, plus the percentage targets a result is judged
//! against. Both are built once at startup and passed to the calculator.

use serde::{Deserialize, Serialize};

/// One of the five glucose bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GlucoseBand {
    /// Level 2 hypoglycemia (< 54 mg/dL)
    VeryLow,
    /// Level 1 hypoglycemia (54-69 mg/dL)
    Low,
    /// Target range (70-180 mg/dL)
    Target,
    /// Level 1 hyperglycemia (181-250 mg/dL)
    High,
    /// Level 2 hyperglycemia (> 250 mg/dL)
    VeryHigh,
}

impl GlucoseBand {
    /// All bands, lowest first
    pub const ALL: [GlucoseBand; 5] = [
        GlucoseBand::VeryLow,
        GlucoseBand::Low,
        GlucoseBand::Target,
        GlucoseBand::High,
        GlucoseBand::VeryHigh,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GlucoseBand::VeryLow => "Very Low",
            GlucoseBand::Low => "Low",
            GlucoseBand::Target => "In Range",
            GlucoseBand::High => "High",
            GlucoseBand::VeryHigh => "Very High",
        }
    }

    /// True for the two level-2 bands
    pub fn is_severe(self) -> bool {
        matches!(self, GlucoseBand::VeryLow | GlucoseBand::VeryHigh)
    }
}

/// Inclusive `[min, max]` bounds of one band, as published to clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Cut points between the glucose bands (mg/dL)
///
/// A value `v` is very low when `v < very_low_below`, low when
/// `v < target_min`, in target when `v <= target_max`, high when
/// `v <= high_max` and very high otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseRanges {
    pub very_low_below: f64,
    pub target_min: f64,
    pub target_max: f64,
    pub high_max: f64,
}

impl GlucoseRanges {
    /// International consensus cut points. Clinical convention, not tunable.
    pub const STANDARD: GlucoseRanges = GlucoseRanges {
        very_low_below: 54.0,
        target_min: 70.0,
        target_max: 180.0,
        high_max: 250.0,
    };

    /// Classify a concentration into exactly one band
    pub fn classify(&self, value: f64) -> GlucoseBand {
        if value < self.very_low_below {
            GlucoseBand::VeryLow
        } else if value < self.target_min {
            GlucoseBand::Low
        } else if value <= self.target_max {
            GlucoseBand::Target
        } else if value <= self.high_max {
            GlucoseBand::High
        } else {
            GlucoseBand::VeryHigh
        }
    }

    /// Client-facing bounds of a band, in whole mg/dL
    pub fn bounds(&self, band: GlucoseBand) -> BandBounds {
        match band {
            GlucoseBand::VeryLow => BandBounds {
                min: None,
                max: Some(self.very_low_below - 1.0),
            },
            GlucoseBand::Low => BandBounds {
                min: Some(self.very_low_below),
                max: Some(self.target_min - 1.0),
            },
            GlucoseBand::Target => BandBounds {
                min: Some(self.target_min),
                max: Some(self.target_max),
            },
            GlucoseBand::High => BandBounds {
                min: Some(self.target_max + 1.0),
                max: Some(self.high_max),
            },
            GlucoseBand::VeryHigh => BandBounds {
                min: Some(self.high_max + 1.0),
                max: None,
            },
        }
    }

    /// `GLUCOSE_RANGES` payload returned next to every report
    pub fn table(&self) -> RangeTable {
        RangeTable {
            very_low: self.bounds(GlucoseBand::VeryLow),
            low: self.bounds(GlucoseBand::Low),
            target: self.bounds(GlucoseBand::Target),
            high: self.bounds(GlucoseBand::High),
            very_high: self.bounds(GlucoseBand::VeryHigh),
        }
    }
}

impl Default for GlucoseRanges {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Band bounds keyed by band name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeTable {
    pub very_low: BandBounds,
    pub low: BandBounds,
    pub target: BandBounds,
    pub high: BandBounds,
    pub very_high: BandBounds,
}

/// Percentage targets for a Time-in-Range report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalTargets {
    /// Minimum percentage of readings in the target band
    pub target_min_percent: f64,
    /// Maximum percentage in very low + low
    pub below_range_max_percent: f64,
    /// Maximum percentage in very low
    pub very_low_max_percent: f64,
    /// Maximum percentage in high + very high
    pub above_range_max_percent: f64,
    /// Maximum percentage in very high
    pub very_high_max_percent: f64,
    /// Maximum coefficient of variation for stable glucose
    pub cv_max_percent: f64,
    /// Readings needed before a report is considered reliable
    pub min_readings: usize,
}

impl Default for ClinicalTargets {
    fn default() -> Self {
        Self {
            target_min_percent: 70.0,
            below_range_max_percent: 4.0,
            very_low_max_percent: 1.0,
            above_range_max_percent: 25.0,
            very_high_max_percent: 5.0,
            cv_max_percent: 36.0,
            min_readings: 50,
        }
    }
}
