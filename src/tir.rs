//! Time-in-Range calculator
//!
//! Summarizes a sequence of glucose samples into per-band counts and
//! percentages plus the usual variability statistics (mean, population
//! standard deviation, coefficient of variation, estimated HbA1c).
//!
//! The calculation is a pure function of its input: no I/O, no shared state,
//! and it never fails. An empty sequence yields zero percentages and null
//! statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::GlucoseSample;
use crate::ranges::{ClinicalTargets, GlucoseBand, GlucoseRanges};

/// ADAG regression: estimated A1c (%) = (mean mg/dL + 46.7) / 28.7
const HBA1C_INTERCEPT: f64 = 46.7;
const HBA1C_SLOPE: f64 = 28.7;

/// Sample count and share of one band
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandStat {
    pub count: usize,
    /// Percentage of all samples, one decimal
    pub percentage: f64,
}

/// Per-band breakdown of a result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandBreakdown {
    pub very_low: BandStat,
    pub low: BandStat,
    pub target: BandStat,
    pub high: BandStat,
    pub very_high: BandStat,
}

impl BandBreakdown {
    pub fn get(&self, band: GlucoseBand) -> &BandStat {
        match band {
            GlucoseBand::VeryLow => &self.very_low,
            GlucoseBand::Low => &self.low,
            GlucoseBand::Target => &self.target,
            GlucoseBand::High => &self.high,
            GlucoseBand::VeryHigh => &self.very_high,
        }
    }

    fn get_mut(&mut self, band: GlucoseBand) -> &mut BandStat {
        match band {
            GlucoseBand::VeryLow => &mut self.very_low,
            GlucoseBand::Low => &mut self.low,
            GlucoseBand::Target => &mut self.target,
            GlucoseBand::High => &mut self.high,
            GlucoseBand::VeryHigh => &mut self.very_high,
        }
    }

    pub fn total_count(&self) -> usize {
        GlucoseBand::ALL.iter().map(|band| self.get(*band).count).sum()
    }
}

/// Time-in-Range summary over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInRangeResult {
    pub bands: BandBreakdown,
    /// Mean glucose (mg/dL), two decimals
    pub mean: Option<f64>,
    /// Population standard deviation (mg/dL), two decimals
    pub std_dev: Option<f64>,
    /// Coefficient of variation (%), one decimal
    pub coefficient_of_variation: Option<f64>,
    /// Estimated HbA1c (%), one decimal
    pub estimated_hba1c: Option<f64>,
    pub sample_count: usize,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

impl TimeInRangeResult {
    /// Result for a period without samples
    pub fn empty() -> Self {
        Self {
            bands: BandBreakdown::default(),
            mean: None,
            std_dev: None,
            coefficient_of_variation: None,
            estimated_hba1c: None,
            sample_count: 0,
            period_start: None,
            period_end: None,
        }
    }

    /// Unrounded share of samples falling in any of `bands`
    pub fn percent_in(&self, bands: &[GlucoseBand]) -> f64 {
        let count: usize = bands.iter().map(|band| self.bands.get(*band).count).sum();
        percent_of(count, self.sample_count)
    }
}

/// Compute the Time-in-Range summary of `samples`
///
/// `period_start`/`period_end` are the earliest and latest timestamps seen,
/// which for ascending input are the first and last samples.
pub fn calculate_time_in_range(samples: &[GlucoseSample], ranges: &GlucoseRanges) -> TimeInRangeResult {
    if samples.is_empty() {
        return TimeInRangeResult::empty();
    }

    let mut bands = BandBreakdown::default();
    let mut sum = 0.0;
    let mut period_start = samples[0].timestamp;
    let mut period_end = samples[0].timestamp;

    for sample in samples {
        bands.get_mut(ranges.classify(sample.value)).count += 1;
        sum += sample.value;
        period_start = period_start.min(sample.timestamp);
        period_end = period_end.max(sample.timestamp);
    }

    let sample_count = samples.len();
    debug_assert_eq!(bands.total_count(), sample_count);
    for band in GlucoseBand::ALL {
        let stat = bands.get_mut(band);
        stat.percentage = round_to(percent_of(stat.count, sample_count), 1);
    }

    let n = sample_count as f64;
    let mean = sum / n;
    // Population variance: divide by n
    let variance = samples
        .iter()
        .map(|s| (s.value - mean).powi(2))
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    let (coefficient_of_variation, estimated_hba1c) = if mean == 0.0 {
        (None, None)
    } else {
        (
            Some(round_to(std_dev / mean * 100.0, 1)),
            Some(round_to((mean + HBA1C_INTERCEPT) / HBA1C_SLOPE, 1)),
        )
    };

    TimeInRangeResult {
        bands,
        mean: Some(round_to(mean, 2)),
        std_dev: Some(round_to(std_dev, 2)),
        coefficient_of_variation,
        estimated_hba1c,
        sample_count,
        period_start: Some(period_start),
        period_end: Some(period_end),
    }
}

/// Outcome of comparing a result with the clinical targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAssessment {
    pub time_in_range_met: bool,
    pub below_range_met: bool,
    pub very_low_met: bool,
    pub above_range_met: bool,
    pub very_high_met: bool,
    /// Fails when the coefficient of variation is unavailable
    pub variability_met: bool,
    /// Enough samples for the result to be trusted
    pub reliable: bool,
    pub all_met: bool,
}

impl TargetAssessment {
    pub fn evaluate(result: &TimeInRangeResult, targets: &ClinicalTargets) -> Self {
        use GlucoseBand::*;

        let time_in_range_met = result.percent_in(&[Target]) >= targets.target_min_percent;
        let below_range_met = result.percent_in(&[VeryLow, Low]) <= targets.below_range_max_percent;
        let very_low_met = result.percent_in(&[VeryLow]) <= targets.very_low_max_percent;
        let above_range_met =
            result.percent_in(&[High, VeryHigh]) <= targets.above_range_max_percent;
        let very_high_met = result.percent_in(&[VeryHigh]) <= targets.very_high_max_percent;
        let variability_met = result
            .coefficient_of_variation
            .is_some_and(|cv| cv <= targets.cv_max_percent);

        Self {
            time_in_range_met,
            below_range_met,
            very_low_met,
            above_range_met,
            very_high_met,
            variability_met,
            reliable: result.sample_count >= targets.min_readings,
            all_met: time_in_range_met
                && below_range_met
                && very_low_met
                && above_range_met
                && very_high_met
                && variability_met,
        }
    }
}

fn percent_of(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
