//! Data models for glucose readings and related structures
//!
//! Defines the core data structures used throughout the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::ranges::{GlucoseBand, GlucoseRanges};

/// A single glucose value at a point in time, as consumed by the calculator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseSample {
    /// Concentration in mg/dL
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl GlucoseSample {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// Where a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    /// Continuous glucose monitor upload
    #[default]
    Cgm,
    /// Fingerstick meter entered by hand
    Manual,
    /// Generated by the built-in CGM simulator
    Simulated,
}

/// Stored glucose reading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseReading {
    /// Unique identifier for this reading
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Glucose concentration (mg/dL)
    pub value: f64,

    /// ISO 8601 timestamp of the reading
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub source: ReadingSource,

    /// Optional correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl GlucoseReading {
    pub fn new(value: f64, timestamp: DateTime<Utc>, source: ReadingSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            value,
            timestamp,
            source,
            correlation_id: None,
        }
    }

    /// The calculator's view of this reading
    pub fn sample(&self) -> GlucoseSample {
        GlucoseSample::new(self.value, self.timestamp)
    }
}

/// Input DTO for glucose reading ingestion
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseInput {
    /// Reportable range of consumer CGMs and meters
    #[validate(range(min = 20.0, max = 600.0, message = "Glucose must be between 20 and 600 mg/dL"))]
    pub value: f64,

    /// Optional client-provided timestamp (defaults to server time)
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub source: ReadingSource,
}

impl From<GlucoseInput> for GlucoseReading {
    fn from(input: GlucoseInput) -> Self {
        GlucoseReading::new(
            input.value,
            input.timestamp.unwrap_or_else(Utc::now),
            input.source,
        )
    }
}

/// Input DTO for bulk uploads from a CGM sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlucoseBatchInput {
    pub readings: Vec<GlucoseInput>,
}

/// Latest reading with its band
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReading {
    #[serde(flatten)]
    pub reading: GlucoseReading,
    pub band: GlucoseBand,
}

impl LatestReading {
    pub fn classify(reading: GlucoseReading, ranges: &GlucoseRanges) -> Self {
        let band = ranges.classify(reading.value);
        Self { reading, band }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub total_readings: u64,
    pub users: usize,
    pub last_reading: Option<DateTime<Utc>>,
}
