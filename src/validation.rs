//! Input validation module
//!
//! Validation for glucose readings and API query parameters.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use validator::Validate;

use crate::config::AnalyticsSettings;
use crate::error::{AppError, AppResult};
use crate::models::GlucoseInput;

/// Glucose ingestion constraints
pub struct GlucoseConstraints;

impl GlucoseConstraints {
    /// Reportable range of consumer CGMs and meters (mg/dL)
    pub const VALUE_MIN: f64 = 20.0;
    pub const VALUE_MAX: f64 = 600.0;

    /// Tolerated clock skew for client timestamps
    pub const MAX_FUTURE_SKEW_MINUTES: i64 = 5;

    /// One week of 5-minute CGM readings
    pub const MAX_BATCH_SIZE: usize = 7 * 288;
}

/// Validate glucose input data
pub fn validate_glucose_input(input: &GlucoseInput) -> AppResult<()> {
    validate_glucose_input_at(input, Utc::now())
}

fn validate_glucose_input_at(input: &GlucoseInput, now: DateTime<Utc>) -> AppResult<()> {
    // Finite check first: NaN slips through range comparisons
    validate_value(input.value)?;

    if let Err(validation_errors) = input.validate() {
        let error_messages: Vec<String> = validation_errors
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let msgs: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|c| c.as_ref()))
                    .collect();
                format!("{}: {}", field, msgs.join(", "))
            })
            .collect();

        warn!(errors = ?error_messages, "Glucose input validation failed");
        return Err(AppError::ValidationError(error_messages.join("; ")));
    }

    if let Some(timestamp) = input.timestamp {
        validate_timestamp(timestamp, now)?;
    }

    debug!("Glucose input validation passed");
    Ok(())
}

/// Validate a batch upload
pub fn validate_batch(inputs: &[GlucoseInput]) -> AppResult<()> {
    if inputs.is_empty() {
        return Err(AppError::BadRequest("Batch contains no readings".to_string()));
    }

    if inputs.len() > GlucoseConstraints::MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "Batch of {} readings exceeds the limit of {}",
            inputs.len(),
            GlucoseConstraints::MAX_BATCH_SIZE
        )));
    }

    let now = Utc::now();
    for (index, input) in inputs.iter().enumerate() {
        validate_glucose_input_at(input, now).map_err(|e| match e {
            AppError::ValidationError(msg) => {
                AppError::ValidationError(format!("readings[{}]: {}", index, msg))
            }
            other => other,
        })?;
    }

    Ok(())
}

fn validate_value(value: f64) -> AppResult<()> {
    if !value.is_finite() {
        return Err(AppError::ValidationError(
            "Glucose value must be a finite number".to_string(),
        ));
    }

    if value < GlucoseConstraints::VALUE_MIN || value > GlucoseConstraints::VALUE_MAX {
        return Err(AppError::ValidationError(format!(
            "Glucose value {} out of reportable range [{}, {}]",
            value,
            GlucoseConstraints::VALUE_MIN,
            GlucoseConstraints::VALUE_MAX
        )));
    }

    Ok(())
}

fn validate_timestamp(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
    if timestamp > now + Duration::minutes(GlucoseConstraints::MAX_FUTURE_SKEW_MINUTES) {
        return Err(AppError::ValidationError(format!(
            "Timestamp {} is in the future",
            timestamp.to_rfc3339()
        )));
    }

    Ok(())
}

/// Resolve the `days` report window
pub fn validate_days(days: Option<i64>, analytics: &AnalyticsSettings) -> AppResult<i64> {
    let days = days.unwrap_or(analytics.default_days);

    if days < 1 || days > analytics.max_days {
        return Err(AppError::ValidationError(format!(
            "days must be between 1 and {}",
            analytics.max_days
        )));
    }

    Ok(days)
}

/// Validate pagination parameters
pub fn validate_pagination(page: Option<u32>, limit: Option<u32>) -> AppResult<(u32, u32)> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(100);

    if page == 0 {
        return Err(AppError::ValidationError(
            "Page number must be greater than 0".to_string(),
        ));
    }

    if limit == 0 || limit > 1000 {
        return Err(AppError::ValidationError(
            "Limit must be between 1 and 1000".to_string(),
        ));
    }

    Ok((page, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadingSource;

    fn input(value: f64) -> GlucoseInput {
        GlucoseInput {
            value,
            timestamp: None,
            source: ReadingSource::Cgm,
        }
    }

    #[test]
    fn test_valid_glucose_input() {
        assert!(validate_glucose_input(&input(110.0)).is_ok());
        assert!(validate_glucose_input(&input(20.0)).is_ok());
        assert!(validate_glucose_input(&input(600.0)).is_ok());
    }

    #[test]
    fn test_out_of_range_value() {
        let result = validate_glucose_input(&input(650.0));
        assert!(result.is_err());

        if let Err(AppError::ValidationError(msg)) = result {
            assert!(msg.contains("value") || msg.contains("Glucose"));
        }

        assert!(validate_glucose_input(&input(5.0)).is_err());
    }

    #[test]
    fn test_non_finite_values() {
        assert!(validate_value(f64::NAN).is_err());
        assert!(validate_value(f64::INFINITY).is_err());
        assert!(validate_value(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_future_timestamp() {
        let now = Utc::now();
        let mut future = input(100.0);
        future.timestamp = Some(now + Duration::hours(1));
        assert!(validate_glucose_input_at(&future, now).is_err());

        let mut skewed = input(100.0);
        skewed.timestamp = Some(now + Duration::minutes(2));
        assert!(validate_glucose_input_at(&skewed, now).is_ok());
    }

    #[test]
    fn test_batch_validation() {
        assert!(validate_batch(&[]).is_err());
        assert!(validate_batch(&[input(100.0), input(120.0)]).is_ok());

        let oversized = vec![input(100.0); GlucoseConstraints::MAX_BATCH_SIZE + 1];
        assert!(matches!(validate_batch(&oversized), Err(AppError::BadRequest(_))));

        match validate_batch(&[input(100.0), input(1000.0)]) {
            Err(AppError::ValidationError(msg)) => assert!(msg.starts_with("readings[1]")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_days_validation() {
        let analytics = AnalyticsSettings::default();

        assert_eq!(validate_days(None, &analytics).unwrap(), 14);
        assert_eq!(validate_days(Some(30), &analytics).unwrap(), 30);
        assert!(validate_days(Some(0), &analytics).is_err());
        assert!(validate_days(Some(-3), &analytics).is_err());
        assert!(validate_days(Some(91), &analytics).is_err());
    }

    #[test]
    fn test_pagination_validation() {
        // Valid cases
        assert!(validate_pagination(Some(1), Some(50)).is_ok());
        assert!(validate_pagination(None, None).is_ok());

        // Invalid cases
        assert!(validate_pagination(Some(0), Some(50)).is_err());
        assert!(validate_pagination(Some(1), Some(0)).is_err());
        assert!(validate_pagination(Some(1), Some(2000)).is_err());
    }
}
