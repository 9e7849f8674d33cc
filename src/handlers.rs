//! HTTP request handlers
//!
//! Implements the REST API: reading ingestion and history, and the
//! Time-in-Range report.

use actix_web::{web, HttpRequest, HttpResponse, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AnalyticsSettings;
use crate::error::{AppError, AppResult};
use crate::models::{GlucoseBatchInput, GlucoseInput, GlucoseReading, HealthCheck, LatestReading};
use crate::ranges::{ClinicalTargets, GlucoseBand, RangeTable};
use crate::state::AppState;
use crate::tir::{calculate_time_in_range, TargetAssessment, TimeInRangeResult};
use crate::trends::{calculate_time_in_range_trends, TrendBucket, TrendGranularity};
use crate::validation::{
    validate_batch, validate_days, validate_glucose_input, validate_pagination, GlucoseConstraints,
};

/// Header carrying the user identity established by the auth gateway
const USER_ID_HEADER: &str = "X-User-ID";

/// Configure all application routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Health check
            .route("/health", web::get().to(health_check))
            // Band and target constants
            .route("/ranges", web::get().to(get_ranges))
            // Glucose data endpoints
            .route("/glucose/readings", web::post().to(ingest_reading))
            .route("/glucose/readings", web::get().to(get_reading_history))
            .route("/glucose/readings/batch", web::post().to(ingest_batch))
            .route("/glucose/latest", web::get().to(get_latest_reading))
            // Analytics
            .route("/glucose/time-in-range", web::get().to(get_time_in_range)),
    );
}

/// Health check endpoint
///
/// GET /api/health
pub async fn health_check(
    state: web::Data<Arc<RwLock<AppState>>>,
) -> Result<HttpResponse, AppError> {
    let state = state.read().await;

    let health = HealthCheck {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_seconds: state.uptime_seconds(),
        total_readings: state.total_readings(),
        users: state.user_count(),
        last_reading: state.last_reading_time(),
    };

    Ok(HttpResponse::Ok().json(health))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RangesResponse {
    glucose_ranges: RangeTable,
    tir_targets: ClinicalTargets,
}

/// Band boundaries and clinical targets
///
/// GET /api/ranges
pub async fn get_ranges(analytics: web::Data<AnalyticsSettings>) -> HttpResponse {
    HttpResponse::Ok().json(RangesResponse {
        glucose_ranges: analytics.ranges.table(),
        tir_targets: analytics.targets,
    })
}

/// Ingest a single glucose reading
///
/// POST /api/glucose/readings
pub async fn ingest_reading(
    state: web::Data<Arc<RwLock<AppState>>>,
    analytics: web::Data<AnalyticsSettings>,
    body: web::Json<GlucoseInput>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&req)?;
    let correlation_id = extract_correlation_id(&req);

    info!(
        correlation_id = %correlation_id,
        user_id = %user_id,
        "Received glucose reading ingestion request"
    );

    validate_glucose_input(&body)?;

    let mut reading: GlucoseReading = body.into_inner().into();
    reading.correlation_id = Some(correlation_id.clone());
    let band = analytics.ranges.classify(reading.value);

    {
        let mut state = state.write().await;
        state.add_reading(&user_id, reading.clone());
    }

    info!(
        correlation_id = %correlation_id,
        reading_id = %reading.id,
        band = ?band,
        "Glucose reading ingested successfully"
    );

    Ok(HttpResponse::Created().json(IngestResponse {
        success: true,
        reading_id: reading.id.to_string(),
        band,
        correlation_id,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestResponse {
    success: bool,
    reading_id: String,
    band: GlucoseBand,
    correlation_id: String,
}

/// Ingest a batch of readings from a CGM sync
///
/// POST /api/glucose/readings/batch
pub async fn ingest_batch(
    state: web::Data<Arc<RwLock<AppState>>>,
    body: web::Json<GlucoseBatchInput>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&req)?;
    let correlation_id = extract_correlation_id(&req);

    validate_batch(&body.readings)?;

    let readings: Vec<GlucoseReading> = body
        .into_inner()
        .readings
        .into_iter()
        .map(|input| {
            let mut reading: GlucoseReading = input.into();
            reading.correlation_id = Some(correlation_id.clone());
            reading
        })
        .collect();
    let accepted = readings.len();

    {
        let mut state = state.write().await;
        for reading in readings {
            state.add_reading(&user_id, reading);
        }
    }

    info!(
        correlation_id = %correlation_id,
        user_id = %user_id,
        reading_count = accepted,
        "Glucose batch ingested successfully"
    );

    Ok(HttpResponse::Created().json(BatchIngestResponse {
        success: true,
        accepted,
        correlation_id,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchIngestResponse {
    success: bool,
    accepted: usize,
    correlation_id: String,
}

/// Get the latest glucose reading
///
/// GET /api/glucose/latest
pub async fn get_latest_reading(
    state: web::Data<Arc<RwLock<AppState>>>,
    analytics: web::Data<AnalyticsSettings>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&req)?;
    let state = state.read().await;

    match state.latest(&user_id) {
        Some(reading) => Ok(HttpResponse::Ok().json(LatestReading::classify(
            reading.clone(),
            &analytics.ranges,
        ))),
        None => Err(AppError::NotFound("No glucose readings available".to_string())),
    }
}

/// Query parameters for reading history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub days: Option<i64>,
}

/// Get reading history, newest first
///
/// GET /api/glucose/readings?page=1&limit=100&days=14
pub async fn get_reading_history(
    state: web::Data<Arc<RwLock<AppState>>>,
    analytics: web::Data<AnalyticsSettings>,
    query: web::Query<HistoryQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&req)?;
    let (page, limit) = validate_pagination(query.page, query.limit)?;
    let days = validate_days(query.days, &analytics)?;

    let (start, end) = report_window(days);

    let state = state.read().await;
    let readings: Vec<&GlucoseReading> = state.readings_between(&user_id, start, end);

    // Apply pagination; pages past the end are empty
    let total = readings.len();
    let start = (page as usize - 1).saturating_mul(limit as usize);
    let end = start.saturating_add(limit as usize).min(total);

    let paginated: Vec<_> = if start < total {
        readings[start..end].to_vec()
    } else {
        Vec::new()
    };

    Ok(HttpResponse::Ok().json(PaginatedResponse {
        data: paginated,
        page,
        limit,
        total: total as u32,
        total_pages: ((total as f64) / (limit as f64)).ceil() as u32,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaginatedResponse<T> {
    data: Vec<T>,
    page: u32,
    limit: u32,
    total: u32,
    total_pages: u32,
}

/// Query parameters for the Time-in-Range report
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInRangeQuery {
    pub days: Option<i64>,
    pub trends: Option<bool>,
    pub trend_period: Option<String>,
}

/// Returned instead of a report when the window holds too few readings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsufficientData {
    insufficient_data: bool,
    reading_count: usize,
    minimum_required: usize,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeInRangeReport {
    insufficient_data: bool,
    reading_count: usize,
    days: i64,
    result: TimeInRangeResult,
    assessment: TargetAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    trends: Option<Vec<TrendBucket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trend_period: Option<TrendGranularity>,
    glucose_ranges: RangeTable,
    tir_targets: ClinicalTargets,
}

/// Time-in-Range report for the last `days` days
///
/// GET /api/glucose/time-in-range?days=14&trends=true&trendPeriod=weekly
pub async fn get_time_in_range(
    state: web::Data<Arc<RwLock<AppState>>>,
    analytics: web::Data<AnalyticsSettings>,
    query: web::Query<TimeInRangeQuery>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&req)?;
    let days = validate_days(query.days, &analytics)?;

    let (start, end) = report_window(days);

    let samples = {
        let state = state.read().await;
        state.samples_in_range(&user_id, start, end)
    };

    let minimum = analytics.targets.min_readings;
    if samples.len() < minimum {
        warn!(
            user_id = %user_id,
            reading_count = samples.len(),
            minimum_required = minimum,
            days = days,
            "Insufficient data for time-in-range report"
        );

        return Ok(HttpResponse::Ok().json(InsufficientData {
            insufficient_data: true,
            reading_count: samples.len(),
            minimum_required: minimum,
            message: format!(
                "At least {} readings are needed for a time-in-range report; found {} in the last {} days",
                minimum,
                samples.len(),
                days
            ),
        }));
    }

    let result = calculate_time_in_range(&samples, &analytics.ranges);
    let assessment = TargetAssessment::evaluate(&result, &analytics.targets);

    let granularity = query
        .trend_period
        .as_deref()
        .map(TrendGranularity::from_param)
        .unwrap_or_default();
    let trends = query
        .trends
        .unwrap_or(false)
        .then(|| calculate_time_in_range_trends(&samples, granularity, &analytics.ranges));

    info!(
        user_id = %user_id,
        reading_count = samples.len(),
        days = days,
        granularity = ?trends.as_ref().map(|_| granularity),
        time_in_range = result.bands.target.percentage,
        "Time-in-range report computed"
    );

    Ok(HttpResponse::Ok().json(TimeInRangeReport {
        insufficient_data: false,
        reading_count: samples.len(),
        days,
        trend_period: trends.as_ref().map(|_| granularity),
        trends,
        result,
        assessment,
        glucose_ranges: analytics.ranges.table(),
        tir_targets: analytics.targets,
    }))
}

/// Window of the last `days` days, ending past `now` by the ingestion
/// clock-skew allowance so freshly accepted readings are included
fn report_window(days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (
        now - Duration::days(days),
        now + Duration::minutes(GlucoseConstraints::MAX_FUTURE_SKEW_MINUTES),
    )
}

/// User identity forwarded by the auth gateway
fn authenticated_user(req: &HttpRequest) -> AppResult<String> {
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", USER_ID_HEADER)))
}

/// Extract or generate correlation ID from request headers
fn extract_correlation_id(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Correlation-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
