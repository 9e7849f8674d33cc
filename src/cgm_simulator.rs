//! Simulated CGM feed
//!
//! Stands in for a CGM uplink during development: fills the readings store
//! with a couple of weeks of history at startup, then keeps adding one
//! reading per interval for the configured user.
//!
//! The generated trace has:
//! - a fasting baseline with a dawn-phenomenon rise in the early morning
//! - post-meal excursions after breakfast, lunch and dinner
//! - Gaussian sensor noise, clamped to what a CGM can report

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::config::SimulatorSettings;
use crate::models::{GlucoseReading, ReadingSource};
use crate::ranges::GlucoseRanges;
use crate::state::AppState;

/// Minutes between backfilled readings, the usual CGM cadence
const BACKFILL_STEP_MINUTES: i64 = 5;

/// Sensor reporting limits (mg/dL)
const SENSOR_MIN: f64 = 40.0;
const SENSOR_MAX: f64 = 400.0;

/// Standard deviation of sensor noise (mg/dL)
const SENSOR_NOISE_SD: f64 = 12.0;

/// Meal excursions: (peak hour UTC, amplitude mg/dL)
const MEALS: [(f64, f64); 3] = [(8.5, 65.0), (13.5, 45.0), (19.5, 80.0)];

/// Width of a post-meal excursion in hours
const MEAL_WIDTH_HOURS: f64 = 1.2;

/// CGM trace generator for one user
pub struct CgmSimulator {
    user_id: String,
    interval_ms: u64,
    backfill_days: i64,
    /// Fasting glucose level
    baseline: f64,
    ranges: GlucoseRanges,
}

impl CgmSimulator {
    pub fn new(settings: &SimulatorSettings, ranges: GlucoseRanges) -> Self {
        info!(
            user_id = %settings.user_id,
            interval_ms = settings.interval_ms,
            backfill_days = settings.backfill_days,
            "Initializing CGM simulator"
        );

        Self {
            user_id: settings.user_id.clone(),
            interval_ms: settings.interval_ms,
            backfill_days: settings.backfill_days,
            baseline: 110.0,
            ranges,
        }
    }

    /// Noise-free glucose level at `timestamp`
    pub fn profile(&self, timestamp: DateTime<Utc>) -> f64 {
        let hour = f64::from(timestamp.hour()) + f64::from(timestamp.minute()) / 60.0;

        // Dawn phenomenon: smooth rise peaking around 06:00
        let dawn = if (3.0..9.0).contains(&hour) {
            ((hour - 3.0) / 6.0 * std::f64::consts::PI).sin() * 20.0
        } else {
            0.0
        };

        let meals: f64 = MEALS
            .iter()
            .map(|(peak, amplitude)| {
                let distance = (hour - peak) / MEAL_WIDTH_HOURS;
                amplitude * (-0.5 * distance * distance).exp()
            })
            .sum();

        self.baseline + dawn + meals
    }

    /// One noisy reading at `timestamp`
    pub fn reading_at<R: Rng>(&self, timestamp: DateTime<Utc>, rng: &mut R) -> GlucoseReading {
        let noise: f64 = rng.sample::<f64, _>(StandardNormal) * SENSOR_NOISE_SD;
        let value = (self.profile(timestamp) + noise).clamp(SENSOR_MIN, SENSOR_MAX).round();

        GlucoseReading::new(value, timestamp, ReadingSource::Simulated)
    }

    /// Readings every five minutes over the `backfill_days` before `end`,
    /// oldest first
    pub fn backfill<R: Rng>(&self, end: DateTime<Utc>, rng: &mut R) -> Vec<GlucoseReading> {
        let count = self.backfill_days * 24 * 60 / BACKFILL_STEP_MINUTES;

        (1..=count)
            .rev()
            .map(|k| self.reading_at(end - ChronoDuration::minutes(k * BACKFILL_STEP_MINUTES), rng))
            .collect()
    }

    /// Backfill history, then generate live readings forever
    pub async fn run(self, state: Arc<RwLock<AppState>>) {
        let mut rng = StdRng::from_entropy();

        let history = self.backfill(Utc::now(), &mut rng);
        let backfilled = history.len();
        {
            let mut app_state = state.write().await;
            for reading in history {
                app_state.add_reading(&self.user_id, reading);
            }
        }
        info!(
            user_id = %self.user_id,
            reading_count = backfilled,
            "Backfilled simulated CGM history"
        );

        let mut tick_interval = interval(Duration::from_millis(self.interval_ms));
        // The first tick completes immediately
        tick_interval.tick().await;

        let mut tick_count: u64 = 0;
        loop {
            tick_interval.tick().await;
            tick_count += 1;

            let reading = self.reading_at(Utc::now(), &mut rng);
            let band = self.ranges.classify(reading.value);

            debug!(
                tick = tick_count,
                user_id = %self.user_id,
                value = reading.value,
                band = ?band,
                "Generated simulated glucose reading"
            );

            if band.is_severe() {
                warn!(
                    user_id = %self.user_id,
                    value = reading.value,
                    band = band.label(),
                    "Simulated reading outside level 1 ranges"
                );
            }

            let mut app_state = state.write().await;
            app_state.add_reading(&self.user_id, reading);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings(backfill_days: i64, interval_ms: u64) -> SimulatorSettings {
        SimulatorSettings {
            enabled: true,
            user_id: "demo-user".to_string(),
            interval_ms,
            backfill_days,
        }
    }

    #[test]
    fn test_simulator_creation() {
        let simulator = CgmSimulator::new(&settings(14, 300_000), GlucoseRanges::STANDARD);
        assert_eq!(simulator.interval_ms, 300_000);
        assert_eq!(simulator.baseline, 110.0);
        assert_eq!(simulator.user_id, "demo-user");
    }

    #[test]
    fn test_profile_has_meal_peaks() {
        let simulator = CgmSimulator::new(&settings(0, 1000), GlucoseRanges::STANDARD);
        let at = |h: u32, m: u32| Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap();

        let night = simulator.profile(at(1, 0));
        let after_dinner = simulator.profile(at(19, 30));

        assert!((night - 110.0).abs() < 1.0);
        assert!(after_dinner > 180.0);
        assert!(simulator.profile(at(6, 0)) > night);
    }

    #[test]
    fn test_backfill_shape() {
        let simulator = CgmSimulator::new(&settings(2, 1000), GlucoseRanges::STANDARD);
        let end = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let history = simulator.backfill(end, &mut rng);

        assert_eq!(history.len(), 2 * 288);
        assert_eq!(history[0].timestamp, end - ChronoDuration::days(2));
        assert_eq!(history.last().unwrap().timestamp, end - ChronoDuration::minutes(5));
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        for reading in &history {
            assert!(reading.value >= SENSOR_MIN && reading.value <= SENSOR_MAX);
            assert_eq!(reading.value, reading.value.round());
            assert_eq!(reading.source, ReadingSource::Simulated);
        }
    }

    #[test]
    fn test_backfill_is_reproducible_with_seed() {
        let simulator = CgmSimulator::new(&settings(1, 1000), GlucoseRanges::STANDARD);
        let end = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();

        let first: Vec<f64> = simulator
            .backfill(end, &mut StdRng::seed_from_u64(42))
            .iter()
            .map(|r| r.value)
            .collect();
        let second: Vec<f64> = simulator
            .backfill(end, &mut StdRng::seed_from_u64(42))
            .iter()
            .map(|r| r.value)
            .collect();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_live_reading_generation() {
        use tokio::time::timeout;

        let state = Arc::new(RwLock::new(AppState::new()));
        let simulator = CgmSimulator::new(&settings(0, 50), GlucoseRanges::STANDARD);

        let state_clone = state.clone();
        let handle = tokio::spawn(async move {
            simulator.run(state_clone).await;
        });

        // Wait for at least one reading
        timeout(Duration::from_millis(1000), async {
            loop {
                if state.read().await.latest("demo-user").is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("Timeout waiting for simulated reading");

        let state = state.read().await;
        let latest = state.latest("demo-user").unwrap();
        assert!(latest.value >= SENSOR_MIN && latest.value <= SENSOR_MAX);

        handle.abort();
    }
}
