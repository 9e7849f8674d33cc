//! Application state management
//!
//! Central state container for the service: an in-memory readings store
//! keeping each user's glucose readings in ascending time order.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

use crate::models::{GlucoseReading, GlucoseSample};

/// Days of history the store is sized for
pub const RETENTION_DAYS: i64 = 90;

/// Readings kept per user: `RETENTION_DAYS` at one reading every 5 minutes
const MAX_READINGS_PER_USER: usize = RETENTION_DAYS as usize * 288;

/// Users kept in memory before the least recently active one is dropped
const DEFAULT_MAX_USERS: usize = 10_000;

/// Central application state
#[derive(Debug)]
pub struct AppState {
    /// Per-user readings, sorted ascending by timestamp
    readings: HashMap<String, VecDeque<GlucoseReading>>,
    /// User ids come from the gateway header, so the map is capped
    max_users: usize,
    /// Application start time
    start_time: DateTime<Utc>,
    /// Total readings processed
    total_readings: u64,
}

impl AppState {
    /// Create new application state
    pub fn new() -> Self {
        Self::with_user_capacity(DEFAULT_MAX_USERS)
    }

    /// Create state holding readings for at most `max_users` users
    pub fn with_user_capacity(max_users: usize) -> Self {
        info!(max_users = max_users, "Initializing application state");
        Self {
            readings: HashMap::new(),
            max_users: max_users.max(1),
            start_time: Utc::now(),
            total_readings: 0,
        }
    }

    /// Store a reading, keeping the user's readings in time order
    pub fn add_reading(&mut self, user_id: &str, reading: GlucoseReading) {
        self.total_readings += 1;

        if !self.readings.contains_key(user_id) && self.readings.len() >= self.max_users {
            self.evict_stalest_user();
        }

        let readings = self.readings.entry(user_id.to_string()).or_default();

        // Readings with equal timestamps keep arrival order
        let position = readings.partition_point(|r| r.timestamp <= reading.timestamp);

        debug!(
            user_id = %user_id,
            reading_id = %reading.id,
            value = reading.value,
            total = self.total_readings,
            "Adding glucose reading to store"
        );

        readings.insert(position, reading);

        // Drop the oldest reading if over capacity
        if readings.len() > MAX_READINGS_PER_USER {
            readings.pop_front();
        }
    }

    /// Drop the user whose newest reading is the oldest
    fn evict_stalest_user(&mut self) {
        let stalest = self
            .readings
            .iter()
            .min_by_key(|(_, r)| r.back().map(|r| r.timestamp))
            .map(|(user_id, _)| user_id.clone());

        if let Some(user_id) = stalest {
            warn!(
                user_id = %user_id,
                max_users = self.max_users,
                "User capacity reached, dropping least recently active user"
            );
            self.readings.remove(&user_id);
        }
    }

    /// Get the latest reading for a user
    pub fn latest(&self, user_id: &str) -> Option<&GlucoseReading> {
        self.readings.get(user_id).and_then(|r| r.back())
    }

    /// Readings of a user within `[start, end]`, newest first
    pub fn readings_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&GlucoseReading> {
        self.readings
            .get(user_id)
            .map(|r| {
                r.iter()
                    .rev()
                    .filter(|r| r.timestamp >= start && r.timestamp <= end)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Samples of a user within `[start, end]`, in ascending time order
    pub fn samples_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<GlucoseSample> {
        self.readings
            .get(user_id)
            .map(|r| {
                r.iter()
                    .filter(|r| r.timestamp >= start && r.timestamp <= end)
                    .map(GlucoseReading::sample)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.start_time).num_seconds() as u64
    }

    /// Get total readings processed
    pub fn total_readings(&self) -> u64 {
        self.total_readings
    }

    /// Number of users with stored readings
    pub fn user_count(&self) -> usize {
        self.readings.len()
    }

    /// Get the timestamp of the most recent reading of any user
    pub fn last_reading_time(&self) -> Option<DateTime<Utc>> {
        self.readings
            .values()
            .filter_map(|r| r.back().map(|r| r.timestamp))
            .max()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
