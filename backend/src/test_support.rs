//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`);
//! compiled only for tests or with the `test-support` feature.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::Notification;
use crate::domain::ports::NotificationPublisher;

/// Fixed instant used by fixtures: 2025-03-14T09:30:00Z.
pub fn fixture_timestamp() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).single() {
        Some(timestamp) => timestamp,
        None => panic!("fixture timestamp must be unambiguous"),
    }
}

/// Clock whose time only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Start the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Publisher that keeps every notification for later inspection.
#[derive(Default)]
pub struct RecordingPublisher(Mutex<Vec<Notification>>);

impl RecordingPublisher {
    /// Drain the recorded notifications.
    pub fn take(&self) -> Vec<Notification> {
        match self.0.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(_) => panic!("publisher mutex"),
        }
    }
}

impl NotificationPublisher for RecordingPublisher {
    fn publish(&self, notification: Notification) {
        match self.0.lock() {
            Ok(mut entries) => entries.push(notification),
            Err(_) => panic!("publisher mutex"),
        }
    }
}
