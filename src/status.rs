use crate::calibration::CalibrationProfile;
use crate::notify::DispatchReport;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Running counters of the node, periodically dumped as JSON
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NodeStatus {
    pub timestamp: f64,
    pub uptime_seconds: u64,
    pub samples: u64,
    pub sensor_errors: u64,
    pub episodes: u64,
    pub indicator_on: bool,
    pub link_up: bool,
    // Calibration
    pub baseline: f64,
    pub threshold: f64,
    pub noise_range: f64,
    // Notification outcomes
    pub sms_sent: u64,
    pub sms_failed: u64,
    pub log_sent: u64,
    pub log_failed: u64,
    pub time_fallbacks: u64,
}

impl NodeStatus {
    pub fn new(profile: &CalibrationProfile) -> Self {
        Self {
            timestamp: current_timestamp(),
            baseline: profile.baseline,
            threshold: profile.threshold,
            noise_range: profile.noise_range,
            ..Default::default()
        }
    }

    pub fn record_dispatch(&mut self, report: &DispatchReport) {
        if report.sms_delivered() {
            self.sms_sent += 1;
        } else {
            self.sms_failed += 1;
        }
        if report.log_delivered() {
            self.log_sent += 1;
        } else {
            self.log_failed += 1;
        }
        if report.timestamp.is_fallback() {
            self.time_fallbacks += 1;
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
