// Node configuration
// Every constant below is a default; a JSON file may override any subset.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------
pub const DEFAULT_SSID: &str = "Testuser";
pub const ASSOCIATION_TIMEOUT_MS: u64 = 15_000;
pub const ASSOCIATION_POLL_MS: u64 = 500;
pub const DEFAULT_PROBE_ADDR: &str = "textbelt.com:443";
pub const PROBE_TIMEOUT_MS: u64 = 2_000;

// ---------------------------------------------------------------------------
// Outbound notifications
// ---------------------------------------------------------------------------
pub const SMS_GATEWAY_URL: &str = "https://textbelt.com/text";
pub const SMS_DESTINATION: &str = "+1";
pub const SMS_ALERT_TEXT: &str = "Motion detected at your door!";
pub const EVENT_LOG_URL: &str = "http://127.0.0.1:5000/api/resource";
pub const HTTP_TIMEOUT_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Time sync (PST with daylight saving)
// ---------------------------------------------------------------------------
pub const NTP_SERVER: &str = "pool.ntp.org:123";
pub const GMT_OFFSET_SECS: i32 = -8 * 3600;
pub const DAYLIGHT_OFFSET_SECS: i32 = 3600;
pub const NTP_TIMEOUT_MS: u64 = 5_000;

// ---------------------------------------------------------------------------
// Detection timing (milliseconds)
// ---------------------------------------------------------------------------
pub const CALIBRATION_SAMPLES: usize = 100;
pub const CALIBRATION_INTERVAL_MS: u64 = 20;
pub const SENSITIVITY: f64 = 5.0;
pub const DWELL_MS: u64 = 3_000; // indicator on-time per episode
pub const GUARD_DELAY_MS: u64 = 2_000; // pause after dispatch
pub const POLL_INTERVAL_MS: u64 = 100;
pub const STATUS_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    /// `termux-sensor` CLI (Android/Termux hosts)
    Termux,
    /// Synthetic low-noise signal with periodic knocks
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Join the configured SSID through NetworkManager
    Nmcli,
    /// Treat TCP reachability of `probe_addr` as association
    Probe,
    /// Connectivity is managed outside the node; always report connected
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mode: LinkMode,
    pub ssid: String,
    pub password: String,
    pub probe_addr: String,
    pub association_timeout_ms: u64,
    pub probe_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mode: LinkMode::Probe,
            ssid: DEFAULT_SSID.to_string(),
            password: String::new(),
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            association_timeout_ms: ASSOCIATION_TIMEOUT_MS,
            probe_timeout_ms: PROBE_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub url: String,
    pub key: String,
    pub phone: String,
    pub message: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            url: SMS_GATEWAY_URL.to_string(),
            key: String::new(),
            phone: SMS_DESTINATION.to_string(),
            message: SMS_ALERT_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            url: EVENT_LOG_URL.to_string(),
            timeout_ms: HTTP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSyncConfig {
    pub server: String,
    pub gmt_offset_secs: i32,
    pub daylight_offset_secs: i32,
    pub timeout_ms: u64,
}

impl TimeSyncConfig {
    /// An empty server selects the host clock instead of SNTP
    pub fn uses_host_clock(&self) -> bool {
        self.server.is_empty()
    }
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            server: NTP_SERVER.to_string(),
            gmt_offset_secs: GMT_OFFSET_SECS,
            daylight_offset_secs: DAYLIGHT_OFFSET_SECS,
            timeout_ms: NTP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub calibration_samples: usize,
    pub calibration_interval_ms: u64,
    pub sensitivity: f64,
    pub dwell_ms: u64,
    pub guard_delay_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            calibration_samples: CALIBRATION_SAMPLES,
            calibration_interval_ms: CALIBRATION_INTERVAL_MS,
            sensitivity: SENSITIVITY,
            dwell_ms: DWELL_MS,
            guard_delay_ms: GUARD_DELAY_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl DetectionConfig {
    pub fn calibration_interval(&self) -> Duration {
        Duration::from_millis(self.calibration_interval_ms)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn guard_delay(&self) -> Duration {
        Duration::from_millis(self.guard_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub source: SensorSource,
    /// Seconds between synthetic knocks (simulated source only, 0 = never)
    pub knock_every_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            source: SensorSource::Termux,
            knock_every_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Name under /sys/class/leds; None drives a log-only indicator
    pub led: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub sms: SmsConfig,
    pub event_log: EventLogConfig,
    pub time_sync: TimeSyncConfig,
    pub detection: DetectionConfig,
    pub sensor: SensorConfig,
    pub indicator: IndicatorConfig,
    pub status_file: Option<PathBuf>,
}

impl NodeConfig {
    /// Load overrides from a JSON file on top of the built-in defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        if d.calibration_samples == 0 {
            return Err(ConfigError::InvalidParameters(
                "calibration_samples must be at least 1".to_string(),
            ));
        }
        if !d.sensitivity.is_finite() || d.sensitivity < 0.0 {
            return Err(ConfigError::InvalidParameters(format!(
                "sensitivity must be a non-negative number, got {}",
                d.sensitivity
            )));
        }
        if d.poll_interval_ms == 0 || d.dwell_ms == 0 {
            return Err(ConfigError::InvalidParameters(
                "poll_interval_ms and dwell_ms must be positive".to_string(),
            ));
        }
        // The indicator is only ticked after the guard delay
        if d.guard_delay_ms >= d.dwell_ms {
            return Err(ConfigError::InvalidParameters(format!(
                "guard_delay_ms ({}) must be shorter than dwell_ms ({})",
                d.guard_delay_ms, d.dwell_ms
            )));
        }
        if self.sms.url.is_empty() || self.event_log.url.is_empty() {
            return Err(ConfigError::InvalidParameters(
                "gateway and event log URLs must be set".to_string(),
            ));
        }
        let offset = self.time_sync.gmt_offset_secs as i64 + self.time_sync.daylight_offset_secs as i64;
        if offset.abs() >= 86_400 {
            return Err(ConfigError::InvalidParameters(format!(
                "combined UTC offset {}s exceeds one day",
                offset
            )));
        }
        if self.network.mode == LinkMode::Nmcli && self.network.ssid.is_empty() {
            return Err(ConfigError::InvalidParameters(
                "nmcli link mode requires an ssid".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = NodeConfig::default();
        assert_eq!(config.detection.calibration_samples, 100);
        assert_eq!(config.detection.dwell(), Duration::from_millis(3000));
        assert_eq!(config.detection.guard_delay(), Duration::from_millis(2000));
        assert_eq!(config.detection.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.time_sync.gmt_offset_secs, -28_800);
        assert_eq!(config.network.association_timeout_ms, 15_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "detection": { "sensitivity": 3.5 },
            "sensor": { "source": "simulated" },
            "network": { "mode": "nmcli", "ssid": "porch" }
        }"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.detection.sensitivity, 3.5);
        assert_eq!(config.detection.calibration_samples, 100);
        assert_eq!(config.sensor.source, SensorSource::Simulated);
        assert_eq!(config.network.mode, LinkMode::Nmcli);
        assert_eq!(config.network.ssid, "porch");
        assert_eq!(config.sms.message, SMS_ALERT_TEXT);
    }

    #[test]
    fn test_rejects_invalid_detection() {
        let mut config = NodeConfig::default();
        config.detection.calibration_samples = 0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.detection.sensitivity = -1.0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.detection.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.detection.guard_delay_ms = 5000;
        config.detection.dwell_ms = 3000;
        assert!(config.validate().is_err());

        config.detection.guard_delay_ms = 3000;
        assert!(config.validate().is_err());

        config.detection.guard_delay_ms = 2999;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "motion_sentry_config_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "detection": { "dwell_ms": 5000 } }"#).unwrap();

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.detection.dwell_ms, 5000);

        std::fs::write(&path, r#"{ "detection": { "calibration_samples": 0 } }"#).unwrap();
        assert!(NodeConfig::load(&path).is_err());

        let _ = std::fs::remove_file(&path);
    }
}
