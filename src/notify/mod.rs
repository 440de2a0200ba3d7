// Notification dispatch: one SMS + one event-log record per rising edge.
//
// Collaborators sit behind traits so the loop can run against recording fakes.

pub mod log_client;
pub mod sms;
pub mod time_sync;

use crate::error::{NotifyError, TimeSyncError};
use crate::network::NetworkLink;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub use log_client::HttpEventLog;
pub use sms::TextbeltGateway;
pub use time_sync::{SntpClock, SystemClock, WallClock};

/// Rendered when the wall clock cannot be resolved
pub const SENTINEL_TIMESTAMP: &str = "1970-01-01 00:00:00";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Transport-level reply from a collaborator. The body is only logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitResponse {
    pub status: u16,
    pub body: String,
}

impl SubmitResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub type Outcome = Result<SubmitResponse, NotifyError>;

/// Event log payload: `{"timestamp": "YYYY-MM-DD HH:MM:SS"}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionRecord {
    pub timestamp: String,
}

#[allow(async_fn_in_trait)]
pub trait SmsGateway {
    async fn submit(&mut self, message: &str) -> Outcome;
}

#[allow(async_fn_in_trait)]
pub trait EventLogSink {
    async fn append(&mut self, record: &MotionRecord) -> Outcome;
}

#[allow(async_fn_in_trait)]
pub trait TimeSource {
    /// Current local wall-clock time (configured offsets applied)
    async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeSyncError>;
}

/// Timestamp attached to a motion record, keeping track of where it came from
#[derive(Clone, Debug, PartialEq)]
pub enum StampedTime {
    Synced(String),
    Fallback(TimeSyncError),
}

impl StampedTime {
    pub fn as_str(&self) -> &str {
        match self {
            StampedTime::Synced(ts) => ts,
            StampedTime::Fallback(_) => SENTINEL_TIMESTAMP,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StampedTime::Fallback(_))
    }
}

pub fn format_timestamp(time: &DateTime<FixedOffset>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Result of one dispatch. Both outcomes are independent.
#[derive(Clone, Debug)]
pub struct DispatchReport {
    pub sms: Outcome,
    pub log: Outcome,
    pub timestamp: StampedTime,
}

impl DispatchReport {
    pub fn sms_delivered(&self) -> bool {
        matches!(&self.sms, Ok(r) if r.is_success())
    }

    pub fn log_delivered(&self) -> bool {
        matches!(&self.log, Ok(r) if r.is_success())
    }
}

/// Fires the outbound side effects of a motion episode.
///
/// Fire-and-forget: nothing is retried, queued or backed off. Every request is
/// gated on the link status and its outcome is logged.
pub struct NotificationDispatcher<S, L, T, N> {
    sms: S,
    event_log: L,
    clock: T,
    link: N,
    alert_text: String,
}

impl<S, L, T, N> NotificationDispatcher<S, L, T, N>
where
    S: SmsGateway,
    L: EventLogSink,
    T: TimeSource,
    N: NetworkLink,
{
    pub fn new(sms: S, event_log: L, clock: T, link: N, alert_text: &str) -> Self {
        Self {
            sms,
            event_log,
            clock,
            link,
            alert_text: alert_text.to_string(),
        }
    }

    /// SMS first, then the event log record
    pub async fn dispatch(&mut self) -> DispatchReport {
        let sms = if self.link.is_connected().await {
            log::info!("Sending SMS");
            self.sms.submit(&self.alert_text).await
        } else {
            Err(NotifyError::NotConnected)
        };
        report("SMS", &sms);

        let timestamp = self.resolve_timestamp().await;
        let record = MotionRecord {
            timestamp: timestamp.as_str().to_string(),
        };

        let log = if self.link.is_connected().await {
            log::info!("Logging motion to server: {}", record.timestamp);
            self.event_log.append(&record).await
        } else {
            Err(NotifyError::NotConnected)
        };
        report("Event log", &log);

        DispatchReport { sms, log, timestamp }
    }

    async fn resolve_timestamp(&mut self) -> StampedTime {
        if !self.link.is_connected().await {
            return StampedTime::Fallback(TimeSyncError::LinkDown);
        }

        match self.clock.now().await {
            Ok(time) => StampedTime::Synced(format_timestamp(&time)),
            Err(e) => {
                log::warn!("Failed to obtain time ({}), using {}", e, SENTINEL_TIMESTAMP);
                StampedTime::Fallback(e)
            }
        }
    }

    pub fn sms(&self) -> &S {
        &self.sms
    }

    pub fn event_log(&self) -> &L {
        &self.event_log
    }

    pub fn link(&self) -> &N {
        &self.link
    }
}

/// Receiver of rising edges; invoked exactly once per edge by the scheduler
#[allow(async_fn_in_trait)]
pub trait MotionNotifier {
    async fn on_motion_rising(&mut self) -> DispatchReport;
}

impl<S, L, T, N> MotionNotifier for NotificationDispatcher<S, L, T, N>
where
    S: SmsGateway,
    L: EventLogSink,
    T: TimeSource,
    N: NetworkLink,
{
    async fn on_motion_rising(&mut self) -> DispatchReport {
        self.dispatch().await
    }
}

fn report(what: &str, outcome: &Outcome) {
    match outcome {
        Ok(resp) if resp.is_success() => {
            log::info!("{} accepted ({}): {}", what, resp.status, resp.body.trim())
        }
        Ok(resp) => log::warn!("{} rejected ({}): {}", what, resp.status, resp.body.trim()),
        Err(e) => log::warn!("{} not delivered: {}", what, e),
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use chrono::TimeZone;

    /// Records every message and answers with a canned outcome
    #[derive(Default)]
    pub struct RecordingSms {
        pub sent: Vec<String>,
        pub fail: Option<NotifyError>,
    }

    impl SmsGateway for RecordingSms {
        async fn submit(&mut self, message: &str) -> Outcome {
            self.sent.push(message.to_string());
            match &self.fail {
                Some(e) => Err(e.clone()),
                None => Ok(SubmitResponse {
                    status: 200,
                    body: r#"{"success":true}"#.to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    pub struct RecordingLog {
        pub records: Vec<MotionRecord>,
        pub fail: Option<NotifyError>,
    }

    impl EventLogSink for RecordingLog {
        async fn append(&mut self, record: &MotionRecord) -> Outcome {
            self.records.push(record.clone());
            match &self.fail {
                Some(e) => Err(e.clone()),
                None => Ok(SubmitResponse {
                    status: 200,
                    body: r#"{"message":"Data received successfully"}"#.to_string(),
                }),
            }
        }
    }

    pub struct FixedClock(pub Result<DateTime<FixedOffset>, TimeSyncError>);

    impl FixedClock {
        pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
            let offset = FixedOffset::west_opt(7 * 3600).unwrap();
            FixedClock(Ok(offset.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()))
        }

        pub fn failing() -> Self {
            FixedClock(Err(TimeSyncError::Timeout(5000)))
        }
    }

    impl TimeSource for FixedClock {
        async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeSyncError> {
            self.0.clone()
        }
    }
}
