use thiserror::Error;

/// Accelerometer failures. Fatal at startup, skipped per tick afterwards.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),

    #[error("Unparseable sensor output: {0}")]
    Parse(String),

    #[error("Sensor returned non-finite reading")]
    NonFinite,
}

/// Outbound request failures (SMS gateway, event log)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Network not connected")]
    NotConnected,

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NotifyError::Timeout
        } else {
            NotifyError::Transport(e.to_string())
        }
    }
}

/// Wall-clock resolution failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeSyncError {
    #[error("Network not connected")]
    LinkDown,

    #[error("Time server did not answer within {0} ms")]
    Timeout(u64),

    #[error("Time server I/O error: {0}")]
    Io(String),

    #[error("Malformed time server reply: {0}")]
    BadReply(String),
}

/// Network association failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Association timed out after {0} ms")]
    Timeout(u64),

    #[error("Link command failed: {0}")]
    Command(String),
}

/// Invalid node configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Event log server storage failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt log entry on line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            SensorError::Unavailable("termux-sensor missing".to_string()).to_string(),
            NotifyError::NotConnected.to_string(),
            TimeSyncError::Timeout(1500).to_string(),
            LinkError::Timeout(15000).to_string(),
            ConfigError::InvalidParameters("sensitivity".to_string()).to_string(),
        ];

        for display in errors {
            assert!(!display.is_empty());
        }
        assert_eq!(
            TimeSyncError::Timeout(1500).to_string(),
            "Time server did not answer within 1500 ms"
        );
    }
}
