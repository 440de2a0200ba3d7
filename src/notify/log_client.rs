use super::{EventLogSink, MotionRecord, Outcome, SubmitResponse};
use std::time::Duration;

/// Posts motion records as JSON to the event log server
pub struct HttpEventLog {
    client: reqwest::Client,
    url: String,
}

impl HttpEventLog {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("motion_sentry/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EventLogSink for HttpEventLog {
    async fn append(&mut self, record: &MotionRecord) -> Outcome {
        log::debug!("POST {} {:?}", self.url, record);
        let response = self.client.post(&self.url).json(record).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(SubmitResponse { status, body })
    }
}
