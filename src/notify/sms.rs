use super::{Outcome, SmsGateway, SubmitResponse};
use std::time::Duration;

/// Textbelt-style SMS gateway: form POST of `phone`, `message` and `key`.
pub struct TextbeltGateway {
    client: reqwest::Client,
    url: String,
    phone: String,
    key: String,
}

impl TextbeltGateway {
    pub fn new(url: &str, phone: &str, key: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("motion_sentry/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: url.to_string(),
            phone: phone.to_string(),
            key: key.to_string(),
        }
    }

    fn form<'a>(&'a self, message: &'a str) -> [(&'static str, &'a str); 3] {
        [
            ("phone", self.phone.as_str()),
            ("message", message),
            ("key", self.key.as_str()),
        ]
    }
}

impl SmsGateway for TextbeltGateway {
    async fn submit(&mut self, message: &str) -> Outcome {
        let response = self
            .client
            .post(&self.url)
            .form(&self.form(message))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(SubmitResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields() {
        let gateway = TextbeltGateway::new(
            "https://textbelt.com/text",
            "+15550100",
            "textbelt",
            Duration::from_secs(10),
        );
        let form = gateway.form("Motion detected at your door!");

        assert_eq!(form[0], ("phone", "+15550100"));
        assert_eq!(form[1], ("message", "Motion detected at your door!"));
        assert_eq!(form[2], ("key", "textbelt"));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_an_error() {
        // Nothing listens on the discard port
        let mut gateway = TextbeltGateway::new(
            "http://127.0.0.1:9/text",
            "+1",
            "",
            Duration::from_millis(500),
        );
        assert!(gateway.submit("hello").await.is_err());
    }
}
