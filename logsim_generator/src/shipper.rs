//! Ships line batches to the parser's ingest endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub const SHIP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP shipper for generated log batches. A batch that fails to ship is
/// dropped; the outcome is only reported as a status message.
pub struct Shipper {
    client: reqwest::Client,
    endpoint: String,
}

impl Shipper {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SHIP_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Posts the batch as a JSON string array. Returns a human-readable
    /// status message for the observer channel.
    pub async fn ship(&self, lines: &[String]) -> String {
        if lines.is_empty() {
            return "Empty batch skipped".to_string();
        }
        debug!("shipping batch of {} lines", lines.len());

        match self.client.post(&self.endpoint).json(lines).send().await {
            Ok(response) if response.status().is_success() => {
                info!("batch of {} lines shipped", lines.len());
                "Logs successfully sent to parser".to_string()
            }
            Ok(response) => {
                let message = format!("Failed to ship logs. Status: {}", response.status().as_u16());
                warn!("{}", message);
                message
            }
            Err(e) => {
                let message = format!("Error sending logs to parser: {}", e);
                warn!("{}", message);
                message
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_batch_is_skipped() {
        let shipper = Shipper::new("http://127.0.0.1:1/logs").unwrap();
        let message = shipper.ship(&[]).await;
        assert_eq!(message, "Empty batch skipped");
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_error() {
        // port 1 refuses connections immediately
        let shipper = Shipper::new("http://127.0.0.1:1/logs").unwrap();
        let message = shipper.ship(&["line".to_string()]).await;
        assert!(message.starts_with("Error sending logs to parser"));
    }
}
