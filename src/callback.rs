//! Report delivery to client callback URLs

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, warn};

use crate::jobs::JudgeReport;

const CALLBACK_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct CallbackClient {
    http: Client,
}

impl CallbackClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(CALLBACK_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }

    /// POST the report as JSON; non-2xx answers are errors
    pub async fn deliver(&self, url: &str, report: &JudgeReport) -> Result<()> {
        self.http
            .post(url)
            .json(report)
            .send()
            .await
            .with_context(|| format!("Failed to reach callback {}", url))?
            .error_for_status()
            .with_context(|| format!("Callback {} rejected report", url))?;

        debug!("Delivered report {} to {}", report.request_id, url);
        Ok(())
    }

    /// Deliver and log failures; reports are not retried
    pub async fn notify(&self, url: &str, report: &JudgeReport) {
        if let Err(e) = self.deliver(url, report).await {
            warn!("Callback for {} failed: {:#}", report.request_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Verdict;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_unreachable_callback_is_an_error() {
        let client = CallbackClient::new().unwrap();
        let report = JudgeReport::verdict(Uuid::new_v4(), Verdict::Accepted, None);

        // Port 9 (discard) on localhost is closed in test environments
        let err = client
            .deliver("http://127.0.0.1:9/callback", &report)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to reach callback"));

        client.notify("http://127.0.0.1:9/callback", &report).await;
    }
}
