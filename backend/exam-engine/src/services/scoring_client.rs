use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

use crate::models::submission::SubmissionPayload;
use crate::utils::retry::{with_retry, Attempt, RetryPolicy};

/// Receives the final submission. Scoring itself is opaque to the engine.
#[async_trait]
pub trait ScoringClient: Send + Sync {
    async fn submit(&self, quiz_id: &str, payload: &SubmissionPayload) -> Result<()>;
}

pub struct HttpScoringClient {
    http_client: Client,
    base_url: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpScoringClient {
    pub fn new(http_client: Client, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid scoring API URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Scoring API URL cannot be used as a base: {}", base_url);
        }
        Ok(Self {
            http_client,
            base_url,
            timeout,
            retry: RetryPolicy::default(),
        })
    }

    fn submissions_url(&self, quiz_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("quizzes")
                .push(quiz_id)
                .push("submissions");
        }
        url
    }

    async fn post_once(&self, url: &Url, payload: &SubmissionPayload) -> Result<(), Attempt<anyhow::Error>> {
        let response = self
            .http_client
            .post(url.clone())
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call scoring API")
            .map_err(Attempt::Transient)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let error = anyhow!("Scoring API returned error {}: {}", status, error_text);
        if is_transient(status) {
            Err(Attempt::Transient(error))
        } else {
            Err(Attempt::Permanent(error))
        }
    }
}

/// Server-side and throttling failures may clear up; other 4xx will not.
fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl ScoringClient for HttpScoringClient {
    async fn submit(&self, quiz_id: &str, payload: &SubmissionPayload) -> Result<()> {
        let url = self.submissions_url(quiz_id);
        tracing::debug!(
            "Posting submission to scoring API: {} ({} answers)",
            url,
            payload.answers.len()
        );

        with_retry(self.retry, "scoring submission", || self.post_once(&url, payload)).await?;

        tracing::info!("Submission accepted by scoring API for quiz {}", quiz_id);
        Ok(())
    }
}
