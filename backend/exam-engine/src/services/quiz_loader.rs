use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::error::EngineError;
use crate::models::quiz::QuizDescriptor;

/// Source of quiz descriptors. Called once per session; the caller
/// validates what comes back.
#[async_trait]
pub trait QuizLoader: Send + Sync {
    async fn load(&self, quiz_id: &str) -> Result<QuizDescriptor, EngineError>;
}

/// Checks what the engine relies on before a session starts: at least one
/// question, unique question ids and a duration between one second and a week.
pub fn validate_descriptor(quiz: &QuizDescriptor) -> Result<(), EngineError> {
    quiz.validate()
        .map_err(|e| EngineError::InvalidQuiz(e.to_string()))?;

    if let Some(id) = quiz.duplicate_question_id() {
        return Err(EngineError::InvalidQuiz(format!(
            "duplicate question id: {}",
            id
        )));
    }
    Ok(())
}

pub struct HttpQuizLoader {
    http_client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpQuizLoader {
    pub fn new(http_client: Client, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid quiz API URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Quiz API URL cannot be used as a base: {}", base_url);
        }
        Ok(Self {
            http_client,
            base_url,
            timeout,
        })
    }

    fn quiz_url(&self, quiz_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("quizzes").push(quiz_id);
        }
        url
    }
}

#[async_trait]
impl QuizLoader for HttpQuizLoader {
    async fn load(&self, quiz_id: &str) -> Result<QuizDescriptor, EngineError> {
        let url = self.quiz_url(quiz_id);
        tracing::debug!("Fetching quiz descriptor: {}", url);

        let response = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EngineError::quiz_unavailable(quiz_id, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(EngineError::QuizNotFound(quiz_id.to_string()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EngineError::quiz_unavailable(
                quiz_id,
                anyhow!("Quiz API returned error {}: {}", status, error_text),
            ));
        }

        let quiz: QuizDescriptor = response
            .json()
            .await
            .map_err(|e| EngineError::quiz_unavailable(quiz_id, e))?;

        tracing::info!(
            "Loaded quiz {} ({} questions, {}s)",
            quiz.id,
            quiz.question_count(),
            quiz.duration_seconds
        );
        Ok(quiz)
    }
}
