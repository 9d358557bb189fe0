#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use exam_engine::{
    config::Config,
    create_router,
    error::EngineError,
    models::{
        quiz::{QuizDescriptor, QuizOption, QuizQuestion},
        submission::SubmissionPayload,
    },
    services::{
        exam_session::{ExamSession, SessionSettings},
        quiz_loader::QuizLoader,
        scoring_client::ScoringClient,
        submission_coordinator::SubmissionCoordinator,
        AppState,
    },
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const RESULTS_URL: &str = "http://results.test/results";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn quiz(id: &str, question_count: usize, duration_seconds: u64) -> QuizDescriptor {
    QuizDescriptor {
        id: id.to_string(),
        title: format!("Quiz {}", id),
        duration_seconds,
        questions: (1..=question_count)
            .map(|n| QuizQuestion {
                id: format!("q{}", n),
                text: format!("Question {}", n),
                options: vec![
                    QuizOption {
                        id: "a".to_string(),
                        text: "Option A".to_string(),
                    },
                    QuizOption {
                        id: "b".to_string(),
                        text: "Option B".to_string(),
                    },
                ],
            })
            .collect(),
    }
}

/// Serves quizzes from memory. Unknown ids are not found; ids listed in
/// `unavailable` fail like a dead upstream.
#[derive(Default)]
pub struct StubQuizLoader {
    quizzes: HashMap<String, QuizDescriptor>,
    unavailable: Vec<String>,
}

impl StubQuizLoader {
    pub fn with_quiz(mut self, quiz: QuizDescriptor) -> Self {
        self.quizzes.insert(quiz.id.clone(), quiz);
        self
    }

    pub fn with_unavailable(mut self, quiz_id: &str) -> Self {
        self.unavailable.push(quiz_id.to_string());
        self
    }
}

#[async_trait]
impl QuizLoader for StubQuizLoader {
    async fn load(&self, quiz_id: &str) -> Result<QuizDescriptor, EngineError> {
        if self.unavailable.iter().any(|id| id == quiz_id) {
            return Err(EngineError::quiz_unavailable(
                quiz_id,
                anyhow::anyhow!("connection refused"),
            ));
        }
        self.quizzes
            .get(quiz_id)
            .cloned()
            .ok_or_else(|| EngineError::QuizNotFound(quiz_id.to_string()))
    }
}

/// Records every POST. Optionally fails, optionally takes its time so that
/// concurrent triggers overlap with an in-flight submission.
#[derive(Default)]
pub struct RecordingScorer {
    submissions: Mutex<Vec<(String, SubmissionPayload)>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingScorer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn last_payload(&self) -> Option<SubmissionPayload> {
        self.submissions
            .lock()
            .unwrap()
            .last()
            .map(|(_, payload)| payload.clone())
    }
}

#[async_trait]
impl ScoringClient for RecordingScorer {
    async fn submit(&self, quiz_id: &str, payload: &SubmissionPayload) -> anyhow::Result<()> {
        self.submissions
            .lock()
            .unwrap()
            .push((quiz_id.to_string(), payload.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("scoring service unreachable");
        }
        Ok(())
    }
}

pub fn start_session(quiz: QuizDescriptor, scorer: Arc<RecordingScorer>) -> Arc<ExamSession> {
    init_tracing();
    let coordinator = SubmissionCoordinator::new(scorer, RESULTS_URL);
    ExamSession::start(quiz, coordinator, SessionSettings::default())
}

pub fn test_config() -> Config {
    Config {
        results_url: RESULTS_URL.to_string(),
        metrics_auth: "metrics:secret".to_string(),
        ..Config::default()
    }
}

pub fn create_test_app(
    loader: StubQuizLoader,
    scorer: Arc<RecordingScorer>,
) -> (Router, Arc<AppState>) {
    init_tracing();
    let app_state = Arc::new(AppState::with_collaborators(
        test_config(),
        Arc::new(loader),
        scorer,
    ));
    (create_router(app_state.clone()), app_state)
}
