use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::config::Config;
use crate::error::EngineError;
use crate::metrics::SESSIONS_TOTAL;

use exam_session::{ExamSession, SessionSettings};
use quiz_loader::{validate_descriptor, HttpQuizLoader, QuizLoader};
use scoring_client::{HttpScoringClient, ScoringClient};
use submission_coordinator::SubmissionCoordinator;

pub mod answer_ledger;
pub mod deadline_controller;
pub mod exam_session;
pub mod integrity_monitor;
pub mod quiz_loader;
pub mod scoring_client;
pub mod status_machine;
pub mod submission_coordinator;
pub mod time_tracker;

type SessionRegistry = RwLock<HashMap<String, Arc<ExamSession>>>;

pub struct AppState {
    pub config: Config,
    pub quiz_loader: Arc<dyn QuizLoader>,
    pub scoring: Arc<dyn ScoringClient>,
    sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        let quiz_loader = HttpQuizLoader::new(
            http_client.clone(),
            &config.quiz_api_url,
            config.http_timeout(),
        )?;
        let scoring =
            HttpScoringClient::new(http_client, &config.scoring_api_url, config.http_timeout())?;

        tracing::info!(
            "Collaborators configured: quiz_api={}, scoring_api={}, results={}",
            config.quiz_api_url,
            config.scoring_api_url,
            config.results_url
        );

        Ok(Self::with_collaborators(
            config,
            Arc::new(quiz_loader),
            Arc::new(scoring),
        ))
    }

    pub fn with_collaborators(
        config: Config,
        quiz_loader: Arc<dyn QuizLoader>,
        scoring: Arc<dyn ScoringClient>,
    ) -> Self {
        Self {
            config,
            quiz_loader,
            scoring,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            tick_interval: self.config.tick_interval(),
            min_transition: self.config.min_transition(),
        }
    }

    /// Loads the quiz and starts a session. A load failure leaves no session
    /// behind. Once submitted, the session stays readable for the configured
    /// retention window and is then evicted.
    pub async fn open_session(&self, quiz_id: &str) -> Result<Arc<ExamSession>, EngineError> {
        let quiz = self.quiz_loader.load(quiz_id).await?;
        validate_descriptor(&quiz)?;

        let coordinator =
            SubmissionCoordinator::new(self.scoring.clone(), self.config.results_url.clone());
        let session = ExamSession::start(quiz, coordinator, self.session_settings());

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id().to_string(), session.clone());
        self.schedule_eviction(&session);
        Ok(session)
    }

    fn schedule_eviction(&self, session: &ExamSession) {
        let registry: Weak<SessionRegistry> = Arc::downgrade(&self.sessions);
        let retention = self.config.session_retention();
        let session_id = session.id().to_string();
        let mut submitted = session.subscribe_submitted();

        tokio::spawn(async move {
            // Err means the session was dropped without being submitted.
            if submitted.wait_for(|done| *done).await.is_err() {
                return;
            }
            drop(submitted);
            tokio::time::sleep(retention).await;

            let Some(registry) = registry.upgrade() else {
                return;
            };
            let evicted = registry
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&session_id);
            if let Some(session) = evicted {
                session.teardown();
                SESSIONS_TOTAL.with_label_values(&["evicted"]).inc();
                tracing::info!(
                    "Evicted submitted exam session {} after {}s",
                    session_id,
                    retention.as_secs()
                );
            }
        });
    }

    pub fn session(&self, session_id: &str) -> Result<Arc<ExamSession>, EngineError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    /// Tears the session down and forgets it.
    pub fn close_session(&self, session_id: &str) -> Result<(), EngineError> {
        let session = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        session.teardown();
        Ok(())
    }

    /// Tears down every session, e.g. on shutdown. In-progress sessions are
    /// not auto-submitted. Returns how many were released.
    pub fn teardown_all(&self) -> usize {
        let sessions: Vec<_> = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, session)| session)
            .collect();
        for session in &sessions {
            session.teardown();
        }
        sessions.len()
    }

    pub fn sessions(&self) -> Vec<Arc<ExamSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
