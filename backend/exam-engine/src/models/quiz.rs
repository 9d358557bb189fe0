use serde::{Deserialize, Serialize};
use validator::Validate;

/// Longest countdown a quiz may ask for (one week).
pub const MAX_DURATION_SECONDS: u64 = 604_800;

/// Quiz as delivered by the quiz collaborator. Content is opaque to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuizDescriptor {
    #[validate(length(min = 1))]
    pub id: String,
    pub title: String,
    #[validate(range(min = 1, max = MAX_DURATION_SECONDS))]
    pub duration_seconds: u64,
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizQuestion {
    #[validate(length(min = 1))]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub options: Vec<QuizOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub duration_seconds: u64,
    pub question_count: usize,
}

impl QuizDescriptor {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Returns the first question id that appears more than once.
    pub fn duplicate_question_id(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.questions
            .iter()
            .map(|q| q.id.as_str())
            .find(|id| !seen.insert(*id))
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            duration_seconds: self.duration_seconds,
            question_count: self.questions.len(),
        }
    }
}
