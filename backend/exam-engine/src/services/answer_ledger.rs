use std::collections::HashMap;

/// Value stored for a question that has been touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEntry {
    Selected(String),
    /// Explicitly cleared by the user. Distinct from never answered.
    Cleared,
}

/// Question index -> selected option.
///
/// Clearing stores [`AnswerEntry::Cleared`] instead of removing the key, so a
/// lookup can tell "visited but cleared" from "never touched" (`None`).
#[derive(Debug, Clone, Default)]
pub struct AnswerLedger {
    entries: HashMap<usize, AnswerEntry>,
}

impl AnswerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: usize, option_id: impl Into<String>) {
        self.entries
            .insert(index, AnswerEntry::Selected(option_id.into()));
    }

    pub fn clear(&mut self, index: usize) {
        self.entries.insert(index, AnswerEntry::Cleared);
    }

    pub fn get(&self, index: usize) -> Option<&AnswerEntry> {
        self.entries.get(&index)
    }

    pub fn selected(&self, index: usize) -> Option<&str> {
        match self.entries.get(&index) {
            Some(AnswerEntry::Selected(option_id)) => Some(option_id.as_str()),
            _ => None,
        }
    }

    pub fn has_answer(&self, index: usize) -> bool {
        self.selected(index).is_some()
    }
}
