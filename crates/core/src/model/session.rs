use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::ids::{LogId, QuestionId, SessionId};
use crate::model::question::{AnswerValue, AssignedQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Standard,
    Diagnostic,
    Preview,
}

/// Outcome of one answered question.
///
/// The same shape is used for the server's progress list and for the
/// engine's progress map, so a reload rebuilds identical state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub question_id: QuestionId,
    pub value: AnswerValue,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<LogId>,
    #[serde(default)]
    pub elapsed_secs: u32,
    #[serde(default)]
    pub revealed: bool,
}

/// A bounded sequence of assigned questions with per-question progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(rename = "type", default)]
    pub session_type: SessionType,
    pub questions: Vec<AssignedQuestion>,
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn has_progress(&self) -> bool {
        !self.progress.is_empty()
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&AssignedQuestion> {
        self.questions.iter().find(|question| question.id == id)
    }

    #[must_use]
    pub fn index_of(&self, id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|question| question.id == id)
    }

    #[must_use]
    pub fn question_ids(&self) -> HashSet<QuestionId> {
        self.questions.iter().map(|question| question.id).collect()
    }

    #[must_use]
    pub fn progress_for(&self, id: QuestionId) -> Option<&ProgressEntry> {
        self.progress.iter().find(|entry| entry.question_id == id)
    }

    /// Replace or append the progress entry for its question.
    pub fn record_progress(&mut self, entry: ProgressEntry) {
        match self
            .progress
            .iter_mut()
            .find(|existing| existing.question_id == entry.question_id)
        {
            Some(existing) => *existing = entry,
            None => self.progress.push(entry),
        }
    }

    /// Drop progress for questions no longer assigned.
    pub fn retain_assigned_progress(&mut self) {
        let ids = self.question_ids();
        self.progress.retain(|entry| ids.contains(&entry.question_id));
    }

    /// Index to land on when resuming: the first unanswered question, or the
    /// last question when everything is answered.
    #[must_use]
    pub fn resume_index(&self) -> usize {
        let answered: HashSet<QuestionId> =
            self.progress.iter().map(|entry| entry.question_id).collect();
        self.questions
            .iter()
            .position(|question| !answered.contains(&question.id))
            .unwrap_or_else(|| self.questions.len().saturating_sub(1))
    }

    /// Whether the session is bound to an external task (e.g. an assignment).
    #[must_use]
    pub fn is_task_bound(&self) -> bool {
        self.source_id
            .as_deref()
            .is_some_and(|source| !source.trim().is_empty())
    }
}

/// Aggregate counts for a session, as shown in the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionScore {
    pub total: usize,
    pub answered: usize,
    pub correct: usize,
}

impl SessionScore {
    #[must_use]
    pub fn from_entries<'a>(total: usize, entries: impl IntoIterator<Item = &'a ProgressEntry>) -> Self {
        let mut answered = 0_usize;
        let mut correct = 0_usize;
        for entry in entries {
            answered = answered.saturating_add(1);
            if entry.is_correct {
                correct = correct.saturating_add(1);
            }
        }
        Self {
            total,
            answered,
            correct,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.answered >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::{AnswerFormat, Choice};

    fn question(id: u64) -> AssignedQuestion {
        AssignedQuestion {
            id: QuestionId::new(id),
            section: "reading".into(),
            sub_section: None,
            stem: format!("Q{id}"),
            passage: None,
            format: AnswerFormat::Choices {
                choices: vec![Choice::new("A", "yes"), Choice::new("B", "no")],
            },
            figures: Vec::new(),
            correct_answer: Some("A".into()),
            unavailable_reason: None,
        }
    }

    fn entry(id: u64, correct: bool) -> ProgressEntry {
        ProgressEntry {
            question_id: QuestionId::new(id),
            value: AnswerValue::new("A"),
            is_correct: correct,
            log_id: Some(LogId::new(100 + id)),
            elapsed_secs: 12,
            revealed: false,
        }
    }

    fn session(progress: Vec<ProgressEntry>) -> Session {
        Session {
            id: SessionId::new(1),
            session_type: SessionType::Standard,
            questions: vec![question(1), question(2), question(3)],
            progress,
            source_id: None,
            started_at: None,
        }
    }

    #[test]
    fn resume_index_points_at_first_unanswered() {
        let session = session(vec![entry(1, true), entry(3, false)]);
        assert_eq!(session.resume_index(), 1);
    }

    #[test]
    fn resume_index_falls_back_to_last_question() {
        let session = session(vec![entry(1, true), entry(2, true), entry(3, false)]);
        assert_eq!(session.resume_index(), 2);
    }

    #[test]
    fn record_progress_replaces_existing_entry() {
        let mut session = session(vec![entry(1, false)]);
        session.record_progress(entry(1, true));
        assert_eq!(session.progress.len(), 1);
        assert!(session.progress[0].is_correct);
    }

    #[test]
    fn retain_assigned_progress_drops_stale_entries() {
        let mut session = session(vec![entry(1, true), entry(9, true)]);
        session.retain_assigned_progress();
        assert_eq!(session.progress.len(), 1);
    }

    #[test]
    fn session_type_reads_type_field() {
        let json = r#"{"id":5,"type":"diagnostic","questions":[]}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.session_type, SessionType::Diagnostic);
        assert!(!session.has_progress());
    }

    #[test]
    fn score_counts_correct_answers() {
        let entries = [entry(1, true), entry(2, false)];
        let score = SessionScore::from_entries(3, entries.iter());
        assert_eq!(score.answered, 2);
        assert_eq!(score.correct, 1);
        assert_eq!(score.remaining(), 1);
        assert!(!score.is_complete());
    }
}
