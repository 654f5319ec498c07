use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::QuestionId;

//
// ─── ANSWERS ──────────────────────────────────────────────────────────────────
//

/// A submitted choice key (`"B"`) or free-form value (`"3.5"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerValue(String);

impl AnswerValue {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Compare against a canonical answer.
    ///
    /// Text compares trimmed and case-insensitively; when both sides parse as
    /// numbers they compare numerically so `"0.50"` matches `"0.5"`.
    #[must_use]
    pub fn matches(&self, canonical: &str) -> bool {
        let left = self.0.trim();
        let right = canonical.trim();
        if let (Ok(a), Ok(b)) = (left.parse::<f64>(), right.parse::<f64>()) {
            return (a - b).abs() < 1e-9;
        }
        left.to_lowercase() == right.to_lowercase()
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── ANSWER FORMAT ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub key: String,
    pub text: String,
}

impl Choice {
    #[must_use]
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeResponseKind {
    #[default]
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FreeResponseSchema {
    #[serde(default)]
    pub kind: FreeResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// How a question is answered: pick a key, or type a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerFormat {
    Choices { choices: Vec<Choice> },
    FreeResponse { schema: FreeResponseSchema },
}

impl AnswerFormat {
    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        match self {
            Self::Choices { choices } => choices,
            Self::FreeResponse { .. } => &[],
        }
    }

    #[must_use]
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Choices { .. })
    }
}

//
// ─── FIGURES ──────────────────────────────────────────────────────────────────
//

/// Image attached to a question, optionally bound to one choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

//
// ─── UNAVAILABILITY ───────────────────────────────────────────────────────────
//

/// Why a question can be viewed but not answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Choice question that came back with zero choices.
    NoChoices,
    /// Question without a canonical answer.
    MissingAnswer,
    /// Tag reported by the server.
    Server(String),
}

impl UnavailableReason {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NoChoices => "This question has no answer choices.".to_string(),
            Self::MissingAnswer => "This question has no answer key yet.".to_string(),
            Self::Server(tag) => format!("This question is unavailable ({tag})."),
        }
    }
}

//
// ─── ASSIGNED QUESTION ────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedQuestion {
    pub id: QuestionId,
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_section: Option<String>,
    pub stem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
    pub format: AnswerFormat,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub figures: Vec<Figure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
}

impl AssignedQuestion {
    /// Effective unavailability: the server tag wins, otherwise derived locally.
    #[must_use]
    pub fn unavailable_reason(&self) -> Option<UnavailableReason> {
        if let Some(tag) = self
            .unavailable_reason
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
        {
            return Some(UnavailableReason::Server(tag.to_string()));
        }
        if self.format.is_choice() && self.format.choices().is_empty() {
            return Some(UnavailableReason::NoChoices);
        }
        if self
            .correct_answer
            .as_deref()
            .is_none_or(|answer| answer.trim().is_empty())
        {
            return Some(UnavailableReason::MissingAnswer);
        }
        None
    }

    #[must_use]
    pub fn is_answerable(&self) -> bool {
        self.unavailable_reason().is_none()
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        self.format.choices()
    }

    #[must_use]
    pub fn choice(&self, key: &str) -> Option<&Choice> {
        self.choices()
            .iter()
            .find(|choice| choice.key.eq_ignore_ascii_case(key))
    }

    /// Figures not bound to any choice.
    pub fn stem_figures(&self) -> impl Iterator<Item = &Figure> {
        self.figures.iter().filter(|figure| figure.choice_key.is_none())
    }

    /// Figures bound to the given choice key.
    pub fn figures_for_choice<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Figure> {
        self.figures.iter().filter(move |figure| {
            figure
                .choice_key
                .as_deref()
                .is_some_and(|bound| bound.eq_ignore_ascii_case(key))
        })
    }

    /// Check a value against the canonical answer, when there is one.
    #[must_use]
    pub fn is_correct(&self, value: &AnswerValue) -> Option<bool> {
        self.correct_answer
            .as_deref()
            .map(|canonical| value.matches(canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice_question(choices: Vec<Choice>, answer: Option<&str>) -> AssignedQuestion {
        AssignedQuestion {
            id: QuestionId::new(1),
            section: "math".into(),
            sub_section: None,
            stem: "What is 1 + 1?".into(),
            passage: None,
            format: AnswerFormat::Choices { choices },
            figures: Vec::new(),
            correct_answer: answer.map(str::to_string),
            unavailable_reason: None,
        }
    }

    #[test]
    fn choice_question_without_choices_is_unavailable() {
        let question = choice_question(Vec::new(), Some("A"));
        assert_eq!(question.unavailable_reason(), Some(UnavailableReason::NoChoices));
        assert!(!question.is_answerable());
    }

    #[test]
    fn question_without_answer_key_is_unavailable() {
        let question = choice_question(vec![Choice::new("A", "2")], Some("  "));
        assert_eq!(
            question.unavailable_reason(),
            Some(UnavailableReason::MissingAnswer)
        );
    }

    #[test]
    fn server_tag_takes_precedence() {
        let mut question = choice_question(Vec::new(), None);
        question.unavailable_reason = Some("retired".into());
        assert_eq!(
            question.unavailable_reason(),
            Some(UnavailableReason::Server("retired".into()))
        );
    }

    #[test]
    fn answer_matching_is_lenient_about_case_and_numbers() {
        assert!(AnswerValue::new(" b ").matches("B"));
        assert!(AnswerValue::new("0.50").matches("0.5"));
        assert!(!AnswerValue::new("C").matches("B"));
    }

    #[test]
    fn figures_split_between_stem_and_choices() {
        let mut question = choice_question(vec![Choice::new("A", "x")], Some("A"));
        question.figures = vec![
            Figure {
                id: "f1".into(),
                url: "/f1.png".into(),
                choice_key: None,
                caption: None,
            },
            Figure {
                id: "f2".into(),
                url: "/f2.png".into(),
                choice_key: Some("a".into()),
                caption: None,
            },
        ];
        assert_eq!(question.stem_figures().count(), 1);
        assert_eq!(question.figures_for_choice("A").count(), 1);
    }

    #[test]
    fn format_deserializes_from_tagged_json() {
        let json = r#"{"kind":"choices","choices":[{"key":"A","text":"one"}]}"#;
        let format: AnswerFormat = serde_json::from_str(json).unwrap();
        assert_eq!(format.choices().len(), 1);
    }
}
