use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

//
// ─── DIRECTIVES ───────────────────────────────────────────────────────────────
//

/// Which body of text a directive applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveTarget {
    Passage,
    Stem,
    Choices,
    Figure,
}

/// Visual treatment applied to a matched snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveAction {
    Highlight,
    Underline,
    Circle,
    Strike,
    Note,
    Color,
    Font,
}

impl DirectiveAction {
    /// CSS modifier used by the renderer.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Highlight => "highlight",
            Self::Underline => "underline",
            Self::Circle => "circle",
            Self::Strike => "strike",
            Self::Note => "note",
            Self::Color => "color",
            Self::Font => "font",
        }
    }
}

/// Instruction to annotate a snippet of question text during one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDirective {
    pub target: DirectiveTarget,
    #[serde(default, alias = "snippet")]
    pub text: String,
    pub action: DirectiveAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emphasis: Option<String>,
}

impl StepDirective {
    #[must_use]
    pub fn new(target: DirectiveTarget, text: impl Into<String>, action: DirectiveAction) -> Self {
        Self {
            target,
            text: text.into(),
            action,
            choice_id: None,
            figure_id: None,
            cue: None,
            emphasis: None,
        }
    }

    #[must_use]
    pub fn with_choice(mut self, choice_id: impl Into<String>) -> Self {
        self.choice_id = Some(choice_id.into());
        self
    }

    #[must_use]
    pub fn with_figure(mut self, figure_id: impl Into<String>) -> Self {
        self.figure_id = Some(figure_id.into());
        self
    }

    #[must_use]
    pub fn with_emphasis(mut self, emphasis: impl Into<String>) -> Self {
        self.emphasis = Some(emphasis.into());
        self
    }
}

//
// ─── STEPS ────────────────────────────────────────────────────────────────────
//

/// Narration text, either a single string or one entry per language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Narration {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl Default for Narration {
    fn default() -> Self {
        Self::Plain(String::new())
    }
}

/// One narrated, timed unit of a multi-step explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationStep {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub step_type: String,
    #[serde(default)]
    pub narration: Narration,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub delay_ms: i64,
    #[serde(default)]
    pub directives: Vec<StepDirective>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub board_notes: Vec<String>,
}

/// AI-authored explanation for a single question.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub steps: Vec<ExplanationStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Explanation {
    /// Summary text when present and non-blank.
    #[must_use]
    pub fn summary_text(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .map(str::trim)
            .filter(|summary| !summary.is_empty())
    }
}

/// Explanation generation allowance reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quota {
    #[serde(default)]
    pub used: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub remaining: u32,
}

impl Quota {
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.limit > 0 && self.remaining == 0
    }
}
