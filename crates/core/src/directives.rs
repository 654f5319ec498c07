//! Partition question text into plain and annotated runs.
//!
//! Matching walks a single cursor forward through the text. Each directive is
//! searched for only in the text after the cursor, so a directive can never
//! match inside a span consumed by an earlier one, and the emitted runs always
//! concatenate back to the original text.

use std::ops::Range;

use crate::model::{DirectiveAction, DirectiveTarget, StepDirective};

/// Snippets longer than this (after stripping punctuation) are prose, not a
/// choice label.
const MAX_CHOICE_LABEL_LEN: usize = 12;

/// A contiguous piece of rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRun {
    Plain(String),
    Annotated {
        text: String,
        action: DirectiveAction,
        emphasis: Option<String>,
        /// Position of the directive in the list it was matched from.
        directive: usize,
    },
}

impl TextRun {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) | Self::Annotated { text, .. } => text,
        }
    }

    #[must_use]
    pub fn action(&self) -> Option<DirectiveAction> {
        match self {
            Self::Plain(_) => None,
            Self::Annotated { action, .. } => Some(*action),
        }
    }
}

/// Split `text` into runs for the given directives, in order.
///
/// Directives whose snippet is blank or not found in the remaining text are
/// skipped.
#[must_use]
pub fn segment_text<'a, I>(text: &str, directives: I) -> Vec<TextRun>
where
    I: IntoIterator<Item = &'a StepDirective>,
{
    let mut runs = Vec::new();
    let mut cursor = 0_usize;

    for (index, directive) in directives.into_iter().enumerate() {
        let remaining = &text[cursor..];
        let Some(found) = find_case_insensitive(remaining, &directive.text) else {
            continue;
        };
        let start = cursor + found.start;
        let end = cursor + found.end;
        if start > cursor {
            runs.push(TextRun::Plain(text[cursor..start].to_string()));
        }
        runs.push(TextRun::Annotated {
            text: text[start..end].to_string(),
            action: directive.action,
            emphasis: directive.emphasis.clone(),
            directive: index,
        });
        cursor = end;
    }

    if cursor < text.len() || runs.is_empty() {
        runs.push(TextRun::Plain(text[cursor..].to_string()));
    }
    runs
}

/// Byte range of the first case-insensitive occurrence of `needle`.
///
/// Comparison uses full Unicode lowercasing, but the returned range always
/// refers to `haystack` itself, whose byte lengths may differ from its
/// lowercased form.
#[must_use]
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.trim().is_empty() {
        return None;
    }
    let folded: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();

    for (start, _) in haystack.char_indices() {
        if let Some(end) = match_folded_at(haystack, start, &folded) {
            return Some(start..end);
        }
    }
    None
}

fn match_folded_at(haystack: &str, start: usize, folded: &[char]) -> Option<usize> {
    let mut matched = 0_usize;
    for (offset, ch) in haystack[start..].char_indices() {
        for lower in ch.to_lowercase() {
            if folded.get(matched) != Some(&lower) {
                return None;
            }
            matched += 1;
        }
        if matched == folded.len() {
            return Some(start + offset + ch.len_utf8());
        }
    }
    None
}

//
// ─── TARGETING ────────────────────────────────────────────────────────────────
//

/// Directives that apply to one body of text, in their original order.
pub fn for_target(
    directives: &[StepDirective],
    target: DirectiveTarget,
) -> impl Iterator<Item = &StepDirective> {
    directives
        .iter()
        .filter(move |directive| directive.target == target)
}

/// Figure directives for one figure; a directive without `figure_id` applies
/// to every figure.
pub fn for_figure<'a>(
    directives: &'a [StepDirective],
    figure_id: &'a str,
) -> impl Iterator<Item = &'a StepDirective> {
    for_target(directives, DirectiveTarget::Figure).filter(move |directive| {
        directive
            .figure_id
            .as_deref()
            .is_none_or(|id| id.trim().eq_ignore_ascii_case(figure_id.trim()))
    })
}

//
// ─── CHOICES ──────────────────────────────────────────────────────────────────
//

/// Whether a choice directive addresses the whole choice `key`.
///
/// An explicit `choice_id` must equal the key (case-insensitively). Without
/// one, a short snippet such as `"(B)"` or `"Option B"` is accepted when its
/// alphanumeric core is the key, optionally prefixed or suffixed by
/// `CHOICE`/`OPTION`.
#[must_use]
pub fn matches_choice(directive: &StepDirective, key: &str) -> bool {
    let key = key.trim();
    if key.is_empty() {
        return false;
    }
    if let Some(choice_id) = directive.choice_id.as_deref() {
        return choice_id.trim().eq_ignore_ascii_case(key);
    }

    let stripped: String = directive
        .text
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect();
    if stripped.is_empty() || stripped.chars().count() > MAX_CHOICE_LABEL_LEN {
        return false;
    }

    let key = key.to_uppercase();
    let patterns = [
        key.clone(),
        format!("CHOICE{key}"),
        format!("OPTION{key}"),
        format!("{key}CHOICE"),
        format!("{key}OPTION"),
    ];
    patterns.iter().any(|pattern| *pattern == stripped)
}

/// Rendering plan for a single answer choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceAnnotation {
    /// Actions applied to the choice as a whole, in directive order.
    pub whole: Vec<DirectiveAction>,
    /// The choice text split by snippet-level directives.
    pub runs: Vec<TextRun>,
}

impl ChoiceAnnotation {
    #[must_use]
    pub fn has(&self, action: DirectiveAction) -> bool {
        self.whole.contains(&action)
    }
}

/// Resolve the active directives against one choice.
///
/// Directives matching the choice as a whole become whole-choice emphasis.
/// Directives carrying an explicit `choice_id` for a different choice are
/// ignored. The rest are matched as snippets inside the choice text, except
/// one-character snippets, which would light up arbitrary letters.
#[must_use]
pub fn annotate_choice(key: &str, text: &str, directives: &[StepDirective]) -> ChoiceAnnotation {
    let mut whole = Vec::new();
    let mut snippets = Vec::new();

    for directive in for_target(directives, DirectiveTarget::Choices) {
        if matches_choice(directive, key) {
            whole.push(directive.action);
            continue;
        }
        if directive.choice_id.is_some() {
            continue;
        }
        if directive.text.trim().chars().count() <= 1 {
            continue;
        }
        snippets.push(directive);
    }

    ChoiceAnnotation {
        whole,
        runs: segment_text(text, snippets),
    }
}
