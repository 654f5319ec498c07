//! Playback timeline for narrated explanations.
//!
//! This module is clock-free: it knows how long each step lasts and how much
//! of the subtitle is visible, while the player task in `services` owns the
//! actual timers.

use std::time::Duration;

use crate::model::{Explanation, ExplanationStep, Narration, StepDirective};

/// Interval between revealed subtitle characters.
pub const SUBTITLE_TICK: Duration = Duration::from_millis(25);

/// Steps never auto-advance sooner than this.
pub const MIN_STEP_DURATION: Duration = Duration::from_millis(500);

/// Languages tried after the declared one.
pub const FALLBACK_LANGUAGES: [&str; 2] = ["en", "ko"];

pub const SUMMARY_STEP_TYPE: &str = "summary";

/// Pick the narration text for `language`.
///
/// Localized maps resolve through the declared language, then
/// [`FALLBACK_LANGUAGES`], then the first entry in key order.
#[must_use]
pub fn resolve_narration(narration: &Narration, language: Option<&str>) -> String {
    let map = match narration {
        Narration::Plain(text) => return text.clone(),
        Narration::Localized(map) => map,
    };

    let declared = language.map(str::trim).filter(|code| !code.is_empty());
    declared
        .into_iter()
        .chain(FALLBACK_LANGUAGES)
        .find_map(|code| map.get(code))
        .or_else(|| map.values().next())
        .cloned()
        .unwrap_or_default()
}

/// Time a playing step stays on screen before auto-advancing.
///
/// `max(duration, 500ms) + max(delay, 0)`; negative inputs are treated as zero.
#[must_use]
pub fn step_advance_delay(step: &ExplanationStep) -> Duration {
    advance_delay(step.duration_ms, step.delay_ms)
}

fn advance_delay(duration_ms: i64, delay_ms: i64) -> Duration {
    let duration = Duration::from_millis(u64::try_from(duration_ms).unwrap_or(0));
    let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
    duration.max(MIN_STEP_DURATION) + delay
}

/// A step ready for playback: narration resolved, timing computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStep {
    pub title: String,
    pub step_type: String,
    pub text: String,
    pub directives: Vec<StepDirective>,
    pub board_notes: Vec<String>,
    pub advance_after: Duration,
}

impl PlaybackStep {
    fn from_step(step: &ExplanationStep, language: Option<&str>) -> Self {
        Self {
            title: step.title.clone(),
            step_type: step.step_type.clone(),
            text: resolve_narration(&step.narration, language),
            directives: step.directives.clone(),
            board_notes: step.board_notes.clone(),
            advance_after: step_advance_delay(step),
        }
    }

    /// Synthetic closing step that reads out the summary.
    fn summary(summary: &str) -> Self {
        let chars = u32::try_from(summary.chars().count()).unwrap_or(u32::MAX);
        Self {
            title: "Summary".to_string(),
            step_type: SUMMARY_STEP_TYPE.to_string(),
            text: summary.to_string(),
            directives: Vec::new(),
            board_notes: Vec::new(),
            advance_after: SUBTITLE_TICK.saturating_mul(chars).max(MIN_STEP_DURATION),
        }
    }

    #[must_use]
    pub fn is_summary(&self) -> bool {
        self.step_type == SUMMARY_STEP_TYPE
    }

    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Flatten an explanation into playback steps.
///
/// `language` overrides the explanation's declared language when given.
#[must_use]
pub fn build_timeline(explanation: &Explanation, language: Option<&str>) -> Vec<PlaybackStep> {
    let language = language.or(explanation.language.as_deref());
    let mut steps: Vec<PlaybackStep> = explanation
        .steps
        .iter()
        .map(|step| PlaybackStep::from_step(step, language))
        .collect();
    if let Some(summary) = explanation.summary_text() {
        steps.push(PlaybackStep::summary(summary));
    }
    steps
}

//
// ─── TIMELINE ─────────────────────────────────────────────────────────────────
//

/// What an automatic advance did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved(usize),
    Stopped,
}

/// Step index, playing flag, and subtitle progress for one explanation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NarrationTimeline {
    steps: Vec<PlaybackStep>,
    index: usize,
    playing: bool,
    revealed: usize,
}

impl NarrationTimeline {
    #[must_use]
    pub fn new(steps: Vec<PlaybackStep>) -> Self {
        Self {
            steps,
            index: 0,
            playing: false,
            revealed: 0,
        }
    }

    #[must_use]
    pub fn from_explanation(explanation: &Explanation, language: Option<&str>) -> Self {
        Self::new(build_timeline(explanation, language))
    }

    #[must_use]
    pub fn steps(&self) -> &[PlaybackStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.steps.len()
    }

    #[must_use]
    pub fn current(&self) -> Option<&PlaybackStep> {
        self.steps.get(self.index)
    }

    /// Directives of the current step; empty when there are no steps.
    #[must_use]
    pub fn active_directives(&self) -> &[StepDirective] {
        self.current()
            .map(|step| step.directives.as_slice())
            .unwrap_or_default()
    }

    /// Subtitle revealed so far.
    #[must_use]
    pub fn subtitle(&self) -> &str {
        let Some(step) = self.current() else {
            return "";
        };
        let end = step
            .text
            .char_indices()
            .nth(self.revealed)
            .map_or(step.text.len(), |(offset, _)| offset);
        &step.text[..end]
    }

    #[must_use]
    pub fn is_subtitle_complete(&self) -> bool {
        self.current()
            .is_none_or(|step| self.revealed >= step.char_count())
    }

    /// Reveal one more character. Returns `false` once the subtitle is full.
    pub fn reveal_next(&mut self) -> bool {
        if self.is_subtitle_complete() {
            return false;
        }
        self.revealed += 1;
        true
    }

    /// Delay before the current step auto-advances.
    #[must_use]
    pub fn advance_after(&self) -> Option<Duration> {
        self.current().map(|step| step.advance_after)
    }

    pub fn play(&mut self) {
        self.playing = !self.steps.is_empty();
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Flip the playing flag and return the new value.
    pub fn toggle_play(&mut self) -> bool {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
        self.playing
    }

    /// Move to `index`. Returns `true` when the step changed.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index >= self.steps.len() || index == self.index {
            return false;
        }
        self.index = index;
        self.revealed = 0;
        true
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.index + 1)
    }

    pub fn previous(&mut self) -> bool {
        match self.index.checked_sub(1) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    /// Timer-driven advance: next step, or stop playback on the last one.
    pub fn advance(&mut self) -> Advance {
        if self.next() {
            Advance::Moved(self.index)
        } else {
            self.playing = false;
            Advance::Stopped
        }
    }
}
