//! Timer-driven narration playback.
//!
//! A [`NarrationPlayer`] owns a tokio task that reveals subtitles, schedules
//! auto-advance and publishes a [`NarrationFrame`] on every change. Dropping
//! the player stops the task and retracts the active directives.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, trace};

use prep_core::model::{Explanation, StepDirective};
use prep_core::narration::{Advance, NarrationTimeline, SUBTITLE_TICK};

/// Snapshot of playback published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NarrationFrame {
    pub index: usize,
    pub total: usize,
    pub playing: bool,
    pub title: String,
    pub step_type: String,
    pub subtitle: String,
    pub subtitle_complete: bool,
    pub directives: Vec<StepDirective>,
    pub board_notes: Vec<String>,
}

impl NarrationFrame {
    fn from_timeline(timeline: &NarrationTimeline) -> Self {
        let Some(step) = timeline.current() else {
            return Self::default();
        };
        Self {
            index: timeline.index(),
            total: timeline.len(),
            playing: timeline.is_playing(),
            title: step.title.clone(),
            step_type: step.step_type.clone(),
            subtitle: timeline.subtitle().to_string(),
            subtitle_complete: timeline.is_subtitle_complete(),
            directives: step.directives.clone(),
            board_notes: step.board_notes.clone(),
        }
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Pause,
    TogglePlay,
    Next,
    Previous,
    GoTo(usize),
}

/// Handle to a running narration task.
pub struct NarrationPlayer {
    commands: mpsc::UnboundedSender<Command>,
    frames: Arc<watch::Sender<NarrationFrame>>,
    task: JoinHandle<()>,
}

impl NarrationPlayer {
    /// Spawn playback for `explanation`, narrated in `language` when available.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(explanation: &Explanation, language: Option<&str>, autoplay: bool) -> Self {
        Self::spawn_timeline(NarrationTimeline::from_explanation(explanation, language), autoplay)
    }

    #[must_use]
    pub fn spawn_timeline(mut timeline: NarrationTimeline, autoplay: bool) -> Self {
        if autoplay {
            timeline.play();
        }
        let (frames, _) = watch::channel(NarrationFrame::from_timeline(&timeline));
        let frames = Arc::new(frames);
        let (commands, receiver) = mpsc::unbounded_channel();
        debug!(steps = timeline.len(), autoplay, "narration started");
        let task = tokio::spawn(run(timeline, Arc::clone(&frames), receiver));
        Self {
            commands,
            frames,
            task,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NarrationFrame> {
        self.frames.subscribe()
    }

    #[must_use]
    pub fn frame(&self) -> NarrationFrame {
        self.frames.borrow().clone()
    }

    pub fn play(&self) {
        self.send(Command::Play);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn toggle_play(&self) {
        self.send(Command::TogglePlay);
    }

    pub fn next(&self) {
        self.send(Command::Next);
    }

    pub fn previous(&self) {
        self.send(Command::Previous);
    }

    pub fn go_to(&self, index: usize) {
        self.send(Command::GoTo(index));
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(?command, "narration task already stopped");
        }
    }
}

impl Drop for NarrationPlayer {
    fn drop(&mut self) {
        self.task.abort();
        retract(&self.frames);
        self.frames.send_modify(|frame| frame.playing = false);
    }
}

fn retract(frames: &watch::Sender<NarrationFrame>) {
    frames.send_if_modified(|frame| {
        if frame.directives.is_empty() {
            return false;
        }
        frame.directives.clear();
        true
    });
}

fn publish(frames: &watch::Sender<NarrationFrame>, timeline: &NarrationTimeline) {
    frames.send_replace(NarrationFrame::from_timeline(timeline));
}

fn schedule(timeline: &NarrationTimeline) -> Option<Instant> {
    if !timeline.is_playing() {
        return None;
    }
    timeline
        .advance_after()
        .map(|delay: Duration| Instant::now() + delay)
}

fn reveal_interval() -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + SUBTITLE_TICK, SUBTITLE_TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run(
    mut timeline: NarrationTimeline,
    frames: Arc<watch::Sender<NarrationFrame>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut reveal = reveal_interval();
    let mut advance_at = schedule(&timeline);

    loop {
        let advance = async move {
            match advance_at {
                Some(at) => sleep_until(at).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                let before = timeline.index();
                match command {
                    Command::Play => timeline.play(),
                    Command::Pause => timeline.pause(),
                    Command::TogglePlay => {
                        timeline.toggle_play();
                    }
                    Command::Next => {
                        timeline.next();
                    }
                    Command::Previous => {
                        timeline.previous();
                    }
                    Command::GoTo(index) => {
                        timeline.go_to(index);
                    }
                }
                trace!(?command, index = timeline.index(), "narration command");
                if timeline.index() != before {
                    retract(&frames);
                    reveal = reveal_interval();
                }
                advance_at = schedule(&timeline);
                publish(&frames, &timeline);
            }
            _ = reveal.tick(), if !timeline.is_subtitle_complete() => {
                timeline.reveal_next();
                publish(&frames, &timeline);
            }
            () = advance => {
                match timeline.advance() {
                    Advance::Moved(index) => {
                        trace!(index, "narration auto-advanced");
                        retract(&frames);
                        reveal = reveal_interval();
                        advance_at = schedule(&timeline);
                    }
                    Advance::Stopped => advance_at = None,
                }
                publish(&frames, &timeline);
            }
        }
    }

    retract(&frames);
}
