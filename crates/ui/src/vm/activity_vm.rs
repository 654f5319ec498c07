use services::PushFeed;
use services::push::{Draft, Job, LogEntry};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityRowVm {
    pub key: String,
    pub title: String,
    pub status: String,
    pub detail: Option<String>,
    pub updated: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLineVm {
    pub level: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ActivityVm {
    pub jobs: Vec<ActivityRowVm>,
    pub drafts: Vec<ActivityRowVm>,
    pub logs: Vec<LogLineVm>,
}

impl ActivityVm {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.drafts.is_empty() && self.logs.is_empty()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn map_job(job: &Job) -> ActivityRowVm {
    ActivityRowVm {
        key: format!("job-{}", job.id),
        title: job
            .title
            .clone()
            .unwrap_or_else(|| format!("Job {}", job.id)),
        status: job.status.clone(),
        detail: job
            .progress
            .map(|progress| format!("{}%", (progress.clamp(0.0, 1.0) * 100.0).round() as i32)),
        updated: job
            .updated_at
            .map(|at| at.format("%H:%M:%S").to_string()),
    }
}

fn map_draft(draft: &Draft) -> ActivityRowVm {
    ActivityRowVm {
        key: format!("draft-{}", draft.id),
        title: draft
            .title
            .clone()
            .unwrap_or_else(|| format!("Draft {}", draft.id)),
        status: draft.status.clone(),
        detail: draft
            .question_id
            .map(|question| format!("Question {question}")),
        updated: draft
            .updated_at
            .map(|at| at.format("%H:%M:%S").to_string()),
    }
}

fn map_log(entry: &LogEntry) -> LogLineVm {
    let text = match entry.at {
        Some(at) => format!("{} {}", at.format("%H:%M:%S"), entry.message),
        None => entry.message.clone(),
    };
    LogLineVm {
        level: entry
            .level
            .clone()
            .unwrap_or_else(|| "info".to_string()),
        text,
    }
}

/// Newest log lines first.
#[must_use]
pub fn map_activity(feed: &PushFeed) -> ActivityVm {
    let mut logs: Vec<_> = feed.logs().map(map_log).collect();
    logs.reverse();
    ActivityVm {
        jobs: feed.jobs().iter().map(map_job).collect(),
        drafts: feed.drafts().iter().map(map_draft).collect(),
        logs,
    }
}
