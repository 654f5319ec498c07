//! Server push channel: job/draft status and generation logs.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use prep_core::model::{DraftId, JobId, QuestionId};

use crate::error::PushError;

pub const MAX_LOG_ENTRIES: usize = 200;
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Background generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: String,
    #[serde(default)]
    pub title: Option<String>,
    /// 0.0 to 1.0 when the server reports it.
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Question draft awaiting review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub status: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub level: Option<String>,
    pub message: String,
}

/// One decoded websocket text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    Snapshot {
        #[serde(default)]
        jobs: Vec<Job>,
        #[serde(default)]
        drafts: Vec<Draft>,
        #[serde(default)]
        logs: Vec<LogEntry>,
    },
    Job {
        job: Job,
    },
    Draft {
        draft: Draft,
    },
    JobRemoved {
        id: JobId,
    },
    DraftRemoved {
        id: DraftId,
    },
    OpenaiLog {
        entry: LogEntry,
    },
}

impl PushMessage {
    /// # Errors
    ///
    /// Returns `PushError::Malformed` for unknown discriminants or bad payloads.
    pub fn decode(text: &str) -> Result<Self, PushError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Client-side merge of everything the push channel has delivered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PushFeed {
    jobs: Vec<Job>,
    drafts: Vec<Draft>,
    logs: VecDeque<LogEntry>,
}

impl PushFeed {
    #[must_use]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    #[must_use]
    pub fn drafts(&self) -> &[Draft] {
        &self.drafts
    }

    /// Oldest first.
    pub fn logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter()
    }

    #[must_use]
    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    pub fn apply(&mut self, message: PushMessage) {
        match message {
            PushMessage::Snapshot { jobs, drafts, logs } => {
                self.jobs = jobs;
                self.drafts = drafts;
                self.logs.clear();
                for entry in logs {
                    self.push_log(entry);
                }
            }
            PushMessage::Job { job } => upsert(&mut self.jobs, job, |job| job.id),
            PushMessage::Draft { draft } => upsert(&mut self.drafts, draft, |draft| draft.id),
            PushMessage::JobRemoved { id } => self.jobs.retain(|job| job.id != id),
            PushMessage::DraftRemoved { id } => self.drafts.retain(|draft| draft.id != id),
            PushMessage::OpenaiLog { entry } => self.push_log(entry),
        }
    }

    fn push_log(&mut self, entry: LogEntry) {
        self.logs.push_back(entry);
        while self.logs.len() > MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
    }
}

fn upsert<T, K: PartialEq>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> K) {
    let id = key(&item);
    match items.iter_mut().find(|existing| key(existing) == id) {
        Some(existing) => *existing = item,
        None => items.insert(0, item),
    }
}

/// Read one websocket connection until it closes, merging frames into `feed`.
///
/// # Errors
///
/// Returns `PushError` on transport failure or the first malformed frame.
pub async fn run(url: &Url, feed: &watch::Sender<PushFeed>) -> Result<(), PushError> {
    let (stream, _) = connect_async(url.as_str()).await?;
    info!(%url, "push channel connected");
    let (_, mut reader) = stream.split();

    while let Some(frame) = reader.next().await {
        match frame? {
            Message::Text(text) => {
                let message = PushMessage::decode(&text).inspect_err(|err| {
                    warn!(error = %err, "malformed push frame, closing channel");
                })?;
                debug!(?message, "push frame");
                feed.send_modify(|feed| feed.apply(message));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    info!(%url, "push channel closed");
    Ok(())
}

/// Push channel kept alive in the background, reconnecting after failures.
///
/// The server sends a fresh snapshot on every connect.
pub struct PushChannel {
    feed: watch::Receiver<PushFeed>,
    task: JoinHandle<()>,
}

impl PushChannel {
    #[must_use]
    pub fn spawn(url: Url) -> Self {
        let (sender, feed) = watch::channel(PushFeed::default());
        let task = tokio::spawn(async move {
            loop {
                if let Err(err) = run(&url, &sender).await {
                    warn!(%url, error = %err, "push channel failed");
                }
                if sender.is_closed() {
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        });
        Self { feed, task }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PushFeed> {
        self.feed.clone()
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: u64, status: &str) -> Job {
        Job {
            id: JobId::new(id),
            status: status.into(),
            title: None,
            progress: None,
            updated_at: None,
        }
    }

    fn log(message: &str) -> LogEntry {
        LogEntry {
            at: None,
            level: None,
            message: message.into(),
        }
    }

    #[test]
    fn decodes_tagged_frames() {
        let message =
            PushMessage::decode(r#"{"type":"job","job":{"id":4,"status":"running"}}"#).unwrap();
        assert_eq!(message, PushMessage::Job { job: job(4, "running") });

        let removed = PushMessage::decode(r#"{"type":"draft_removed","id":9}"#).unwrap();
        assert_eq!(removed, PushMessage::DraftRemoved { id: DraftId::new(9) });

        let log = PushMessage::decode(r#"{"type":"openai_log","entry":{"message":"hi"}}"#);
        assert!(log.is_ok());
    }

    #[test]
    fn unknown_discriminant_is_malformed() {
        let err = PushMessage::decode(r#"{"type":"mystery"}"#).unwrap_err();
        assert!(matches!(err, PushError::Malformed(_)));
    }

    #[test]
    fn job_upsert_replaces_in_place_or_prepends() {
        let mut feed = PushFeed::default();
        feed.apply(PushMessage::Snapshot {
            jobs: vec![job(1, "queued"), job(2, "queued")],
            drafts: Vec::new(),
            logs: Vec::new(),
        });

        feed.apply(PushMessage::Job { job: job(2, "done") });
        feed.apply(PushMessage::Job { job: job(3, "queued") });

        let ids: Vec<u64> = feed.jobs().iter().map(|job| job.id.value()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(feed.jobs()[2].status, "done");
    }

    #[test]
    fn merge_is_idempotent() {
        let frames = [
            PushMessage::Job { job: job(1, "running") },
            PushMessage::JobRemoved { id: JobId::new(5) },
        ];
        let mut once = PushFeed::default();
        let mut twice = PushFeed::default();
        for frame in &frames {
            once.apply(frame.clone());
            twice.apply(frame.clone());
            twice.apply(frame.clone());
        }
        assert_eq!(once, twice);
    }

    #[test]
    fn snapshot_replaces_everything() {
        let mut feed = PushFeed::default();
        feed.apply(PushMessage::Job { job: job(1, "running") });
        feed.apply(PushMessage::OpenaiLog { entry: log("old") });
        feed.apply(PushMessage::Snapshot {
            jobs: vec![job(7, "queued")],
            drafts: Vec::new(),
            logs: Vec::new(),
        });
        assert_eq!(feed.jobs().len(), 1);
        assert_eq!(feed.jobs()[0].id, JobId::new(7));
        assert_eq!(feed.log_count(), 0);
    }

    #[test]
    fn log_ring_drops_oldest() {
        let mut feed = PushFeed::default();
        for index in 0..MAX_LOG_ENTRIES + 5 {
            feed.apply(PushMessage::OpenaiLog {
                entry: log(&format!("line {index}")),
            });
        }
        assert_eq!(feed.log_count(), MAX_LOG_ENTRIES);
        assert_eq!(feed.logs().next().unwrap().message, "line 5");
    }

    #[test]
    fn removals_delete_by_id() {
        let mut feed = PushFeed::default();
        feed.apply(PushMessage::Draft {
            draft: Draft {
                id: DraftId::new(1),
                status: "review".into(),
                title: None,
                question_id: None,
                updated_at: None,
            },
        });
        feed.apply(PushMessage::DraftRemoved { id: DraftId::new(1) });
        assert!(feed.drafts().is_empty());
    }
}
