use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an ID from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

numeric_id!(
    /// Server identifier of a practice session.
    SessionId
);
numeric_id!(
    /// Server identifier of a question.
    QuestionId
);
numeric_id!(
    /// Identifier the server assigns to a recorded answer.
    LogId
);
numeric_id!(
    /// PDF ingestion job pushed over the live channel.
    JobId
);
numeric_id!(
    /// Question draft produced by the ingestion pipeline.
    DraftId
);

/// Composite key of a per-question progress entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgressKey {
    pub session_id: SessionId,
    pub question_id: QuestionId,
}

impl ProgressKey {
    #[must_use]
    pub const fn new(session_id: SessionId, question_id: QuestionId) -> Self {
        Self {
            session_id,
            question_id,
        }
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session_id, self.question_id)
    }
}

/// Entity a captured figure is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CaptureTarget {
    Question(QuestionId),
    Draft(DraftId),
}

impl CaptureTarget {
    /// Path segment used by the figure endpoints.
    #[must_use]
    pub fn path_segment(&self) -> String {
        match self {
            Self::Question(id) => format!("questions/{id}"),
            Self::Draft(id) => format!("drafts/{id}"),
        }
    }
}
