//! Run events
//!
//! Append-only, ordered per run id. One variant per event kind so the hub
//! and the persistence boundary match exhaustively; the serialized tag
//! names are the wire names subscribers and the event log see.

use crate::types::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        workflow_id: String,
        timestamp: DateTime<Utc>,
    },
    RunForked {
        run_id: String,
        parent_run_id: String,
        forked_from_step_id: String,
        timestamp: DateTime<Utc>,
    },
    RunReplayed {
        run_id: String,
        replay_of_run_id: String,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        run_id: String,
        step_id: String,
        timestamp: DateTime<Utc>,
    },
    StepLog {
        run_id: String,
        step_id: String,
        message: String,
        level: LogLevel,
        timestamp: DateTime<Utc>,
    },
    ArtifactWritten {
        run_id: String,
        artifact_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    ArtifactEdited {
        run_id: String,
        artifact_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    StepFinished {
        run_id: String,
        step_id: String,
        status: RunStatus,
        timestamp: DateTime<Utc>,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
        timestamp: DateTime<Utc>,
    },
    RunFailed {
        run_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::RunForked { run_id, .. }
            | Self::RunReplayed { run_id, .. }
            | Self::StepStarted { run_id, .. }
            | Self::StepLog { run_id, .. }
            | Self::ArtifactWritten { run_id, .. }
            | Self::ArtifactEdited { run_id, .. }
            | Self::StepFinished { run_id, .. }
            | Self::RunFinished { run_id, .. }
            | Self::RunFailed { run_id, .. } => run_id,
        }
    }

    /// The serialized tag name, e.g. "RUN_STARTED".
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "RUN_STARTED",
            Self::RunForked { .. } => "RUN_FORKED",
            Self::RunReplayed { .. } => "RUN_REPLAYED",
            Self::StepStarted { .. } => "STEP_STARTED",
            Self::StepLog { .. } => "STEP_LOG",
            Self::ArtifactWritten { .. } => "ARTIFACT_WRITTEN",
            Self::ArtifactEdited { .. } => "ARTIFACT_EDITED",
            Self::StepFinished { .. } => "STEP_FINISHED",
            Self::RunFinished { .. } => "RUN_FINISHED",
            Self::RunFailed { .. } => "RUN_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now;

    #[test]
    fn tag_names_match_wire_format() {
        let event = RunEvent::RunStarted {
            run_id: "r1".into(),
            workflow_id: "wf1".into(),
            timestamp: now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RUN_STARTED");
        assert_eq!(event.event_type(), "RUN_STARTED");
    }

    #[test]
    fn roundtrip() {
        let event = RunEvent::StepFinished {
            run_id: "r1".into(),
            step_id: "step-2".into(),
            status: RunStatus::Canceled,
            timestamp: now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: RunEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.run_id(), "r1");
    }
}
