//! Trial snapshot export
//!
//! Assembles the finished trial, both alignment results and the session
//! metrics into one immutable [`TrialSnapshot`]. Export performs no I/O; the
//! snapshot is handed to the caller, which decides where and how to persist it.

use crate::condition::TrialContext;
use crate::error::TrialError;
use crate::types::{
    AlignmentResult, FinishEvent, KeyEvent, Millis, Passage, PassageMetadata, SessionMetrics,
};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot schema identifier
pub const SNAPSHOT_VERSION: &str = "keytrial.snapshot.v1";

/// Who produced a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Finalized fields of a trial, ready for export
#[derive(Debug, Clone)]
pub struct TrialRecord {
    pub passage: Passage,
    pub typed_text: String,
    pub events: Vec<KeyEvent>,
    pub started_at: Option<Millis>,
    pub started_at_utc: Option<DateTime<Utc>>,
    pub finished_at: Option<Millis>,
    pub context: Option<TrialContext>,
}

/// Immutable record of one terminal transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSnapshot {
    schema_version: String,
    snapshot_id: String,
    producer: SnapshotProducer,
    event: FinishEvent,
    practice: bool,
    exported_at_utc: String,
    passage: PassageMetadata,
    target_text: String,
    typed_text: String,
    started_at: Option<Millis>,
    started_at_utc: Option<String>,
    finished_at: Option<Millis>,
    context: Option<TrialContext>,
    events: Vec<KeyEvent>,
    character_alignment: AlignmentResult,
    word_alignment: AlignmentResult,
    metrics: SessionMetrics,
}

impl TrialSnapshot {
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn producer(&self) -> &SnapshotProducer {
        &self.producer
    }

    pub fn event(&self) -> FinishEvent {
        self.event
    }

    /// True for snapshots produced by a reset variant
    pub fn is_practice(&self) -> bool {
        self.practice
    }

    pub fn exported_at_utc(&self) -> &str {
        &self.exported_at_utc
    }

    pub fn passage(&self) -> &PassageMetadata {
        &self.passage
    }

    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    pub fn typed_text(&self) -> &str {
        &self.typed_text
    }

    pub fn started_at(&self) -> Option<Millis> {
        self.started_at
    }

    pub fn started_at_utc(&self) -> Option<&str> {
        self.started_at_utc.as_deref()
    }

    pub fn finished_at(&self) -> Option<Millis> {
        self.finished_at
    }

    /// Context captured when the first key landed
    pub fn context(&self) -> Option<&TrialContext> {
        self.context.as_ref()
    }

    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    pub fn character_alignment(&self) -> &AlignmentResult {
        &self.character_alignment
    }

    pub fn word_alignment(&self) -> &AlignmentResult {
        &self.word_alignment
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }
}

/// Snapshot exporter
pub struct SnapshotExporter {
    instance_id: String,
}

impl Default for SnapshotExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotExporter {
    /// Create a new exporter with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an exporter with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Assemble a snapshot from a finished trial and its analysis
    pub fn export(
        &self,
        record: TrialRecord,
        event: FinishEvent,
        character_alignment: AlignmentResult,
        word_alignment: AlignmentResult,
        metrics: SessionMetrics,
    ) -> TrialSnapshot {
        let snapshot = TrialSnapshot {
            schema_version: SNAPSHOT_VERSION.to_string(),
            snapshot_id: Uuid::new_v4().to_string(),
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            event,
            practice: event.is_practice(),
            exported_at_utc: Utc::now().to_rfc3339(),
            passage: record.passage.metadata,
            target_text: record.passage.text,
            typed_text: record.typed_text,
            started_at: record.started_at,
            started_at_utc: record.started_at_utc.map(|t| t.to_rfc3339()),
            finished_at: record.finished_at,
            context: record.context,
            events: record.events,
            character_alignment,
            word_alignment,
            metrics,
        };

        log::info!(
            "Exported {} snapshot {} ({} events, accuracy {:.3})",
            snapshot.event,
            snapshot.snapshot_id,
            snapshot.events.len(),
            snapshot.metrics.accuracy
        );
        snapshot
    }

    /// Encode a snapshot to pretty JSON
    pub fn to_json(snapshot: &TrialSnapshot) -> Result<String, TrialError> {
        serde_json::to_string_pretty(snapshot).map_err(TrialError::JsonError)
    }
}
