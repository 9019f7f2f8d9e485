//! Trial state machine
//!
//! A [`Trial`] owns the target passage, the typed buffer, the key event log and
//! the lifecycle phase:
//!
//! ```text
//! Idle --first accepted key--> Capturing --submit--> Finalized
//!   |                              |
//!   +------------------------------+--reset-typing / reset-text-and-typing--> Cancelled
//! ```
//!
//! Key handling only records and edits. Alignment and metrics run once, at the
//! terminal transition, over whatever was captured.

use crate::alignment::AlignmentEngine;
use crate::condition::TrialContext;
use crate::config::EngineConfig;
use crate::error::TrialError;
use crate::metrics::MetricsAggregator;
use crate::recorder::{KeyEventRecorder, RecordOutcome};
use crate::snapshot::{SnapshotExporter, TrialRecord, TrialSnapshot};
use crate::types::{FinishEvent, KeyEvent, Millis, Passage, PassageMetadata, Phase};
use chrono::{DateTime, Utc};

/// Result of feeding a key signal to a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// First accepted key: the trial moved from Idle to Capturing
    Began,
    /// Key-down appended to the log
    Recorded,
    /// Key-up closed an open event
    Released,
    /// Auto-repeat key-down, dropped
    Repeat,
    /// Signal had no effect (terminal phase, unmatched or out of order)
    Ignored,
}

/// Effect of a key on the typed buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEdit {
    Insert(String),
    DeleteBackward,
    DeleteForward,
    CursorLeft,
    CursorRight,
    CursorHome,
    CursorEnd,
    None,
}

/// Map a key symbol to its buffer effect
pub fn classify_key(key: &str, config: &EngineConfig) -> BufferEdit {
    let mut chars = key.chars();
    if let (Some(_), None) = (chars.next(), chars.next()) {
        return BufferEdit::Insert(key.to_string());
    }

    match key {
        "Backspace" => BufferEdit::DeleteBackward,
        "Delete" => BufferEdit::DeleteForward,
        "ArrowLeft" => BufferEdit::CursorLeft,
        "ArrowRight" => BufferEdit::CursorRight,
        "Home" => BufferEdit::CursorHome,
        "End" => BufferEdit::CursorEnd,
        "Enter" if config.enter_inserts_newline => BufferEdit::Insert("\n".to_string()),
        "Tab" if config.tab_inserts_tab => BufferEdit::Insert("\t".to_string()),
        _ => BufferEdit::None,
    }
}

/// One attempt at typing a passage
#[derive(Debug, Clone)]
pub struct Trial {
    passage: Passage,
    phase: Phase,
    recorder: KeyEventRecorder,
    /// Typed buffer, one entry per inserted key
    buffer: Vec<String>,
    cursor: usize,
    started_at: Option<Millis>,
    started_at_utc: Option<DateTime<Utc>>,
    context: Option<TrialContext>,
    config: EngineConfig,
}

impl Trial {
    pub fn new(passage: Passage, config: EngineConfig) -> Self {
        Self {
            passage,
            phase: Phase::Idle,
            recorder: KeyEventRecorder::new(config.suppress_auto_repeat),
            buffer: Vec::new(),
            cursor: 0,
            started_at: None,
            started_at_utc: None,
            context: None,
            config,
        }
    }

    /// Fresh Idle trial over the same passage and configuration
    pub fn rearm(&self) -> Self {
        Self::new(self.passage.clone(), self.config.clone())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn passage(&self) -> &Passage {
        &self.passage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current contents of the typed buffer
    pub fn typed_text(&self) -> String {
        self.buffer.concat()
    }

    /// Cursor position in buffer entries
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Complete keystroke history, including corrective keys
    pub fn events(&self) -> &[KeyEvent] {
        self.recorder.events()
    }

    pub fn started_at(&self) -> Option<Millis> {
        self.started_at
    }

    pub fn context(&self) -> Option<&TrialContext> {
        self.context.as_ref()
    }

    /// Replace the passage before any key is accepted
    pub fn set_target_passage(
        &mut self,
        text: impl Into<String>,
        metadata: PassageMetadata,
    ) -> Result<(), TrialError> {
        if self.phase != Phase::Idle {
            return Err(TrialError::PassageLocked { phase: self.phase });
        }
        self.passage = Passage::new(text, metadata);
        Ok(())
    }

    /// Feed a key press.
    ///
    /// `context` is the caller's ambient context at the time of the press; it is
    /// captured only by the key that begins the trial.
    pub fn key_down(&mut self, key: &str, time: Millis, context: &TrialContext) -> KeyOutcome {
        if self.phase.is_terminal() {
            log::debug!("Key-down {:?} ignored: trial {}", key, self.phase);
            return KeyOutcome::Ignored;
        }

        match self.recorder.key_down(key, time) {
            RecordOutcome::Recorded(_) => {}
            RecordOutcome::Repeat => return KeyOutcome::Repeat,
            _ => return KeyOutcome::Ignored,
        }

        let outcome = if self.phase == Phase::Idle {
            self.begin(time, context);
            KeyOutcome::Began
        } else {
            KeyOutcome::Recorded
        };

        let edit = classify_key(key, &self.config);
        self.apply_edit(edit);
        outcome
    }

    /// Feed a key release
    pub fn key_up(&mut self, key: &str, time: Millis) -> KeyOutcome {
        if self.phase != Phase::Capturing {
            log::debug!("Key-up {:?} ignored: trial {}", key, self.phase);
            return KeyOutcome::Ignored;
        }

        match self.recorder.key_up(key, time) {
            RecordOutcome::Released(_) => KeyOutcome::Released,
            _ => KeyOutcome::Ignored,
        }
    }

    /// Empty the typed buffer; the event log is kept
    pub fn clear_typed(&mut self) {
        if self.phase != Phase::Capturing {
            return;
        }
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Finalize the trial and export it
    pub fn submit(
        &mut self,
        at: Millis,
        exporter: &SnapshotExporter,
    ) -> Result<TrialSnapshot, TrialError> {
        self.finish(FinishEvent::Submit, at, exporter)
    }

    /// Cancel, keeping the passage for a retry; the attempt is still exported
    pub fn reset_typing(
        &mut self,
        at: Millis,
        exporter: &SnapshotExporter,
    ) -> Result<TrialSnapshot, TrialError> {
        self.finish(FinishEvent::ResetTyping, at, exporter)
    }

    /// Cancel and request a new passage; the attempt is still exported
    pub fn reset_text_and_typing(
        &mut self,
        at: Millis,
        exporter: &SnapshotExporter,
    ) -> Result<TrialSnapshot, TrialError> {
        self.finish(FinishEvent::ResetTextAndTyping, at, exporter)
    }

    /// Run the terminal transition for `event`.
    ///
    /// Exactly one snapshot per trial: a terminal trial returns
    /// [`TrialError::AlreadyTerminal`] and exports nothing.
    pub fn finish(
        &mut self,
        event: FinishEvent,
        at: Millis,
        exporter: &SnapshotExporter,
    ) -> Result<TrialSnapshot, TrialError> {
        if self.phase.is_terminal() {
            log::debug!("{} on a {} trial rejected", event, self.phase);
            return Err(TrialError::AlreadyTerminal { phase: self.phase });
        }

        let from = self.phase;
        self.phase = event.terminal_phase();
        log::debug!("Trial {} -> {} via {}", from, self.phase, event);

        let typed_text = self.typed_text();
        let events = self.recorder.events().to_vec();
        let (characters, words) = AlignmentEngine::align_both(
            &self.passage.text,
            &typed_text,
            self.config.max_tokens_warning,
        );
        let config = &self.config;
        let metrics = MetricsAggregator::aggregate_with(
            &events,
            &characters,
            &words,
            self.started_at,
            |key| config.is_corrective(key),
        );

        let record = TrialRecord {
            passage: self.passage.clone(),
            typed_text,
            events,
            started_at: self.started_at,
            started_at_utc: self.started_at_utc,
            finished_at: Some(at),
            context: self.context.clone(),
        };

        if event.is_practice() {
            self.buffer.clear();
            self.cursor = 0;
        }

        Ok(exporter.export(record, event, characters, words, metrics))
    }

    fn begin(&mut self, time: Millis, context: &TrialContext) {
        self.phase = Phase::Capturing;
        self.started_at = Some(time);
        self.started_at_utc = Some(Utc::now());
        self.context = Some(context.clone());
        log::debug!(
            "Trial began at {}ms under {} condition",
            time,
            context.condition.kind()
        );
    }

    fn apply_edit(&mut self, edit: BufferEdit) {
        match edit {
            BufferEdit::Insert(text) => {
                self.buffer.insert(self.cursor, text);
                self.cursor += 1;
            }
            BufferEdit::DeleteBackward => {
                if self.cursor > 0 {
                    self.buffer.remove(self.cursor - 1);
                    self.cursor -= 1;
                }
            }
            BufferEdit::DeleteForward => {
                if self.cursor < self.buffer.len() {
                    self.buffer.remove(self.cursor);
                }
            }
            BufferEdit::CursorLeft => self.cursor = self.cursor.saturating_sub(1),
            BufferEdit::CursorRight => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            BufferEdit::CursorHome => self.cursor = 0,
            BufferEdit::CursorEnd => self.cursor = self.buffer.len(),
            BufferEdit::None => {}
        }
    }
}
