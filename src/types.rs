//! Core data types
//!
//! This module defines the records that flow through the engine: the key event
//! log produced during capture, the alignment edit script, per-key and session
//! metrics, and the passage description supplied by the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Milliseconds on the caller's monotonic clock
pub type Millis = f64;

/// Lifecycle phase of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Armed, no key accepted yet
    Idle,
    /// At least one key accepted; buffer and log are live
    Capturing,
    /// Terminal, reached through submit
    Finalized,
    /// Terminal, reached through one of the reset variants
    Cancelled,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Capturing => "capturing",
            Phase::Finalized => "finalized",
            Phase::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finalized | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical keystroke with its timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key symbol as reported by the input surface (e.g. "a", "Backspace")
    pub key: String,
    /// Time the key went down
    pub press_time: Millis,
    /// Time the key came up, if a release was observed
    pub release_time: Option<Millis>,
    /// `release_time - press_time` when released
    pub hold_time: Option<Millis>,
    /// Gap since the previous key's release (or press, if it was still held)
    pub lag_time: Millis,
    /// Running sum of `lag_time` across the trial
    pub total_lag_time: Millis,
}

impl KeyEvent {
    /// Whether the key is still held (no release recorded)
    pub fn is_open(&self) -> bool {
        self.release_time.is_none()
    }

    /// Close the event with an observed release
    pub(crate) fn release(&mut self, at: Millis) {
        self.release_time = Some(at);
        self.hold_time = Some(at - self.press_time);
    }
}

/// Token granularity used by the alignment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Extended grapheme clusters
    Character,
    /// Whitespace-delimited words
    Word,
}

/// Kind of a single alignment step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Match,
    Insert,
    Delete,
    Substitute,
}

/// One step of an edit script.
///
/// "Source" is the target passage and "target" is the typed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Op {
    pub kind: OpKind,
    /// Passage token; absent for `Insert`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_token: Option<String>,
    /// Typed token; absent for `Delete`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_token: Option<String>,
    pub source_index: usize,
    pub target_index: usize,
}

/// Edit script for one granularity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub granularity: Granularity,
    pub ops: Vec<Op>,
    /// Number of non-match steps (the edit distance)
    pub distance: usize,
}

impl AlignmentResult {
    /// Count of steps of the given kind
    pub fn count(&self, kind: OpKind) -> usize {
        self.ops.iter().filter(|op| op.kind == kind).count()
    }

    /// Token count of the passage side
    pub fn source_len(&self) -> usize {
        self.ops.iter().filter(|op| op.source_token.is_some()).count()
    }

    /// Token count of the typed side
    pub fn target_len(&self) -> usize {
        self.ops.iter().filter(|op| op.target_token.is_some()).count()
    }

    /// Passage tokens in order, rebuilt from the script
    pub fn source_tokens(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| op.source_token.as_deref())
            .collect()
    }

    /// Typed tokens in order, rebuilt from the script
    pub fn target_tokens(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| op.target_token.as_deref())
            .collect()
    }
}

/// Timing statistics for one key symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerKeyStat {
    pub key: String,
    pub count: u32,
    pub mean_hold_time: Option<Millis>,
    pub mean_lag_time: Option<Millis>,
}

/// Session-level accuracy, throughput and timing aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Per typed key symbol, ordered by key
    pub per_key: BTreeMap<String, PerKeyStat>,
    /// matched characters / max(passage length, typed length)
    pub accuracy: f64,
    /// Same ratio over the word alignment
    pub word_accuracy: f64,
    /// Typed characters per second of elapsed time
    pub chars_per_second: f64,
    /// Words per minute using the five-character word
    pub wpm: f64,
    /// Last press minus trial start
    pub elapsed_ms: Millis,
    pub matched: u32,
    pub substituted: u32,
    pub inserted: u32,
    pub deleted: u32,
    pub total_keystrokes: u32,
    /// Backspace/Delete style keystrokes
    pub corrective_keystrokes: u32,
    pub mean_hold_time: Option<Millis>,
    pub mean_lag_time: Option<Millis>,
}

/// Caller-supplied description of the passage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub index: u32,
}

impl PassageMetadata {
    pub fn new(category: impl Into<String>, label: impl Into<String>, index: u32) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
            index,
        }
    }
}

/// A passage to type together with its metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl Passage {
    pub fn new(text: impl Into<String>, metadata: PassageMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// Which terminal transition produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishEvent {
    Submit,
    ResetTyping,
    ResetTextAndTyping,
}

impl FinishEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishEvent::Submit => "submit",
            FinishEvent::ResetTyping => "reset-typing",
            FinishEvent::ResetTextAndTyping => "reset-text-and-typing",
        }
    }

    /// Phase a trial lands in after this event
    pub fn terminal_phase(&self) -> Phase {
        match self {
            FinishEvent::Submit => Phase::Finalized,
            FinishEvent::ResetTyping | FinishEvent::ResetTextAndTyping => Phase::Cancelled,
        }
    }

    /// Reset variants are recorded as practice attempts
    pub fn is_practice(&self) -> bool {
        !matches!(self, FinishEvent::Submit)
    }
}

impl fmt::Display for FinishEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
