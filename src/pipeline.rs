//! Session orchestration
//!
//! This module provides the public API for driving trials. A [`TrialSession`]
//! owns the current [`Trial`], forwards key signals to it, runs the terminal
//! transitions and hands every snapshot to a caller-supplied [`TrialObserver`].

use crate::condition::TrialContext;
use crate::config::EngineConfig;
use crate::error::TrialError;
use crate::schema::ScriptAdapter;
use crate::snapshot::{SnapshotExporter, TrialSnapshot};
use crate::trial::{KeyOutcome, Trial};
use crate::types::{FinishEvent, Millis, Passage, PassageMetadata, Phase};
use std::collections::VecDeque;

/// Receives the outbound notifications of a session
pub trait TrialObserver {
    /// Called once per trial, when its first key is accepted
    fn on_trial_begun(&mut self, _context: &TrialContext) {}

    /// Called once per terminal transition with the exported snapshot
    fn on_trial_finished(&mut self, snapshot: TrialSnapshot);
}

/// Collects snapshots in export order
impl TrialObserver for Vec<TrialSnapshot> {
    fn on_trial_finished(&mut self, snapshot: TrialSnapshot) {
        self.push(snapshot);
    }
}

/// Supplies the passage for the trial after a reset-text-and-typing
pub trait PassageSource {
    fn next_passage(&mut self) -> Option<Passage>;
}

/// Passages handed out in order
#[derive(Debug, Clone, Default)]
pub struct PassageQueue {
    passages: VecDeque<Passage>,
}

impl PassageQueue {
    pub fn new(passages: impl IntoIterator<Item = Passage>) -> Self {
        Self {
            passages: passages.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.passages.len()
    }
}

impl PassageSource for PassageQueue {
    fn next_passage(&mut self) -> Option<Passage> {
        self.passages.pop_front()
    }
}

/// Stateful driver for consecutive trials
pub struct TrialSession<O: TrialObserver, P: PassageSource> {
    trial: Trial,
    /// Passage chosen by the last reset-text-and-typing, used by the next rearm
    pending_passage: Option<Passage>,
    observer: O,
    passages: P,
    exporter: SnapshotExporter,
    config: EngineConfig,
}

impl<O: TrialObserver, P: PassageSource> TrialSession<O, P> {
    /// Create a session whose first trial targets `passage`
    pub fn new(
        passage: impl Into<String>,
        metadata: PassageMetadata,
        observer: O,
        passages: P,
        config: EngineConfig,
    ) -> Self {
        Self {
            trial: Trial::new(Passage::new(passage, metadata), config.clone()),
            pending_passage: None,
            observer,
            passages,
            exporter: SnapshotExporter::new(),
            config,
        }
    }

    /// Use a specific exporter (e.g. with a fixed instance ID)
    pub fn with_exporter(mut self, exporter: SnapshotExporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn trial(&self) -> &Trial {
        &self.trial
    }

    pub fn phase(&self) -> Phase {
        self.trial.phase()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn exporter(&self) -> &SnapshotExporter {
        &self.exporter
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Consume the session and return its observer
    pub fn into_observer(self) -> O {
        self.observer
    }

    pub fn key_down(&mut self, key: &str, time: Millis, context: &TrialContext) -> KeyOutcome {
        let outcome = self.trial.key_down(key, time, context);
        if outcome == KeyOutcome::Began {
            self.observer.on_trial_begun(context);
        }
        outcome
    }

    pub fn key_up(&mut self, key: &str, time: Millis) -> KeyOutcome {
        self.trial.key_up(key, time)
    }

    pub fn clear_typed(&mut self) {
        self.trial.clear_typed();
    }

    pub fn set_target_passage(
        &mut self,
        text: impl Into<String>,
        metadata: PassageMetadata,
    ) -> Result<(), TrialError> {
        self.trial.set_target_passage(text, metadata)
    }

    pub fn submit(&mut self, at: Millis) -> Result<(), TrialError> {
        self.finish(FinishEvent::Submit, at)
    }

    pub fn reset_typing(&mut self, at: Millis) -> Result<(), TrialError> {
        self.finish(FinishEvent::ResetTyping, at)
    }

    pub fn reset_text_and_typing(&mut self, at: Millis) -> Result<(), TrialError> {
        self.finish(FinishEvent::ResetTextAndTyping, at)
    }

    /// Start a fresh Idle trial on the pending passage, or the current one
    pub fn rearm(&mut self) -> Result<(), TrialError> {
        if self.trial.phase() == Phase::Capturing {
            return Err(TrialError::TrialInProgress {
                phase: self.trial.phase(),
            });
        }

        self.trial = match self.pending_passage.take() {
            Some(passage) => Trial::new(passage, self.config.clone()),
            None => self.trial.rearm(),
        };
        log::debug!(
            "Session re-armed on passage {:?}",
            self.trial.passage().metadata.label
        );
        Ok(())
    }

    fn finish(&mut self, event: FinishEvent, at: Millis) -> Result<(), TrialError> {
        let snapshot = self.trial.finish(event, at, &self.exporter)?;

        if event == FinishEvent::ResetTextAndTyping {
            self.pending_passage = self.passages.next_passage();
            if self.pending_passage.is_none() {
                log::debug!("No next passage available; keeping the current one");
            }
        }

        self.observer.on_trial_finished(snapshot);

        if self.config.auto_rearm {
            self.rearm()?;
        }
        Ok(())
    }
}

/// Replay a `keytrial.script.v1` JSON document and encode each snapshot.
///
/// # Returns
/// One JSON document per exported snapshot, in export order
///
/// # Example
/// ```ignore
/// let snapshots = replay_to_json(script_json, &EngineConfig::default())?;
/// ```
pub fn replay_to_json(script_json: &str, config: &EngineConfig) -> Result<Vec<String>, TrialError> {
    let script = ScriptAdapter::parse(script_json)?;
    let snapshots = ScriptAdapter::run(&script, config)?;

    snapshots
        .iter()
        .map(|snapshot| serde_json::to_string(snapshot).map_err(TrialError::JsonError))
        .collect()
}
