//! Key event recorder
//!
//! Turns raw key-down/key-up signals into an ordered, append-only log of
//! [`KeyEvent`]s. The recorder knows nothing about the passage or the typed
//! buffer; it only tracks which keys are held and the timing between them.

use crate::types::{KeyEvent, Millis};
use std::collections::HashMap;

/// What the recorder did with a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new event was appended at this index
    Recorded(usize),
    /// Key-down for a key already held, dropped as auto-repeat
    Repeat,
    /// The open event at this index was closed
    Released(usize),
    /// Key-up with no matching held key
    Unmatched,
    /// Signal timestamp precedes what the log already holds
    OutOfOrder,
}

impl RecordOutcome {
    /// Whether a new event was appended
    pub fn is_recorded(&self) -> bool {
        matches!(self, RecordOutcome::Recorded(_))
    }
}

/// Single-writer keystroke log
#[derive(Debug, Clone)]
pub struct KeyEventRecorder {
    events: Vec<KeyEvent>,
    /// Held key -> index of its open event
    held: HashMap<String, usize>,
    suppress_auto_repeat: bool,
    total_lag: Millis,
}

impl Default for KeyEventRecorder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl KeyEventRecorder {
    pub fn new(suppress_auto_repeat: bool) -> Self {
        Self {
            events: Vec::new(),
            held: HashMap::new(),
            suppress_auto_repeat,
            total_lag: 0.0,
        }
    }

    /// Record a key press
    pub fn key_down(&mut self, key: &str, time: Millis) -> RecordOutcome {
        if !time.is_finite() {
            log::warn!("Key-down {:?} with non-finite time {}; dropped", key, time);
            return RecordOutcome::OutOfOrder;
        }

        if self.suppress_auto_repeat && self.held.contains_key(key) {
            log::trace!("Auto-repeat of {:?} at {}ms ignored", key, time);
            return RecordOutcome::Repeat;
        }

        let lag_time = match self.events.last() {
            Some(prev) if time < prev.press_time => {
                log::warn!(
                    "Key-down {:?} at {}ms precedes last press at {}ms; dropped",
                    key,
                    time,
                    prev.press_time
                );
                return RecordOutcome::OutOfOrder;
            }
            Some(prev) => time - prev.release_time.unwrap_or(prev.press_time),
            None => 0.0,
        };
        self.total_lag += lag_time;

        let index = self.events.len();
        self.events.push(KeyEvent {
            key: key.to_string(),
            press_time: time,
            release_time: None,
            hold_time: None,
            lag_time,
            total_lag_time: self.total_lag,
        });
        self.held.insert(key.to_string(), index);

        log::trace!("Recorded {:?} at {}ms (lag {}ms)", key, time, lag_time);
        RecordOutcome::Recorded(index)
    }

    /// Record a key release
    pub fn key_up(&mut self, key: &str, time: Millis) -> RecordOutcome {
        if !time.is_finite() {
            log::warn!("Key-up {:?} with non-finite time {}; dropped", key, time);
            return RecordOutcome::OutOfOrder;
        }

        let Some(held_key) = self.held_symbol(key) else {
            log::debug!("Key-up {:?} at {}ms without a held press", key, time);
            return RecordOutcome::Unmatched;
        };
        let index = self.held[&held_key];

        let event = &mut self.events[index];
        if time < event.press_time {
            log::warn!(
                "Key-up {:?} at {}ms precedes its press at {}ms; dropped",
                key,
                time,
                event.press_time
            );
            return RecordOutcome::OutOfOrder;
        }

        event.release(time);
        self.held.remove(&held_key);
        RecordOutcome::Released(index)
    }

    /// Held symbol a key-up for `key` closes.
    ///
    /// A single-character key may be released under its other-case symbol
    /// (Shift let go before the letter: down "A", up "a").
    fn held_symbol(&self, key: &str) -> Option<String> {
        if self.held.contains_key(key) {
            return Some(key.to_string());
        }

        let mut chars = key.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        let lower: String = c.to_lowercase().collect();
        let upper: String = c.to_uppercase().collect();
        [lower, upper]
            .into_iter()
            .find(|candidate| candidate != key && self.held.contains_key(candidate.as_str()))
    }

    /// Whether `key` is currently held
    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains_key(key)
    }

    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Hand back the complete log. Keys still held keep `hold_time = None`.
    pub fn finish(self) -> Vec<KeyEvent> {
        if !self.held.is_empty() {
            log::debug!("{} key(s) still held at finish", self.held.len());
        }
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_and_lag() {
        let mut recorder = KeyEventRecorder::default();

        assert_eq!(recorder.key_down("a", 0.0), RecordOutcome::Recorded(0));
        assert_eq!(recorder.key_up("a", 80.0), RecordOutcome::Released(0));
        assert_eq!(recorder.key_down("b", 200.0), RecordOutcome::Recorded(1));
        assert_eq!(recorder.key_up("b", 260.0), RecordOutcome::Released(1));

        let events = recorder.finish();
        assert_eq!(events[0].hold_time, Some(80.0));
        assert_eq!(events[0].lag_time, 0.0);
        assert_eq!(events[1].hold_time, Some(60.0));
        assert_eq!(events[1].lag_time, 120.0);
        assert_eq!(events[1].total_lag_time, 120.0);
    }

    #[test]
    fn test_lag_uses_press_when_previous_still_held() {
        let mut recorder = KeyEventRecorder::default();

        recorder.key_down("a", 0.0);
        recorder.key_down("b", 50.0);
        recorder.key_up("a", 90.0);
        recorder.key_up("b", 120.0);
        recorder.key_down("c", 150.0);

        let events = recorder.events();
        // b pressed while a was down: lag measured from a's press
        assert_eq!(events[1].lag_time, 50.0);
        // c follows b's release
        assert_eq!(events[2].lag_time, 30.0);
        assert_eq!(events[2].total_lag_time, 80.0);
        // Rollover still closes the right events
        assert_eq!(events[0].hold_time, Some(90.0));
        assert_eq!(events[1].hold_time, Some(70.0));
    }

    #[test]
    fn test_auto_repeat_suppressed() {
        let mut recorder = KeyEventRecorder::new(true);

        recorder.key_down("a", 0.0);
        assert_eq!(recorder.key_down("a", 30.0), RecordOutcome::Repeat);
        assert_eq!(recorder.key_down("a", 60.0), RecordOutcome::Repeat);
        recorder.key_up("a", 100.0);

        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.events()[0].hold_time, Some(100.0));

        // A fresh press after release opens a new event
        assert!(recorder.key_down("a", 150.0).is_recorded());
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_auto_repeat_recorded_when_not_suppressed() {
        let mut recorder = KeyEventRecorder::new(false);

        recorder.key_down("a", 0.0);
        recorder.key_down("a", 30.0);
        recorder.key_up("a", 50.0);

        let events = recorder.finish();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].hold_time, None);
        assert_eq!(events[1].hold_time, Some(20.0));
    }

    #[test]
    fn test_unmatched_and_out_of_order() {
        let mut recorder = KeyEventRecorder::default();

        assert_eq!(recorder.key_up("x", 10.0), RecordOutcome::Unmatched);

        recorder.key_down("a", 100.0);
        assert_eq!(recorder.key_down("b", 50.0), RecordOutcome::OutOfOrder);
        assert_eq!(recorder.key_up("a", 90.0), RecordOutcome::OutOfOrder);
        assert!(recorder.is_held("a"));
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_corrective_keys_are_logged() {
        let mut recorder = KeyEventRecorder::default();
        recorder.key_down("a", 0.0);
        recorder.key_up("a", 10.0);
        recorder.key_down("Backspace", 20.0);
        recorder.key_up("Backspace", 30.0);

        let keys: Vec<&str> = recorder.events().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "Backspace"]);
    }

    #[test]
    fn test_release_under_other_case_closes_event() {
        let mut recorder = KeyEventRecorder::default();

        // Shift let go before the letter: down "A", up "a"
        recorder.key_down("Shift", 0.0);
        recorder.key_down("A", 10.0);
        recorder.key_up("Shift", 20.0);
        assert_eq!(recorder.key_up("a", 30.0), RecordOutcome::Released(1));
        assert!(!recorder.is_held("A"));

        recorder.key_down("b", 100.0);
        recorder.key_up("b", 150.0);
        recorder.key_down("Shift", 200.0);
        assert_eq!(recorder.key_down("A", 210.0), RecordOutcome::Recorded(4));

        let events = recorder.finish();
        assert_eq!(events[1].hold_time, Some(20.0));
        let presses = events.iter().filter(|e| e.key == "A").count();
        assert_eq!(presses, 2);
    }

    #[test]
    fn test_other_case_release_prefers_exact_match() {
        let mut recorder = KeyEventRecorder::default();
        recorder.key_down("a", 0.0);
        recorder.key_down("A", 10.0);

        assert_eq!(recorder.key_up("A", 20.0), RecordOutcome::Released(1));
        assert!(recorder.is_held("a"));
        assert_eq!(recorder.key_up("A", 30.0), RecordOutcome::Released(0));
        assert_eq!(recorder.key_up("Shift", 40.0), RecordOutcome::Unmatched);
    }

    #[test]
    fn test_non_finite_times_dropped() {
        let mut recorder = KeyEventRecorder::default();
        recorder.key_down("a", 0.0);
        recorder.key_up("a", 50.0);

        assert_eq!(recorder.key_down("b", f64::NAN), RecordOutcome::OutOfOrder);
        assert_eq!(recorder.key_down("c", f64::INFINITY), RecordOutcome::OutOfOrder);
        recorder.key_down("d", 100.0);
        assert_eq!(recorder.key_up("d", f64::NAN), RecordOutcome::OutOfOrder);
        recorder.key_up("d", 130.0);

        let events = recorder.finish();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].lag_time, 50.0);
        assert_eq!(events[1].total_lag_time, 50.0);
        assert_eq!(events[1].hold_time, Some(30.0));
    }

    #[test]
    fn test_missing_release_keeps_null_hold() {
        let mut recorder = KeyEventRecorder::default();
        recorder.key_down("a", 0.0);

        let events = recorder.finish();
        assert_eq!(events[0].release_time, None);
        assert_eq!(events[0].hold_time, None);
    }
}
