//! Metrics aggregation
//!
//! Reduces a finished key event log and its alignment results to per-key timing
//! statistics and session accuracy/throughput figures. Pure: the same inputs
//! always give the same metrics.

use crate::types::{AlignmentResult, KeyEvent, Millis, OpKind, PerKeyStat, SessionMetrics};
use std::collections::BTreeMap;

/// Characters per word for words-per-minute
const CHARS_PER_WORD: f64 = 5.0;

/// Corrective keys used when the caller does not supply its own list
pub const DEFAULT_CORRECTIVE_KEYS: [&str; 2] = ["Backspace", "Delete"];

/// Metrics aggregator for finished trials
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Aggregate with the default corrective key set
    pub fn aggregate(
        events: &[KeyEvent],
        characters: &AlignmentResult,
        words: &AlignmentResult,
        started_at: Option<Millis>,
    ) -> SessionMetrics {
        Self::aggregate_with(events, characters, words, started_at, |key| {
            DEFAULT_CORRECTIVE_KEYS.contains(&key)
        })
    }

    /// Aggregate with a caller-defined corrective key predicate
    pub fn aggregate_with(
        events: &[KeyEvent],
        characters: &AlignmentResult,
        words: &AlignmentResult,
        started_at: Option<Millis>,
        is_corrective: impl Fn(&str) -> bool,
    ) -> SessionMetrics {
        let per_key = compute_per_key(events);

        let matched = characters.count(OpKind::Match);
        let typed_len = characters.target_len();
        let accuracy = compute_accuracy(matched, characters.source_len(), typed_len);
        let word_accuracy = compute_accuracy(
            words.count(OpKind::Match),
            words.source_len(),
            words.target_len(),
        );

        let elapsed_ms = compute_elapsed(events, started_at);
        let chars_per_second = compute_chars_per_second(typed_len, elapsed_ms);
        let wpm = compute_wpm(typed_len, elapsed_ms);

        let corrective_keystrokes = events
            .iter()
            .filter(|e| is_corrective(e.key.as_str()))
            .count();

        SessionMetrics {
            per_key,
            accuracy,
            word_accuracy,
            chars_per_second,
            wpm,
            elapsed_ms,
            matched: matched as u32,
            substituted: characters.count(OpKind::Substitute) as u32,
            inserted: characters.count(OpKind::Insert) as u32,
            deleted: characters.count(OpKind::Delete) as u32,
            total_keystrokes: events.len() as u32,
            corrective_keystrokes: corrective_keystrokes as u32,
            mean_hold_time: mean(events.iter().filter_map(|e| e.hold_time)),
            mean_lag_time: mean(events.iter().map(|e| e.lag_time)),
        }
    }
}

/// Per-key counts and mean timings, keyed by the typed key symbol
fn compute_per_key(events: &[KeyEvent]) -> BTreeMap<String, PerKeyStat> {
    let mut grouped: BTreeMap<&str, Vec<&KeyEvent>> = BTreeMap::new();
    for event in events {
        grouped.entry(event.key.as_str()).or_default().push(event);
    }

    grouped
        .into_iter()
        .map(|(key, events)| {
            let stat = PerKeyStat {
                key: key.to_string(),
                count: events.len() as u32,
                mean_hold_time: mean(events.iter().filter_map(|e| e.hold_time)),
                mean_lag_time: mean(events.iter().map(|e| e.lag_time)),
            };
            (key.to_string(), stat)
        })
        .collect()
}

/// Arithmetic mean, `None` for an empty sequence
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Formula: `matched / max(passage_len, typed_len)`
///
/// Two empty sides are a perfect (vacuous) match.
fn compute_accuracy(matched: usize, source_len: usize, target_len: usize) -> f64 {
    let denominator = source_len.max(target_len);
    if denominator == 0 {
        return 1.0;
    }
    matched as f64 / denominator as f64
}

/// Last press minus trial start; zero when nothing was captured
fn compute_elapsed(events: &[KeyEvent], started_at: Option<Millis>) -> Millis {
    match (started_at, events.last()) {
        (Some(start), Some(last)) => (last.press_time - start).max(0.0),
        _ => 0.0,
    }
}

fn compute_chars_per_second(typed_len: usize, elapsed_ms: Millis) -> f64 {
    if elapsed_ms <= 0.0 {
        return 0.0;
    }
    typed_len as f64 / (elapsed_ms / 1000.0)
}

/// Formula: `(typed_len / 5) / minutes`
fn compute_wpm(typed_len: usize, elapsed_ms: Millis) -> f64 {
    if elapsed_ms <= 0.0 {
        return 0.0;
    }
    (typed_len as f64 / CHARS_PER_WORD) / (elapsed_ms / 60_000.0)
}
