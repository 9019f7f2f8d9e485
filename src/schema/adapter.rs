//! Adapter for loading and replaying keytrial.script.v1 documents
//!
//! Scripts are fed step by step through a [`TrialSession`]; the snapshots it
//! exports are collected in order.

use crate::config::EngineConfig;
use crate::error::TrialError;
use crate::pipeline::{PassageQueue, TrialSession};
use crate::schema::script::*;
use crate::snapshot::{SnapshotExporter, TrialSnapshot};
use crate::types::Phase;

/// Adapter for parsing, validating and replaying scripts
pub struct ScriptAdapter;

impl ScriptAdapter {
    /// Parse a JSON string containing one script
    pub fn parse(json: &str) -> Result<TrialScript, TrialError> {
        let script: TrialScript = serde_json::from_str(json)?;
        Ok(script)
    }

    /// Parse NDJSON (newline-delimited JSON) containing one script per line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<TrialScript>, TrialError> {
        let mut scripts = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<TrialScript>(trimmed) {
                Ok(script) => scripts.push(script),
                Err(e) => {
                    return Err(TrialError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(scripts)
    }

    /// Validate a script, returning every issue found
    pub fn validate(script: &TrialScript) -> Vec<ValidationError> {
        script.issues()
    }

    /// Replay a script with a fresh exporter
    pub fn run(
        script: &TrialScript,
        config: &EngineConfig,
    ) -> Result<Vec<TrialSnapshot>, TrialError> {
        Self::run_with_exporter(script, config, SnapshotExporter::new())
    }

    /// Replay a script, stamping snapshots with `exporter`'s instance ID.
    ///
    /// Lifecycle commands the engine rejects (a second submit, a passage change
    /// after capture began) are logged and skipped, as a live front end would
    /// have seen them fail.
    pub fn run_with_exporter(
        script: &TrialScript,
        config: &EngineConfig,
        exporter: SnapshotExporter,
    ) -> Result<Vec<TrialSnapshot>, TrialError> {
        config.validate()?;
        script
            .validate()
            .map_err(|e| TrialError::InvalidScript(e.to_string()))?;

        let mut session = TrialSession::new(
            script.passage.text.clone(),
            script.passage.metadata.clone(),
            Vec::<TrialSnapshot>::new(),
            PassageQueue::new(script.next_passages.iter().cloned()),
            config.clone(),
        )
        .with_exporter(exporter);
        let mut context = script.context.clone();

        for (index, step) in script.steps.iter().enumerate() {
            let result = match step {
                ScriptStep::KeyDown { key, time_ms } => {
                    session.key_down(key, *time_ms, &context);
                    Ok(())
                }
                ScriptStep::KeyUp { key, time_ms } => {
                    session.key_up(key, *time_ms);
                    Ok(())
                }
                ScriptStep::Clear => {
                    session.clear_typed();
                    Ok(())
                }
                ScriptStep::SetPassage { passage } => {
                    session.set_target_passage(passage.text.clone(), passage.metadata.clone())
                }
                ScriptStep::Submit { time_ms } => session.submit(*time_ms),
                ScriptStep::ResetTyping { time_ms } => session.reset_typing(*time_ms),
                ScriptStep::ResetTextAndTyping { time_ms } => {
                    session.reset_text_and_typing(*time_ms)
                }
                ScriptStep::Rearm => session.rearm(),
                ScriptStep::SetContext { context: next } => {
                    context = next.clone();
                    Ok(())
                }
            };

            if let Err(e) = result {
                log::warn!("Step {} ({}) skipped: {}", index, step.type_name(), e);
            }
        }

        if session.phase() == Phase::Capturing {
            log::debug!("Script ended with an unfinished trial; nothing exported for it");
        }

        Ok(session.into_observer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionKind;
    use crate::types::{FinishEvent, OpKind};
    use pretty_assertions::assert_eq;

    fn create_test_script() -> &'static str {
        r#"{
            "schema_version": "keytrial.script.v1",
            "passage": {"text": "cat", "metadata": {"category": "animals", "label": "a", "index": 0}},
            "next_passages": [{"text": "dog", "metadata": {"category": "animals", "label": "b", "index": 1}}],
            "context": {"condition": {"kind": "particles"}},
            "steps": [
                {"type": "key_down", "key": "c", "time_ms": 0},
                {"type": "key_up", "key": "c", "time_ms": 80},
                {"type": "key_down", "key": "o", "time_ms": 200},
                {"type": "key_up", "key": "o", "time_ms": 260},
                {"type": "key_down", "key": "Backspace", "time_ms": 400},
                {"type": "key_up", "key": "Backspace", "time_ms": 450},
                {"type": "key_down", "key": "a", "time_ms": 500},
                {"type": "key_up", "key": "a", "time_ms": 560},
                {"type": "key_down", "key": "t", "time_ms": 700},
                {"type": "key_up", "key": "t", "time_ms": 760},
                {"type": "submit", "time_ms": 900},
                {"type": "submit", "time_ms": 950},
                {"type": "rearm"},
                {"type": "set_context", "context": {"condition": {"kind": "waves"}}},
                {"type": "key_down", "key": "x", "time_ms": 1000},
                {"type": "reset_text_and_typing", "time_ms": 1100},
                {"type": "rearm"},
                {"type": "key_down", "key": "d", "time_ms": 1200},
                {"type": "reset_typing", "time_ms": 1300}
            ]
        }"#
    }

    #[test]
    fn test_run_script() {
        let script = ScriptAdapter::parse(create_test_script()).unwrap();
        let snapshots = ScriptAdapter::run(&script, &EngineConfig::default()).unwrap();

        assert_eq!(snapshots.len(), 3);

        let first = &snapshots[0];
        assert_eq!(first.event(), FinishEvent::Submit);
        assert_eq!(first.typed_text(), "cat");
        assert_eq!(first.events().len(), 5);
        assert_eq!(first.metrics().accuracy, 1.0);
        assert_eq!(first.metrics().corrective_keystrokes, 1);
        assert_eq!(first.events()[1].lag_time, 120.0);
        assert_eq!(
            first.context().map(|c| c.condition.kind()),
            Some(ConditionKind::Particles)
        );

        let second = &snapshots[1];
        assert_eq!(second.event(), FinishEvent::ResetTextAndTyping);
        assert_eq!(second.target_text(), "cat");
        assert_eq!(
            second.context().map(|c| c.condition.kind()),
            Some(ConditionKind::Waves)
        );

        let third = &snapshots[2];
        assert_eq!(third.target_text(), "dog");
        assert_eq!(third.character_alignment().count(OpKind::Match), 1);
    }

    #[test]
    fn test_run_rejects_invalid_script() {
        let mut script = ScriptAdapter::parse(create_test_script()).unwrap();
        script.steps.clear();

        let result = ScriptAdapter::run(&script, &EngineConfig::default());
        assert!(matches!(result, Err(TrialError::InvalidScript(_))));
    }

    #[test]
    fn test_run_with_instance_id() {
        let script = ScriptAdapter::parse(create_test_script()).unwrap();
        let exporter = SnapshotExporter::with_instance_id("replay-1".to_string());
        let snapshots =
            ScriptAdapter::run_with_exporter(&script, &EngineConfig::default(), exporter).unwrap();

        assert!(snapshots
            .iter()
            .all(|s| s.producer().instance_id == "replay-1"));
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"{"schema_version":"keytrial.script.v1","passage":{"text":"a"},"steps":[{"type":"key_down","key":"a","time_ms":0},{"type":"submit","time_ms":10}]}

{"schema_version":"keytrial.script.v1","passage":{"text":"b"},"steps":[{"type":"submit","time_ms":0}]}"#;

        let scripts = ScriptAdapter::parse_ndjson(ndjson).unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[1].passage.text, "b");
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"schema_version\":\"keytrial.script.v1\",\"passage\":{\"text\":\"a\"},\"steps\":[]}\nnot json";
        let err = ScriptAdapter::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_validate_script() {
        let script = ScriptAdapter::parse(create_test_script()).unwrap();
        assert!(ScriptAdapter::validate(&script).is_empty());
    }
}
