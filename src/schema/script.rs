//! keytrial.script.v1 schema definition
//!
//! A replay script is a recorded (or hand-written) sequence of key signals and
//! lifecycle commands against a passage. Replaying it through a session yields
//! the same snapshots a live front end would have produced.

use crate::condition::TrialContext;
use crate::types::{Millis, Passage};
use serde::{Deserialize, Serialize};

/// Current script schema version
pub const SCRIPT_VERSION: &str = "keytrial.script.v1";

/// One replayable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    KeyDown {
        key: String,
        time_ms: Millis,
    },
    KeyUp {
        key: String,
        time_ms: Millis,
    },
    /// Empty the typed buffer
    Clear,
    /// Replace the target passage (only valid before the first key)
    SetPassage {
        passage: Passage,
    },
    Submit {
        time_ms: Millis,
    },
    ResetTyping {
        time_ms: Millis,
    },
    ResetTextAndTyping {
        time_ms: Millis,
    },
    /// Start the next trial
    Rearm,
    /// Switch the ambient context used for subsequent key-downs
    SetContext {
        context: TrialContext,
    },
}

impl ScriptStep {
    /// Step timestamp, if the step carries one
    pub fn time_ms(&self) -> Option<Millis> {
        match self {
            ScriptStep::KeyDown { time_ms, .. }
            | ScriptStep::KeyUp { time_ms, .. }
            | ScriptStep::Submit { time_ms }
            | ScriptStep::ResetTyping { time_ms }
            | ScriptStep::ResetTextAndTyping { time_ms } => Some(*time_ms),
            ScriptStep::Clear
            | ScriptStep::SetPassage { .. }
            | ScriptStep::Rearm
            | ScriptStep::SetContext { .. } => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptStep::KeyDown { .. } => "key_down",
            ScriptStep::KeyUp { .. } => "key_up",
            ScriptStep::Clear => "clear",
            ScriptStep::SetPassage { .. } => "set_passage",
            ScriptStep::Submit { .. } => "submit",
            ScriptStep::ResetTyping { .. } => "reset_typing",
            ScriptStep::ResetTextAndTyping { .. } => "reset_text_and_typing",
            ScriptStep::Rearm => "rearm",
            ScriptStep::SetContext { .. } => "set_context",
        }
    }
}

/// A complete replay script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialScript {
    /// Schema version (must be "keytrial.script.v1")
    pub schema_version: String,

    /// Passage of the first trial
    pub passage: Passage,

    /// Passages handed out by reset-text-and-typing, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_passages: Vec<Passage>,

    /// Context in effect until a `set_context` step
    #[serde(default)]
    pub context: TrialContext,

    pub steps: Vec<ScriptStep>,
}

impl TrialScript {
    /// Create a script for `passage` with no steps
    pub fn new(passage: Passage) -> Self {
        Self {
            schema_version: SCRIPT_VERSION.to_string(),
            passage,
            next_passages: Vec::new(),
            context: TrialContext::default(),
            steps: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: TrialContext) -> Self {
        self.context = context;
        self
    }

    pub fn push(&mut self, step: ScriptStep) {
        self.steps.push(step);
    }

    /// First problem found, if any
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.issues().into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(()),
        }
    }

    /// Every problem found, in step order
    pub fn issues(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();

        if self.schema_version != SCRIPT_VERSION {
            issues.push(ValidationError::InvalidSchemaVersion {
                expected: SCRIPT_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if self.steps.is_empty() {
            issues.push(ValidationError::EmptySteps);
        }

        let mut previous: Option<Millis> = None;
        for (index, step) in self.steps.iter().enumerate() {
            let Some(time_ms) = step.time_ms() else {
                continue;
            };
            if !time_ms.is_finite() {
                issues.push(ValidationError::InvalidTime {
                    index,
                    step_type: step.type_name(),
                });
                continue;
            }
            if let Some(prev) = previous {
                if time_ms < prev {
                    issues.push(ValidationError::NonMonotonicTime {
                        index,
                        time_ms,
                        previous_ms: prev,
                    });
                }
            }
            previous = Some(previous.map_or(time_ms, |p| p.max(time_ms)));
        }

        issues
    }
}

/// Validation errors for replay scripts
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Script has no steps")]
    EmptySteps,

    #[error("Step {index} at {time_ms}ms precedes an earlier step at {previous_ms}ms")]
    NonMonotonicTime {
        index: usize,
        time_ms: Millis,
        previous_ms: Millis,
    },

    #[error("Step {index} ({step_type}) has a non-finite timestamp")]
    InvalidTime { index: usize, step_type: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionKind;
    use crate::types::PassageMetadata;
    use pretty_assertions::assert_eq;

    fn script() -> TrialScript {
        let mut script = TrialScript::new(Passage::new("hi", PassageMetadata::default()));
        script.push(ScriptStep::KeyDown {
            key: "h".to_string(),
            time_ms: 0.0,
        });
        script.push(ScriptStep::KeyUp {
            key: "h".to_string(),
            time_ms: 60.0,
        });
        script.push(ScriptStep::Clear);
        script.push(ScriptStep::Submit { time_ms: 100.0 });
        script
    }

    #[test]
    fn test_serialize_steps() {
        let json = serde_json::to_string_pretty(&script()).unwrap();

        assert!(json.contains("keytrial.script.v1"));
        assert!(json.contains("\"type\": \"key_down\""));
        assert!(json.contains("\"type\": \"clear\""));
        assert!(json.contains("\"time_ms\": 100.0"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let json = r#"{
            "schema_version": "keytrial.script.v1",
            "passage": {"text": "cat"},
            "context": {"condition": {"kind": "waves"}, "tag": "b2"},
            "steps": [
                {"type": "key_down", "key": "c", "time_ms": 0},
                {"type": "rearm"}
            ]
        }"#;

        let script: TrialScript = serde_json::from_str(json).unwrap();
        assert_eq!(script.passage.text, "cat");
        assert_eq!(script.passage.metadata, PassageMetadata::default());
        assert!(script.next_passages.is_empty());
        assert_eq!(script.context.condition.kind(), ConditionKind::Waves);
        assert_eq!(script.steps[1], ScriptStep::Rearm);
        assert_eq!(script.steps[0].time_ms(), Some(0.0));
    }

    #[test]
    fn test_valid_script() {
        assert!(script().validate().is_ok());
    }

    #[test]
    fn test_wrong_version() {
        let mut script = script();
        script.schema_version = "keytrial.script.v0".to_string();

        assert!(matches!(
            script.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_empty_steps() {
        let script = TrialScript::new(Passage::default());
        assert_eq!(script.issues(), vec![ValidationError::EmptySteps]);
    }

    #[test]
    fn test_non_monotonic_times() {
        let mut script = script();
        script.push(ScriptStep::KeyDown {
            key: "i".to_string(),
            time_ms: 50.0,
        });
        script.push(ScriptStep::KeyUp {
            key: "i".to_string(),
            time_ms: f64::NAN,
        });

        let issues = script.issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(
            issues[0],
            ValidationError::NonMonotonicTime {
                index: 4,
                time_ms: 50.0,
                previous_ms: 100.0,
            }
        );
        assert!(matches!(issues[1], ValidationError::InvalidTime { index: 5, .. }));
    }
}
