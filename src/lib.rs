//! keytrial - Keystroke capture and alignment engine for typing trials
//!
//! A trial records every key press and release against a target passage,
//! tracks the typed buffer, and on submit or reset produces one immutable
//! snapshot: the full keystroke log, a character-level and a word-level
//! alignment of passage against typed text, and per-key/session metrics.
//!
//! ## Modules
//!
//! - **Capture**: [`recorder`] and [`trial`] turn key signals into an event log
//!   and a typed buffer under a four-phase lifecycle
//! - **Analysis**: [`alignment`] and [`metrics`] reduce a finished trial
//! - **Export**: [`snapshot`] assembles the result; [`pipeline`] drives
//!   consecutive trials and notifies an observer
//! - **Replay**: [`schema`] loads recorded scripts and runs them through a session

pub mod alignment;
pub mod condition;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod recorder;
pub mod schema;
pub mod snapshot;
pub mod trial;
pub mod types;

pub use condition::{ConditionKind, ConditionSettings, TrialContext, VisualCondition};
pub use config::EngineConfig;
pub use error::TrialError;
pub use pipeline::{replay_to_json, PassageQueue, PassageSource, TrialObserver, TrialSession};
pub use snapshot::{SnapshotExporter, TrialSnapshot};
pub use trial::{KeyOutcome, Trial};

// Schema exports
pub use schema::{ScriptAdapter, TrialScript, SCRIPT_VERSION};

/// Engine version embedded in every snapshot
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for snapshots
pub const PRODUCER_NAME: &str = "keytrial";
