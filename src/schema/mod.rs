//! keytrial.script.v1 replay schema
//!
//! This module defines the input format for replaying recorded key signals
//! and lifecycle commands through a trial session.

mod adapter;
mod script;

pub use adapter::*;
pub use script::*;
