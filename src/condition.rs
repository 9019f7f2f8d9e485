//! Visual conditions
//!
//! The background animation shown during a trial is an experimental condition.
//! Each variant carries its own parameter set; the caller keeps one parameter set
//! per variant in [`ConditionSettings`] and resolves the active one by kind.
//! Whatever is active when the first key lands is captured into the trial as a
//! [`TrialContext`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a visual condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Static,
    Gradient,
    Particles,
    Waves,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 4] = [
        ConditionKind::Static,
        ConditionKind::Gradient,
        ConditionKind::Particles,
        ConditionKind::Waves,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::Static => "static",
            ConditionKind::Gradient => "gradient",
            ConditionKind::Particles => "particles",
            ConditionKind::Waves => "waves",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain background
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticParams {
    /// CSS-style color string
    pub color: String,
}

impl Default for StaticParams {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
        }
    }
}

/// Slowly shifting color gradient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientParams {
    /// Cycles per minute
    pub speed: f64,
    /// Hue rotation in degrees
    pub hue_shift: f64,
}

impl Default for GradientParams {
    fn default() -> Self {
        Self {
            speed: 1.0,
            hue_shift: 45.0,
        }
    }
}

/// Drifting particle field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleParams {
    pub count: u32,
    /// Pixels per second
    pub speed: f64,
    /// Particle radius in pixels
    pub size: f64,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self {
            count: 100,
            speed: 20.0,
            size: 2.0,
        }
    }
}

/// Sinusoidal wave overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Pixels
    pub amplitude: f64,
    /// Hz
    pub frequency: f64,
    /// Pixels per second
    pub speed: f64,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            amplitude: 20.0,
            frequency: 0.5,
            speed: 40.0,
        }
    }
}

/// A fully parameterized visual condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisualCondition {
    Static(StaticParams),
    Gradient(GradientParams),
    Particles(ParticleParams),
    Waves(WaveParams),
}

impl VisualCondition {
    pub fn kind(&self) -> ConditionKind {
        match self {
            VisualCondition::Static(_) => ConditionKind::Static,
            VisualCondition::Gradient(_) => ConditionKind::Gradient,
            VisualCondition::Particles(_) => ConditionKind::Particles,
            VisualCondition::Waves(_) => ConditionKind::Waves,
        }
    }
}

impl Default for VisualCondition {
    fn default() -> Self {
        VisualCondition::Static(StaticParams::default())
    }
}

/// One parameter set per condition kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSettings {
    pub static_bg: StaticParams,
    pub gradient: GradientParams,
    pub particles: ParticleParams,
    pub waves: WaveParams,
}

impl ConditionSettings {
    /// Resolve the parameters of `kind` into a condition value
    pub fn condition_for(&self, kind: ConditionKind) -> VisualCondition {
        match kind {
            ConditionKind::Static => VisualCondition::Static(self.static_bg.clone()),
            ConditionKind::Gradient => VisualCondition::Gradient(self.gradient.clone()),
            ConditionKind::Particles => VisualCondition::Particles(self.particles.clone()),
            ConditionKind::Waves => VisualCondition::Waves(self.waves.clone()),
        }
    }

    /// Store a condition's parameters under its own kind
    pub fn set(&mut self, condition: VisualCondition) {
        match condition {
            VisualCondition::Static(p) => self.static_bg = p,
            VisualCondition::Gradient(p) => self.gradient = p,
            VisualCondition::Particles(p) => self.particles = p,
            VisualCondition::Waves(p) => self.waves = p,
        }
    }
}

/// Ambient context captured when a trial begins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialContext {
    pub condition: VisualCondition,
    /// Free-form caller label (e.g. session or block name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl TrialContext {
    pub fn new(condition: VisualCondition) -> Self {
        Self {
            condition,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Context for the active kind in a settings table
    pub fn from_settings(settings: &ConditionSettings, active: ConditionKind) -> Self {
        Self::new(settings.condition_for(active))
    }
}
