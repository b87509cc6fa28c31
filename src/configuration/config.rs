//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. A scenario consists of:
//!
//! - [`EngineConfig`]     – engine options (which integrator)
//! - [`ParametersConfig`] – numerical parameters and physical constants
//! - [`BodyConfig`]       – initial state and plugins for each body
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! An example scenario YAML matching these types:
//!
//! ```yaml
//! engine:
//!   integrator: "hermite"   # or "leapfrog"
//!
//! parameters:
//!   t_end: 10.0             # total simulation time
//!   dt: 0.01                # nominal sub-step size
//!   tick: 0.1               # time advanced per Evolve call
//!   eps: 1.0e-9             # softening added to the cubed separation
//!   g: 1.0                  # gravitational constant
//!
//! bodies:
//!   - x: [ -0.5, 0.0, 0.0 ]
//!     v: [  0.0, 1.0, 0.0 ]
//!     m: 1.0
//!   - x: [  0.5, 0.0, 0.0 ]
//!     v: [  0.0, -1.0, 0.0 ]
//!     m: 1.0
//!     fixed: true
//! ```
//!
//! A body may additionally carry a `rocket:` or `drag:` block; the scenario
//! builder attaches the corresponding external-acceleration plugin.

use serde::Deserialize;

/// Which integrator the engine runs
/// `integrator: "hermite"` or `integrator: "leapfrog"`
#[derive(Deserialize, Debug, Clone)]
pub enum IntegratorConfig {
    #[serde(rename = "hermite")] // 4th-order predictor-corrector, adaptive sub-steps
    Hermite,

    #[serde(rename = "leapfrog")] // 2nd-order symplectic kick-drift-kick, fixed step
    LeapFrog,
}

/// High-level engine configuration
#[derive(Deserialize, Debug)]
pub struct EngineConfig {
    pub integrator: IntegratorConfig, // time integrator used for advancing the system state
}

/// Global numerical and physical parameters for a scenario
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub t_end: f64, // time end
    pub dt: f64,    // nominal sub-step size
    #[serde(default)]
    pub tick: Option<f64>, // driver granularity; defaults to 10 * dt
    #[serde(default)]
    pub min_dt_scale: Option<f64>, // adaptive lower clamp as fraction of dt
    #[serde(default)]
    pub max_dt_scale: Option<f64>, // adaptive upper clamp as fraction of dt
    pub eps: f64, // softening - prevents singular forces at very small separations
    pub g: f64,   // gravitational constant
}

/// One rocket stage
#[derive(Deserialize, Debug, Clone)]
pub struct StageConfig {
    pub dry_mass: f64,
    pub fuel_mass: f64,
    pub burn_rate: f64,
    pub thrust: f64,
    #[serde(default)]
    pub cross_section: f64,
    #[serde(default)]
    pub drag_coefficient: f64,
}

/// Rocket-engine plugin for one body
#[derive(Deserialize, Debug, Clone)]
pub struct RocketConfig {
    pub payload_mass: f64,
    pub thrust_axis: Vec<f64>, // 3 components, normalized by the builder
    #[serde(default = "default_accel_scale")]
    pub accel_scale: f64, // thrust/mass -> simulation units
    #[serde(default)]
    pub engine_on: bool,
    pub stages: Vec<StageConfig>,
}

fn default_accel_scale() -> f64 {
    1.0
}

/// Atmospheric-drag plugin for one body
#[derive(Deserialize, Debug, Clone)]
pub struct DragConfig {
    pub center_body: usize,   // index of the attracting body
    pub surface_radius: f64,  // impact threshold
    #[serde(default)]
    pub table_base_altitude: f64,
    pub densities: Vec<f64>,  // sampled every 10 altitude units
    pub drag_coefficient: f64,
    pub cross_section: f64,
    pub vehicle_mass: f64,
}

/// Configuration for a single body's initial state
#[derive(Deserialize, Debug)]
pub struct BodyConfig {
    pub x: Vec<f64>, // initial position (3 components) in simulation units
    pub v: Vec<f64>, // initial velocity (3 components) in simulation units per time unit
    pub m: f64,      // mass of the body; zero makes a massless test particle
    #[serde(default)]
    pub fixed: bool, // fixed-motion: exerts gravity but is never advanced
    #[serde(default)]
    pub rocket: Option<RocketConfig>,
    #[serde(default)]
    pub drag: Option<DragConfig>,
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug)]
pub struct ScenarioConfig {
    pub engine: EngineConfig, // engine-level configuration (integrator choice)
    pub parameters: ParametersConfig, // global numerical and physical parameters
    pub bodies: Vec<BodyConfig>, // initial state of the system
}
