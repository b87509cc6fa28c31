//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime bundle
//! (`Scenario`) containing:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - the live system state (`GravityState` with bodies at t = 0)
//! - the chosen integrator, with bodies appended in lockstep with the
//!   state and external-acceleration plugins attached
//!
//! The bundle doubles as a headless driver: `run_to_end` primes the
//! integrator and ticks `evolve` until `t_end`, reporting energy drift.

use std::cell::RefCell;
use std::rc::Rc;

use log::{info, warn};

use crate::configuration::config::{BodyConfig, IntegratorConfig, ScenarioConfig};
use crate::simulation::engine::Engine;
use crate::simulation::external::{AtmosphericDrag, RocketEngine, Stage};
use crate::simulation::hermite::HermiteIntegrator;
use crate::simulation::integrator::GravityIntegrator;
use crate::simulation::leapfrog::LeapFrogIntegrator;
use crate::simulation::params::Parameters;
use crate::simulation::states::{BodyStatus, GravityState, NVec3};

fn vec3_from(components: &[f64]) -> NVec3 {
    if components.len() != 3 {
        warn!("expected 3 components, got {} — missing axes read as zero", components.len());
    }
    NVec3::new(
        components.first().copied().unwrap_or(0.0),
        components.get(1).copied().unwrap_or(0.0),
        components.get(2).copied().unwrap_or(0.0),
    )
}

/// A fully-initialized simulation: the live state plus its paired
/// integrator, ready to be driven one tick at a time.
pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub state: GravityState,
    pub integrator: Box<dyn GravityIntegrator>,
}

impl Scenario {
    pub fn build(cfg: ScenarioConfig) -> Self {
        let p_cfg = cfg.parameters;
        let parameters = Parameters {
            t_end: p_cfg.t_end,
            dt: p_cfg.dt,
            tick: p_cfg.tick.unwrap_or(p_cfg.dt * 10.0),
            min_dt_scale: p_cfg.min_dt_scale.unwrap_or(1e-3),
            max_dt_scale: p_cfg.max_dt_scale.unwrap_or(1.0),
            eps: p_cfg.eps,
            g: p_cfg.g,
        };

        let engine = Engine {
            integrator: cfg.engine.integrator,
        };

        let capacity = cfg.bodies.len();
        let mut state = GravityState::new(capacity);

        // Construct the chosen integrator with the scenario's constants
        let mut integrator: Box<dyn GravityIntegrator> = match engine.integrator {
            IntegratorConfig::Hermite => {
                let mut hermite = HermiteIntegrator::new(capacity, parameters.dt);
                hermite.set_gravitational_constant(parameters.g);
                hermite.set_softening(parameters.eps);
                hermite.set_step_bounds(parameters.min_dt(), parameters.max_dt());
                Box::new(hermite)
            }
            IntegratorConfig::LeapFrog => {
                let mut leapfrog = LeapFrogIntegrator::new(capacity, parameters.dt);
                leapfrog.set_gravitational_constant(parameters.g);
                leapfrog.set_softening(parameters.eps);
                Box::new(leapfrog)
            }
        };

        // Append bodies to state and integrator in lockstep, then attach
        // any per-body plugin to the integrator's single slot
        for (index, bc) in cfg.bodies.iter().enumerate() {
            let position = vec3_from(&bc.x);
            let velocity = vec3_from(&bc.v);
            let status = if bc.fixed {
                BodyStatus::ACTIVE | BodyStatus::FIXED_MOTION
            } else {
                BodyStatus::ACTIVE
            };

            state.add_body(bc.m, position, velocity, status);
            integrator.add_body(index, bc.m, position, velocity);

            if let Some(plugin) = build_plugin(bc) {
                integrator.set_external_acceleration(index, Some(plugin));
            }
        }

        Self {
            engine,
            parameters,
            state,
            integrator,
        }
    }

    /// Headless driver: prime, then tick `evolve` until `t_end`.
    /// Returns the relative energy drift over the run.
    pub fn run_to_end(&mut self) -> f64 {
        self.integrator.pre_evolve(&mut self.state);

        let t_end = self.parameters.t_end;
        let tick = self.parameters.tick;
        let mut t = 0.0;
        while t < t_end {
            let advanced = self.integrator.evolve(tick.min(t_end - t), &mut self.state);
            if advanced <= 0.0 {
                warn!("evolve made no progress at t = {t:.4}, stopping the run");
                break;
            }
            t += advanced;
        }

        let drift = self.energy_drift();
        info!("run complete: t = {t:.4}, relative energy drift = {drift:.3e}");
        drift
    }

    /// `|E - E0| / |E0|`, or absolute drift when the initial energy is zero.
    pub fn energy_drift(&self) -> f64 {
        let e0 = self.integrator.initial_energy();
        let e = self.integrator.energy(&self.state);
        if e0 != 0.0 {
            ((e - e0) / e0).abs()
        } else {
            (e - e0).abs()
        }
    }
}

/// Map a body's optional plugin config onto the single-slot contract. A
/// body configured with both rocket and drag gets the rocket; composing
/// multiple effects needs a caller-side wrapper summing sub-effects.
fn build_plugin(bc: &BodyConfig) -> Option<crate::simulation::external::SharedAcceleration> {
    if let Some(rocket_cfg) = &bc.rocket {
        if bc.drag.is_some() {
            warn!("body has both rocket and drag configured; attaching rocket only");
        }
        let stages = rocket_cfg
            .stages
            .iter()
            .map(|s| Stage {
                dry_mass: s.dry_mass,
                fuel_mass: s.fuel_mass,
                burn_rate: s.burn_rate,
                thrust: s.thrust,
                cross_section: s.cross_section,
                drag_coefficient: s.drag_coefficient,
            })
            .collect();
        let mut rocket = RocketEngine::new(
            rocket_cfg.payload_mass,
            vec3_from(&rocket_cfg.thrust_axis),
            rocket_cfg.accel_scale,
            stages,
        );
        rocket.set_engine(rocket_cfg.engine_on);
        return Some(Rc::new(RefCell::new(rocket)));
    }

    if let Some(drag_cfg) = &bc.drag {
        let drag = AtmosphericDrag::new(
            drag_cfg.center_body,
            drag_cfg.surface_radius,
            drag_cfg.table_base_altitude,
            drag_cfg.densities.clone(),
            drag_cfg.drag_coefficient,
            drag_cfg.cross_section,
            drag_cfg.vehicle_mass,
        );
        return Some(Rc::new(RefCell::new(drag)));
    }

    None
}
