//! Per-body external (non-gravitational) acceleration sources.
//!
//! A body may carry at most one [`ExternalAcceleration`]; the integrator
//! queries it once per sub-step and adds the result into that body's
//! acceleration before the corrector runs. Implementations must be safe to
//! call repeatedly for the same time against different candidate states:
//! trajectory prediction evaluates them against cloned states, possibly many
//! times for the same nominal time, so persistent side effects (fuel burned,
//! impact latch) may only advance when the queried state `is_live()`.

use std::cell::RefCell;
use std::rc::Rc;

use log::{info, warn};

use crate::simulation::states::{GravityState, NVec3};

/// Altitude spacing of the atmospheric density table samples.
const DENSITY_SAMPLE_STEP: f64 = 10.0;

/// Relative speeds below this produce no drag (the direction of a
/// near-zero relative velocity is numerically meaningless).
const MIN_DRAG_SPEED_SQ: f64 = 1e-12;

/// A non-gravitational acceleration source attached to one body.
///
/// `mass` is in/out: implementations that change the body's mass (fuel
/// burn) write the current total vehicle mass through it.
pub trait ExternalAcceleration {
    fn acceleration(
        &mut self,
        time: f64,
        state: &GravityState,
        body: usize,
        mass: &mut f64,
    ) -> NVec3;
}

/// Shared handle to a plugin. The integrator holds one of these per body
/// but does not control the plugin's lifetime; the collaborator that
/// attached the body does. Integrator clones share the same plugin object,
/// which is exactly what the live-state contract requires.
pub type SharedAcceleration = Rc<RefCell<dyn ExternalAcceleration>>;

/// Notified exactly once when a dragged body reaches the surface of its
/// attracting body on the live timeline.
pub trait ImpactObserver {
    fn on_impact(&mut self, body: usize, time: f64, speed: f64);
}

// =========================================================================
// Rocket engine
// =========================================================================

/// One rocket stage. Cross-section and drag coefficient are carried for
/// collaborators that compose thrust with drag; the engine itself only uses
/// the mass, burn rate and thrust figures.
#[derive(Debug, Clone)]
pub struct Stage {
    pub dry_mass: f64,
    pub fuel_mass: f64,
    pub burn_rate: f64,
    pub thrust: f64,
    pub cross_section: f64,
    pub drag_coefficient: f64,
}

/// Single- or multi-stage rocket thrust.
///
/// Tracks per-stage remaining fuel. Fuel burns proportionally to elapsed
/// time, but only when queried against the live state; clone evaluations
/// read the persisted fuel level without consuming it. Stage advance is an
/// explicit operation, never automatic. Fuel exhaustion is not an error:
/// thrust smoothly drops to zero.
#[derive(Clone)]
pub struct RocketEngine {
    payload_mass: f64,
    stages: Vec<Stage>,
    fuel_remaining: Vec<f64>,
    active_stage: usize,
    engine_on: bool,
    thrust_axis: NVec3,
    /// Converts thrust/mass into the integrator's physical unit system.
    accel_scale: f64,
    last_live_time: Option<f64>,
}

impl RocketEngine {
    pub fn new(payload_mass: f64, thrust_axis: NVec3, accel_scale: f64, stages: Vec<Stage>) -> Self {
        let axis_norm = thrust_axis.norm();
        let axis = if axis_norm > 0.0 {
            thrust_axis / axis_norm
        } else {
            warn!("rocket thrust axis has zero length, defaulting to +x");
            NVec3::new(1.0, 0.0, 0.0)
        };
        let fuel_remaining = stages.iter().map(|s| s.fuel_mass).collect();
        Self {
            payload_mass,
            stages,
            fuel_remaining,
            active_stage: 0,
            engine_on: false,
            thrust_axis: axis,
            accel_scale,
            last_live_time: None,
        }
    }

    pub fn set_engine(&mut self, on: bool) {
        self.engine_on = on;
    }

    pub fn is_engine_on(&self) -> bool {
        self.engine_on
    }

    pub fn set_thrust_axis(&mut self, axis: NVec3) {
        let norm = axis.norm();
        if norm > 0.0 {
            self.thrust_axis = axis / norm;
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn active_stage(&self) -> usize {
        self.active_stage
    }

    /// Remaining fuel in the active stage (zero once all stages are spent).
    pub fn fuel_remaining(&self) -> f64 {
        self.fuel_remaining.get(self.active_stage).copied().unwrap_or(0.0)
    }

    /// Jettison the active stage and switch to the next. Explicit only.
    pub fn next_stage(&mut self) {
        if self.active_stage < self.stages.len() {
            self.active_stage += 1;
            info!("rocket staged, now on stage {}", self.active_stage);
        } else {
            warn!("next_stage called with no stages left");
        }
    }

    /// Current total vehicle mass: payload plus the dry mass and remaining
    /// fuel of every stage not yet jettisoned.
    pub fn total_mass(&self) -> f64 {
        let mut m = self.payload_mass;
        for s in self.active_stage..self.stages.len() {
            m += self.stages[s].dry_mass + self.fuel_remaining[s];
        }
        m
    }
}

impl ExternalAcceleration for RocketEngine {
    fn acceleration(
        &mut self,
        time: f64,
        state: &GravityState,
        _body: usize,
        mass: &mut f64,
    ) -> NVec3 {
        // Fuel consumption is tied to real elapsed time on the live
        // timeline only; clone queries are referentially transparent.
        if state.is_live() {
            if let Some(last) = self.last_live_time {
                let dt = time - last;
                if dt > 0.0 && self.engine_on && self.active_stage < self.stages.len() {
                    let burned = self.stages[self.active_stage].burn_rate * dt;
                    let fuel = &mut self.fuel_remaining[self.active_stage];
                    *fuel = (*fuel - burned).max(0.0);
                }
            }
            self.last_live_time = Some(time);
        }

        let total = self.total_mass();
        *mass = total;

        let burning = self.engine_on
            && self.active_stage < self.stages.len()
            && self.fuel_remaining[self.active_stage] > 0.0
            && total > 0.0;
        if burning {
            self.thrust_axis * (self.stages[self.active_stage].thrust / total * self.accel_scale)
        } else {
            NVec3::zeros()
        }
    }
}

// =========================================================================
// Atmospheric drag
// =========================================================================

/// Atmospheric drag against one attracting body, with a tabulated density
/// profile and an impact latch at the surface.
#[derive(Clone)]
pub struct AtmosphericDrag {
    /// Index of the attracting body in the paired state.
    center_body: usize,
    surface_radius: f64,
    /// Altitude of `densities[0]` above the surface.
    table_base_altitude: f64,
    /// Air density sampled every `DENSITY_SAMPLE_STEP` altitude units.
    densities: Vec<f64>,
    drag_coefficient: f64,
    cross_section: f64,
    vehicle_mass: f64,
    impacted: bool,
    observer: Option<Rc<RefCell<dyn ImpactObserver>>>,
}

impl AtmosphericDrag {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        center_body: usize,
        surface_radius: f64,
        table_base_altitude: f64,
        densities: Vec<f64>,
        drag_coefficient: f64,
        cross_section: f64,
        vehicle_mass: f64,
    ) -> Self {
        if densities.is_empty() {
            warn!("atmospheric density table is empty, drag will be zero");
        }
        Self {
            center_body,
            surface_radius,
            table_base_altitude,
            densities,
            drag_coefficient,
            cross_section,
            vehicle_mass,
            impacted: false,
            observer: None,
        }
    }

    pub fn set_impact_observer(&mut self, observer: Option<Rc<RefCell<dyn ImpactObserver>>>) {
        self.observer = observer;
    }

    pub fn has_impacted(&self) -> bool {
        self.impacted
    }

    /// Air density at `altitude` above the surface, linearly interpolated
    /// between table samples and clamped at both ends.
    pub fn density_at(&self, altitude: f64) -> f64 {
        if self.densities.is_empty() {
            return 0.0;
        }
        let pos = (altitude - self.table_base_altitude) / DENSITY_SAMPLE_STEP;
        if pos <= 0.0 {
            return self.densities[0];
        }
        let last = self.densities.len() - 1;
        let lower = pos.floor() as usize;
        if lower >= last {
            return self.densities[last];
        }
        let frac = pos - lower as f64;
        self.densities[lower] * (1.0 - frac) + self.densities[lower + 1] * frac
    }
}

impl ExternalAcceleration for AtmosphericDrag {
    fn acceleration(
        &mut self,
        time: f64,
        state: &GravityState,
        body: usize,
        _mass: &mut f64,
    ) -> NVec3 {
        // Once impacted, the body stays inert to drag for good.
        if self.impacted {
            return NVec3::zeros();
        }

        let rel_pos = state.position(body) - state.position(self.center_body);
        let height = rel_pos.norm() - self.surface_radius;
        let rel_vel = state.velocity(body) - state.velocity(self.center_body);

        if height <= 0.0 {
            // Surface penetration: latch and notify once, live only. Clone
            // evaluations still see zero acceleration below the surface but
            // leave the latch alone.
            if state.is_live() {
                self.impacted = true;
                let speed = rel_vel.norm();
                info!("body {body} impacted surface at t = {time:.3}, speed {speed:.3}");
                if let Some(observer) = &self.observer {
                    observer.borrow_mut().on_impact(body, time, speed);
                }
            }
            return NVec3::zeros();
        }

        let speed2 = rel_vel.norm_squared();
        if speed2 < MIN_DRAG_SPEED_SQ || self.vehicle_mass <= 0.0 {
            return NVec3::zeros();
        }
        let speed = speed2.sqrt();

        let rho = self.density_at(height);
        let decel = 0.5 * rho * speed2 * self.drag_coefficient * self.cross_section
            / self.vehicle_mass;

        // Opposes the velocity relative to the attracting body
        rel_vel * (-decel / speed)
    }
}
