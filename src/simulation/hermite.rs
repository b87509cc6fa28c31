//! 4th-order Hermite predictor-corrector integrator with adaptive stepping.
//!
//! Each sub-step predicts positions and velocities with a 3rd-order Taylor
//! expansion in acceleration and jerk, recomputes both derivatives with an
//! O(N²) pair pass, then corrects with the standard Hermite formula. The
//! sub-step size tracks a pairwise collision-time heuristic, so the step
//! shrinks automatically through close encounters and grows back as bodies
//! separate. Preferred over leapfrog for station-keeping, descent and close
//! flybys.

use log::{error, warn};

use crate::simulation::external::SharedAcceleration;
use crate::simulation::forces::ForceLaw;
use crate::simulation::integrator::{total_energy, GravityIntegrator};
use crate::simulation::states::{GravityState, NVec3};

/// Hard cap on sub-steps per `evolve` call: bounded latency over accuracy
/// when bodies pass arbitrarily close to each other.
const MAX_SUBSTEPS: usize = 50;

/// Exponential smoothing factor for the collision-time average.
const COLL_SMOOTHING: f64 = 0.8;

/// Default softening added to the cubed pair separation.
const DEFAULT_SOFTENING: f64 = 1e-9;

/// Default adaptive-step clamps as fractions of the nominal step.
const DEFAULT_MIN_STEP_SCALE: f64 = 1e-3;
const DEFAULT_MAX_STEP_SCALE: f64 = 1.0;

#[derive(Clone)]
pub struct HermiteIntegrator {
    capacity: usize,
    g: f64,
    eps: f64,
    force_law: ForceLaw,

    // Per-body derivative arrays, index-aligned with the paired state
    vel: Vec<NVec3>,
    acc: Vec<NVec3>,
    jerk: Vec<NVec3>,

    // Previous-step snapshot used only during the corrector pass
    old_pos: Vec<NVec3>,
    old_vel: Vec<NVec3>,
    old_acc: Vec<NVec3>,
    old_jerk: Vec<NVec3>,

    externals: Vec<Option<SharedAcceleration>>,

    // Adaptive-step bookkeeping
    dt: f64,
    dt_initial: f64,
    min_dt: f64,
    max_dt: f64,
    collision_time: f64,
    collision_time_initial: f64,
    collision_time_avg: f64,

    initial_energy: f64,
}

impl HermiteIntegrator {
    /// Integrator with room for `max_bodies` and nominal step `dt`.
    pub fn new(max_bodies: usize, dt: f64) -> Self {
        Self {
            capacity: max_bodies,
            g: 1.0,
            eps: DEFAULT_SOFTENING,
            force_law: ForceLaw::Newtonian,
            vel: Vec::with_capacity(max_bodies),
            acc: Vec::with_capacity(max_bodies),
            jerk: Vec::with_capacity(max_bodies),
            old_pos: Vec::with_capacity(max_bodies),
            old_vel: Vec::with_capacity(max_bodies),
            old_acc: Vec::with_capacity(max_bodies),
            old_jerk: Vec::with_capacity(max_bodies),
            externals: Vec::with_capacity(max_bodies),
            dt,
            dt_initial: dt,
            min_dt: dt * DEFAULT_MIN_STEP_SCALE,
            max_dt: dt * DEFAULT_MAX_STEP_SCALE,
            collision_time: 0.0,
            collision_time_initial: 0.0,
            collision_time_avg: 0.0,
            initial_energy: 0.0,
        }
    }

    pub fn set_gravitational_constant(&mut self, g: f64) {
        self.g = g;
    }

    pub fn set_softening(&mut self, eps: f64) {
        self.eps = eps;
    }

    /// Clamp range for the adaptive sub-step.
    pub fn set_step_bounds(&mut self, min_dt: f64, max_dt: f64) {
        self.min_dt = min_dt;
        self.max_dt = max_dt;
    }

    /// Current adaptive sub-step size.
    pub fn current_step(&self) -> f64 {
        self.dt
    }

    pub fn nominal_step(&self) -> f64 {
        self.dt_initial
    }

    /// Latest raw pairwise collision-time estimate.
    pub fn collision_time(&self) -> f64 {
        self.collision_time
    }

    fn snapshot(&mut self, state: &GravityState) {
        for i in 0..state.body_count() {
            self.old_pos[i] = state.position(i);
            self.old_vel[i] = state.velocity(i);
            self.old_acc[i] = self.acc[i];
            self.old_jerk[i] = self.jerk[i];
        }
    }

    /// Predictor: 3rd-order Taylor expansion in acceleration and jerk.
    fn predict(&mut self, dt: f64, state: &mut GravityState) {
        let dt2 = dt * dt;
        for i in 0..state.body_count() {
            if !state.status(i).integrates() {
                continue;
            }
            let p = state.position(i);
            let v = state.velocity(i);
            let a = self.acc[i];
            let jk = self.jerk[i];
            state.set_position(i, p + v * dt + a * (dt2 * 0.5) + jk * (dt2 * dt / 6.0));
            state.set_velocity(i, v + a * dt + jk * (dt2 * 0.5));
        }
    }

    /// Recompute acceleration and jerk for every body, then inject external
    /// accelerations (queried once per body per sub-step, acceleration only
    /// — they do not participate in the pairwise jerk term). Returns the raw
    /// minimum collision-time estimate from the pair pass.
    fn force_pass(&mut self, time: f64, state: &mut GravityState) -> Option<f64> {
        for i in 0..self.acc.len() {
            self.acc[i] = NVec3::zeros();
            self.jerk[i] = NVec3::zeros();
        }

        let min_q = self
            .force_law
            .accumulate_with_jerk(self.g, self.eps, state, &mut self.acc, &mut self.jerk);

        for i in 0..state.body_count() {
            if !state.status(i).integrates() {
                continue;
            }
            if let Some(plugin) = &self.externals[i] {
                let mut mass = state.mass(i);
                let a = plugin.borrow_mut().acceleration(time, state, i, &mut mass);
                state.set_mass(i, mass);
                self.acc[i] += a;
            }
        }

        min_q
    }

    /// Corrector: velocity then position from the average of old and new
    /// acceleration and jerk.
    fn correct(&mut self, dt: f64, state: &mut GravityState) {
        let dt2_12 = dt * dt / 12.0;
        for i in 0..state.body_count() {
            if !state.status(i).integrates() {
                continue;
            }
            let v1 = self.old_vel[i]
                + (self.old_acc[i] + self.acc[i]) * (dt * 0.5)
                + (self.old_jerk[i] - self.jerk[i]) * dt2_12;
            let x1 = self.old_pos[i]
                + (self.old_vel[i] + v1) * (dt * 0.5)
                + (self.old_acc[i] - self.acc[i]) * dt2_12;
            state.set_velocity(i, v1);
            state.set_position(i, x1);
            self.vel[i] = v1;
        }
    }

    /// Rescale the next sub-step from the smoothed collision-time estimate,
    /// clamped to `[min_dt, max_dt]`. With no pair estimate (single-body
    /// system, or every pair skipped) the step holds steady.
    fn adapt_step(&mut self, min_q: Option<f64>) {
        let Some(q) = min_q else {
            return;
        };
        let coll = q.powf(0.25);
        self.collision_time = coll;
        self.collision_time_avg =
            COLL_SMOOTHING * self.collision_time_avg + (1.0 - COLL_SMOOTHING) * coll;
        if self.collision_time_initial > 0.0 {
            self.dt = (self.dt_initial * self.collision_time_avg / self.collision_time_initial)
                .clamp(self.min_dt, self.max_dt);
        }
    }
}

impl GravityIntegrator for HermiteIntegrator {
    fn add_body(&mut self, index: usize, _mass: f64, position: NVec3, velocity: NVec3) {
        if index != self.vel.len() {
            error!(
                "add_body index {index} breaks append-only ordering (expected {})",
                self.vel.len()
            );
            return;
        }
        if self.vel.len() >= self.capacity {
            error!("add_body rejected: integrator capacity {} exhausted", self.capacity);
            return;
        }
        self.vel.push(velocity);
        self.acc.push(NVec3::zeros());
        self.jerk.push(NVec3::zeros());
        self.old_pos.push(position);
        self.old_vel.push(velocity);
        self.old_acc.push(NVec3::zeros());
        self.old_jerk.push(NVec3::zeros());
        self.externals.push(None);
    }

    fn remove_body_at(&mut self, index: usize) {
        if index >= self.vel.len() {
            warn!("remove_body_at({index}) out of range, slot count = {}", self.vel.len());
            return;
        }
        self.vel.remove(index);
        self.acc.remove(index);
        self.jerk.remove(index);
        self.old_pos.remove(index);
        self.old_vel.remove(index);
        self.old_acc.remove(index);
        self.old_jerk.remove(index);
        self.externals.remove(index);
    }

    fn grow(&mut self, additional: usize) {
        self.capacity += additional;
        self.vel.reserve(additional);
        self.acc.reserve(additional);
        self.jerk.reserve(additional);
        self.old_pos.reserve(additional);
        self.old_vel.reserve(additional);
        self.old_acc.reserve(additional);
        self.old_jerk.reserve(additional);
        self.externals.reserve(additional);
    }

    fn set_external_acceleration(&mut self, index: usize, accel: Option<SharedAcceleration>) {
        if index >= self.externals.len() {
            warn!("set_external_acceleration({index}) out of range");
            return;
        }
        self.externals[index] = accel;
    }

    fn set_force_law(&mut self, law: ForceLaw) {
        self.force_law = law;
    }

    fn pre_evolve(&mut self, state: &mut GravityState) {
        let n = state.body_count();
        if n != self.vel.len() {
            error!(
                "pre_evolve: state has {n} bodies but integrator has {} slots",
                self.vel.len()
            );
            return;
        }
        for i in 0..n {
            self.vel[i] = state.velocity(i);
        }

        let min_q = self.force_pass(state.time(), state);

        self.initial_energy = total_energy(self.g, state);

        // Normalization baseline for adaptive stepping
        self.collision_time_initial = min_q.map(|q| q.powf(0.25)).unwrap_or(0.0);
        self.collision_time = self.collision_time_initial;
        self.collision_time_avg = self.collision_time_initial;
        self.dt = self.dt_initial;
    }

    fn evolve(&mut self, requested_time: f64, state: &mut GravityState) -> f64 {
        if requested_time <= 0.0 || state.body_count() == 0 {
            return 0.0;
        }
        debug_assert_eq!(state.body_count(), self.vel.len());

        // The starting sub-step never exceeds the request
        self.dt = self.dt.min(requested_time);

        let mut elapsed = 0.0;
        let mut steps = 0usize;
        while elapsed < requested_time {
            if steps >= MAX_SUBSTEPS {
                warn!(
                    "sub-step cap {MAX_SUBSTEPS} hit, finishing remaining {:.3e} in one step",
                    requested_time - elapsed
                );
                self.dt = requested_time - elapsed;
            }
            let dt = self.dt;

            self.snapshot(state);
            self.predict(dt, state);
            let min_q = self.force_pass(state.time() + dt, state);
            self.correct(dt, state);
            state.advance_time(dt);

            elapsed += dt;
            steps += 1;
            self.adapt_step(min_q);
        }

        elapsed
    }

    fn velocity_for(&self, index: usize) -> NVec3 {
        self.vel[index]
    }

    fn acceleration_for(&self, index: usize) -> NVec3 {
        self.acc[index]
    }

    fn energy(&self, state: &GravityState) -> f64 {
        total_energy(self.g, state)
    }

    fn initial_energy(&self) -> f64 {
        self.initial_energy
    }

    fn deep_clone(&self) -> Box<dyn GravityIntegrator> {
        Box::new(self.clone())
    }
}
