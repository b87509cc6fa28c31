//! 2nd-order symplectic leapfrog (kick-drift-kick) integrator.
//!
//! Fixed-step: half-kick velocities with the current acceleration, drift
//! positions with the half-kicked velocities, recompute accelerations (same
//! O(N²) pair pattern and softening as Hermite, same external-acceleration
//! injection, no jerk), then half-kick again with the new acceleration.
//! Superior long-term energy behavior for smooth, well-separated orbits, at
//! the cost of not adapting to close encounters.

use log::{error, warn};

use crate::simulation::external::SharedAcceleration;
use crate::simulation::forces::ForceLaw;
use crate::simulation::integrator::{total_energy, GravityIntegrator};
use crate::simulation::states::{GravityState, NVec3};

/// Default softening added to the cubed pair separation.
const DEFAULT_SOFTENING: f64 = 1e-9;

#[derive(Clone)]
pub struct LeapFrogIntegrator {
    capacity: usize,
    g: f64,
    eps: f64,
    force_law: ForceLaw,
    dt: f64,

    // Per-body arrays, index-aligned with the paired state
    vel: Vec<NVec3>,
    acc: Vec<NVec3>,
    externals: Vec<Option<SharedAcceleration>>,

    initial_energy: f64,
}

impl LeapFrogIntegrator {
    /// Integrator with room for `max_bodies` and fixed step `dt`.
    pub fn new(max_bodies: usize, dt: f64) -> Self {
        Self {
            capacity: max_bodies,
            g: 1.0,
            eps: DEFAULT_SOFTENING,
            force_law: ForceLaw::Newtonian,
            dt,
            vel: Vec::with_capacity(max_bodies),
            acc: Vec::with_capacity(max_bodies),
            externals: Vec::with_capacity(max_bodies),
            initial_energy: 0.0,
        }
    }

    pub fn set_gravitational_constant(&mut self, g: f64) {
        self.g = g;
    }

    pub fn set_softening(&mut self, eps: f64) {
        self.eps = eps;
    }

    pub fn step_size(&self) -> f64 {
        self.dt
    }

    /// Recompute accelerations, then inject external accelerations (one
    /// query per body per step).
    fn force_pass(&mut self, time: f64, state: &mut GravityState) {
        for a in self.acc.iter_mut() {
            *a = NVec3::zeros();
        }

        self.force_law.accumulate(self.g, self.eps, state, &mut self.acc);

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
    }

    /// Half-kick every integrating body's velocity by `half_dt` using the
    /// current accelerations.
    fn kick(&mut self, half_dt: f64, state: &mut GravityState) {
        for i in 0..state.body_count() {
            if !state.status(i).integrates() {
                continue;
            }
            let v = state.velocity(i) + self.acc[i] * half_dt;
            state.set_velocity(i, v);
            self.vel[i] = v;
        }
    }

    /// Drift every integrating body's position by a full step at its
    /// current (half-kicked) velocity.
    fn drift(&mut self, dt: f64, state: &mut GravityState) {
        for i in 0..state.body_count() {
            if !state.status(i).integrates() {
                continue;
            }
            let p = state.position(i) + state.velocity(i) * dt;
            state.set_position(i, p);
        }
    }
}

impl GravityIntegrator for LeapFrogIntegrator {
    fn add_body(&mut self, index: usize, _mass: f64, _position: NVec3, velocity: NVec3) {
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
        self.externals.push(None);
    }

    fn remove_body_at(&mut self, index: usize) {
        if index >= self.vel.len() {
            warn!("remove_body_at({index}) out of range, slot count = {}", self.vel.len());
            return;
        }
        self.vel.remove(index);
        self.acc.remove(index);
        self.externals.remove(index);
    }

    fn grow(&mut self, additional: usize) {
        self.capacity += additional;
        self.vel.reserve(additional);
        self.acc.reserve(additional);
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
        self.force_pass(state.time(), state);
        self.initial_energy = total_energy(self.g, state);
    }

    fn evolve(&mut self, requested_time: f64, state: &mut GravityState) -> f64 {
        if requested_time <= 0.0 || state.body_count() == 0 {
            return 0.0;
        }
        debug_assert_eq!(state.body_count(), self.vel.len());

        let dt = self.dt;
        let half_dt = 0.5 * dt;

        let mut elapsed = 0.0;
        while elapsed < requested_time {
            self.kick(half_dt, state);
            self.drift(dt, state);
            state.advance_time(dt);
            self.force_pass(state.time(), state);
            self.kick(half_dt, state);
            elapsed += dt;
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
