//! Integrator contract shared by the Hermite and leapfrog implementations.
//!
//! An integrator owns per-body derivative arrays that stay index-aligned
//! with a paired [`GravityState`]: bodies are appended in the same order on
//! both sides, and removals compact both in lockstep. Violating index
//! parity is a programming error, not a recoverable condition.

use crate::simulation::external::SharedAcceleration;
use crate::simulation::forces::ForceLaw;
use crate::simulation::states::{GravityState, NVec3};

/// Polymorphic integrator interface consumed by drivers and by clone-based
/// search routines (closest approach, maneuver trials).
///
/// Lifecycle: constructed READY with a capacity and nominal step; bodies
/// appended; `pre_evolve` primes derivatives once; `evolve` repeats. There
/// is no terminal state. None of these operations returns an error across
/// the public boundary: configuration misuse is logged and ignored, numeric
/// degeneracy is absorbed by softening and step clamping.
pub trait GravityIntegrator {
    /// Append a body's integration slot. `index` must equal the current
    /// count (strict append-only ordering, mirroring the paired state) and
    /// stay within capacity; violations log an error and no-op.
    fn add_body(&mut self, index: usize, mass: f64, position: NVec3, velocity: NVec3);

    /// Remove the slot at `index`, shifting higher slots down by one. Call
    /// in lockstep with `GravityState::remove_body_at`.
    fn remove_body_at(&mut self, index: usize);

    /// Raise capacity by `additional` slots, preserving contents.
    fn grow(&mut self, additional: usize);

    /// Attach (or detach, with `None`) the body's single external
    /// acceleration slot. Composing multiple effects requires a caller-side
    /// wrapper that sums sub-effects behind this one slot.
    fn set_external_acceleration(&mut self, index: usize, accel: Option<SharedAcceleration>);

    /// Replace the force law used by the pair pass.
    fn set_force_law(&mut self, law: ForceLaw);

    /// One-time derivative priming before the first `evolve`: runs a force
    /// pass and records the initial total energy and, for adaptive
    /// integrators, the step-normalization baseline.
    fn pre_evolve(&mut self, state: &mut GravityState);

    /// Advance `state` by at least `requested_time` using internal
    /// sub-steps; returns the actual elapsed simulated time, which may
    /// exceed the request by at most one sub-step.
    fn evolve(&mut self, requested_time: f64, state: &mut GravityState) -> f64;

    fn velocity_for(&self, index: usize) -> NVec3;

    fn acceleration_for(&self, index: usize) -> NVec3;

    /// Current total energy (kinetic + pairwise potential) of `state`,
    /// skipping INACTIVE bodies.
    fn energy(&self, state: &GravityState) -> f64;

    /// Total energy recorded by `pre_evolve`, for drift diagnostics.
    fn initial_energy(&self) -> f64;

    /// Independent copy of this integrator with identical array contents
    /// and no shared mutable numeric storage. External-acceleration slots
    /// keep pointing at the same plugin objects; those distinguish live
    /// from speculative states themselves. Pair with
    /// `GravityState::clone_state` for what-if evolution.
    fn deep_clone(&self) -> Box<dyn GravityIntegrator>;
}

/// Kinetic plus pairwise potential energy, skipping INACTIVE bodies.
/// Coincident pairs contribute no potential rather than an infinity.
pub(crate) fn total_energy(g: f64, state: &GravityState) -> f64 {
    let n = state.body_count();
    let mut energy = 0.0;

    for i in 0..n {
        if state.status(i).is_inactive() {
            continue;
        }
        energy += 0.5 * state.mass(i) * state.velocity(i).norm_squared();

        for j in (i + 1)..n {
            if state.status(j).is_inactive() {
                continue;
            }
            let r = (state.position(j) - state.position(i)).norm();
            if r > 0.0 {
                energy -= g * state.mass(i) * state.mass(j) / r;
            }
        }
    }

    energy
}
