//! Pairwise force accumulation for the N-body engine.
//!
//! Provides the default Newtonian inverse-square law with softening, and a
//! pluggable radial force-law delegate for non-Newtonian experiments. The
//! delegate path is a separate loop from the Newtonian one so the hot
//! per-pair code carries no force-law branch.

use std::rc::Rc;

use crate::simulation::states::{GravityState, NVec3};

/// Relative speeds below this are ignored by the collision-time estimate
/// (a pair that is not moving apart or together has no meaningful estimate).
const MIN_REL_SPEED_SQ: f64 = 1e-30;

/// Caller-defined radial force law used in place of inverse-square gravity.
///
/// `accel(r)` is the acceleration magnitude per unit source mass at
/// separation `r` (positive = attractive, constants such as G folded in by
/// the implementation); `accel_dot(r)` is its radial derivative, needed for
/// the Hermite jerk term.
pub trait ForceDelegate {
    fn accel(&self, r: f64) -> f64;
    fn accel_dot(&self, r: f64) -> f64;
}

/// Which force law a pair pass applies, selected at attach time.
#[derive(Clone)]
pub enum ForceLaw {
    /// Newtonian inverse-square with softening, scaled by `g`.
    Newtonian,
    /// Delegate-supplied radial pseudo-force.
    Custom(Rc<dyn ForceDelegate>),
}

impl ForceLaw {
    /// Accumulate pairwise accelerations into `acc` (no jerk). Used by the
    /// leapfrog integrator and diagnostics.
    pub(crate) fn accumulate(&self, g: f64, eps: f64, state: &GravityState, acc: &mut [NVec3]) {
        match self {
            ForceLaw::Newtonian => newtonian_pass(g, eps, state, acc),
            ForceLaw::Custom(delegate) => delegate_pass(delegate.as_ref(), state, acc),
        }
    }

    /// Accumulate pairwise accelerations and jerks, returning the minimum
    /// over all contributing pairs of `separation² / relative_speed²` (the
    /// raw collision-time estimate), or `None` when no pair yields one.
    pub(crate) fn accumulate_with_jerk(
        &self,
        g: f64,
        eps: f64,
        state: &GravityState,
        acc: &mut [NVec3],
        jerk: &mut [NVec3],
    ) -> Option<f64> {
        match self {
            ForceLaw::Newtonian => newtonian_jerk_pass(g, eps, state, acc, jerk),
            ForceLaw::Custom(delegate) => delegate_jerk_pass(delegate.as_ref(), state, acc, jerk),
        }
    }
}

/// Whether the unordered pair (i, j) takes part in force accumulation.
///
/// INACTIVE bodies are skipped on both sides. A pair of two FIXED_MOTION
/// bodies does no useful work (neither side integrates) and can be
/// degenerate, so it is skipped too; a single fixed body stays in the loop
/// as a force source.
#[inline]
fn pair_contributes(state: &GravityState, i: usize, j: usize) -> bool {
    let si = state.status(i);
    let sj = state.status(j);
    if si.is_inactive() || sj.is_inactive() {
        return false;
    }
    !(si.is_fixed() && sj.is_fixed())
}

/// Direct O(N²) Newtonian gravity with softening.
///
/// The softening constant is added to the cubed separation, so the force
/// never becomes singular at near-zero distance.
fn newtonian_pass(g: f64, eps: f64, state: &GravityState, acc: &mut [NVec3]) {
    let n = state.body_count();

    // Loop over each unordered pair (i, j) with i < j
    for i in 0..n {
        for j in (i + 1)..n {
            if !pair_contributes(state, i, j) {
                continue;
            }

            // r points from i to j: i feels a pull along +r, j along -r
            let r = state.position(j) - state.position(i);
            let r2 = r.norm_squared();

            // Softened cube |r|³ + eps; eps floors the denominator so a
            // coincident pair yields a large but finite acceleration
            let r3 = r2 * r2.sqrt() + eps;
            let coef = g / r3;

            // Newton's third law: equal and opposite, scaled by the
            // other body's mass
            acc[i] += coef * state.mass(j) * r;
            acc[j] -= coef * state.mass(i) * r;
        }
    }
}

/// Newtonian pass that also accumulates the pairwise jerk (the time
/// derivative of acceleration) and tracks the collision-time estimate.
fn newtonian_jerk_pass(
    g: f64,
    eps: f64,
    state: &GravityState,
    acc: &mut [NVec3],
    jerk: &mut [NVec3],
) -> Option<f64> {
    let n = state.body_count();
    let mut min_coll_q: Option<f64> = None;

    for i in 0..n {
        for j in (i + 1)..n {
            if !pair_contributes(state, i, j) {
                continue;
            }

            let r = state.position(j) - state.position(i);
            let v = state.velocity(j) - state.velocity(i);
            let r2 = r.norm_squared();
            let v2 = v.norm_squared();
            let rv = r.dot(&v);

            let r3 = r2 * r2.sqrt() + eps;
            let coef = g / r3;

            acc[i] += coef * state.mass(j) * r;
            acc[j] -= coef * state.mass(i) * r;

            // d/dt of r/|r|³:  v/|r|³ − 3 (r·v) r / (|r|² |r|³)
            let beta = if r2 > 0.0 { 3.0 * rv / r2 } else { 0.0 };
            let jpair = coef * (v - beta * r);
            jerk[i] += state.mass(j) * jpair;
            jerk[j] -= state.mass(i) * jpair;

            // Raw collision-time estimate for step adaptation
            if v2 > MIN_REL_SPEED_SQ {
                let q = r2 / v2;
                min_coll_q = Some(match min_coll_q {
                    Some(m) => m.min(q),
                    None => q,
                });
            }
        }
    }

    min_coll_q
}

/// Delegate pair pass: radial force `f(r)` per unit source mass along the
/// separation direction, no jerk.
fn delegate_pass(delegate: &dyn ForceDelegate, state: &GravityState, acc: &mut [NVec3]) {
    let n = state.body_count();

    for i in 0..n {
        for j in (i + 1)..n {
            if !pair_contributes(state, i, j) {
                continue;
            }

            let r = state.position(j) - state.position(i);
            let rlen = r.norm();
            if rlen <= 0.0 {
                continue;
            }
            let rhat = r / rlen;

            let f = delegate.accel(rlen);
            acc[i] += state.mass(j) * f * rhat;
            acc[j] -= state.mass(i) * f * rhat;
        }
    }
}

/// Delegate pair pass with jerk. For a radial law `a = f(r) r̂`:
///
///   da/dt = f'(r) ṙ r̂ + f(r) (v/|r| − r (r·v)/|r|³)
///
/// with ṙ = (r·v)/|r|.
fn delegate_jerk_pass(
    delegate: &dyn ForceDelegate,
    state: &GravityState,
    acc: &mut [NVec3],
    jerk: &mut [NVec3],
) -> Option<f64> {
    let n = state.body_count();
    let mut min_coll_q: Option<f64> = None;

    for i in 0..n {
        for j in (i + 1)..n {
            if !pair_contributes(state, i, j) {
                continue;
            }

            let r = state.position(j) - state.position(i);
            let v = state.velocity(j) - state.velocity(i);
            let r2 = r.norm_squared();
            let v2 = v.norm_squared();
            if r2 <= 0.0 {
                continue;
            }
            let rlen = r2.sqrt();
            let rhat = r / rlen;
            let rv = r.dot(&v);
            let rdot = rv / rlen;

            let f = delegate.accel(rlen);
            let fdot = delegate.accel_dot(rlen);

            acc[i] += state.mass(j) * f * rhat;
            acc[j] -= state.mass(i) * f * rhat;

            let jpair = fdot * rdot * rhat + f * (v / rlen - r * (rv / (r2 * rlen)));
            jerk[i] += state.mass(j) * jpair;
            jerk[j] -= state.mass(i) * jpair;

            if v2 > MIN_REL_SPEED_SQ {
                let q = r2 / v2;
                min_coll_q = Some(match min_coll_q {
                    Some(m) => m.min(q),
                    None => q,
                });
            }
        }
    }

    min_coll_q
}
