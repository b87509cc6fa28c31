use std::cell::RefCell;
use std::rc::Rc;

use approx::{assert_abs_diff_eq, assert_relative_eq};

use gravsim::{
    AtmosphericDrag, BodyStatus, ExternalAcceleration, ForceDelegate, ForceLaw, GravityIntegrator,
    GravityState, HermiteIntegrator, ImpactObserver, LeapFrogIntegrator, NVec3, RocketEngine,
    Stage,
};

/// Build a simple 2-body state separated along the x-axis
fn two_body_state(dist: f64, m1: f64, m2: f64) -> GravityState {
    let mut state = GravityState::new(8);
    state.add_body(
        m1,
        NVec3::new(-dist / 2.0, 0.0, 0.0),
        NVec3::zeros(),
        BodyStatus::ACTIVE,
    );
    state.add_body(
        m2,
        NVec3::new(dist / 2.0, 0.0, 0.0),
        NVec3::zeros(),
        BodyStatus::ACTIVE,
    );
    state
}

/// Hermite integrator mirroring `state`, bodies appended in lockstep
fn hermite_for(state: &GravityState, dt: f64, g: f64, eps: f64) -> HermiteIntegrator {
    let mut integ = HermiteIntegrator::new(state.capacity(), dt);
    integ.set_gravitational_constant(g);
    integ.set_softening(eps);
    for i in 0..state.body_count() {
        integ.add_body(i, state.mass(i), state.position(i), state.velocity(i));
    }
    integ
}

/// LeapFrog integrator mirroring `state`
fn leapfrog_for(state: &GravityState, dt: f64, g: f64, eps: f64) -> LeapFrogIntegrator {
    let mut integ = LeapFrogIntegrator::new(state.capacity(), dt);
    integ.set_gravitational_constant(g);
    integ.set_softening(eps);
    for i in 0..state.body_count() {
        integ.add_body(i, state.mass(i), state.position(i), state.velocity(i));
    }
    integ
}

/// Circular two-body orbit about the common center of mass, separation 1
fn circular_binary(m1: f64, m2: f64) -> GravityState {
    let total = m1 + m2;
    let omega = total.sqrt(); // G = 1, r = 1
    let x1 = -m2 / total;
    let x2 = m1 / total;

    let mut state = GravityState::new(2);
    state.add_body(
        m1,
        NVec3::new(x1, 0.0, 0.0),
        NVec3::new(0.0, omega * x1, 0.0),
        BodyStatus::ACTIVE,
    );
    state.add_body(
        m2,
        NVec3::new(x2, 0.0, 0.0),
        NVec3::new(0.0, omega * x2, 0.0),
        BodyStatus::ACTIVE,
    );
    state
}

/// Drive `evolve` until at least `t_total` has elapsed, in `tick` chunks
fn drive(integ: &mut dyn GravityIntegrator, state: &mut GravityState, t_total: f64, tick: f64) {
    let mut t = 0.0;
    while t < t_total {
        t += integ.evolve(tick.min(t_total - t), state);
    }
}

// ==================================================================================
// Gravity / force-pass tests
// ==================================================================================

#[test]
fn gravity_newton_third_law() {
    let mut state = two_body_state(1.0, 2.0, 3.0);
    let mut integ = hermite_for(&state, 0.001, 0.1, 0.0);
    integ.pre_evolve(&mut state);

    let net = integ.acceleration_for(0) * state.mass(0) + integ.acceleration_for(1) * state.mass(1);

    assert!(net.norm() < 1e-12, "Net momentum rate not zero: {:?}", net);
}

#[test]
fn gravity_points_toward_other_body() {
    let mut state = two_body_state(2.0, 1.0, 1.0);
    let mut integ = hermite_for(&state, 0.001, 0.1, 0.0);
    integ.pre_evolve(&mut state);

    let dx = state.position(1) - state.position(0);
    let a0 = integ.acceleration_for(0);

    assert!(dx.norm() > 0.0);
    assert!(a0.dot(&dx) > 0.0, "Acceleration is not toward second body");
}

#[test]
fn gravity_inverse_square_law() {
    let mut state_r = two_body_state(1.0, 1.0, 1.0);
    let mut state_2r = two_body_state(2.0, 1.0, 1.0);
    let mut integ_r = hermite_for(&state_r, 0.001, 0.1, 0.0);
    let mut integ_2r = hermite_for(&state_2r, 0.001, 0.1, 0.0);

    integ_r.pre_evolve(&mut state_r);
    integ_2r.pre_evolve(&mut state_2r);

    let ratio = integ_r.acceleration_for(0).norm() / integ_2r.acceleration_for(0).norm();

    assert!((ratio - 4.0).abs() < 1e-3, "Expected ~4x, got {}", ratio);
}

#[test]
fn gravity_softening_prevents_blowup() {
    let mut state = two_body_state(1e-9, 1.0, 1.0);
    let mut integ = hermite_for(&state, 0.001, 0.1, 0.1);
    integ.pre_evolve(&mut state);

    assert!(
        integ.acceleration_for(0).norm() < 1e9,
        "Softening failed; acceleration too large"
    );
}

/// An inverse-square delegate must reproduce the built-in Newtonian path
struct InverseSquare {
    g: f64,
}

impl ForceDelegate for InverseSquare {
    fn accel(&self, r: f64) -> f64 {
        self.g / (r * r)
    }

    fn accel_dot(&self, r: f64) -> f64 {
        -2.0 * self.g / (r * r * r)
    }
}

#[test]
fn force_delegate_matches_newtonian() {
    let g = 0.1;

    let mut state_a = two_body_state(2.0, 1.0, 3.0);
    let mut newton = hermite_for(&state_a, 0.001, g, 0.0);
    newton.pre_evolve(&mut state_a);

    let mut state_b = two_body_state(2.0, 1.0, 3.0);
    let mut custom = hermite_for(&state_b, 0.001, g, 0.0);
    custom.set_force_law(ForceLaw::Custom(Rc::new(InverseSquare { g })));
    custom.pre_evolve(&mut state_b);

    for i in 0..2 {
        let a_n = newton.acceleration_for(i);
        let a_c = custom.acceleration_for(i);
        assert_relative_eq!(a_n.x, a_c.x, epsilon = 1e-12);
        assert_relative_eq!(a_n.y, a_c.y, epsilon = 1e-12);
        assert_relative_eq!(a_n.z, a_c.z, epsilon = 1e-12);
    }
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn hermite_circular_orbit_round_trip() {
    // Fixed central unit mass, massless particle at r = 1 with v = sqrt(GM/r)
    let mut state = GravityState::new(2);
    state.add_body(
        1.0,
        NVec3::zeros(),
        NVec3::zeros(),
        BodyStatus::ACTIVE | BodyStatus::FIXED_MOTION,
    );
    state.add_body(
        0.0,
        NVec3::new(1.0, 0.0, 0.0),
        NVec3::new(0.0, 1.0, 0.0),
        BodyStatus::ACTIVE,
    );

    let mut integ = hermite_for(&state, 0.01, 1.0, 1e-9);
    integ.pre_evolve(&mut state);

    let period = 2.0 * std::f64::consts::PI;
    drive(&mut integ, &mut state, period, 0.3);

    let pos = state.position(1);
    let vel = state.velocity(1);
    assert_abs_diff_eq!(pos.x, 1.0, epsilon = 2e-2);
    assert_abs_diff_eq!(pos.y, 0.0, epsilon = 2e-2);
    assert_abs_diff_eq!(vel.x, 0.0, epsilon = 2e-2);
    assert_abs_diff_eq!(vel.y, 1.0, epsilon = 2e-2);
}

#[test]
fn hermite_energy_conservation() {
    let mut state = circular_binary(1.0, 1e-3);
    let mut integ = hermite_for(&state, 0.01, 1.0, 1e-9);
    integ.pre_evolve(&mut state);

    let e0 = integ.initial_energy();
    assert!(e0 < 0.0, "bound orbit should have negative energy");

    // ~10^4 sub-steps at dt = 0.01
    drive(&mut integ, &mut state, 100.0, 0.3);

    let drift = ((integ.energy(&state) - e0) / e0).abs();
    assert!(drift < 1e-4, "Hermite energy drift too large: {drift:e}");
}

#[test]
fn leapfrog_energy_bounded() {
    let mut state = circular_binary(1.0, 1e-3);
    let mut integ = leapfrog_for(&state, 0.001, 1.0, 1e-9);
    integ.pre_evolve(&mut state);

    let e0 = integ.initial_energy();

    // 10^4 fixed steps
    drive(&mut integ, &mut state, 10.0, 1.0);

    let drift = ((integ.energy(&state) - e0) / e0).abs();
    assert!(drift < 1e-4, "LeapFrog energy drift too large: {drift:e}");
}

#[test]
fn evolve_overshoots_by_at_most_one_step() {
    let mut state = two_body_state(1.0, 1.0, 1.0);
    let mut integ = leapfrog_for(&state, 0.01, 0.1, 1e-9);
    integ.pre_evolve(&mut state);

    let actual = integ.evolve(0.105, &mut state);
    assert!(actual >= 0.105, "returned less than requested: {actual}");
    assert!(actual < 0.105 + 0.01 + 1e-12, "overshoot exceeds one step: {actual}");
}

#[test]
fn adaptive_step_shrinks_on_close_approach() {
    // Hyperbolic flyby past a fixed central mass, impact parameter 0.5
    let mut state = GravityState::new(2);
    state.add_body(
        1.0,
        NVec3::zeros(),
        NVec3::zeros(),
        BodyStatus::ACTIVE | BodyStatus::FIXED_MOTION,
    );
    state.add_body(
        1e-6,
        NVec3::new(-10.0, 0.5, 0.0),
        NVec3::new(1.5, 0.0, 0.0),
        BodyStatus::ACTIVE,
    );

    let mut integ = hermite_for(&state, 0.01, 1.0, 1e-9);
    integ.pre_evolve(&mut state);
    let dt0 = integ.nominal_step();

    let mut min_step = f64::INFINITY;
    for _ in 0..1000 {
        integ.evolve(0.02, &mut state);
        min_step = min_step.min(integ.current_step());
    }

    assert!(
        min_step < 0.5 * dt0,
        "step did not shrink near closest approach: {min_step} vs nominal {dt0}"
    );
    assert!(
        state.position(1).norm() > 10.0,
        "flyby should have separated again"
    );
    assert!(
        integ.current_step() > 0.7 * dt0,
        "step did not recover after separation: {}",
        integ.current_step()
    );
}

#[test]
fn fixed_body_perturbs_but_never_moves() {
    let mut state = GravityState::new(2);
    state.add_body(
        5.0,
        NVec3::new(0.0, 3.0, 0.0),
        NVec3::new(9.0, 9.0, 9.0), // junk velocity; must never be applied
        BodyStatus::ACTIVE | BodyStatus::FIXED_MOTION,
    );
    state.add_body(
        1e-3,
        NVec3::new(1.0, 0.0, 0.0),
        NVec3::zeros(),
        BodyStatus::ACTIVE,
    );

    let mut integ = hermite_for(&state, 0.001, 1.0, 1e-9);
    integ.pre_evolve(&mut state);

    let fixed_pos = state.position(0);
    let fixed_vel = state.velocity(0);
    drive(&mut integ, &mut state, 0.5, 0.04);

    assert_eq!(state.position(0), fixed_pos, "fixed body moved");
    assert_eq!(state.velocity(0), fixed_vel, "fixed body velocity changed");

    // The free body must have bent toward the fixed mass
    let v = state.velocity(1);
    assert!(v.y > 0.0, "free body was not attracted toward the fixed mass");
}

#[test]
fn inactive_body_is_skipped_entirely() {
    let mut state = two_body_state(1.0, 1.0, 1.0);
    state.set_status(1, BodyStatus::INACTIVE);

    let mut integ = hermite_for(&state, 0.001, 1.0, 1e-9);
    integ.pre_evolve(&mut state);

    assert_eq!(integ.acceleration_for(0), NVec3::zeros());

    let p0 = state.position(0);
    drive(&mut integ, &mut state, 0.5, 0.04);
    assert_eq!(state.position(0), p0, "lone active body should feel nothing");
}

// ==================================================================================
// Clone / speculative-evolution tests
// ==================================================================================

#[test]
fn clone_is_independent_of_live_state() {
    let mut state = two_body_state(1.0, 1.0, 1.0);
    let mut integ = hermite_for(&state, 0.001, 1.0, 1e-9);
    integ.pre_evolve(&mut state);

    let live_p1 = state.position(1);

    let mut clone = state.clone_state();
    assert!(!clone.is_live());

    clone.set_position(1, NVec3::new(42.0, 0.0, 0.0));
    assert_eq!(state.position(1), live_p1, "live state saw a clone mutation");

    // Evolve the clone through a cloned integrator; live state must not move
    let live_p0 = state.position(0);
    let mut clone_integ = integ.deep_clone();
    clone_integ.evolve(0.04, &mut clone);

    assert_eq!(state.position(0), live_p0);
    assert_eq!(state.position(1), live_p1);
    assert_ne!(clone.position(0), live_p0, "clone did not evolve");
}

#[test]
fn rocket_fuel_is_referentially_transparent_across_clones() {
    let mut state = GravityState::new(2);
    state.add_body(
        1.0,
        NVec3::zeros(),
        NVec3::zeros(),
        BodyStatus::ACTIVE | BodyStatus::FIXED_MOTION,
    );
    state.add_body(
        1.0,
        NVec3::new(5.0, 0.0, 0.0),
        NVec3::new(0.0, 0.4, 0.0),
        BodyStatus::ACTIVE,
    );

    let rocket = Rc::new(RefCell::new(RocketEngine::new(
        0.5,
        NVec3::new(0.0, 1.0, 0.0),
        1.0,
        vec![Stage {
            dry_mass: 0.2,
            fuel_mass: 1.0,
            burn_rate: 0.05,
            thrust: 2.0,
            cross_section: 0.0,
            drag_coefficient: 0.0,
        }],
    )));
    rocket.borrow_mut().set_engine(true);

    let mut integ = hermite_for(&state, 0.01, 1.0, 1e-9);
    integ.set_external_acceleration(1, Some(rocket.clone()));
    integ.pre_evolve(&mut state);

    let fuel_before = rocket.borrow().fuel_remaining();

    // Two what-if evolutions over the same interval
    let mut clone_a = state.clone_state();
    let mut integ_a = integ.deep_clone();
    drive(integ_a.as_mut(), &mut clone_a, 2.0, 0.4);

    let mut clone_b = state.clone_state();
    let mut integ_b = integ.deep_clone();
    drive(integ_b.as_mut(), &mut clone_b, 2.0, 0.4);

    assert_eq!(
        clone_a.velocity(1),
        clone_b.velocity(1),
        "clone evolutions diverged: plugin state leaked between them"
    );
    assert_eq!(
        rocket.borrow().fuel_remaining(),
        fuel_before,
        "clone evolution consumed live fuel"
    );

    // Only a live evolve actually burns
    drive(&mut integ, &mut state, 2.0, 0.4);
    assert!(
        rocket.borrow().fuel_remaining() < fuel_before,
        "live evolution did not consume fuel"
    );
}

#[test]
fn body_removal_compacts_and_reindexes() {
    let mut state = GravityState::new(3);
    state.add_body(1.0, NVec3::new(0.0, 0.0, 0.0), NVec3::new(0.1, 0.0, 0.0), BodyStatus::ACTIVE);
    state.add_body(2.0, NVec3::new(1.0, 0.0, 0.0), NVec3::new(0.2, 0.0, 0.0), BodyStatus::ACTIVE);
    state.add_body(3.0, NVec3::new(2.0, 0.0, 0.0), NVec3::new(0.3, 0.0, 0.0), BodyStatus::ACTIVE);

    let mut integ = hermite_for(&state, 0.001, 1.0, 1e-9);

    state.remove_body_at(1);
    integ.remove_body_at(1);

    assert_eq!(state.body_count(), 2);
    assert_eq!(state.mass(0), 1.0);
    assert_eq!(state.mass(1), 3.0);
    assert_eq!(state.position(1), NVec3::new(2.0, 0.0, 0.0));
    assert_eq!(integ.velocity_for(0), NVec3::new(0.1, 0.0, 0.0));
    assert_eq!(integ.velocity_for(1), NVec3::new(0.3, 0.0, 0.0));

    // The compacted pair must still evolve cleanly
    integ.pre_evolve(&mut state);
    drive(&mut integ, &mut state, 0.1, 0.04);
}

#[test]
fn state_capacity_is_enforced_and_growable() {
    let mut state = GravityState::new(1);
    assert!(state
        .add_body(1.0, NVec3::zeros(), NVec3::zeros(), BodyStatus::ACTIVE)
        .is_some());
    assert!(
        state
            .add_body(1.0, NVec3::zeros(), NVec3::zeros(), BodyStatus::ACTIVE)
            .is_none(),
        "append past capacity must be rejected"
    );

    state.grow(1);
    assert_eq!(
        state.add_body(2.0, NVec3::new(1.0, 0.0, 0.0), NVec3::zeros(), BodyStatus::ACTIVE),
        Some(1)
    );
}

// ==================================================================================
// External-acceleration tests
// ==================================================================================

#[test]
fn rocket_thrust_drops_to_zero_on_exhaustion() {
    let mut state = GravityState::new(1);
    state.add_body(1.0, NVec3::zeros(), NVec3::zeros(), BodyStatus::ACTIVE);

    let mut rocket = RocketEngine::new(
        0.5,
        NVec3::new(1.0, 0.0, 0.0),
        1.0,
        vec![Stage {
            dry_mass: 0.1,
            fuel_mass: 0.2,
            burn_rate: 0.1,
            thrust: 4.0,
            cross_section: 0.0,
            drag_coefficient: 0.0,
        }],
    );
    rocket.set_engine(true);

    let mut mass = state.mass(0);
    // First live query establishes the clock without burning
    let a0 = rocket.acceleration(0.0, &state, 0, &mut mass);
    assert!(a0.x > 0.0, "engine on with fuel should thrust");
    assert_relative_eq!(mass, 0.8, epsilon = 1e-12);

    // Burn through all fuel (0.2 / 0.1 per unit time = 2 time units)
    let a1 = rocket.acceleration(1.0, &state, 0, &mut mass);
    assert!(a1.x > a0.x, "thrust should rise as the vehicle lightens");

    let a2 = rocket.acceleration(10.0, &state, 0, &mut mass);
    assert_eq!(a2, NVec3::zeros(), "exhausted stage must not thrust");
    assert_eq!(rocket.fuel_remaining(), 0.0);
    assert_relative_eq!(mass, 0.6, epsilon = 1e-12); // payload + dry, fuel gone
}

#[test]
fn rocket_staging_is_explicit() {
    let stage = |fuel: f64| Stage {
        dry_mass: 0.1,
        fuel_mass: fuel,
        burn_rate: 1.0,
        thrust: 1.0,
        cross_section: 0.0,
        drag_coefficient: 0.0,
    };
    let mut rocket = RocketEngine::new(0.5, NVec3::new(1.0, 0.0, 0.0), 1.0, vec![stage(0.0), stage(0.3)]);
    rocket.set_engine(true);

    let state = {
        let mut s = GravityState::new(1);
        s.add_body(1.0, NVec3::zeros(), NVec3::zeros(), BodyStatus::ACTIVE);
        s
    };

    // First stage is dry: no thrust, but no automatic staging either
    let mut mass = 1.0;
    assert_eq!(rocket.acceleration(0.0, &state, 0, &mut mass), NVec3::zeros());
    assert_eq!(rocket.active_stage(), 0);
    assert_relative_eq!(mass, 1.0, epsilon = 1e-12); // 0.5 + 2 * 0.1 + 0.3

    rocket.next_stage();
    assert_eq!(rocket.active_stage(), 1);
    let a = rocket.acceleration(0.0, &state, 0, &mut mass);
    assert!(a.x > 0.0, "second stage should thrust after explicit staging");
    assert_relative_eq!(mass, 0.9, epsilon = 1e-12); // first stage dry mass dropped
}

#[test]
fn drag_density_table_interpolates_linearly() {
    let drag = AtmosphericDrag::new(0, 10.0, 0.0, vec![1.0, 0.5, 0.25], 1.0, 1.0, 1.0);

    assert_relative_eq!(drag.density_at(0.0), 1.0, epsilon = 1e-12);
    assert_relative_eq!(drag.density_at(5.0), 0.75, epsilon = 1e-12);
    assert_relative_eq!(drag.density_at(10.0), 0.5, epsilon = 1e-12);
    assert_relative_eq!(drag.density_at(15.0), 0.375, epsilon = 1e-12);
    // Clamped outside the table
    assert_relative_eq!(drag.density_at(-3.0), 1.0, epsilon = 1e-12);
    assert_relative_eq!(drag.density_at(500.0), 0.25, epsilon = 1e-12);
}

#[test]
fn drag_opposes_relative_velocity() {
    let mut state = GravityState::new(2);
    state.add_body(
        100.0,
        NVec3::zeros(),
        NVec3::zeros(),
        BodyStatus::ACTIVE | BodyStatus::FIXED_MOTION,
    );
    state.add_body(
        1.0,
        NVec3::new(15.0, 0.0, 0.0), // altitude 5 above surface radius 10
        NVec3::new(0.0, 2.0, 0.0),
        BodyStatus::ACTIVE,
    );

    let mut drag = AtmosphericDrag::new(0, 10.0, 0.0, vec![1.0, 0.5], 2.0, 0.5, 4.0);

    let mut mass = state.mass(1);
    let a = drag.acceleration(0.0, &state, 1, &mut mass);

    // 0.5 * rho(5) * v^2 * cd * area / m = 0.5 * 0.75 * 4 * 2 * 0.5 / 4
    let expected = 0.5 * 0.75 * 4.0 * 2.0 * 0.5 / 4.0;
    assert!(a.y < 0.0, "drag must oppose the velocity");
    assert_relative_eq!(a.y, -expected, epsilon = 1e-12);
    assert_abs_diff_eq!(a.x, 0.0, epsilon = 1e-15);
}

#[test]
fn drag_ignores_near_zero_relative_velocity() {
    let mut state = GravityState::new(2);
    state.add_body(
        100.0,
        NVec3::zeros(),
        NVec3::zeros(),
        BodyStatus::ACTIVE | BodyStatus::FIXED_MOTION,
    );
    state.add_body(
        1.0,
        NVec3::new(15.0, 0.0, 0.0),
        NVec3::new(0.0, 1e-9, 0.0),
        BodyStatus::ACTIVE,
    );

    let mut drag = AtmosphericDrag::new(0, 10.0, 0.0, vec![1.0], 2.0, 0.5, 4.0);
    let mut mass = 1.0;
    assert_eq!(drag.acceleration(0.0, &state, 1, &mut mass), NVec3::zeros());
}

struct ImpactCounter {
    count: usize,
}

impl ImpactObserver for ImpactCounter {
    fn on_impact(&mut self, _body: usize, _time: f64, _speed: f64) {
        self.count += 1;
    }
}

#[test]
fn drag_impact_latches_once_and_only_for_live_state() {
    let mut state = GravityState::new(2);
    state.add_body(
        100.0,
        NVec3::zeros(),
        NVec3::zeros(),
        BodyStatus::ACTIVE | BodyStatus::FIXED_MOTION,
    );
    state.add_body(
        1.0,
        NVec3::new(9.0, 0.0, 0.0), // below the surface at radius 10
        NVec3::new(-1.0, 0.0, 0.0),
        BodyStatus::ACTIVE,
    );

    let counter = Rc::new(RefCell::new(ImpactCounter { count: 0 }));
    let mut drag = AtmosphericDrag::new(0, 10.0, 0.0, vec![1.0], 2.0, 0.5, 4.0);
    drag.set_impact_observer(Some(counter.clone()));

    // A speculative query below the surface gives zero but does not latch
    let clone = state.clone_state();
    let mut mass = 1.0;
    assert_eq!(drag.acceleration(0.0, &clone, 1, &mut mass), NVec3::zeros());
    assert!(!drag.has_impacted());
    assert_eq!(counter.borrow().count, 0);

    // Live queries latch exactly once
    assert_eq!(drag.acceleration(0.0, &state, 1, &mut mass), NVec3::zeros());
    assert_eq!(drag.acceleration(0.1, &state, 1, &mut mass), NVec3::zeros());
    assert!(drag.has_impacted());
    assert_eq!(counter.borrow().count, 1, "impact must be reported exactly once");
}
