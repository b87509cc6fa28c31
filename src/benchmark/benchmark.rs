use std::time::Instant;

use crate::simulation::forces::ForceLaw;
use crate::simulation::hermite::HermiteIntegrator;
use crate::simulation::integrator::GravityIntegrator;
use crate::simulation::leapfrog::LeapFrogIntegrator;
use crate::simulation::states::{BodyStatus, GravityState, NVec3};

/// Helper to build a deterministic state of size `n` (no rand needed)
fn make_state(n: usize) -> GravityState {
    let mut state = GravityState::new(n);
    for i in 0..n {
        let i_f = i as f64;
        let x = NVec3::new(
            (i_f * 0.37).sin() * 5.0,
            (i_f * 0.13).cos() * 5.0,
            (i_f * 0.07).sin() * 5.0,
        );
        let v = NVec3::new(
            (i_f * 0.11).cos() * 0.1,
            (i_f * 0.23).sin() * 0.1,
            0.0,
        );
        state.add_body(1.0, x, v, BodyStatus::ACTIVE);
    }
    state
}

/// Time one acceleration-only pair pass and one acceleration+jerk pass for
/// a range of body counts. Paste output directly into a spreadsheet.
pub fn bench_pair_pass() {
    let ns = [200, 400, 800, 1600, 3200, 6400];
    let g = 0.1;
    let eps = 1e-4;

    println!("N,acc_ms,acc_jerk_ms");

    for n in ns {
        let state = make_state(n);
        let law = ForceLaw::Newtonian;

        let mut acc = vec![NVec3::zeros(); n];
        let mut jerk = vec![NVec3::zeros(); n];

        // Warm up
        law.accumulate(g, eps, &state, &mut acc);
        law.accumulate_with_jerk(g, eps, &state, &mut acc, &mut jerk);

        let t0 = Instant::now();
        law.accumulate(g, eps, &state, &mut acc);
        let acc_ms = t0.elapsed().as_secs_f64() * 1000.0;

        let t1 = Instant::now();
        law.accumulate_with_jerk(g, eps, &state, &mut acc, &mut jerk);
        let acc_jerk_ms = t1.elapsed().as_secs_f64() * 1000.0;

        println!("{n},{acc_ms:.6},{acc_jerk_ms:.6}");
    }
}

/// Time one `evolve` tick of each integrator for a range of body counts.
pub fn bench_integrators() {
    let ns = [200, 400, 800, 1600, 3200];
    let dt = 0.001;
    let tick = 0.01;
    let steps = 2; // evolve calls per measurement (tune as needed)

    println!("N,hermite_ms,leapfrog_ms");

    for n in ns {
        // Hermite
        let mut state_h = make_state(n);
        let mut hermite = HermiteIntegrator::new(n, dt);
        hermite.set_gravitational_constant(0.1);
        hermite.set_softening(1e-4);
        for i in 0..n {
            hermite.add_body(i, state_h.mass(i), state_h.position(i), state_h.velocity(i));
        }
        hermite.pre_evolve(&mut state_h);

        // Warm-up
        hermite.evolve(tick, &mut state_h);

        let t0 = Instant::now();
        for _ in 0..steps {
            hermite.evolve(tick, &mut state_h);
        }
        let hermite_ms = t0.elapsed().as_secs_f64() * 1000.0 / steps as f64;

        // LeapFrog
        let mut state_l = make_state(n);
        let mut leapfrog = LeapFrogIntegrator::new(n, dt);
        leapfrog.set_gravitational_constant(0.1);
        leapfrog.set_softening(1e-4);
        for i in 0..n {
            leapfrog.add_body(i, state_l.mass(i), state_l.position(i), state_l.velocity(i));
        }
        leapfrog.pre_evolve(&mut state_l);

        // Warm-up
        leapfrog.evolve(tick, &mut state_l);

        let t1 = Instant::now();
        for _ in 0..steps {
            leapfrog.evolve(tick, &mut state_l);
        }
        let leapfrog_ms = t1.elapsed().as_secs_f64() * 1000.0 / steps as f64;

        println!("{n},{hermite_ms:.6},{leapfrog_ms:.6}");
    }
}
