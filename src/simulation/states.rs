//! Core state container for the N-body engine.
//!
//! `GravityState` owns the canonical masses, positions, velocities and
//! per-body status flags of one simulated "universe", stored as parallel
//! arrays indexed by body. It is the unit of cloning: speculative
//! ("what-if") evolution always runs against a `clone_state()` copy while
//! the live state keeps advancing once per tick.

use log::warn;
use nalgebra::Vector3;

pub type NVec3 = Vector3<f64>;

/// Per-body status bits.
///
/// INACTIVE bodies are skipped entirely in force accumulation. FIXED_MOTION
/// bodies exert gravity on others but their own position and velocity are
/// never advanced (their mass still matters).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyStatus(u8);

impl BodyStatus {
    pub const ACTIVE: BodyStatus = BodyStatus(0b0001);
    pub const INACTIVE: BodyStatus = BodyStatus(0b0010);
    pub const FIXED_MOTION: BodyStatus = BodyStatus(0b0100);

    #[inline]
    pub fn contains(self, other: BodyStatus) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_inactive(self) -> bool {
        self.contains(BodyStatus::INACTIVE)
    }

    #[inline]
    pub fn is_fixed(self) -> bool {
        self.contains(BodyStatus::FIXED_MOTION)
    }

    /// Whether this body participates in force accumulation at all.
    #[inline]
    pub fn contributes(self) -> bool {
        !self.is_inactive()
    }

    /// Whether the integrator advances this body's position and velocity.
    #[inline]
    pub fn integrates(self) -> bool {
        !self.is_inactive() && !self.is_fixed()
    }
}

impl std::ops::BitOr for BodyStatus {
    type Output = BodyStatus;

    fn bitor(self, rhs: BodyStatus) -> BodyStatus {
        BodyStatus(self.0 | rhs.0)
    }
}

impl Default for BodyStatus {
    fn default() -> Self {
        BodyStatus::ACTIVE
    }
}

/// Mutable snapshot of the whole simulated system.
///
/// Invariant: `masses`, `positions`, `velocities` and `status` are parallel
/// arrays of length `body_count()`. Body indices are stable for a body's
/// lifetime except that `remove_body_at` compacts the arrays, shifting all
/// higher indices down by one. A paired integrator must perform the same
/// shift on its own arrays in the same call sequence, and any externally
/// cached index must be invalidated on removal.
#[derive(Debug)]
pub struct GravityState {
    masses: Vec<f64>,
    positions: Vec<NVec3>,
    velocities: Vec<NVec3>,
    status: Vec<BodyStatus>,
    capacity: usize,
    physics_time: f64,
    live: bool,
}

impl GravityState {
    /// A live state with room for `capacity` bodies.
    pub fn new(capacity: usize) -> Self {
        Self {
            masses: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
            status: Vec::with_capacity(capacity),
            capacity,
            physics_time: 0.0,
            live: true,
        }
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.masses.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cumulative simulated time; stamps external-acceleration queries.
    #[inline]
    pub fn time(&self) -> f64 {
        self.physics_time
    }

    /// True on the authoritative, continuously-evolving state. Speculative
    /// copies from `clone_state()` report false, which is how side-effecting
    /// external accelerations (fuel burn, impact latch) know not to advance
    /// their persistent counters.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub(crate) fn advance_time(&mut self, dt: f64) {
        self.physics_time += dt;
    }

    /// Append a body. Returns the new index, or `None` (logged, no-op) if
    /// capacity is exhausted; callers must grow state and integrator
    /// together before appending past the initial capacity.
    pub fn add_body(
        &mut self,
        mass: f64,
        position: NVec3,
        velocity: NVec3,
        status: BodyStatus,
    ) -> Option<usize> {
        if self.masses.len() >= self.capacity {
            warn!(
                "add_body rejected: capacity {} exhausted (grow the state first)",
                self.capacity
            );
            return None;
        }
        self.masses.push(mass);
        self.positions.push(position);
        self.velocities.push(velocity);
        self.status.push(status);
        Some(self.masses.len() - 1)
    }

    /// Remove the body at `index`, shifting all higher-indexed entries down
    /// by one.
    pub fn remove_body_at(&mut self, index: usize) {
        if index >= self.masses.len() {
            warn!(
                "remove_body_at({index}) out of range, body_count = {}",
                self.masses.len()
            );
            return;
        }
        self.masses.remove(index);
        self.positions.remove(index);
        self.velocities.remove(index);
        self.status.remove(index);
    }

    /// Reserve room for `additional` more bodies.
    pub fn grow(&mut self, additional: usize) {
        self.capacity += additional;
        self.masses.reserve(additional);
        self.positions.reserve(additional);
        self.velocities.reserve(additional);
        self.status.reserve(additional);
    }

    /// Full independent copy of every array and the physics clock, marked
    /// non-live. A prediction routine mutates the copy (e.g. injects a trial
    /// maneuver) and evolves it forward without perturbing this state.
    pub fn clone_state(&self) -> GravityState {
        GravityState {
            masses: self.masses.clone(),
            positions: self.positions.clone(),
            velocities: self.velocities.clone(),
            status: self.status.clone(),
            capacity: self.capacity,
            physics_time: self.physics_time,
            live: false,
        }
    }

    // Hot-path accessors. An out-of-range index is a programming error and
    // panics via slice indexing; no clamping.

    #[inline]
    pub fn position(&self, index: usize) -> NVec3 {
        self.positions[index]
    }

    #[inline]
    pub fn velocity(&self, index: usize) -> NVec3 {
        self.velocities[index]
    }

    #[inline]
    pub fn mass(&self, index: usize) -> f64 {
        self.masses[index]
    }

    #[inline]
    pub fn status(&self, index: usize) -> BodyStatus {
        self.status[index]
    }

    #[inline]
    pub fn set_position(&mut self, index: usize, value: NVec3) {
        self.positions[index] = value;
    }

    #[inline]
    pub fn set_velocity(&mut self, index: usize, value: NVec3) {
        self.velocities[index] = value;
    }

    #[inline]
    pub fn set_mass(&mut self, index: usize, value: f64) {
        self.masses[index] = value;
    }

    #[inline]
    pub fn set_status(&mut self, index: usize, value: BodyStatus) {
        self.status[index] = value;
    }
}
