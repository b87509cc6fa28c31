pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use simulation::states::{BodyStatus, GravityState, NVec3};
pub use simulation::forces::{ForceDelegate, ForceLaw};
pub use simulation::external::{
    AtmosphericDrag, ExternalAcceleration, ImpactObserver, RocketEngine, SharedAcceleration, Stage,
};
pub use simulation::integrator::GravityIntegrator;
pub use simulation::hermite::HermiteIntegrator;
pub use simulation::leapfrog::LeapFrogIntegrator;
pub use simulation::scenario::Scenario;
pub use simulation::params::Parameters;

pub use configuration::config::{
    BodyConfig, DragConfig, EngineConfig, IntegratorConfig, ParametersConfig, RocketConfig,
    ScenarioConfig, StageConfig,
};

pub use benchmark::benchmark::{bench_integrators, bench_pair_pass};
