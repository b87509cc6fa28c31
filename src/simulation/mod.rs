pub mod states;
pub mod params;
pub mod engine;
pub mod forces;
pub mod external;
pub mod integrator;
pub mod hermite;
pub mod leapfrog;
pub mod scenario;
