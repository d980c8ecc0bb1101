pub mod constants;
pub mod defects;
pub mod dos;
pub mod error;
pub mod input;
pub mod solver;
pub mod system;

pub use defects::{DefectChargeState, DefectSpecies};
pub use dos::{DensityOfStates, Dos};
pub use error::ScFermiError;
pub use input::InputSet;
pub use solver::{AdaptiveStepSolver, NeutralitySolver, SolverOptions, SolverResult};
pub use system::{ConcentrationValue, DefectSystem};
