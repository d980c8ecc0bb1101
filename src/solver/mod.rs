//! Charge-neutrality root-finding.

/// Configuration options for the neutrality solver.
pub mod options;

/// The solver interface and the default adaptive sign-chasing search.
pub mod solver;

pub use options::SolverOptions;
pub use solver::{AdaptiveStepSolver, NeutralitySolver, SolverResult};
