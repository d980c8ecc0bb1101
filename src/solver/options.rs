//! This module defines configuration options for the charge-neutrality solver.
//!
//! It provides the `SolverOptions` struct, which controls the convergence
//! criterion and the iteration budget of the Fermi-level search. These options
//! trade computational cost against the tightness of the charge balance.

/// Configuration parameters for the charge-neutrality solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// The convergence tolerance on the net charge per cell.
    ///
    /// The search stops once `|q_tot(E_F)|` falls below this threshold.
    /// The default matches the legacy SC-FERMI tool, which drives the
    /// residual down to the limits of double precision.
    pub convergence_tolerance: f64,
    /// The maximum number of trial steps allowed.
    ///
    /// Exhausting the budget is not an error: the solver returns its best
    /// estimate together with a non-convergence diagnostic.
    pub n_trial_steps: u32,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            convergence_tolerance: 1e-18,
            n_trial_steps: 1500,
        }
    }
}
