//! This module implements the Fermi-level search for charge neutrality.
//!
//! The search is a damped sign-chasing walk, not a guaranteed-convergent
//! bisection: it steps the Fermi level in the direction that reduces the net
//! charge and quarters the step on every sign reversal. Its correctness rests
//! on `q_tot` being monotonically non-decreasing in the Fermi level, which
//! the physics guarantees and the solver does not verify. The strategy is
//! self-contained and surfaces explicit bracket-failure semantics, which is
//! why it is preferred over a generic bounded minimiser of `|q_tot|`.

use crate::error::ScFermiError;
use crate::solver::options::SolverOptions;

/// The outcome of a Fermi-level search.
///
/// Non-convergence is reported here rather than through a warning side
/// channel: when `converged` is false the caller still receives the best
/// estimate along with the residual and a local-slope error estimate, and can
/// decide to relax the tolerance or raise the step budget and re-solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverResult {
    /// The self-consistent Fermi level estimate, in eV.
    pub e_fermi: f64,
    /// Whether `|q_tot|` fell below the convergence tolerance.
    pub converged: bool,
    /// The absolute net charge at the last evaluated point.
    pub residual: f64,
    /// Finite-difference local slope estimate,
    /// `(q_tot(E_F + step) - q_tot(E_F - step)) / 2`.
    pub e_fermi_err: f64,
    /// The number of trial steps consumed.
    pub steps: u32,
}

/// A strategy for locating the root of a charge-neutrality functional.
///
/// The functional is passed as a plain closure so solver strategies can be
/// swapped without touching the defect model.
pub trait NeutralitySolver {
    /// Searches `[emin, emax]` for the Fermi level at which `q_tot` vanishes.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::Bracket` if both scan directions are exhausted
    /// without finding a sign change inside the bounds.
    fn solve(
        &self,
        q_tot: &dyn Fn(f64) -> f64,
        emin: f64,
        emax: f64,
    ) -> Result<SolverResult, ScFermiError>;
}

/// The default adaptive sign-chasing search.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveStepSolver {
    options: SolverOptions,
}

impl AdaptiveStepSolver {
    /// Creates a solver with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the solver with custom options.
    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }
}

impl NeutralitySolver for AdaptiveStepSolver {
    fn solve(
        &self,
        q_tot: &dyn Fn(f64) -> f64,
        emin: f64,
        emax: f64,
    ) -> Result<SolverResult, ScFermiError> {
        let mut e_fermi = 0.5 * (emin + emax);
        let mut step = 1.0;
        let mut direction = 1.0;
        let mut reached_min = false;
        let mut reached_max = false;
        let mut converged = false;
        let mut q = 0.0;
        let mut steps = 0;

        for _ in 0..self.options.n_trial_steps {
            steps += 1;
            q = q_tot(e_fermi);
            if e_fermi > emax {
                if reached_min || reached_max {
                    return Err(ScFermiError::Bracket { emin, emax });
                }
                reached_max = true;
                direction = -1.0;
            }
            if e_fermi < emin {
                if reached_min || reached_max {
                    return Err(ScFermiError::Bracket { emin, emax });
                }
                reached_min = true;
                direction = 1.0;
            }
            if q.abs() < self.options.convergence_tolerance {
                converged = true;
                break;
            }
            // A positive net charge while walking up (or negative while
            // walking down) means the root was overshot: damp and reverse.
            if q > 0.0 {
                if direction > 0.0 {
                    step *= 0.25;
                    direction = -1.0;
                }
            } else if q < 0.0 && direction < 0.0 {
                step *= 0.25;
                direction = 1.0;
            }
            e_fermi += direction * step;
        }

        let e_fermi_err = (q_tot(e_fermi + step) - q_tot(e_fermi - step)) / 2.0;

        Ok(SolverResult {
            e_fermi,
            converged,
            residual: q.abs(),
            e_fermi_err,
            steps,
        })
    }
}
