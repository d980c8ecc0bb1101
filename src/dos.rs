//! This module defines the density-of-states boundary of the library.
//!
//! It includes the `DensityOfStates` trait for abstracting carrier-statistics
//! access, and the `Dos` struct, a concrete grid-based implementation that
//! integrates a tabulated density of states with Fermi–Dirac weights. The
//! trait decouples the charge-neutrality solver from any particular
//! electronic-structure representation, so analytic model densities can be
//! substituted in tests or by downstream code.

use crate::constants::BOLTZMANN_EV_PER_K;
use crate::error::ScFermiError;

/// A trait supplying integrated carrier statistics to a defect system.
///
/// Energies are in eV with the valence-band maximum at zero, so the band gap
/// spans `[0, bandgap]`. Implementations are read-only during a solve; the
/// solver evaluates `carrier_concentrations` many times and relies on the
/// answers being deterministic.
pub trait DensityOfStates {
    /// Returns the total number of electrons in the reference cell.
    fn nelect(&self) -> f64;

    /// Returns the band gap in eV.
    fn bandgap(&self) -> f64;

    /// Returns whether the underlying calculation was spin polarised.
    fn spin_polarised(&self) -> bool;

    /// Returns the lowest energy of the description, in eV.
    fn emin(&self) -> f64;

    /// Returns the highest energy of the description, in eV.
    fn emax(&self) -> f64;

    /// Returns the equilibrium hole and electron concentrations `(p0, n0)`
    /// per cell at the given Fermi level (eV) and temperature (K).
    fn carrier_concentrations(&self, e_fermi: f64, temperature: f64) -> (f64, f64);
}

/// A tabulated density of states on an ascending energy grid.
///
/// Hole concentrations integrate the valence states (`E <= 0`) weighted by
/// the hole occupation `1 - f(E)`, and electron concentrations integrate the
/// conduction states (`E >= bandgap`) weighted by `f(E)`, both with the
/// trapezoidal rule. Gap states, if the grid carries any, contribute to
/// neither carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct Dos {
    energies: Vec<f64>,
    dos: Vec<f64>,
    nelect: f64,
    bandgap: f64,
    spin_polarised: bool,
}

impl Dos {
    /// Creates a new `Dos` from an energy grid and matching DOS values.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::InvalidDos` if the grid and values differ in
    /// length, contain fewer than two points, or the energies do not
    /// increase strictly.
    pub fn new(
        energies: Vec<f64>,
        dos: Vec<f64>,
        nelect: f64,
        bandgap: f64,
        spin_polarised: bool,
    ) -> Result<Self, ScFermiError> {
        if energies.len() != dos.len() {
            return Err(ScFermiError::InvalidDos(format!(
                "energy grid has {} points but DOS has {}",
                energies.len(),
                dos.len()
            )));
        }
        if energies.len() < 2 {
            return Err(ScFermiError::InvalidDos(
                "at least two grid points are required".to_string(),
            ));
        }
        if energies.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ScFermiError::InvalidDos(
                "energy grid must be strictly ascending".to_string(),
            ));
        }
        Ok(Self {
            energies,
            dos,
            nelect,
            bandgap,
            spin_polarised,
        })
    }

    /// Rescales the DOS so that the valence states integrate to `nelect`.
    ///
    /// Raw densities from electronic-structure output are often in arbitrary
    /// units; normalising against the known electron count fixes the scale
    /// that the carrier concentrations inherit.
    pub fn normalise(&mut self) {
        let valence: Vec<(f64, f64)> = self
            .energies
            .iter()
            .zip(self.dos.iter())
            .filter(|(e, _)| **e <= 0.0)
            .map(|(e, d)| (*e, *d))
            .collect();
        let integral = trapezoid(&valence);
        if integral > 0.0 {
            let scale = self.nelect / integral;
            for d in &mut self.dos {
                *d *= scale;
            }
        }
    }

    /// Returns the energy grid in eV.
    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// Returns the DOS values, one per grid point.
    pub fn dos(&self) -> &[f64] {
        &self.dos
    }
}

impl DensityOfStates for Dos {
    fn nelect(&self) -> f64 {
        self.nelect
    }

    fn bandgap(&self) -> f64 {
        self.bandgap
    }

    fn spin_polarised(&self) -> bool {
        self.spin_polarised
    }

    fn emin(&self) -> f64 {
        self.energies[0]
    }

    fn emax(&self) -> f64 {
        self.energies[self.energies.len() - 1]
    }

    fn carrier_concentrations(&self, e_fermi: f64, temperature: f64) -> (f64, f64) {
        let kt = BOLTZMANN_EV_PER_K * temperature;

        let holes: Vec<(f64, f64)> = self
            .energies
            .iter()
            .zip(self.dos.iter())
            .filter(|(e, _)| **e <= 0.0)
            .map(|(e, d)| (*e, d / (1.0 + ((e_fermi - e) / kt).exp())))
            .collect();

        let electrons: Vec<(f64, f64)> = self
            .energies
            .iter()
            .zip(self.dos.iter())
            .filter(|(e, _)| **e >= self.bandgap)
            .map(|(e, d)| (*e, d / (1.0 + ((e - e_fermi) / kt).exp())))
            .collect();

        (trapezoid(&holes), trapezoid(&electrons))
    }
}

/// Trapezoidal integration over `(x, y)` samples with ascending `x`.
fn trapezoid(samples: &[(f64, f64)]) -> f64 {
    samples
        .windows(2)
        .map(|w| 0.5 * (w[1].0 - w[0].0) * (w[0].1 + w[1].1))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_band_dos() -> Dos {
        // Unit DOS in the valence band [-1, 0] and conduction band [1, 2],
        // zero in the gap.
        let energies: Vec<f64> = (0..=300).map(|i| -1.0 + i as f64 * 0.01).collect();
        let dos: Vec<f64> = energies
            .iter()
            .map(|e| if *e <= 0.0 || *e >= 1.0 { 1.0 } else { 0.0 })
            .collect();
        Dos::new(energies, dos, 4.0, 1.0, false).unwrap()
    }

    #[test]
    fn test_rejects_mismatched_grids() {
        let result = Dos::new(vec![0.0, 1.0], vec![1.0], 4.0, 1.0, false);
        assert!(matches!(result, Err(ScFermiError::InvalidDos(_))));
    }

    #[test]
    fn test_rejects_unsorted_grid() {
        let result = Dos::new(vec![0.0, -1.0], vec![1.0, 1.0], 4.0, 1.0, false);
        assert!(matches!(result, Err(ScFermiError::InvalidDos(_))));
    }

    #[test]
    fn test_normalise_scales_valence_integral_to_nelect() {
        let mut dos = flat_band_dos();
        dos.normalise();
        let valence: Vec<(f64, f64)> = dos
            .energies()
            .iter()
            .zip(dos.dos().iter())
            .filter(|(e, _)| **e <= 0.0)
            .map(|(e, d)| (*e, *d))
            .collect();
        assert!((trapezoid(&valence) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_carriers_balance_at_midgap_for_symmetric_dos() {
        let mut dos = flat_band_dos();
        dos.normalise();
        let (p0, n0) = dos.carrier_concentrations(0.5, 300.0);
        assert!(p0 > 0.0);
        assert!((p0 - n0).abs() / p0 < 1e-6);
    }

    #[test]
    fn test_electron_count_grows_with_fermi_level() {
        let dos = flat_band_dos();
        let (_, n_low) = dos.carrier_concentrations(0.3, 300.0);
        let (_, n_high) = dos.carrier_concentrations(0.7, 300.0);
        assert!(n_high > n_low);
    }

    #[test]
    fn test_trapezoid_linear_function() {
        let samples: Vec<(f64, f64)> = (0..=10).map(|i| (i as f64, 2.0 * i as f64)).collect();
        assert!((trapezoid(&samples) - 100.0).abs() < 1e-12);
    }
}
