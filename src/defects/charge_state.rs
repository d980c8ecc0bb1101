//! This module defines `DefectChargeState`, the leaf of the defect model.
//!
//! A charge state knows its own formation energy, which is linear in the
//! Fermi level, and its own equilibrium occupation, which follows
//! dilute-limit Boltzmann statistics unless an externally imposed (frozen)
//! concentration overrides it.

use crate::constants::BOLTZMANN_EV_PER_K;

/// One charge state of one defect species.
///
/// The reference `energy` is the formation energy at a Fermi level of zero
/// (the valence-band maximum); `degeneracy` is the spin/orbital multiplicity
/// entering the statistical weight. A charge state is immutable once built,
/// except for the fixed-concentration override, which is a configuration-time
/// setter invoked before any solve.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectChargeState {
    /// The charge of this state, in units of the elementary charge.
    /// Unique within the owning species.
    charge: i32,
    /// Formation energy at E_F = 0, in eV.
    energy: f64,
    /// Spin/orbital multiplicity of the state.
    degeneracy: u32,
    /// Externally imposed concentration per cell, overriding the computed
    /// Boltzmann occupation when set.
    fixed_concentration: Option<f64>,
}

impl DefectChargeState {
    /// Creates a new charge state with a Boltzmann-equilibrated occupation.
    pub fn new(charge: i32, energy: f64, degeneracy: u32) -> Self {
        Self {
            charge,
            energy,
            degeneracy,
            fixed_concentration: None,
        }
    }

    /// Creates a charge state whose concentration (per cell) is externally
    /// imposed from the start.
    pub fn new_fixed(charge: i32, energy: f64, degeneracy: u32, concentration: f64) -> Self {
        Self {
            charge,
            energy,
            degeneracy,
            fixed_concentration: Some(concentration),
        }
    }

    /// Returns the charge of this state.
    pub fn charge(&self) -> i32 {
        self.charge
    }

    /// Returns the formation energy at E_F = 0, in eV.
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Returns the degeneracy of this state.
    pub fn degeneracy(&self) -> u32 {
        self.degeneracy
    }

    /// Returns the frozen concentration per cell, if one has been imposed.
    pub fn fixed_concentration(&self) -> Option<f64> {
        self.fixed_concentration
    }

    /// Imposes a frozen concentration (per cell) on this charge state.
    ///
    /// A configuration-time operation: it must complete before the owning
    /// system is solved.
    pub fn fix_concentration(&mut self, concentration: f64) {
        self.fixed_concentration = Some(concentration);
    }

    /// Returns the formation energy at the given Fermi level, in eV.
    ///
    /// `E_form(E_F) = energy + charge * E_F`. Pure, with no side effects.
    pub fn get_formation_energy(&self, e_fermi: f64) -> f64 {
        self.energy + f64::from(self.charge) * e_fermi
    }

    /// Returns the concentration of this charge state per cell.
    ///
    /// The frozen concentration if one is set, else the dilute-limit
    /// Boltzmann occupation
    /// `nsites * degeneracy * exp(-E_form(E_F) / (k_B T))`,
    /// where `nsites` is the site multiplicity supplied by the owning
    /// species.
    pub fn get_concentration(&self, e_fermi: f64, temperature: f64, nsites: u32) -> f64 {
        match self.fixed_concentration {
            Some(conc) => conc,
            None => {
                let kt = BOLTZMANN_EV_PER_K * temperature;
                f64::from(nsites)
                    * f64::from(self.degeneracy)
                    * (-self.get_formation_energy(e_fermi) / kt).exp()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formation_energy_is_linear_in_fermi_level() {
        let cs = DefectChargeState::new(2, -0.3, 1);
        assert_eq!(cs.get_formation_energy(0.0), -0.3);
        assert_eq!(cs.get_formation_energy(1.0), 1.7);
        let neutral = DefectChargeState::new(0, 0.5, 1);
        assert_eq!(neutral.get_formation_energy(3.0), 0.5);
    }

    #[test]
    fn test_boltzmann_concentration() {
        let cs = DefectChargeState::new(0, 0.5, 2);
        let kt = BOLTZMANN_EV_PER_K * 300.0;
        let expected = 3.0 * 2.0 * (-0.5 / kt).exp();
        let conc = cs.get_concentration(0.7, 300.0, 3);
        assert!((conc - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_fixed_concentration_overrides_occupation() {
        let mut cs = DefectChargeState::new(1, 0.5, 1);
        assert_eq!(cs.fixed_concentration(), None);
        cs.fix_concentration(1e-5);
        assert_eq!(cs.get_concentration(0.7, 300.0, 4), 1e-5);
    }

    #[test]
    fn test_concentration_decreases_with_formation_energy() {
        let low = DefectChargeState::new(0, 0.5, 1);
        let high = DefectChargeState::new(0, 0.6, 1);
        assert!(low.get_concentration(0.0, 300.0, 1) > high.get_concentration(0.0, 300.0, 1));
    }
}
