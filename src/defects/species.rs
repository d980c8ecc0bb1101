//! This module defines `DefectSpecies`, a named defect owning its charge states.
//!
//! A species aggregates the concentrations of its charge states, splits them
//! into positive and negative contributions to the net charge, enforces the
//! fixed-concentration invariants, and computes transition-level geometry
//! (the lower envelope of the charge states' formation-energy lines).

use std::collections::BTreeMap;

use crate::defects::charge_state::DefectChargeState;
use crate::error::ScFermiError;

/// A defect species: a unique name, a site multiplicity, and an ordered
/// collection of charge states keyed by charge.
///
/// Charge states live in a `BTreeMap` so iteration is always in ascending
/// charge order, which keeps reports and exports reproducible. An optional
/// species-level fixed concentration (per cell) overrides the summed
/// equilibrium value.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectSpecies {
    name: String,
    nsites: u32,
    charge_states: BTreeMap<i32, DefectChargeState>,
    fixed_concentration: Option<f64>,
}

/// Relative tolerance used when comparing sums of fixed concentrations.
/// User-entered decimals do not survive binary rounding, so "equal" and
/// "not exceeding" are judged to within this factor.
const FIXED_CONC_RTOL: f64 = 1e-12;

impl DefectSpecies {
    /// Creates a new species from a list of charge states.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::DuplicateChargeState` if two states share a
    /// charge.
    pub fn new(
        name: &str,
        nsites: u32,
        charge_states: Vec<DefectChargeState>,
    ) -> Result<Self, ScFermiError> {
        Self::from_parts(name, nsites, charge_states, None)
    }

    /// Creates a species from fully specified parts, including charge states
    /// that may already carry frozen concentrations and an optional fixed
    /// species total (per cell).
    ///
    /// This is the entry point for deserialized configurations; the
    /// fixed-concentration invariants are validated eagerly here, never
    /// during a solve.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::DuplicateChargeState` if two states share a
    /// charge, or `ScFermiError::Constraint` if the frozen concentrations
    /// are inconsistent.
    pub fn from_parts(
        name: &str,
        nsites: u32,
        charge_states: Vec<DefectChargeState>,
        fixed_concentration: Option<f64>,
    ) -> Result<Self, ScFermiError> {
        let mut map = BTreeMap::new();
        for cs in charge_states {
            let charge = cs.charge();
            if map.insert(charge, cs).is_some() {
                return Err(ScFermiError::DuplicateChargeState {
                    species: name.to_string(),
                    charge,
                });
            }
        }
        let species = Self {
            name: name.to_string(),
            nsites,
            charge_states: map,
            fixed_concentration,
        };
        species.check_concentrations()?;
        Ok(species)
    }

    /// Returns the name of this species.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of equivalent lattice sites per cell.
    pub fn nsites(&self) -> u32 {
        self.nsites
    }

    /// Returns the charge states keyed by charge, in ascending order.
    pub fn charge_states(&self) -> &BTreeMap<i32, DefectChargeState> {
        &self.charge_states
    }

    /// Returns the charge state with the given charge, if present.
    pub fn charge_state(&self, charge: i32) -> Option<&DefectChargeState> {
        self.charge_states.get(&charge)
    }

    /// Returns the fixed total concentration per cell, if one is imposed.
    pub fn fixed_concentration(&self) -> Option<f64> {
        self.fixed_concentration
    }

    /// Imposes a fixed total concentration (per cell) on this species.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::Constraint` if the new total is inconsistent
    /// with the concentrations already frozen at charge-state level.
    pub fn fix_concentration(&mut self, concentration: f64) -> Result<(), ScFermiError> {
        self.check_against_total(Some(concentration))?;
        self.fixed_concentration = Some(concentration);
        Ok(())
    }

    /// Imposes a frozen concentration (per cell) on one charge state.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::Constraint` if no such charge state exists or
    /// if the frozen concentrations become inconsistent with a fixed species
    /// total.
    pub fn fix_charge_state_concentration(
        &mut self,
        charge: i32,
        concentration: f64,
    ) -> Result<(), ScFermiError> {
        let previous = match self.charge_states.get_mut(&charge) {
            Some(cs) => {
                let previous = cs.fixed_concentration();
                cs.fix_concentration(concentration);
                previous
            }
            None => {
                return Err(ScFermiError::Constraint {
                    species: self.name.clone(),
                    details: format!("no charge state with charge {charge}"),
                })
            }
        };
        if let Err(e) = self.check_concentrations() {
            // Roll back so a rejected setter leaves the species untouched.
            if let Some(cs) = self.charge_states.get_mut(&charge) {
                match previous {
                    Some(c) => cs.fix_concentration(c),
                    None => *cs = DefectChargeState::new(charge, cs.energy(), cs.degeneracy()),
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Validates the fixed-concentration invariants of this species.
    ///
    /// The frozen charge-state concentrations must not exceed a fixed species
    /// total, and when every charge state is frozen they must sum to it.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::Constraint` on violation.
    pub fn check_concentrations(&self) -> Result<(), ScFermiError> {
        self.check_against_total(self.fixed_concentration)
    }

    fn check_against_total(&self, total: Option<f64>) -> Result<(), ScFermiError> {
        let Some(total) = total else {
            return Ok(());
        };
        let fixed_sum: f64 = self
            .charge_states
            .values()
            .filter_map(DefectChargeState::fixed_concentration)
            .sum();
        let n_fixed = self.fixed_conc_charge_states().len();
        if n_fixed == 0 {
            return Ok(());
        }
        let tol = FIXED_CONC_RTOL * total.abs().max(1.0);
        if fixed_sum > total + tol {
            return Err(ScFermiError::Constraint {
                species: self.name.clone(),
                details: format!(
                    "fixed charge state concentrations sum to {fixed_sum}, \
                     exceeding the fixed species total {total}"
                ),
            });
        }
        if n_fixed == self.charge_states.len() && (fixed_sum - total).abs() > tol {
            return Err(ScFermiError::Constraint {
                species: self.name.clone(),
                details: format!(
                    "all charge states are fixed but their concentrations sum to \
                     {fixed_sum}, not the fixed species total {total}"
                ),
            });
        }
        Ok(())
    }

    /// Returns the charge states without a frozen concentration, keyed by
    /// charge.
    pub fn variable_conc_charge_states(&self) -> BTreeMap<i32, &DefectChargeState> {
        self.charge_states
            .iter()
            .filter(|(_, cs)| cs.fixed_concentration().is_none())
            .map(|(q, cs)| (*q, cs))
            .collect()
    }

    /// Returns the charge states carrying a frozen concentration, keyed by
    /// charge.
    pub fn fixed_conc_charge_states(&self) -> BTreeMap<i32, &DefectChargeState> {
        self.charge_states
            .iter()
            .filter(|(_, cs)| cs.fixed_concentration().is_some())
            .map(|(q, cs)| (*q, cs))
            .collect()
    }

    /// Returns the concentration of every charge state per cell, keyed by
    /// charge.
    ///
    /// When a fixed species total is imposed, the variable charge states
    /// keep their relative Boltzmann weights but are rescaled so that all
    /// states together sum to the total (after subtracting the individually
    /// frozen states).
    pub fn charge_state_concentrations(
        &self,
        e_fermi: f64,
        temperature: f64,
    ) -> BTreeMap<i32, f64> {
        let mut concs: BTreeMap<i32, f64> = self
            .charge_states
            .iter()
            .map(|(q, cs)| (*q, cs.get_concentration(e_fermi, temperature, self.nsites)))
            .collect();
        if let Some(total) = self.fixed_concentration {
            let frozen: f64 = self
                .charge_states
                .values()
                .filter_map(DefectChargeState::fixed_concentration)
                .sum();
            let variable_sum: f64 = self
                .charge_states
                .iter()
                .filter(|(_, cs)| cs.fixed_concentration().is_none())
                .map(|(q, _)| concs[q])
                .sum();
            if variable_sum > 0.0 {
                let scale = (total - frozen) / variable_sum;
                for (q, cs) in &self.charge_states {
                    if cs.fixed_concentration().is_none() {
                        if let Some(conc) = concs.get_mut(q) {
                            *conc *= scale;
                        }
                    }
                }
            }
        }
        concs
    }

    /// Returns the total concentration of this species per cell.
    ///
    /// The fixed species total if one is imposed, else the sum over charge
    /// states.
    pub fn get_concentration(&self, e_fermi: f64, temperature: f64) -> f64 {
        match self.fixed_concentration {
            Some(conc) => conc,
            None => self
                .charge_state_concentrations(e_fermi, temperature)
                .values()
                .sum(),
        }
    }

    /// Splits the charge-state concentrations into positive and negative
    /// contributions to the net charge density.
    ///
    /// Each state contributes `concentration * |charge|` to the sum matching
    /// the sign of its charge; neutral states contribute to neither.
    pub fn defect_charge_contributions(&self, e_fermi: f64, temperature: f64) -> (f64, f64) {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for (q, conc) in self.charge_state_concentrations(e_fermi, temperature) {
            if q > 0 {
                positive += conc * f64::from(q);
            } else if q < 0 {
                negative += conc * f64::from(-q);
            }
        }
        (positive, negative)
    }

    /// Returns the formation energy of each variable-concentration charge
    /// state at the given Fermi level, keyed by charge.
    ///
    /// Frozen states are excluded: their population is externally imposed,
    /// not energetically determined.
    pub fn get_formation_energies(&self, e_fermi: f64) -> BTreeMap<i32, f64> {
        self.variable_conc_charge_states()
            .iter()
            .map(|(q, cs)| (*q, cs.get_formation_energy(e_fermi)))
            .collect()
    }

    /// Returns the variable-concentration charge states sorted ascending by
    /// formation energy at the given Fermi level.
    pub fn charge_states_by_formation_energy(&self, e_fermi: f64) -> Vec<&DefectChargeState> {
        let mut states: Vec<&DefectChargeState> =
            self.variable_conc_charge_states().into_values().collect();
        states.sort_by(|a, b| {
            a.get_formation_energy(e_fermi)
                .total_cmp(&b.get_formation_energy(e_fermi))
        });
        states
    }

    /// Returns the thermodynamically dominant (minimum formation energy)
    /// variable charge state at the given Fermi level, or `None` if every
    /// state is frozen.
    pub fn min_energy_charge_state(&self, e_fermi: f64) -> Option<&DefectChargeState> {
        self.charge_states_by_formation_energy(e_fermi)
            .into_iter()
            .next()
    }

    /// Returns the Fermi level and energy at which the formation-energy
    /// lines of two charge states cross.
    ///
    /// Energies are referenced at E_F = 0. Returns `None` if either charge
    /// has no variable-concentration state.
    pub fn get_transition_level_and_energy(&self, q1: i32, q2: i32) -> Option<(f64, f64)> {
        let energies = self.get_formation_energies(0.0);
        let e1 = *energies.get(&q1)?;
        let e2 = *energies.get(&q2)?;
        let e_fermi = (e2 - e1) / f64::from(q1 - q2);
        let energy = e1 + f64::from(q1) * e_fermi;
        Some((e_fermi, energy))
    }

    /// Returns the lower formation-energy envelope over `[e_min, e_max]` as
    /// ordered `(E_F, energy)` breakpoints.
    ///
    /// The profile starts at `e_min`, ends at `e_max`, and includes every
    /// crossing at which the dominant charge state changes. Only
    /// variable-concentration states participate; a species with none
    /// produces an empty profile.
    pub fn tl_profile(&self, e_min: f64, e_max: f64) -> Vec<(f64, f64)> {
        let Some(first) = self.min_energy_charge_state(e_min) else {
            return Vec::new();
        };
        let Some(last) = self.min_energy_charge_state(e_max) else {
            return Vec::new();
        };

        let mut points = vec![(e_min, first.get_formation_energy(e_min))];
        let mut q = first.charge();
        let q_end = last.charge();

        // Walk down in charge: as E_F rises the dominant state's slope
        // (its charge) can only decrease. At each step take the nearest
        // crossing with a lower-charge state.
        while q != q_end {
            let next = self
                .variable_conc_charge_states()
                .keys()
                .filter(|q2| **q2 < q)
                .filter_map(|q2| self.get_transition_level_and_energy(q, *q2).map(|tl| (tl, *q2)))
                .min_by(|a, b| a.0 .0.total_cmp(&b.0 .0));
            match next {
                Some(((e_fermi, energy), q2)) => {
                    points.push((e_fermi, energy));
                    q = q2;
                }
                None => break,
            }
        }

        points.push((e_max, last.get_formation_energy(e_max)));
        points
    }
}
