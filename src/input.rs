//! This module provides the TOML input set and utilities for loading it.
//!
//! An input set describes a complete calculation: temperature, cell volume,
//! the density of states, the defect species with their charge states, and
//! optional solver settings. Fixed concentrations in input files follow the
//! legacy convention and are given in cm⁻³; they are converted to per-cell
//! counts with the cell volume when the `DefectSystem` is built. The DOS grid
//! can be given inline or referenced as an external file, which callers (for
//! example the command-line tool) read and hand to `build_with_grid`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::constants::ANGSTROM3_PER_CM3;
use crate::defects::{DefectChargeState, DefectSpecies};
use crate::dos::Dos;
use crate::error::ScFermiError;
use crate::solver::SolverOptions;
use crate::system::DefectSystem;

/// A deserialized calculation description.
///
/// # Examples
///
/// ```
/// use scfermi::InputSet;
///
/// let toml_data = r#"
/// temperature = 300.0
/// volume = 100.0
///
/// [dos]
/// nelect = 4.0
/// bandgap = 1.0
/// energy = [-1.0, 0.0, 1.0, 2.0]
/// total = [1.0, 1.0, 1.0, 1.0]
///
/// [[defect_species]]
/// name = "V_O"
/// nsites = 1
/// charge_states = [
///     { charge = 0, energy = 0.5 },
///     { charge = 2, energy = -0.3 },
/// ]
/// "#;
///
/// let input = InputSet::load_from_str(toml_data).unwrap();
/// let system = input.build().unwrap();
/// assert_eq!(system.defect_species_names(), vec!["V_O"]);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputSet {
    /// Temperature in K.
    pub temperature: f64,
    /// Cell volume in Å³.
    pub volume: f64,
    /// Convergence tolerance on the net charge; solver default when absent.
    #[serde(default)]
    pub convergence_tolerance: Option<f64>,
    /// Trial-step budget for the Fermi-level search; solver default when
    /// absent.
    #[serde(default)]
    pub n_trial_steps: Option<u32>,
    /// The density-of-states description.
    pub dos: DosConfig,
    /// The defect species present in the cell.
    #[serde(default)]
    pub defect_species: Vec<SpeciesConfig>,
}

/// The density-of-states section of an input set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DosConfig {
    /// Total electron count of the reference cell.
    pub nelect: f64,
    /// Band gap in eV.
    pub bandgap: f64,
    /// Whether the underlying calculation was spin polarised.
    #[serde(default)]
    pub spin_polarised: bool,
    /// Inline energy grid in eV, valence-band maximum at zero.
    #[serde(default)]
    pub energy: Option<Vec<f64>>,
    /// Inline DOS values, one per grid point.
    #[serde(default)]
    pub total: Option<Vec<f64>>,
    /// Path to a two-column `energy dos` text file, as an alternative to the
    /// inline grid. The library does not read it; see `build_with_grid`.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Whether to rescale the DOS so the valence states integrate to
    /// `nelect`. Defaults to true.
    #[serde(default = "default_normalise")]
    pub normalise: bool,
}

fn default_normalise() -> bool {
    true
}

/// One defect species of an input set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeciesConfig {
    /// Unique species name.
    pub name: String,
    /// Number of equivalent lattice sites per cell.
    pub nsites: u32,
    /// Fixed total concentration in cm⁻³, if imposed.
    #[serde(default)]
    pub fixed_concentration: Option<f64>,
    /// The charge states of the species.
    pub charge_states: Vec<ChargeStateConfig>,
}

/// One charge state of a species in an input set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChargeStateConfig {
    /// Charge in units of the elementary charge.
    pub charge: i32,
    /// Formation energy at E_F = 0, in eV.
    pub energy: f64,
    /// Spin/orbital multiplicity; defaults to 1.
    #[serde(default = "default_degeneracy")]
    pub degeneracy: u32,
    /// Frozen concentration in cm⁻³, if imposed.
    #[serde(default)]
    pub fixed_concentration: Option<f64>,
}

fn default_degeneracy() -> u32 {
    1
}

impl InputSet {
    /// Loads an input set from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::Io` if the file cannot be read, or
    /// `ScFermiError::Deserialization` if the TOML content is invalid.
    pub fn load_from_file(path: &Path) -> Result<Self, ScFermiError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScFermiError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&content)
    }

    /// Parses an input set from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::Deserialization` if the TOML content is
    /// invalid.
    pub fn load_from_str(toml_str: &str) -> Result<Self, ScFermiError> {
        toml::from_str(toml_str).map_err(ScFermiError::from)
    }

    /// Returns the external DOS file referenced by this input, if any.
    pub fn dos_file(&self) -> Option<&Path> {
        self.dos.file.as_deref()
    }

    /// Builds the defect system using the inline DOS grid.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::InvalidDos` if the input carries no inline
    /// grid, or any configuration error from the model constructors.
    pub fn build(&self) -> Result<DefectSystem<Dos>, ScFermiError> {
        match (&self.dos.energy, &self.dos.total) {
            (Some(energy), Some(total)) => self.build_with_grid(energy.clone(), total.clone()),
            _ => Err(ScFermiError::InvalidDos(
                "input carries no inline DOS grid; read the referenced file and use \
                 build_with_grid"
                    .to_string(),
            )),
        }
    }

    /// Builds the defect system from an externally supplied DOS grid,
    /// typically read from the file named in the input.
    ///
    /// # Errors
    ///
    /// Returns any configuration error from the model constructors.
    pub fn build_with_grid(
        &self,
        energy: Vec<f64>,
        total: Vec<f64>,
    ) -> Result<DefectSystem<Dos>, ScFermiError> {
        let mut dos = Dos::new(
            energy,
            total,
            self.dos.nelect,
            self.dos.bandgap,
            self.dos.spin_polarised,
        )?;
        if self.dos.normalise {
            dos.normalise();
        }

        // Input concentrations are cm^-3 by legacy convention; the model
        // works per cell.
        let to_cell = self.volume / ANGSTROM3_PER_CM3;

        let mut species = Vec::with_capacity(self.defect_species.len());
        for sc in &self.defect_species {
            let charge_states = sc
                .charge_states
                .iter()
                .map(|cs| match cs.fixed_concentration {
                    Some(conc) => DefectChargeState::new_fixed(
                        cs.charge,
                        cs.energy,
                        cs.degeneracy,
                        conc * to_cell,
                    ),
                    None => DefectChargeState::new(cs.charge, cs.energy, cs.degeneracy),
                })
                .collect();
            species.push(DefectSpecies::from_parts(
                &sc.name,
                sc.nsites,
                charge_states,
                sc.fixed_concentration.map(|c| c * to_cell),
            )?);
        }

        let defaults = SolverOptions::default();
        let options = SolverOptions {
            convergence_tolerance: self
                .convergence_tolerance
                .unwrap_or(defaults.convergence_tolerance),
            n_trial_steps: self.n_trial_steps.unwrap_or(defaults.n_trial_steps),
        };

        Ok(DefectSystem::new(species, dos, self.volume, self.temperature)?.with_options(options))
    }
}
