use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all fallible operations in the `scfermi` library.
///
/// Configuration problems (inconsistent fixed concentrations, duplicate keys,
/// malformed density-of-states data) are reported eagerly, before any solve
/// begins. The only error a solve itself can raise is `Bracket`; running out
/// of trial steps is a non-fatal diagnostic carried on the solver result
/// instead.
#[derive(Error, Debug)]
pub enum ScFermiError {
    /// The fixed concentrations declared for a defect species are mutually
    /// inconsistent: the per-charge-state values exceed the species total,
    /// or (when every charge state is fixed) fail to sum to it.
    #[error("Inconsistent fixed concentrations for defect species '{species}': {details}")]
    Constraint {
        /// The name of the offending species.
        species: String,
        /// A description of the violated invariant.
        details: String,
    },

    /// Charge neutrality could not be bracketed: both scan directions were
    /// exhausted without the net charge changing sign inside the energy
    /// bounds of the density of states.
    #[error("No charge-neutral solution found between {emin} eV and {emax} eV")]
    Bracket {
        /// Lower energy bound of the search, in eV.
        emin: f64,
        /// Upper energy bound of the search, in eV.
        emax: f64,
    },

    /// Two defect species in the same system share a name.
    #[error("Duplicate defect species name: '{0}'")]
    DuplicateSpecies(String),

    /// Two charge states of the same species share a charge.
    #[error("Duplicate charge state {charge} for defect species '{species}'")]
    DuplicateChargeState {
        /// The name of the species owning the clashing charge states.
        species: String,
        /// The duplicated charge.
        charge: i32,
    },

    /// The density-of-states data failed validation, for example mismatched
    /// grid lengths or a non-ascending energy grid.
    #[error("Invalid density of states data: {0}")]
    InvalidDos(String),

    /// An I/O error that occurred while reading an input file or writing an
    /// export, with the path for context.
    #[error("I/O error at path '{path}': {source}")]
    Io {
        /// The path of the file that caused the I/O error.
        path: PathBuf,
        /// The underlying `std::io::Error`.
        #[source]
        source: std::io::Error,
    },

    /// An error while parsing a TOML input set.
    #[error("Failed to deserialize TOML input: {0}")]
    Deserialization(#[from] toml::de::Error),
}
