//! Defect model: individual charge states and the species that own them.

/// A single charge state of a point defect.
pub mod charge_state;

/// A named defect species owning a keyed collection of charge states.
pub mod species;

pub use charge_state::DefectChargeState;
pub use species::DefectSpecies;
