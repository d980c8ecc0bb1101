//! Physical constants used throughout the library.
//!
//! All energies are handled in electron volts and all temperatures in kelvin,
//! so the only constants needed are the Boltzmann constant in those units and
//! the factor converting per-cell counts into per-cm³ densities.

/// The Boltzmann constant in electron volts per kelvin.
///
/// Used in every Fermi–Dirac and Boltzmann occupation factor. The value is
/// the 2018 CODATA recommendation, approximately 8.617 × 10⁻⁵ eV/K.
pub const BOLTZMANN_EV_PER_K: f64 = 8.617_333_262e-5;

/// Cubic angstroms per cubic centimetre.
///
/// Concentrations are computed per unit cell; multiplying by
/// `ANGSTROM3_PER_CM3 / volume` (volume in Å³) converts them to cm⁻³, the
/// convention of the legacy SC-FERMI tool.
pub const ANGSTROM3_PER_CM3: f64 = 1e24;
