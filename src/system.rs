//! This module defines `DefectSystem`, the top of the defect-equilibrium model.
//!
//! A system owns its defect species outright and a density-of-states
//! implementation, defines the charge-neutrality functional `q_tot(E_F)`,
//! drives the Fermi-level search, and produces reports, structured exports,
//! and legacy SC-FERMI input serialization.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::constants::ANGSTROM3_PER_CM3;
use crate::defects::DefectSpecies;
use crate::dos::DensityOfStates;
use crate::error::ScFermiError;
use crate::solver::{AdaptiveStepSolver, NeutralitySolver, SolverOptions, SolverResult};

/// One value of the structured export: either a species total or a
/// per-charge-state breakdown keyed by the charge rendered as a string.
///
/// Serializes untagged, so the export round-trips to the flat dictionary
/// shape of the legacy tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConcentrationValue {
    /// A scalar concentration (or the Fermi level itself).
    Scalar(f64),
    /// Charge (as string) to concentration, for decomposed exports.
    ByChargeState(BTreeMap<String, f64>),
}

/// A semiconductor with a population of point defects, solvable for the
/// self-consistent Fermi level at which it is charge neutral.
///
/// The system owns an independent copy of its species list, so fixing a
/// concentration here can never alias into another system. Configuration
/// setters must run before a solve; an unmodified system can be re-solved
/// any number of times with bit-identical results.
#[derive(Debug, Clone)]
pub struct DefectSystem<D: DensityOfStates> {
    defect_species: Vec<DefectSpecies>,
    dos: D,
    volume: f64,
    temperature: f64,
    options: SolverOptions,
}

impl<D: DensityOfStates> DefectSystem<D> {
    /// Creates a new defect system.
    ///
    /// Species names must be unique and every species must satisfy its
    /// fixed-concentration invariants; configuration errors are caught here,
    /// never deferred into the root-finding loop.
    ///
    /// # Arguments
    ///
    /// * `defect_species` - The defect species present in the cell.
    /// * `dos` - The density-of-states description; read-only during solves.
    /// * `volume` - Cell volume in Å³, used to scale per-cell counts to cm⁻³.
    /// * `temperature` - Temperature in K.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::DuplicateSpecies` or `ScFermiError::Constraint`
    /// on invalid configuration.
    pub fn new(
        defect_species: Vec<DefectSpecies>,
        dos: D,
        volume: f64,
        temperature: f64,
    ) -> Result<Self, ScFermiError> {
        let mut seen = std::collections::BTreeSet::new();
        for species in &defect_species {
            if !seen.insert(species.name().to_string()) {
                return Err(ScFermiError::DuplicateSpecies(species.name().to_string()));
            }
            species.check_concentrations()?;
        }
        Ok(Self {
            defect_species,
            dos,
            volume,
            temperature,
            options: SolverOptions::default(),
        })
    }

    /// Configures the system with custom solver options.
    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the solver options in effect.
    pub fn options(&self) -> SolverOptions {
        self.options
    }

    /// Returns the temperature in K.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Returns the cell volume in Å³.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns the density-of-states description.
    pub fn dos(&self) -> &D {
        &self.dos
    }

    /// Returns the defect species of this system.
    pub fn defect_species(&self) -> &[DefectSpecies] {
        &self.defect_species
    }

    /// Returns the names of the defect species, in system order.
    pub fn defect_species_names(&self) -> Vec<&str> {
        self.defect_species.iter().map(DefectSpecies::name).collect()
    }

    /// Returns the species with the given name, if present.
    pub fn defect_species_by_name(&self, name: &str) -> Option<&DefectSpecies> {
        self.defect_species.iter().find(|ds| ds.name() == name)
    }

    /// Returns a mutable handle to the species with the given name, for
    /// configuration-time setters such as `fix_concentration`.
    pub fn defect_species_by_name_mut(&mut self, name: &str) -> Option<&mut DefectSpecies> {
        self.defect_species.iter_mut().find(|ds| ds.name() == name)
    }

    /// Sums the positive and negative defect charge contributions over all
    /// species at the given Fermi level.
    pub fn total_defect_charge_contributions(&self, e_fermi: f64) -> (f64, f64) {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for species in &self.defect_species {
            let (p, n) = species.defect_charge_contributions(e_fermi, self.temperature);
            positive += p;
            negative += n;
        }
        (positive, negative)
    }

    /// The charge-neutrality functional: the net charge per cell at the
    /// given Fermi level.
    ///
    /// `q_tot = (n0 + negative defects) - (p0 + positive defects)`.
    /// Physically monotonically non-decreasing in `E_F`; the solver assumes
    /// this and does not verify it.
    pub fn q_tot(&self, e_fermi: f64) -> f64 {
        let (p0, n0) = self.dos.carrier_concentrations(e_fermi, self.temperature);
        let (positive, negative) = self.total_defect_charge_contributions(e_fermi);
        (n0 + negative) - (p0 + positive)
    }

    /// Solves for the self-consistent Fermi level with the default adaptive
    /// sign-chasing search.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::Bracket` if charge neutrality cannot be
    /// bracketed between the energy bounds of the DOS. Running out of trial
    /// steps is not an error; the returned result carries the diagnostic.
    pub fn get_sc_fermi(&self) -> Result<SolverResult, ScFermiError> {
        let solver = AdaptiveStepSolver::new().with_options(self.options);
        self.solve_with(&solver)
    }

    /// Solves for the self-consistent Fermi level with a caller-supplied
    /// solver strategy.
    pub fn solve_with(&self, solver: &dyn NeutralitySolver) -> Result<SolverResult, ScFermiError> {
        solver.solve(&|e| self.q_tot(e), self.dos.emin(), self.dos.emax())
    }

    fn per_volume_scale(&self) -> f64 {
        ANGSTROM3_PER_CM3 / self.volume
    }

    /// Generates a human-readable report in the style of SC-FERMI: the Fermi
    /// level, carrier concentrations, per-species concentrations, and a
    /// per-charge-state breakdown with percentage contributions.
    ///
    /// # Errors
    ///
    /// Propagates any error from the solve.
    pub fn report(&self) -> Result<String, ScFermiError> {
        let scale = self.per_volume_scale();
        let result = self.get_sc_fermi()?;
        let e_fermi = result.e_fermi;
        let (p0, n0) = self.dos.carrier_concentrations(e_fermi, self.temperature);

        let mut out = String::new();
        out.push_str(&format!("SC Fermi level :      {e_fermi}  (eV)\n"));
        out.push_str("Concentrations:\n");
        out.push_str(&format!("n (electrons)  : {} cm^-3\n", n0 * scale));
        out.push_str(&format!("p (holes)      : {} cm^-3\n", p0 * scale));
        for ds in &self.defect_species {
            let conc = ds.get_concentration(e_fermi, self.temperature);
            let fixed = if ds.fixed_concentration().is_some() {
                " [fixed]"
            } else {
                ""
            };
            out.push_str(&format!(
                "{:<9}      : {} cm^-3{}\n",
                ds.name(),
                conc * scale,
                fixed
            ));
        }
        out.push_str("\nBreakdown of concentrations for each defect charge state:\n");
        for ds in &self.defect_species {
            let total = ds.get_concentration(e_fermi, self.temperature);
            out.push_str("---------------------------------------------------------\n");
            if total == 0.0 {
                out.push_str(&format!(
                    "{:<11}: Zero total - cannot give breakdown\n",
                    ds.name()
                ));
                continue;
            }
            out.push_str(&format!(
                "{:<11}: Charge Concentration(cm^-3) Total\n",
                ds.name()
            ));
            for (q, conc) in ds.charge_state_concentrations(e_fermi, self.temperature) {
                let fixed = match ds.charge_state(q).and_then(|cs| cs.fixed_concentration()) {
                    Some(_) => " [fixed]",
                    None => "",
                };
                out.push_str(&format!(
                    "           : {:>2}  {:.5e}          {:.2}{}\n",
                    q,
                    conc * scale,
                    conc * 100.0 / total,
                    fixed
                ));
            }
        }
        Ok(out)
    }

    /// Returns the transition-level profile of every species between the
    /// energy bounds of the DOS, keyed by species name.
    pub fn get_transition_levels(&self) -> BTreeMap<String, Vec<(f64, f64)>> {
        self.defect_species
            .iter()
            .map(|ds| {
                (
                    ds.name().to_string(),
                    ds.tl_profile(self.dos.emin(), self.dos.emax()),
                )
            })
            .collect()
    }

    /// Returns a structured export of the solved system.
    ///
    /// Always contains `"Fermi Energy"`, `"p0"` and `"n0"`, plus one entry
    /// per species: its total concentration, or (when `decomposed`) a nested
    /// charge-to-concentration map. Concentrations are scaled to cm⁻³ unless
    /// `per_volume` is false, in which case they stay per cell.
    ///
    /// # Errors
    ///
    /// Propagates any error from the solve.
    pub fn as_dict(
        &self,
        decomposed: bool,
        per_volume: bool,
    ) -> Result<BTreeMap<String, ConcentrationValue>, ScFermiError> {
        let scale = if per_volume {
            self.per_volume_scale()
        } else {
            1.0
        };
        let result = self.get_sc_fermi()?;
        let e_fermi = result.e_fermi;
        let (p0, n0) = self.dos.carrier_concentrations(e_fermi, self.temperature);

        let mut out = BTreeMap::new();
        out.insert(
            "Fermi Energy".to_string(),
            ConcentrationValue::Scalar(e_fermi),
        );
        out.insert("p0".to_string(), ConcentrationValue::Scalar(p0 * scale));
        out.insert("n0".to_string(), ConcentrationValue::Scalar(n0 * scale));

        for ds in &self.defect_species {
            let value = if decomposed {
                ConcentrationValue::ByChargeState(
                    ds.charge_state_concentrations(e_fermi, self.temperature)
                        .into_iter()
                        .map(|(q, conc)| (q.to_string(), conc * scale))
                        .collect(),
                )
            } else {
                ConcentrationValue::Scalar(ds.get_concentration(e_fermi, self.temperature) * scale)
            };
            out.insert(ds.name().to_string(), value);
        }
        Ok(out)
    }

    /// Serializes this system as a legacy SC-FERMI input file body.
    ///
    /// Fixed line order: spin flag, nelect, bandgap, temperature, then the
    /// variable-concentration species with their charge states, the species
    /// with fixed totals, and the individually fixed charge states.
    /// Concentrations are scaled by 1e24/volume to the cm⁻³ convention of
    /// the legacy tool. The fixed-charge-state collection is gathered fresh
    /// on every call, so a setter invoked between calls is always reflected.
    pub fn input_string(&self) -> String {
        let scale = self.per_volume_scale();
        let mut out = String::new();

        out.push_str(if self.dos.spin_polarised() { "1\n" } else { "0\n" });
        out.push_str(&format!("{}\n", self.dos.nelect()));
        out.push_str(&format!("{}\n", self.dos.bandgap()));
        out.push_str(&format!("{}\n", self.temperature));

        let free: Vec<&DefectSpecies> = self
            .defect_species
            .iter()
            .filter(|ds| !ds.variable_conc_charge_states().is_empty())
            .collect();
        out.push_str(&format!("{}\n", free.len()));
        for ds in &free {
            let variable = ds.variable_conc_charge_states();
            out.push_str(&format!("{} {} {}\n", ds.name(), variable.len(), ds.nsites()));
            for (q, cs) in variable {
                out.push_str(&format!(" {} {} {}\n", q, cs.energy(), cs.degeneracy()));
            }
        }

        let fixed: Vec<&DefectSpecies> = self
            .defect_species
            .iter()
            .filter(|ds| ds.fixed_concentration().is_some())
            .collect();
        out.push_str(&format!("{}\n", fixed.len()));
        for ds in &fixed {
            if let Some(conc) = ds.fixed_concentration() {
                out.push_str(&format!("{} {}\n", ds.name(), conc * scale));
            }
        }

        let fixed_charge_states: Vec<(&str, i32, f64)> = self
            .defect_species
            .iter()
            .flat_map(|ds| {
                ds.fixed_conc_charge_states()
                    .into_iter()
                    .filter_map(move |(q, cs)| {
                        cs.fixed_concentration().map(|conc| (ds.name(), q, conc))
                    })
            })
            .collect();
        out.push_str(&format!("{}\n", fixed_charge_states.len()));
        for (name, q, conc) in fixed_charge_states {
            out.push_str(&format!("{} {} {}\n", name, q, conc * scale));
        }

        out
    }

    /// Writes the legacy SC-FERMI input file to the given path.
    ///
    /// # Errors
    ///
    /// Returns `ScFermiError::Io` if the file cannot be written.
    pub fn write_inputs(&self, path: &Path) -> Result<(), ScFermiError> {
        std::fs::write(path, self.input_string()).map_err(|source| ScFermiError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl<D: DensityOfStates> fmt::Display for DefectSystem<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DefectSystem")?;
        writeln!(f, "  nelect: {} e", self.dos.nelect())?;
        writeln!(f, "  bandgap: {} eV", self.dos.bandgap())?;
        writeln!(f, "  volume: {} A^3", self.volume)?;
        writeln!(f, "  temperature: {} K", self.temperature)?;
        writeln!(f, "\nContains defect species:")?;
        for ds in &self.defect_species {
            writeln!(f, "  {}", ds.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BOLTZMANN_EV_PER_K;
    use crate::defects::DefectChargeState;

    /// Analytic non-degenerate band-edge model: Boltzmann tails of unit
    /// effective density of states at each band edge.
    #[derive(Debug, Clone)]
    struct ModelDos {
        nelect: f64,
        bandgap: f64,
    }

    impl DensityOfStates for ModelDos {
        fn nelect(&self) -> f64 {
            self.nelect
        }
        fn bandgap(&self) -> f64 {
            self.bandgap
        }
        fn spin_polarised(&self) -> bool {
            false
        }
        fn emin(&self) -> f64 {
            -1.0
        }
        fn emax(&self) -> f64 {
            self.bandgap + 1.0
        }
        fn carrier_concentrations(&self, e_fermi: f64, temperature: f64) -> (f64, f64) {
            let kt = BOLTZMANN_EV_PER_K * temperature;
            let p0 = (-e_fermi / kt).exp();
            let n0 = (-(self.bandgap - e_fermi) / kt).exp();
            (p0, n0)
        }
    }

    fn model_dos() -> ModelDos {
        ModelDos {
            nelect: 4.0,
            bandgap: 1.0,
        }
    }

    fn donor_species() -> DefectSpecies {
        DefectSpecies::new(
            "V_O",
            1,
            vec![
                DefectChargeState::new(0, 0.5, 1),
                DefectChargeState::new(2, -0.3, 1),
            ],
        )
        .unwrap()
    }

    fn donor_system() -> DefectSystem<ModelDos> {
        DefectSystem::new(vec![donor_species()], model_dos(), 100.0, 300.0).unwrap()
    }

    #[test]
    fn test_duplicate_species_names_rejected() {
        let result = DefectSystem::new(
            vec![donor_species(), donor_species()],
            model_dos(),
            100.0,
            300.0,
        );
        assert!(matches!(result, Err(ScFermiError::DuplicateSpecies(_))));
    }

    #[test]
    fn test_constraint_violation_caught_at_validation_time() {
        let result = DefectSpecies::from_parts(
            "V_O",
            1,
            vec![
                DefectChargeState::new_fixed(0, 0.5, 1, 2e-5),
                DefectChargeState::new_fixed(2, -0.3, 1, 2e-5),
            ],
            Some(1e-5),
        );
        assert!(matches!(result, Err(ScFermiError::Constraint { .. })));
    }

    #[test]
    fn test_q_tot_reduces_to_carriers_without_charged_defects() {
        let neutral_only = DefectSpecies::new(
            "X",
            1,
            vec![DefectChargeState::new(0, 0.4, 1)],
        )
        .unwrap();
        let system = DefectSystem::new(vec![neutral_only], model_dos(), 100.0, 300.0).unwrap();
        let (p0, n0) = system.dos().carrier_concentrations(0.3, 300.0);
        assert_eq!(system.q_tot(0.3), n0 - p0);
    }

    #[test]
    fn test_intrinsic_fermi_level_at_midgap() {
        let system: DefectSystem<ModelDos> =
            DefectSystem::new(vec![], model_dos(), 100.0, 300.0).unwrap();
        let result = system.get_sc_fermi().unwrap();
        assert!(result.converged);
        assert!((result.e_fermi - 0.5).abs() < 1e-9);
        let (p0, n0) = system
            .dos()
            .carrier_concentrations(result.e_fermi, system.temperature());
        assert!((n0 - p0).abs() < system.q_tot(result.e_fermi).abs() + 1e-18);
    }

    #[test]
    fn test_donor_raises_fermi_level_above_midgap() {
        let system = donor_system();
        let result = system.get_sc_fermi().unwrap();
        assert!(result.converged);
        assert!(result.e_fermi > 0.5);
        assert!(system.q_tot(result.e_fermi).abs() < 1e-18);
    }

    #[test]
    fn test_repeated_solves_bit_identical() {
        let system = donor_system();
        let a = system.get_sc_fermi().unwrap();
        let b = system.get_sc_fermi().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_report_header_and_fixed_annotation() {
        let mut system = donor_system();
        system
            .defect_species_by_name_mut("V_O")
            .unwrap()
            .fix_concentration(1e-5)
            .unwrap();
        let report = system.report().unwrap();
        let first_line = report.lines().next().unwrap();
        assert!(first_line.contains("SC Fermi level"));
        assert!(report.contains("[fixed]"));
        assert!(report.contains("n (electrons)"));
        assert!(report.contains("p (holes)"));
    }

    #[test]
    fn test_as_dict_contains_run_stats_and_species() {
        let system = donor_system();
        let dict = system.as_dict(false, true).unwrap();
        assert!(dict.contains_key("Fermi Energy"));
        assert!(dict.contains_key("p0"));
        assert!(dict.contains_key("n0"));
        assert!(matches!(dict["V_O"], ConcentrationValue::Scalar(_)));
    }

    #[test]
    fn test_as_dict_decomposed_keeps_every_species() {
        let second = DefectSpecies::new(
            "Li_i",
            2,
            vec![
                DefectChargeState::new(0, 0.8, 1),
                DefectChargeState::new(1, 0.2, 2),
            ],
        )
        .unwrap();
        let system = DefectSystem::new(
            vec![donor_species(), second],
            model_dos(),
            100.0,
            300.0,
        )
        .unwrap();
        let dict = system.as_dict(true, false).unwrap();
        match (&dict["V_O"], &dict["Li_i"]) {
            (
                ConcentrationValue::ByChargeState(vo),
                ConcentrationValue::ByChargeState(li),
            ) => {
                assert_eq!(vo.len(), 2);
                assert!(vo.contains_key("0") && vo.contains_key("2"));
                assert_eq!(li.len(), 2);
                assert!(li.contains_key("0") && li.contains_key("1"));
            }
            _ => panic!("expected decomposed charge-state maps for both species"),
        }
    }

    #[test]
    fn test_per_volume_scaling() {
        let system = donor_system();
        let per_cell = system.as_dict(false, false).unwrap();
        let per_volume = system.as_dict(false, true).unwrap();
        let (ConcentrationValue::Scalar(cell), ConcentrationValue::Scalar(vol)) =
            (&per_cell["n0"], &per_volume["n0"])
        else {
            panic!("expected scalar carrier concentrations");
        };
        assert!((vol / cell - 1e24 / 100.0).abs() / (1e24 / 100.0) < 1e-12);
    }

    #[test]
    fn test_input_string_layout() {
        let mut system = donor_system();
        system
            .defect_species_by_name_mut("V_O")
            .unwrap()
            .fix_charge_state_concentration(0, 1e-6)
            .unwrap();
        let input = system.input_string();
        let lines: Vec<&str> = input.lines().collect();
        assert_eq!(lines[0], "0"); // spin flag
        assert_eq!(lines[1], "4"); // nelect
        assert_eq!(lines[2], "1"); // bandgap
        assert_eq!(lines[3], "300"); // temperature
        assert_eq!(lines[4], "1"); // one species with variable states
        assert_eq!(lines[5], "V_O 1 1"); // one variable state remains
        assert_eq!(lines[6], " 2 -0.3 1");
        assert_eq!(lines[7], "0"); // no fixed species totals
        assert_eq!(lines[8], "1"); // one fixed charge state
        assert!(lines[9].starts_with("V_O 0 "));
        assert!(input.ends_with('\n'));
    }

    #[test]
    fn test_transition_levels_keyed_by_species() {
        let system = donor_system();
        let levels = system.get_transition_levels();
        let profile = &levels["V_O"];
        assert_eq!(profile.first().unwrap().0, system.dos().emin());
        assert_eq!(profile.last().unwrap().0, system.dos().emax());
    }
}
