mod common;

use scfermi::{DefectSystem, DensityOfStates, InputSet, ScFermiError};

#[test]
fn test_fixed_species_total_pins_the_concentration() {
    let dos = common::flat_band_dos(4.0, 1.0);
    let free = DefectSystem::new(vec![common::oxygen_vacancy()], dos.clone(), 100.0, 300.0)
        .unwrap();
    let free_result = free.get_sc_fermi().unwrap();

    let mut pinned = free.clone();
    pinned
        .defect_species_by_name_mut("V_O")
        .unwrap()
        .fix_concentration(1e-9)
        .unwrap();
    let pinned_result = pinned.get_sc_fermi().unwrap();

    assert!(pinned_result.converged);
    let vo = pinned.defect_species_by_name("V_O").unwrap();
    assert_eq!(
        vo.get_concentration(pinned_result.e_fermi, pinned.temperature()),
        1e-9
    );
    // Throttling the donor supply moves the Fermi level back towards midgap.
    assert!(pinned_result.e_fermi < free_result.e_fermi);
    assert!(pinned_result.e_fermi > 0.5);
}

#[test]
fn test_fixed_charge_state_dominates_the_net_charge() {
    let dos = common::flat_band_dos(4.0, 1.0);
    let mut species = common::oxygen_vacancy();
    species.fix_charge_state_concentration(2, 1e-8).unwrap();
    let system = DefectSystem::new(vec![species], dos, 100.0, 300.0).unwrap();

    let result = system.get_sc_fermi().unwrap();
    assert!(result.converged);

    // At the solution the frozen donors must be compensated by electrons.
    let (p0, n0) = system
        .dos()
        .carrier_concentrations(result.e_fermi, system.temperature());
    let (positive, negative) = system.total_defect_charge_contributions(result.e_fermi);
    assert!(positive >= 2e-8);
    assert_eq!(negative, 0.0);
    assert!((n0 - (p0 + positive)).abs() < system.options().convergence_tolerance);
    assert!(n0 > p0);
}

#[test]
fn test_report_flags_frozen_populations() {
    let dos = common::flat_band_dos(4.0, 1.0);
    let mut species = common::oxygen_vacancy();
    species.fix_concentration(1e-9).unwrap();
    species.fix_charge_state_concentration(0, 1e-10).unwrap();
    let system = DefectSystem::new(vec![species], dos, 100.0, 300.0).unwrap();

    let report = system.report().unwrap();
    let fixed_lines: Vec<&str> = report
        .lines()
        .filter(|line| line.contains("[fixed]"))
        .collect();
    // One species line and one charge-state breakdown line.
    assert_eq!(fixed_lines.len(), 2);
    assert!(fixed_lines[0].starts_with("V_O"));
}

#[test]
fn test_written_inputs_follow_the_legacy_layout() {
    let dos = common::flat_band_dos(4.0, 1.0);
    let mut species = common::oxygen_vacancy();
    species.fix_concentration(1e-7).unwrap();
    let system = DefectSystem::new(vec![species], dos, 100.0, 300.0).unwrap();

    let temp_file = tempfile::NamedTempFile::new().unwrap();
    system.write_inputs(temp_file.path()).unwrap();
    let written = std::fs::read_to_string(temp_file.path()).unwrap();
    let lines: Vec<&str> = written.lines().collect();

    assert_eq!(lines[0], "0"); // not spin polarised
    assert_eq!(lines[1], "4"); // nelect
    assert_eq!(lines[2], "1"); // bandgap
    assert_eq!(lines[3], "300"); // temperature
    assert_eq!(lines[4], "1"); // one species with variable states
    assert_eq!(lines[5], "V_O 2 1");
    assert_eq!(lines[6], " 0 0.5 1");
    assert_eq!(lines[7], " 2 -0.3 1");
    assert_eq!(lines[8], "1"); // one fixed species total

    let mut parts = lines[9].split_whitespace();
    assert_eq!(parts.next(), Some("V_O"));
    let conc: f64 = parts.next().unwrap().parse().unwrap();
    // 1e-7 per cell scaled by 1e24 / 100 A^3.
    assert!((conc - 1e15).abs() / 1e15 < 1e-12);

    assert_eq!(lines[10], "0"); // no individually fixed charge states
}

#[test]
fn test_frozen_input_file_solves_end_to_end() {
    let toml_str = r#"
    temperature = 300.0
    volume = 100.0

    [dos]
    nelect = 4.0
    bandgap = 1.0
    energy = [-1.0, -0.75, -0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0]
    total = [1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]

    [[defect_species]]
    name = "V_O"
    nsites = 1
    fixed_concentration = 1e15
    charge_states = [
        { charge = 0, energy = 0.5 },
        { charge = 2, energy = -0.3 },
    ]
    "#;
    let input = InputSet::load_from_str(toml_str).unwrap();
    let system = input.build().unwrap();

    let vo = system.defect_species_by_name("V_O").unwrap();
    // 1e15 cm^-3 in a 100 A^3 cell is 1e-7 per cell.
    assert!((vo.fixed_concentration().unwrap() - 1e-7).abs() / 1e-7 < 1e-12);

    let result = system.get_sc_fermi().unwrap();
    assert!(result.converged);
    assert!(system.q_tot(result.e_fermi).abs() < system.options().convergence_tolerance);
}

#[test]
fn test_overcommitted_constraints_are_rejected_before_solving() {
    let dos = common::flat_band_dos(4.0, 1.0);
    let mut species = common::oxygen_vacancy();
    species.fix_charge_state_concentration(0, 1e-5).unwrap();
    let result = species.fix_concentration(1e-6);
    assert!(matches!(result, Err(ScFermiError::Constraint { .. })));

    // The failed setter leaves the species usable.
    let system = DefectSystem::new(vec![species], dos, 100.0, 300.0).unwrap();
    assert!(system.get_sc_fermi().is_ok());
}
