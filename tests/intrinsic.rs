mod common;

use scfermi::{DefectChargeState, DefectSpecies, DefectSystem, DensityOfStates};

#[test]
fn test_intrinsic_fermi_level_is_the_carrier_crossing() {
    let dos = common::flat_band_dos(4.0, 1.0);
    let system: DefectSystem<_> = DefectSystem::new(vec![], dos, 100.0, 300.0).unwrap();

    let result = system.get_sc_fermi().unwrap();
    assert!(result.converged, "intrinsic solve should converge");
    assert!(
        (result.e_fermi - 0.5).abs() < 1e-6,
        "symmetric bands should pin the Fermi level at midgap, got {}",
        result.e_fermi
    );

    let (p0, n0) = system
        .dos()
        .carrier_concentrations(result.e_fermi, system.temperature());
    assert!((n0 - p0).abs() < system.options().convergence_tolerance);
}

#[test]
fn test_neutral_defects_do_not_shift_the_fermi_level() {
    let dos = common::flat_band_dos(4.0, 1.0);
    let intrinsic: DefectSystem<_> =
        DefectSystem::new(vec![], dos.clone(), 100.0, 300.0).unwrap();

    let neutral_only = DefectSpecies::new(
        "X_i",
        1,
        vec![DefectChargeState::new(0, 0.4, 1)],
    )
    .unwrap();
    let with_neutral = DefectSystem::new(vec![neutral_only], dos, 100.0, 300.0).unwrap();

    let a = intrinsic.get_sc_fermi().unwrap();
    let b = with_neutral.get_sc_fermi().unwrap();
    assert_eq!(a.e_fermi, b.e_fermi);
}

#[test]
fn test_repeated_solves_are_bit_identical() {
    let dos = common::flat_band_dos(4.0, 1.0);
    let system = DefectSystem::new(vec![common::oxygen_vacancy()], dos, 100.0, 300.0).unwrap();

    let first = system.get_sc_fermi().unwrap();
    let second = system.get_sc_fermi().unwrap();
    assert_eq!(first, second);

    let report_a = system.report().unwrap();
    let report_b = system.report().unwrap();
    assert_eq!(report_a, report_b);
}
