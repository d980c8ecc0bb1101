use scfermi::{DefectChargeState, DefectSpecies, Dos};

/// A flat-band model density of states: unit DOS in the valence band
/// `[-1, 0]` and the conduction band `[bandgap, bandgap + 1]`, zero in the
/// gap, normalised so the valence states integrate to `nelect`.
pub fn flat_band_dos(nelect: f64, bandgap: f64) -> Dos {
    let n_points = 600;
    let emin = -1.0;
    let emax = bandgap + 1.0;
    let step = (emax - emin) / n_points as f64;
    let energies: Vec<f64> = (0..=n_points).map(|i| emin + i as f64 * step).collect();
    let dos: Vec<f64> = energies
        .iter()
        .map(|e| {
            if *e <= 0.0 || *e >= bandgap {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    let mut dos = Dos::new(energies, dos, nelect, bandgap, false).unwrap();
    dos.normalise();
    dos
}

/// The oxygen-vacancy-like donor used across the suites: a neutral state at
/// 0.5 eV and a doubly positive state at -0.3 eV, one site per cell.
#[allow(dead_code)]
pub fn oxygen_vacancy() -> DefectSpecies {
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
