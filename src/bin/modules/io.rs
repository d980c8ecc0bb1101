use super::cli::OutputFormat;
use super::error::CliError;
use prettytable::*;
use scfermi::{ConcentrationValue, DefectSystem, DensityOfStates, Dos, SolverResult};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads a two-column `energy dos` text file, skipping blank lines and
/// `#` comments.
pub fn read_dos_grid(path: &Path) -> Result<(Vec<f64>, Vec<f64>), CliError> {
    let file = std::fs::File::open(path).map_err(|e| CliError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = BufReader::new(file);

    let mut energy = Vec::new();
    let mut total = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| CliError::DosParse {
            path: path.to_path_buf(),
            details: format!("Error reading line {}: {}", i + 1, e),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let (e_str, d_str) = match (parts.next(), parts.next()) {
            (Some(e), Some(d)) => (e, d),
            _ => {
                return Err(CliError::DosParse {
                    path: path.to_path_buf(),
                    details: format!("Line {}: expected two columns, got '{}'", i + 1, trimmed),
                })
            }
        };
        let e: f64 = e_str.parse().map_err(|_| CliError::DosParse {
            path: path.to_path_buf(),
            details: format!("Line {}: invalid energy: {}", i + 1, e_str),
        })?;
        let d: f64 = d_str.parse().map_err(|_| CliError::DosParse {
            path: path.to_path_buf(),
            details: format!("Line {}: invalid DOS value: {}", i + 1, d_str),
        })?;
        energy.push(e);
        total.push(d);
    }

    if energy.is_empty() {
        return Err(CliError::DosParse {
            path: path.to_path_buf(),
            details: "No data lines found".to_string(),
        });
    }

    Ok((energy, total))
}

pub fn get_writer(output_path: &Option<PathBuf>) -> Result<Box<dyn Write>, CliError> {
    match output_path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| CliError::Io {
                path: path.clone(),
                source: e,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

pub fn write_results(
    mut writer: Box<dyn Write>,
    system: &DefectSystem<Dos>,
    result: &SolverResult,
    format: &OutputFormat,
    precision: usize,
    decomposed: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Report => {
            let report = system.report()?;
            writer.write_all(report.as_bytes())?;
            Ok(())
        }
        OutputFormat::Pretty => write_pretty_tables(&mut writer, system, result, precision),
        OutputFormat::Json => write_json(&mut writer, system, result, precision, decomposed),
    }
}

fn write_pretty_tables(
    writer: &mut dyn Write,
    system: &DefectSystem<Dos>,
    result: &SolverResult,
    precision: usize,
) -> Result<(), CliError> {
    let box_format = format::FormatBuilder::new()
        .column_separator('│')
        .borders('│')
        .separators(
            &[format::LinePosition::Top],
            format::LineSeparator::new('─', '┬', '╭', '╮'),
        )
        .separators(
            &[format::LinePosition::Title],
            format::LineSeparator::new('═', '╪', '╞', '╡'),
        )
        .separators(
            &[format::LinePosition::Intern],
            format::LineSeparator::new('─', '┼', '├', '┤'),
        )
        .separators(
            &[format::LinePosition::Bottom],
            format::LineSeparator::new('─', '┴', '╰', '╯'),
        )
        .padding(1, 1)
        .build();

    let no_intern_format = format::FormatBuilder::new()
        .column_separator('│')
        .borders('│')
        .separators(
            &[format::LinePosition::Top],
            format::LineSeparator::new('─', '┬', '╭', '╮'),
        )
        .separators(
            &[format::LinePosition::Bottom],
            format::LineSeparator::new('─', '┴', '╰', '╯'),
        )
        .padding(1, 1)
        .build();

    let scale = 1e24 / system.volume();
    let (p0, n0) = system
        .dos()
        .carrier_concentrations(result.e_fermi, system.temperature());

    let mut title_table = Table::new();
    title_table.set_format(box_format);
    title_table.add_row(row![bc->"Self-Consistent Fermi Level Results"]);
    title_table.print(writer)?;
    writeln!(writer)?;

    let mut summary_table = Table::new();
    summary_table.set_format(no_intern_format);
    summary_table.add_row(
        row![b->"Fermi Level:", format!("{:.prec$} eV", result.e_fermi, prec = precision)],
    );
    summary_table.add_row(row![b->"Converged:", result.converged]);
    summary_table
        .add_row(row![b->"Residual:", format!("{:.prec$e} e/cell", result.residual, prec = precision)]);
    summary_table.add_row(row![b->"Trial Steps:", result.steps]);
    summary_table
        .add_row(row![b->"n (electrons):", format!("{:.prec$e} cm^-3", n0 * scale, prec = precision)]);
    summary_table
        .add_row(row![b->"p (holes):", format!("{:.prec$e} cm^-3", p0 * scale, prec = precision)]);
    summary_table.print(writer)?;
    writeln!(writer)?;

    let mut data_table = Table::new();
    data_table.set_format(box_format);
    data_table.set_titles(
        row![bc->"Species", bc->"Charge", bc->"Concentration (cm^-3)", bc->"Share (%)", bc->"Fixed"],
    );

    for ds in system.defect_species() {
        let total = ds.get_concentration(result.e_fermi, system.temperature());
        for (q, conc) in ds.charge_state_concentrations(result.e_fermi, system.temperature()) {
            let share = if total > 0.0 { conc * 100.0 / total } else { 0.0 };
            let fixed = ds
                .charge_state(q)
                .and_then(|cs| cs.fixed_concentration())
                .is_some();
            data_table.add_row(row![
                l->ds.name(),
                r->q,
                r->format!("{:.prec$e}", conc * scale, prec = precision),
                r->format!("{:.2}", share),
                c->if fixed { "yes" } else { "" }
            ]);
        }
    }

    data_table.print(writer)?;

    Ok(())
}

fn write_json(
    writer: &mut dyn Write,
    system: &DefectSystem<Dos>,
    result: &SolverResult,
    precision: usize,
    decomposed: bool,
) -> Result<(), CliError> {
    let dict = system.as_dict(decomposed, true)?;

    writeln!(writer, "{{")?;
    writeln!(writer, "  \"converged\": {},", result.converged)?;
    writeln!(
        writer,
        "  \"residual\": {:.*e},",
        precision, result.residual
    )?;
    let n_entries = dict.len();
    for (i, (key, value)) in dict.iter().enumerate() {
        let comma = if i < n_entries - 1 { "," } else { "" };
        match value {
            ConcentrationValue::Scalar(v) => {
                writeln!(writer, "  \"{}\": {:.*e}{}", key, precision, v, comma)?;
            }
            ConcentrationValue::ByChargeState(map) => {
                writeln!(writer, "  \"{}\": {{", key)?;
                let n_states = map.len();
                for (j, (q, conc)) in map.iter().enumerate() {
                    let inner_comma = if j < n_states - 1 { "," } else { "" };
                    writeln!(
                        writer,
                        "    \"{}\": {:.*e}{}",
                        q, precision, conc, inner_comma
                    )?;
                }
                writeln!(writer, "  }}{}", comma)?;
            }
        }
    }
    writeln!(writer, "}}")?;
    Ok(())
}
