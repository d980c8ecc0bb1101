use super::cli::Cli;
use super::error::CliError;
use super::io;
use indicatif::{ProgressBar, ProgressStyle};
use scfermi::{InputSet, SolverOptions};

pub fn run(args: Cli) -> Result<(), CliError> {
    let input = InputSet::load_from_file(&args.input)?;

    let system = if let Some(dos_path) = input.dos_file() {
        // Relative DOS file paths are resolved next to the input file.
        let resolved = match args.input.parent() {
            Some(parent) if dos_path.is_relative() => parent.join(dos_path),
            _ => dos_path.to_path_buf(),
        };
        let (energy, total) = io::read_dos_grid(&resolved)?;
        input.build_with_grid(energy, total)?
    } else {
        input.build()?
    };

    let defaults = system.options();
    let system = system.with_options(SolverOptions {
        convergence_tolerance: args
            .solver
            .tolerance
            .unwrap_or(defaults.convergence_tolerance),
        n_trial_steps: args.solver.n_trial_steps.unwrap_or(defaults.n_trial_steps),
    });

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message("Solving for the self-consistent Fermi level...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = system.get_sc_fermi()?;

    pb.finish_and_clear();

    if !result.converged {
        eprintln!(
            "Warning: residual ({:e}) greater than the convergence tolerance after {} steps; \
             increase --n-trial-steps or relax --tolerance",
            result.residual, result.steps
        );
    }

    if let Some(path) = &args.output.write_inputs {
        system.write_inputs(path)?;
    }

    let writer = io::get_writer(&args.output.output)?;
    io::write_results(
        writer,
        &system,
        &result,
        &args.output.format,
        args.output.precision,
        args.output.decomposed,
    )?;

    Ok(())
}
