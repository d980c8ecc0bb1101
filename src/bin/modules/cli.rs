use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

const ABOUT: &str = "A command-line tool for computing the self-consistent Fermi level and \
defect concentrations of a semiconductor from charge neutrality.";
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser)]
#[command(
    version,
    about = ABOUT,
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input file describing the defect system, in TOML format.
    ///
    /// The input carries the temperature, cell volume, density of states
    /// (inline grid or a reference to a two-column text file) and the defect
    /// species with their charge states. Fixed concentrations are in cm^-3.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[command(flatten)]
    pub output: OutputOptions,

    #[command(flatten)]
    pub solver: SolverArgs,
}

/// Options for controlling the output format and destination.
#[derive(Args)]
#[command(next_help_heading = "Output Options")]
pub struct OutputOptions {
    /// Output file path.
    ///
    /// If not specified, results are written to standard output.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format for the results.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Report)]
    pub format: OutputFormat,

    /// Number of decimal places to display for floating-point values.
    #[arg(short, long, default_value_t = 6)]
    pub precision: usize,

    /// Break concentrations down to individual charge states in structured
    /// output.
    #[arg(short, long)]
    pub decomposed: bool,

    /// Also write a legacy SC-FERMI input file to this path.
    #[arg(long, value_name = "FILE")]
    pub write_inputs: Option<PathBuf>,
}

/// Options overriding the solver settings of the input file.
#[derive(Args)]
#[command(next_help_heading = "Solver Options")]
pub struct SolverArgs {
    /// Convergence tolerance on the net charge per cell.
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Maximum number of trial steps for the Fermi-level search.
    #[arg(long)]
    pub n_trial_steps: Option<u32>,
}

/// Output format for the calculation results.
#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    /// SC-FERMI style plain-text report.
    Report,
    /// Pretty-printed tables with the solve summary and per-charge-state
    /// concentrations.
    Pretty,
    /// JSON object with the Fermi level, carrier and defect concentrations.
    Json,
}
