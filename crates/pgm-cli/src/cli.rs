use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use pgm_core::DatasetType;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pgm", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level (overrides the config file; RUST_LOG wins over both)
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    /// Configuration file (defaults to ./pgm.toml when present)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Meta data registry document replacing the bundled one
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub meta: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a dataset file against the meta data registry
    Validate {
        /// Dataset in native JSON form
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// input, update, sym_output, asym_output or sc_output
        #[arg(long, short = 't')]
        dataset_type: DatasetType,
        /// Require a batch dataset
        #[arg(long, conflicts_with = "single")]
        batch: bool,
        /// Require a single dataset
        #[arg(long)]
        single: bool,
    },
    /// Show the shape of every component and non-fatal findings
    Inspect {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, short = 't')]
        dataset_type: DatasetType,
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
    /// Rewrite a batch dataset with dense or sparse scenarios
    Convert {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, short = 't')]
        dataset_type: DatasetType,
        #[arg(long, value_enum)]
        to: BatchKind,
        /// Dense dataset whose first scenario fixes the record slots of `--to dense`
        #[arg(long, value_hint = ValueHint::FilePath)]
        slots_from: Option<PathBuf>,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
    /// Keep only selected components and attributes
    Filter {
        #[arg(value_hint = ValueHint::FilePath)]
        input: PathBuf,
        #[arg(long, short = 't')]
        dataset_type: DatasetType,
        /// Comma separated `component` or `component:attribute` entries
        #[arg(long, value_delimiter = ',', required_unless_present = "relevant")]
        components: Vec<String>,
        /// Keep the attributes holding at least one value
        #[arg(long, conflicts_with = "components")]
        relevant: bool,
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
    /// Show the effective calculation options and check them
    Options {
        #[arg(long, value_enum, default_value_t = OptionsFormat::Toml)]
        format: OptionsFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OptionsFormat {
    Toml,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BatchKind {
    Dense,
    Sparse,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
