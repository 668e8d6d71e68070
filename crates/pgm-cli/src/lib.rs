pub mod cli;
pub mod common;
pub mod config;

pub use cli::{build_cli_command, BatchKind, Cli, Commands, OptionsFormat, OutputFormat};
pub use common::Session;
pub use config::PgmConfig;
