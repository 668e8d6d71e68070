//! Shell completion scripts for `pgm`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap_complete::{generate, Shell};
use pgm_cli::build_cli_command;
use tracing::info;

const BIN_NAME: &str = "pgm";

/// Completion script for `shell`.
pub fn render(shell: Shell) -> Vec<u8> {
    let mut script = Vec::new();
    generate(shell, &mut build_cli_command(), BIN_NAME, &mut script);
    script
}

pub fn handle(shell: Shell, out: Option<&Path>) -> Result<()> {
    let script = render(shell);
    let Some(path) = out else {
        io::stdout().write_all(&script)?;
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    fs::write(path, &script)
        .with_context(|| format!("writing completion script to '{}'", path.display()))?;
    info!(%shell, path = %path.display(), bytes = script.len(), "wrote completion script");
    println!("Wrote {shell} completion to {}", path.display());
    Ok(())
}
