use std::io;

use anyhow::{anyhow, Context, Result};
use pgm_cli::{OptionsFormat, Session};

pub fn handle(session: &Session, format: OptionsFormat) -> Result<()> {
    let options = &session.config.calculation;
    options
        .check()
        .context("checking [calculation] options")?;
    match format {
        OptionsFormat::Toml => {
            let text = toml::to_string_pretty(options)
                .map_err(|err| anyhow!("serializing options to TOML: {err}"))?;
            print!("{text}");
            println!("# method in effect: {}", options.method());
        }
        OptionsFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), options)
                .map_err(|err| anyhow!("serializing options to JSON: {err}"))?;
            println!();
        }
    }
    Ok(())
}
