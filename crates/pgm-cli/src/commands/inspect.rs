//! Shape summary and non-fatal findings for one dataset file.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use pgm_cli::{OutputFormat, Session};
use pgm_core::{DatasetType, Diagnostics};
use pgm_dataset::{inspect_dataset, validate_dataset, DatasetInfo};
use serde::Serialize;
use tabwriter::TabWriter;

#[derive(Serialize)]
struct InspectReport<'a> {
    path: String,
    /// Absent when the dataset fails validation
    #[serde(skip_serializing_if = "Option::is_none")]
    info: Option<&'a DatasetInfo>,
    extra_records: usize,
    diagnostics: &'a Diagnostics,
}

pub fn handle(
    session: &Session,
    input: &Path,
    dataset_type: DatasetType,
    format: OutputFormat,
) -> Result<()> {
    let (dataset, extra) = session.load(input, dataset_type)?;
    let meta = session.dataset_meta(dataset_type)?;
    let info = validate_dataset(&dataset, meta).ok();
    let diagnostics = inspect_dataset(&dataset, meta);

    let report = InspectReport {
        path: input.display().to_string(),
        info: info.as_ref(),
        extra_records: extra.len(),
        diagnostics: &diagnostics,
    };
    match format {
        OutputFormat::Plain => print_table(&report)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), &report)
                .map_err(|err| anyhow!("serializing inspect report to JSON: {err}"))?;
            println!();
        }
    }

    if diagnostics.has_errors() {
        bail!(
            "'{}' has {} error(s)",
            input.display(),
            diagnostics.error_count()
        );
    }
    Ok(())
}

fn print_table(report: &InspectReport) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    if let Some(info) = report.info {
        writeln!(
            writer,
            "{} ({}, batch size {})",
            report.path, info.dataset_type, info.batch_size
        )?;
        writeln!(writer, "COMPONENT\tSHAPE\tPER SCENARIO\tTOTAL")?;
        for (name, component) in &info.components {
            let per_scenario = component
                .elements_per_scenario
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                name, component.shape, per_scenario, component.total_elements
            )?;
        }
    } else {
        writeln!(writer, "{} (invalid)", report.path)?;
    }
    if report.extra_records > 0 {
        writeln!(writer, "extra-field records: {}", report.extra_records)?;
    }
    write!(writer, "{}", report.diagnostics)?;
    writer.flush()?;
    Ok(())
}
