use std::path::Path;

use anyhow::{Context, Result};
use pgm_cli::Session;
use pgm_core::DatasetType;
use pgm_dataset::{validate_batch_dataset, validate_dataset, validate_single_dataset};
use tracing::info;

pub fn handle(
    session: &Session,
    input: &Path,
    dataset_type: DatasetType,
    batch: bool,
    single: bool,
) -> Result<()> {
    let (dataset, _) = session.load(input, dataset_type)?;
    let meta = session.dataset_meta(dataset_type)?;
    let info = if batch {
        validate_batch_dataset(&dataset, meta)
    } else if single {
        validate_single_dataset(&dataset, meta)
    } else {
        validate_dataset(&dataset, meta)
    }
    .with_context(|| format!("validating '{}'", input.display()))?;

    info!(batch_size = info.batch_size, "dataset is valid");
    let shape = if info.is_batch {
        format!("batch of {} scenarios", info.batch_size)
    } else {
        "single dataset".to_string()
    };
    println!(
        "{}: valid {} {} with {} component types",
        input.display(),
        dataset_type,
        shape,
        info.components.len()
    );
    Ok(())
}
