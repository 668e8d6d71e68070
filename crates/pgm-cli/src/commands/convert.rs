use std::path::Path;

use anyhow::{Context, Result};
use pgm_cli::{BatchKind, Session};
use pgm_core::DatasetType;
use pgm_dataset::{dataset_to_dense, dataset_to_sparse, dense_slot_ids, SlotIds};
use tracing::{debug, info, warn};

pub fn handle(
    session: &Session,
    input: &Path,
    dataset_type: DatasetType,
    to: BatchKind,
    slots_from: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let (dataset, extra) = session.load(input, dataset_type)?;
    if !dataset.is_batch() {
        warn!(path = %input.display(), "single dataset has no scenarios to convert");
    }
    let converted = match to {
        BatchKind::Dense => {
            let slots = load_slots(session, slots_from, dataset_type)?;
            dataset_to_dense(&dataset, &slots)
        }
        BatchKind::Sparse => dataset_to_sparse(&dataset, session.config.native.sparse_policy),
    }
    .with_context(|| format!("converting '{}'", input.display()))?;

    let records: usize = converted
        .components
        .values()
        .map(|data| data.total_elements())
        .sum();
    info!(to = ?to, records, "converted batch dataset");
    session.save(output, &converted, dataset_type, &extra)?;
    println!(
        "Wrote {} scenarios ({} records) to {}",
        converted.batch_size(),
        records,
        output.display()
    );
    Ok(())
}

fn load_slots(
    session: &Session,
    slots_from: Option<&Path>,
    dataset_type: DatasetType,
) -> Result<SlotIds> {
    let Some(path) = slots_from else {
        return Ok(SlotIds::new());
    };
    let (reference, _) = session.load(path, dataset_type)?;
    let slots = dense_slot_ids(&reference)
        .with_context(|| format!("reading slot ids from '{}'", path.display()))?;
    debug!(path = %path.display(), components = slots.len(), "loaded dense slot ids");
    Ok(slots)
}
