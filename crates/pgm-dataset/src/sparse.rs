//! Dense and sparse batch conversion.
//!
//! A dense batch repeats every record in every scenario, using default
//! values where a scenario does not override anything. A sparse batch only
//! keeps the overriding records and delimits scenarios with an index pointer.
//! Converting dense to sparse and back restores exactly the records that were
//! dropped as defaults, as long as the same [`RecordTemplate`] is used and the
//! dense slot ids ([`dense_slot_ids`]) are handed back to the expansion.

use crate::buffer::{ColumnarData, ComponentBuffer, RecordArray};
use crate::column::Column;
use crate::data::{ComponentData, Dataset, DenseBatch, SparseBatch};
use crate::index_pointer::IndexPointer;
use pgm_core::{AttributeKind, AttributeValue, PgmError, PgmResult, ID_ATTRIBUTE, NULL_INT32};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Which dense records count as "not overriding anything".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparsePolicy {
    /// Every attribute except `id` equals the template value
    #[default]
    DropDefaults,
    /// The record's `id` is null (padding)
    DropUnsetIds,
}

/// Default value per attribute; attributes not listed default to null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordTemplate {
    values: BTreeMap<String, AttributeValue>,
}

impl RecordTemplate {
    /// Template where every attribute is null.
    pub fn nulls() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    pub fn value(&self, attribute: &str, kind: AttributeKind) -> AttributeValue {
        match self.values.get(attribute) {
            Some(value) if value.kind() == kind => *value,
            _ => kind.null_value(),
        }
    }
}

/// Drop records that do not override anything.
pub fn dense_to_sparse(
    dense: &DenseBatch,
    template: &RecordTemplate,
    policy: SparsePolicy,
) -> PgmResult<SparseBatch> {
    dense.check()?;
    let data = &dense.data;
    let attributes: Vec<(String, AttributeKind)> = data
        .attribute_names()
        .into_iter()
        .filter_map(|name| data.attribute_kind(name).map(|kind| (name.to_string(), kind)))
        .collect();
    if policy == SparsePolicy::DropUnsetIds && !data.has_attribute(ID_ATTRIBUTE) {
        return Err(PgmError::invalid_arguments("dropping unset ids requires an 'id' attribute"));
    }

    let mut kept = Vec::new();
    let mut counts = Vec::with_capacity(dense.batch_size);
    for scenario in 0..dense.batch_size {
        let mut count = 0;
        for offset in 0..dense.elements_per_scenario {
            let row = scenario * dense.elements_per_scenario + offset;
            let drop = match policy {
                SparsePolicy::DropDefaults => {
                    let mut is_default = true;
                    let payload = attributes.iter().filter(|(name, _)| name != ID_ATTRIBUTE);
                    for (name, kind) in payload {
                        if data.value(row, name)? != template.value(name, *kind) {
                            is_default = false;
                            break;
                        }
                    }
                    is_default
                }
                SparsePolicy::DropUnsetIds => data.value(row, ID_ATTRIBUTE)?.is_null(),
            };
            if !drop {
                kept.push(row);
                count += 1;
            }
        }
        counts.push(count);
    }

    debug!(
        scenarios = dense.batch_size,
        dense_records = data.len(),
        sparse_records = kept.len(),
        "converted dense batch to sparse"
    );
    SparseBatch::new(IndexPointer::from_counts(&counts), data.select(&kept)?)
}

/// Expand a sparse batch to one record per slot id in every scenario.
///
/// Slots default to the union of ids over all scenarios, in order of first
/// appearance. Slots a scenario does not mention are filled from the template
/// with their id set.
pub fn sparse_to_dense(
    sparse: &SparseBatch,
    template: &RecordTemplate,
    slot_ids: Option<&[i32]>,
) -> PgmResult<DenseBatch> {
    sparse.check()?;
    let data = &sparse.data;
    let ids = data.ids()?.ok_or_else(|| {
        PgmError::invalid_arguments("sparse to dense conversion requires an 'id' attribute")
    })?;
    if let Some(pos) = ids.iter().position(|id| *id == NULL_INT32) {
        return Err(PgmError::InvalidId(format!("sparse record {} has no id", pos)));
    }

    let slots: Vec<i32> = match slot_ids {
        Some(slots) => {
            let mut seen = HashSet::new();
            if let Some(id) = slots.iter().find(|id| !seen.insert(**id)) {
                return Err(PgmError::ConflictId { id: *id });
            }
            slots.to_vec()
        }
        None => {
            let mut seen = HashSet::new();
            ids.iter().copied().filter(|id| seen.insert(*id)).collect()
        }
    };
    let slot_of: HashMap<i32, usize> =
        slots.iter().enumerate().map(|(k, id)| (*id, k)).collect();

    let defaults = template_rows(data, template, &slots)?;
    let default_offset = data.len();
    let combined = ComponentBuffer::concat(&[data.clone(), defaults])?;

    let batch_size = sparse.batch_size();
    let mut rows = Vec::with_capacity(batch_size.saturating_mul(slots.len()));
    for scenario in 0..batch_size {
        let range = sparse.indptr.scenario_range(scenario)?;
        let mut picked: Vec<Option<usize>> = vec![None; slots.len()];
        for row in range {
            let id = ids[row];
            let slot = *slot_of.get(&id).ok_or(PgmError::IdNotFound { id })?;
            if picked[slot].replace(row).is_some() {
                return Err(PgmError::ConflictId { id });
            }
        }
        rows.extend(
            picked
                .iter()
                .enumerate()
                .map(|(slot, row)| row.unwrap_or(default_offset + slot)),
        );
    }

    debug!(
        scenarios = batch_size,
        slots = slots.len(),
        "converted sparse batch to dense"
    );
    DenseBatch::new(batch_size, slots.len(), combined.select(&rows)?)
}

/// One template record per id, with the same fields/columns as `like`.
fn template_rows(
    like: &ComponentBuffer,
    template: &RecordTemplate,
    ids: &[i32],
) -> PgmResult<ComponentBuffer> {
    let value_for = |name: &str, kind: AttributeKind, id: i32| {
        if name == ID_ATTRIBUTE {
            AttributeValue::Int32(id)
        } else {
            template.value(name, kind)
        }
    };
    Ok(match like {
        ComponentBuffer::Array(array) => ComponentBuffer::Array(RecordArray {
            fields: array.fields.clone(),
            records: ids
                .iter()
                .map(|id| {
                    array
                        .fields
                        .iter()
                        .map(|field| value_for(&field.name, field.kind, *id))
                        .collect()
                })
                .collect(),
        }),
        ComponentBuffer::Columnar(columnar) => {
            let mut out = ColumnarData::new();
            for (name, column) in &columnar.columns {
                let mut filled = Column::with_capacity(column.kind(), ids.len());
                for id in ids {
                    filled.push(value_for(name, column.kind(), *id))?;
                }
                out.columns.insert(name.clone(), filled);
            }
            ComponentBuffer::Columnar(out)
        }
    })
}

/// Stack per-scenario buffers: dense when every scenario has the same number
/// of records, sparse otherwise.
pub fn batch_list_to_component_data(scenarios: &[ComponentBuffer]) -> PgmResult<ComponentData> {
    let first = scenarios
        .first()
        .ok_or_else(|| PgmError::invalid_arguments("batch list has no scenarios"))?;
    if scenarios.iter().all(|batch| batch.len() == first.len()) {
        Ok(ComponentData::DenseBatch(DenseBatch::from_scenarios(scenarios)?))
    } else {
        Ok(ComponentData::SparseBatch(SparseBatch::from_scenarios(scenarios)?))
    }
}

/// Split batch data into one buffer per scenario; single data is one scenario.
pub fn component_data_to_batch_list(data: &ComponentData) -> PgmResult<Vec<ComponentBuffer>> {
    match data.batch_size() {
        None => Ok(vec![data.buffer().clone()]),
        Some(size) => (0..size).map(|scenario| data.scenario(scenario)).collect(),
    }
}

/// Dense slot ids per component type.
pub type SlotIds = BTreeMap<String, Vec<i32>>;

/// Scenario 0 ids of every dense batch component; null ids are skipped.
pub fn dense_slot_ids(dataset: &Dataset) -> PgmResult<SlotIds> {
    let mut slots = SlotIds::new();
    for (name, data) in &dataset.components {
        let ComponentData::DenseBatch(dense) = data else {
            continue;
        };
        if dense.batch_size == 0 {
            continue;
        }
        if let Some(ids) = dense.scenario(0)?.ids()? {
            let ids = ids.into_iter().filter(|id| *id != NULL_INT32).collect();
            slots.insert(name.clone(), ids);
        }
    }
    Ok(slots)
}

/// Convert every dense batch component of a dataset to sparse.
pub fn dataset_to_sparse(dataset: &Dataset, policy: SparsePolicy) -> PgmResult<Dataset> {
    let template = RecordTemplate::nulls();
    let mut out = Dataset::new();
    for (name, data) in &dataset.components {
        let converted = match data {
            ComponentData::DenseBatch(dense) => {
                ComponentData::SparseBatch(dense_to_sparse(dense, &template, policy)?)
            }
            other => other.clone(),
        };
        out.insert(name.clone(), converted);
    }
    Ok(out)
}

/// Convert every sparse batch component of a dataset to dense.
///
/// A component listed in `slots` keeps those slots first, in that order, and
/// is re-expanded onto them even when it is already dense. Ids the data
/// mentions beyond them follow in order of first appearance.
pub fn dataset_to_dense(dataset: &Dataset, slots: &SlotIds) -> PgmResult<Dataset> {
    let template = RecordTemplate::nulls();
    let mut out = Dataset::new();
    for (name, data) in &dataset.components {
        let sparse = match (data, slots.get(name)) {
            (ComponentData::SparseBatch(sparse), _) => sparse.clone(),
            (ComponentData::DenseBatch(dense), Some(_)) => {
                dense.check()?;
                let counts = vec![dense.elements_per_scenario; dense.batch_size];
                SparseBatch::new(IndexPointer::from_counts(&counts), dense.data.clone())?
            }
            (other, _) => {
                out.insert(name.clone(), other.clone());
                continue;
            }
        };
        let component_slots = match slots.get(name) {
            Some(known) => Some(extend_slots(known, &sparse)?),
            None => None,
        };
        let dense = sparse_to_dense(&sparse, &template, component_slots.as_deref())?;
        out.insert(name.clone(), ComponentData::DenseBatch(dense));
    }
    Ok(out)
}

fn extend_slots(known: &[i32], sparse: &SparseBatch) -> PgmResult<Vec<i32>> {
    let mut slots = known.to_vec();
    let mut seen: HashSet<i32> = known.iter().copied().collect();
    for id in sparse.data.ids()?.unwrap_or_default() {
        if seen.insert(id) {
            slots.push(id);
        }
    }
    Ok(slots)
}
