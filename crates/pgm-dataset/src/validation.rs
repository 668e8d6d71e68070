//! Shape validation of datasets against the meta data registry.
//!
//! Validation is a pure projection: it never changes the data, it only tells
//! which of the six recognized shapes every component has and how many
//! scenarios the dataset describes, or fails with [`PgmError::Dataset`].

use crate::buffer::{ColumnarData, ComponentBuffer, RecordArray};
use crate::data::{ComponentData, DataShape, Dataset, ShapeKind};
use pgm_core::{
    AttributeKind, ComponentMeta, DatasetMeta, DatasetType, Diagnostics, PgmError, PgmResult,
    ID_ATTRIBUTE,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Shape summary of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
    pub shape: DataShape,
    /// `None` for sparse batches
    pub elements_per_scenario: Option<usize>,
    pub total_elements: usize,
}

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    pub dataset_type: DatasetType,
    pub is_batch: bool,
    /// 1 for single datasets
    pub batch_size: usize,
    pub components: BTreeMap<String, ComponentInfo>,
}

/// Validate every component and the consistency of batch sizes.
pub fn validate_dataset(dataset: &Dataset, meta: &DatasetMeta) -> PgmResult<DatasetInfo> {
    let mut components = BTreeMap::new();
    let mut single = Vec::new();
    let mut batch_size: Option<(usize, &str)> = None;

    for (name, data) in &dataset.components {
        let component_meta = meta.component(name)?;
        let info = validate_component(name, data, component_meta)?;

        match data.batch_size() {
            None => single.push(name.as_str()),
            Some(size) => match batch_size {
                None => batch_size = Some((size, name.as_str())),
                Some((expected, first)) if expected != size => {
                    return Err(PgmError::dataset(format!(
                        "inconsistent batch sizes: '{}' has {} scenarios, '{}' has {}",
                        first, expected, name, size
                    )));
                }
                Some(_) => {}
            },
        }
        components.insert(name.clone(), info);
    }

    if let (Some((_, batch_component)), Some(single_component)) = (batch_size, single.first()) {
        return Err(PgmError::dataset(format!(
            "dataset mixes single data ('{}') with batch data ('{}')",
            single_component, batch_component
        )));
    }

    Ok(DatasetInfo {
        dataset_type: meta.dataset_type,
        is_batch: batch_size.is_some(),
        batch_size: batch_size.map(|(size, _)| size).unwrap_or(1),
        components,
    })
}

/// Validate and additionally require every component to be batch data.
///
/// An empty dataset counts as a batch of size 1.
pub fn validate_batch_dataset(dataset: &Dataset, meta: &DatasetMeta) -> PgmResult<DatasetInfo> {
    let mut info = validate_dataset(dataset, meta)?;
    if dataset.is_empty() {
        info.is_batch = true;
        return Ok(info);
    }
    if !info.is_batch {
        return Err(PgmError::dataset(format!(
            "expected a batch '{}' dataset, got single data",
            meta.dataset_type
        )));
    }
    Ok(info)
}

/// Validate and additionally require single data only.
pub fn validate_single_dataset(dataset: &Dataset, meta: &DatasetMeta) -> PgmResult<DatasetInfo> {
    let info = validate_dataset(dataset, meta)?;
    if info.is_batch {
        return Err(PgmError::dataset(format!(
            "expected a single '{}' dataset, got batch data with {} scenarios",
            meta.dataset_type, info.batch_size
        )));
    }
    Ok(info)
}

fn validate_component(
    name: &str,
    data: &ComponentData,
    meta: &ComponentMeta,
) -> PgmResult<ComponentInfo> {
    let len = validate_buffer(name, data.buffer(), meta)?;
    let shape = data.shape();
    let elements_per_scenario = match data {
        ComponentData::Single(_) => Some(len),
        ComponentData::DenseBatch(dense) => {
            let expected = dense.expected_len().map_err(|err| {
                PgmError::dataset(format!("dense batch '{}': {}", name, err))
            })?;
            if expected != len {
                return Err(PgmError::dataset(format!(
                    "dense batch '{}' has {} records, expected {} scenarios x {} elements",
                    name, len, dense.batch_size, dense.elements_per_scenario
                )));
            }
            Some(dense.elements_per_scenario)
        }
        ComponentData::SparseBatch(sparse) => {
            sparse.indptr.validate().map_err(|err| match err {
                PgmError::Dataset(message) => {
                    PgmError::dataset(format!("sparse batch '{}': {}", name, message))
                }
                other => other,
            })?;
            if i64::try_from(len).ok() != Some(sparse.indptr.total()) {
                return Err(PgmError::dataset(format!(
                    "sparse batch '{}' has {} records but indptr ends at {}",
                    name,
                    len,
                    sparse.indptr.total()
                )));
            }
            None
        }
    };
    Ok(ComponentInfo {
        shape,
        elements_per_scenario,
        total_elements: len,
    })
}

/// Check the buffer against the component schema, returning its record count.
fn validate_buffer(name: &str, buffer: &ComponentBuffer, meta: &ComponentMeta) -> PgmResult<usize> {
    match buffer {
        ComponentBuffer::Array(array) => validate_array(name, array, meta),
        ComponentBuffer::Columnar(columnar) => validate_columnar(name, columnar, meta),
    }
}

fn check_attribute(
    component: &str,
    attribute: &str,
    kind: AttributeKind,
    meta: &ComponentMeta,
) -> PgmResult<()> {
    let expected = meta.attribute(attribute).map(|attr| attr.kind).ok_or_else(|| {
        PgmError::dataset(format!(
            "unknown attribute '{}' for component '{}'",
            attribute, component
        ))
    })?;
    if expected != kind {
        return Err(PgmError::dataset(format!(
            "attribute '{}' of component '{}' must be {}, found {}",
            attribute, component, expected, kind
        )));
    }
    Ok(())
}

fn validate_array(name: &str, array: &RecordArray, meta: &ComponentMeta) -> PgmResult<usize> {
    let mut seen = HashSet::new();
    for field in &array.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(PgmError::dataset(format!(
                "attribute '{}' listed twice for component '{}'",
                field.name, name
            )));
        }
        check_attribute(name, &field.name, field.kind, meta)?;
    }
    for (row, record) in array.records.iter().enumerate() {
        if record.len() != array.fields.len() {
            return Err(PgmError::dataset(format!(
                "record {} of component '{}' has {} values, expected {}",
                row,
                name,
                record.len(),
                array.fields.len()
            )));
        }
        if let Some((field, value)) = array
            .fields
            .iter()
            .zip(record)
            .find(|(field, value)| value.kind() != field.kind)
        {
            return Err(PgmError::dataset(format!(
                "record {} of component '{}' holds a {} value for {} attribute '{}'",
                row,
                name,
                value.kind(),
                field.kind,
                field.name
            )));
        }
    }
    Ok(array.len())
}

fn validate_columnar(
    name: &str,
    columnar: &ColumnarData,
    meta: &ComponentMeta,
) -> PgmResult<usize> {
    for (attribute, column) in &columnar.columns {
        check_attribute(name, attribute, column.kind(), meta)?;
    }
    columnar
        .checked_len()
        .map_err(|err| PgmError::dataset(format!("component '{}': {}", name, err)))
}

/// Structural findings that are valid but likely unintended.
///
/// Shape violations are reported as a single error entry instead of failing,
/// so callers get one report for a file either way.
pub fn inspect_dataset(dataset: &Dataset, meta: &DatasetMeta) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    if let Err(err) = validate_dataset(dataset, meta) {
        diagnostics.add_error(err.category(), &err.to_string());
        return diagnostics;
    }

    for (name, data) in &dataset.components {
        let buffer = data.buffer();
        if buffer.is_empty() && data.shape().kind != ShapeKind::SparseBatch {
            diagnostics.add_warning_with_entity("content", "component has no records", name);
            continue;
        }

        if !buffer.has_attribute(ID_ATTRIBUTE) {
            diagnostics.add_warning_with_entity("content", "records carry no 'id' attribute", name);
        } else if !buffer.has_non_null(ID_ATTRIBUTE) && !buffer.is_empty() {
            diagnostics.add_warning_with_entity("content", "every 'id' is null", name);
        }

        let has_payload = buffer
            .attribute_names()
            .into_iter()
            .filter(|attribute| *attribute != ID_ATTRIBUTE)
            .any(|attribute| buffer.has_non_null(attribute));
        if !has_payload && !buffer.is_empty() {
            diagnostics.add_warning_with_entity(
                "content",
                "records hold no value besides 'id'",
                name,
            );
        }

        if let ComponentData::SparseBatch(sparse) = data {
            for (scenario, count) in sparse.indptr.counts().into_iter().enumerate() {
                if count == 0 {
                    diagnostics.add_warning_in_scenario(
                        "content",
                        "sparse scenario carries no records",
                        name,
                        scenario,
                    );
                }
            }
        }
    }
    diagnostics
}
