//! Native (list-of-map) mirror of datasets.
//!
//! The mirror is what JSON based callers exchange: a single dataset is a map
//! from component type to a list of records, a batch dataset is a list of
//! such maps, one per scenario. Records are plain maps from attribute name to
//! value, so they can also carry fields the record arrays have no room for.
//! Those are split off into an [`ExtraInfo`] keyed by scenario and component
//! id and merged back in on the way out.
//!
//! ```
//! use pgm_core::{DatasetType, PowerGridMetaData};
//! use pgm_dataset::native::{dataset_to_native, native_to_dataset, ExtraPolicy, NativeDataset};
//!
//! let meta = PowerGridMetaData::bundled().unwrap().dataset(DatasetType::Input).unwrap();
//! let native: NativeDataset = serde_json::from_str(
//!     r#"{"node": [{"id": 1, "u_rated": 10500.0, "name": "substation"}]}"#,
//! )
//! .unwrap();
//!
//! let (dataset, extra) = native_to_dataset(&native, meta, ExtraPolicy::Keep).unwrap();
//! assert_eq!(dataset.get("node").unwrap().total_elements(), 1);
//! assert_eq!(dataset_to_native(&dataset, meta, Some(&extra)).unwrap(), native);
//! ```

use crate::buffer::{ComponentBuffer, RecordArray};
use crate::data::{ComponentData, Dataset};
use crate::sparse::batch_list_to_component_data;
use crate::validation::validate_dataset;
use pgm_core::{
    AttributeKind, AttributeValue, ComponentMeta, DatasetMeta, PgmError, PgmResult, ID_ATTRIBUTE,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// One attribute or extra field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NativeValue {
    /// Explicit JSON `null`, same as leaving the attribute out
    Null,
    Int(i64),
    Real(f64),
    /// Per-phase values, `null` for an unset phase
    Asym([Option<f64>; 3]),
    Text(String),
    /// Anything else, only valid as an extra field
    Other(serde_json::Value),
}

pub type NativeComponent = BTreeMap<String, NativeValue>;
pub type NativeComponentList = Vec<NativeComponent>;
pub type SingleNativeDataset = BTreeMap<String, NativeComponentList>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NativeDataset {
    Single(SingleNativeDataset),
    Batch(Vec<SingleNativeDataset>),
}

impl NativeDataset {
    pub fn is_batch(&self) -> bool {
        matches!(self, NativeDataset::Batch(_))
    }
}

/// Scenario index (0 for single data) and component id of one record.
pub type ExtraKey = (usize, i32);

/// Extra record fields per record.
pub type ExtraInfo = BTreeMap<ExtraKey, BTreeMap<String, NativeValue>>;

/// What to do with record fields the schema does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPolicy {
    #[default]
    Reject,
    /// Move them into the returned [`ExtraInfo`]
    Keep,
    Ignore,
}

/// Convert the mirror to a dataset of record arrays.
///
/// Single mirrors become single data; batch mirrors are stacked per
/// component, dense when every scenario lists the same number of records and
/// sparse otherwise. A component missing from a scenario counts as an empty
/// list for that scenario.
pub fn native_to_dataset(
    native: &NativeDataset,
    meta: &DatasetMeta,
    policy: ExtraPolicy,
) -> PgmResult<(Dataset, ExtraInfo)> {
    let mut extra = ExtraInfo::new();
    let mut dataset = Dataset::new();
    match native {
        NativeDataset::Single(single) => {
            for (name, records) in single {
                let array = records_to_array(name, records, meta, policy, 0, &mut extra)?;
                dataset.insert(name.clone(), ComponentBuffer::Array(array));
            }
        }
        NativeDataset::Batch(scenarios) => {
            let names: BTreeSet<&String> = scenarios.iter().flat_map(|s| s.keys()).collect();
            for name in names {
                let mut buffers = Vec::with_capacity(scenarios.len());
                for (index, scenario) in scenarios.iter().enumerate() {
                    let records = scenario.get(name).map(Vec::as_slice).unwrap_or(&[]);
                    let array = records_to_array(name, records, meta, policy, index, &mut extra)?;
                    buffers.push(ComponentBuffer::Array(array));
                }
                dataset.insert(name.clone(), batch_list_to_component_data(&buffers)?);
            }
        }
    }
    debug!(
        dataset_type = %meta.dataset_type,
        components = dataset.len(),
        batch = native.is_batch(),
        "converted native mirror to dataset"
    );
    Ok((dataset, extra))
}

fn records_to_array(
    component: &str,
    records: &[NativeComponent],
    meta: &DatasetMeta,
    policy: ExtraPolicy,
    scenario: usize,
    extra: &mut ExtraInfo,
) -> PgmResult<RecordArray> {
    let component_meta = meta
        .component(component)
        .map_err(|err| PgmError::serialization(err.to_string()))?;
    let mut array = RecordArray::initialize(component_meta, records.len());
    for (row, record) in records.iter().enumerate() {
        let mut unknown = Vec::new();
        for (field, value) in record {
            match component_meta.attribute(field) {
                Some(attribute) => {
                    let converted = native_to_value(value, attribute.kind).ok_or_else(|| {
                        PgmError::serialization(format!(
                            "{} record {}: cannot store {:?} in {} attribute '{}'",
                            component, row, value, attribute.kind, field
                        ))
                    })?;
                    array.records[row][position(component_meta, field)?] = converted;
                }
                None => unknown.push((field, value)),
            }
        }
        if unknown.is_empty() {
            continue;
        }
        match policy {
            ExtraPolicy::Ignore => {}
            ExtraPolicy::Reject => {
                return Err(PgmError::serialization(format!(
                    "{} record {}: unknown attribute '{}'",
                    component, row, unknown[0].0
                )));
            }
            ExtraPolicy::Keep => {
                let id = array.get(row, ID_ATTRIBUTE)?;
                let id = id.as_i32().filter(|_| !id.is_null()).ok_or_else(|| {
                    PgmError::serialization(format!(
                        "{} record {}: extra fields need an id to attach to",
                        component, row
                    ))
                })?;
                let fields = extra.entry((scenario, id)).or_default();
                for (field, value) in unknown {
                    fields.insert(field.clone(), value.clone());
                }
            }
        }
    }
    Ok(array)
}

fn position(meta: &ComponentMeta, field: &str) -> PgmResult<usize> {
    meta.position(field).ok_or_else(|| {
        PgmError::UnreachableHit(format!("attribute '{}' lost its position", field))
    })
}

fn native_to_value(value: &NativeValue, kind: AttributeKind) -> Option<AttributeValue> {
    match (value, kind) {
        (NativeValue::Null, kind) => Some(kind.null_value()),
        (NativeValue::Int(v), AttributeKind::Int32) => {
            i32::try_from(*v).ok().map(AttributeValue::Int32)
        }
        (NativeValue::Int(v), AttributeKind::Int8) => {
            i8::try_from(*v).ok().map(AttributeValue::Int8)
        }
        (NativeValue::Int(v), AttributeKind::Double) => Some(AttributeValue::Double(*v as f64)),
        (NativeValue::Real(v), AttributeKind::Double) => Some(AttributeValue::Double(*v)),
        (NativeValue::Asym(phases), AttributeKind::Double3) => Some(AttributeValue::Double3(
            phases.map(|phase| phase.unwrap_or(f64::NAN)),
        )),
        _ => None,
    }
}

fn value_to_native(value: AttributeValue) -> Option<NativeValue> {
    if value.is_null() {
        return None;
    }
    Some(match value {
        AttributeValue::Int32(v) => NativeValue::Int(i64::from(v)),
        AttributeValue::Int8(v) => NativeValue::Int(i64::from(v)),
        AttributeValue::Double(v) => NativeValue::Real(v),
        AttributeValue::Double3(phases) => {
            NativeValue::Asym(phases.map(|phase| (!phase.is_nan()).then_some(phase)))
        }
    })
}

/// Convert a dataset to its mirror.
///
/// Null attributes are left out. Extra fields are attached to the record
/// with the matching scenario and id without overriding attributes. Batch
/// scenarios leave out components without records.
pub fn dataset_to_native(
    dataset: &Dataset,
    meta: &DatasetMeta,
    extra: Option<&ExtraInfo>,
) -> PgmResult<NativeDataset> {
    let info =
        validate_dataset(dataset, meta).map_err(|err| PgmError::serialization(err.to_string()))?;
    if !info.is_batch {
        let single = scenario_to_native(dataset, 0, extra, false)?;
        return Ok(NativeDataset::Single(single));
    }
    let scenarios = (0..info.batch_size)
        .map(|scenario| scenario_to_native(&dataset.scenario(scenario)?, scenario, extra, true))
        .collect::<PgmResult<Vec<_>>>()?;
    Ok(NativeDataset::Batch(scenarios))
}

fn scenario_to_native(
    dataset: &Dataset,
    scenario: usize,
    extra: Option<&ExtraInfo>,
    skip_empty: bool,
) -> PgmResult<SingleNativeDataset> {
    let mut out = SingleNativeDataset::new();
    for (name, data) in &dataset.components {
        let ComponentData::Single(buffer) = data else {
            return Err(PgmError::UnreachableHit(format!(
                "component '{}' is still batch data inside a scenario",
                name
            )));
        };
        if skip_empty && buffer.is_empty() {
            continue;
        }
        let attributes = buffer.attribute_names();
        let mut records = Vec::with_capacity(buffer.len());
        for row in 0..buffer.len() {
            let mut record = NativeComponent::new();
            for attribute in &attributes {
                if let Some(value) = value_to_native(buffer.value(row, attribute)?) {
                    record.insert(attribute.to_string(), value);
                }
            }
            let id = buffer
                .has_attribute(ID_ATTRIBUTE)
                .then(|| buffer.value(row, ID_ATTRIBUTE))
                .transpose()?
                .and_then(|id| id.as_i32());
            let fields = id.and_then(|id| extra.and_then(|extra| extra.get(&(scenario, id))));
            if let Some(fields) = fields {
                for (field, value) in fields {
                    record.entry(field.clone()).or_insert_with(|| value.clone());
                }
            }
            records.push(record);
        }
        out.insert(name.clone(), records);
    }
    Ok(out)
}

pub fn load_native_dataset(path: &Path) -> PgmResult<NativeDataset> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|err| {
        PgmError::serialization(format!("parsing '{}': {}", path.display(), err))
    })
}

pub fn save_native_dataset(path: &Path, native: &NativeDataset) -> PgmResult<()> {
    let text = serde_json::to_string_pretty(native)?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ShapeKind;
    use pgm_core::{DatasetType, PowerGridMetaData};
    use serde_json::json;

    fn meta(dataset_type: DatasetType) -> &'static DatasetMeta {
        PowerGridMetaData::bundled()
            .unwrap()
            .dataset(dataset_type)
            .unwrap()
    }

    fn native(value: serde_json::Value) -> NativeDataset {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn untagged_values_parse_by_json_type() {
        let single = native(json!({"asym_load": [{
            "id": 3, "p_specified": [1.0, null, 2.5], "status": 1, "tag": "x", "flag": true
        }]}));
        let NativeDataset::Single(single) = single else {
            panic!("expected single");
        };
        let record = &single["asym_load"][0];
        assert_eq!(record["id"], NativeValue::Int(3));
        assert_eq!(
            record["p_specified"],
            NativeValue::Asym([Some(1.0), None, Some(2.5)])
        );
        assert_eq!(record["tag"], NativeValue::Text("x".into()));
        assert_eq!(record["flag"], NativeValue::Other(json!(true)));
    }

    #[test]
    fn single_round_trip_keeps_partial_asym_and_extras() {
        let original = native(json!({
            "asym_load": [
                {"id": 3, "node": 1, "p_specified": [1.0, null, 2.5], "source": "feeder 7"}
            ],
            "node": [{"id": 1, "u_rated": 400.0}]
        }));
        let input = meta(DatasetType::Input);
        let (dataset, extra) = native_to_dataset(&original, input, ExtraPolicy::Keep).unwrap();
        assert_eq!(
            extra[&(0, 3)]["source"],
            NativeValue::Text("feeder 7".into())
        );
        let load = dataset.get("asym_load").unwrap().buffer();
        let value = load.value(0, "p_specified").unwrap();
        assert!(!value.is_null());
        assert_eq!(
            dataset_to_native(&dataset, input, Some(&extra)).unwrap(),
            original
        );
    }

    #[test]
    fn extra_policies() {
        let original = native(json!({"node": [{"id": 1, "name": "a"}]}));
        let input = meta(DatasetType::Input);
        let err = native_to_dataset(&original, input, ExtraPolicy::Reject).unwrap_err();
        assert!(matches!(err, PgmError::Serialization(_)));
        let (_, extra) = native_to_dataset(&original, input, ExtraPolicy::Ignore).unwrap();
        assert!(extra.is_empty());

        let no_id = native(json!({"node": [{"name": "a"}]}));
        assert!(native_to_dataset(&no_id, input, ExtraPolicy::Keep).is_err());
    }

    #[test]
    fn batch_extras_stay_with_their_scenario() {
        let update = meta(DatasetType::Update);
        let original = native(json!([
            {"sym_load": [{"id": 1, "p_specified": 1.0, "note": "peak"}]},
            {"sym_load": [{"id": 1, "p_specified": 2.0, "note": "valley"}]},
            {"sym_load": [{"id": 1, "p_specified": 3.0}]}
        ]));
        let (dataset, extra) = native_to_dataset(&original, update, ExtraPolicy::Keep).unwrap();
        assert_eq!(extra.len(), 2);
        assert_eq!(extra[&(0, 1)]["note"], NativeValue::Text("peak".into()));
        assert_eq!(extra[&(1, 1)]["note"], NativeValue::Text("valley".into()));
        assert!(!extra.contains_key(&(2, 1)));
        assert_eq!(
            dataset_to_native(&dataset, update, Some(&extra)).unwrap(),
            original
        );
    }

    #[test]
    fn out_of_range_and_mistyped_values_fail() {
        let input = meta(DatasetType::Input);
        let status = native(json!({"sym_load": [{"id": 1, "status": 300}]}));
        assert!(native_to_dataset(&status, input, ExtraPolicy::Reject).is_err());
        let id = native(json!({"node": [{"id": 1.5}]}));
        assert!(native_to_dataset(&id, input, ExtraPolicy::Reject).is_err());
        let unknown = native(json!({"transformer": [{"id": 1}]}));
        assert!(native_to_dataset(&unknown, input, ExtraPolicy::Reject).is_err());
    }

    #[test]
    fn batch_mirror_stacks_dense_or_sparse() {
        let update = meta(DatasetType::Update);
        let uniform = native(json!([
            {"sym_load": [{"id": 1, "p_specified": 1.0}]},
            {"sym_load": [{"id": 1, "p_specified": 2.0}]}
        ]));
        let (dataset, _) = native_to_dataset(&uniform, update, ExtraPolicy::Reject).unwrap();
        assert_eq!(
            dataset.get("sym_load").unwrap().shape().kind,
            ShapeKind::DenseBatch
        );
        assert_eq!(dataset_to_native(&dataset, update, None).unwrap(), uniform);

        let ragged = native(json!([
            {"sym_load": [{"id": 1, "p_specified": 1.0}], "source": [{"id": 9, "u_ref": 1.0}]},
            {"sym_load": [{"id": 1, "p_specified": 2.0}, {"id": 2, "status": 0}]}
        ]));
        let (dataset, _) = native_to_dataset(&ragged, update, ExtraPolicy::Reject).unwrap();
        assert_eq!(dataset.batch_size(), 2);
        assert_eq!(
            dataset.get("sym_load").unwrap().shape().kind,
            ShapeKind::SparseBatch
        );
        assert_eq!(
            dataset.get("source").unwrap().shape().kind,
            ShapeKind::SparseBatch
        );
        assert_eq!(dataset_to_native(&dataset, update, None).unwrap(), ragged);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        let original = native(json!({"node": [{"id": 1, "u_rated": 10.5}]}));
        save_native_dataset(&path, &original).unwrap();
        assert_eq!(load_native_dataset(&path).unwrap(), original);
        assert!(matches!(
            load_native_dataset(&dir.path().join("missing.json")),
            Err(PgmError::Io(_))
        ));
    }
}
