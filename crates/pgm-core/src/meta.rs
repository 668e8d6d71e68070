//! Component meta data registry.
//!
//! The registry tells, per dataset type and component type, which attributes
//! exist and of which [`AttributeKind`]. It is the only source of truth for
//! field sets: nothing in the dataset crates hard-codes attribute names other
//! than `id`.
//!
//! The registry document is JSON, keyed by dataset type then component type,
//! with an ordered list of `[name, kind]` pairs per component. The list order
//! is the canonical attribute order.
//!
//! ```
//! use pgm_core::meta::{DatasetType, PowerGridMetaData};
//!
//! let meta = PowerGridMetaData::from_json_str(
//!     r#"{"input": {"node": [["id", "int32"], ["u_rated", "double"]]}}"#,
//! )
//! .unwrap();
//! let node = meta.dataset(DatasetType::Input).unwrap().component("node").unwrap();
//! assert_eq!(node.attribute_names(), vec!["id", "u_rated"]);
//! ```

use crate::enums::CalculationType;
use crate::error::{PgmError, PgmResult};
use crate::value::{AttributeKind, AttributeValue};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Name of the identifier attribute every component carries.
pub const ID_ATTRIBUTE: &str = "id";

const BUNDLED_REGISTRY: &str = include_str!("../data/meta_data.json");

static BUNDLED: OnceCell<PowerGridMetaData> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    Input,
    Update,
    SymOutput,
    AsymOutput,
    ScOutput,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Input => "input",
            DatasetType::Update => "update",
            DatasetType::SymOutput => "sym_output",
            DatasetType::AsymOutput => "asym_output",
            DatasetType::ScOutput => "sc_output",
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["input", "update", "sym_output", "asym_output", "sc_output"]
    }

    /// Result dataset produced by a calculation.
    pub fn output_for(calculation_type: CalculationType, symmetric: bool) -> Self {
        match (calculation_type, symmetric) {
            (CalculationType::ShortCircuit, _) => DatasetType::ScOutput,
            (_, true) => DatasetType::SymOutput,
            (_, false) => DatasetType::AsymOutput,
        }
    }

    pub fn is_output(&self) -> bool {
        !matches!(self, DatasetType::Input | DatasetType::Update)
    }
}

impl FromStr for DatasetType {
    type Err = PgmError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "input" => Ok(DatasetType::Input),
            "update" => Ok(DatasetType::Update),
            "sym_output" => Ok(DatasetType::SymOutput),
            "asym_output" => Ok(DatasetType::AsymOutput),
            "sc_output" => Ok(DatasetType::ScOutput),
            other => Err(PgmError::invalid_arguments(format!(
                "unknown dataset type '{}'; supported values: {}",
                other,
                DatasetType::available().join(", ")
            ))),
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMeta {
    pub name: String,
    pub kind: AttributeKind,
}

/// Attribute layout of one component type within one dataset type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMeta {
    pub name: String,
    pub attributes: Vec<AttributeMeta>,
}

impl ComponentMeta {
    pub fn attribute(&self, name: &str) -> Option<&AttributeMeta> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Position of the attribute in canonical order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name == name)
    }

    /// Kind of the attribute, or a dataset error naming the component.
    pub fn kind_of(&self, name: &str) -> PgmResult<AttributeKind> {
        self.attribute(name).map(|attr| attr.kind).ok_or_else(|| {
            PgmError::dataset(format!("unknown attribute '{name}' for component '{}'", self.name))
        })
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    /// Default-fill template: every attribute at its null sentinel.
    pub fn null_record(&self) -> Vec<AttributeValue> {
        self.attributes
            .iter()
            .map(|attr| attr.kind.null_value())
            .collect()
    }
}

/// All component layouts of one dataset type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMeta {
    pub dataset_type: DatasetType,
    pub components: BTreeMap<String, ComponentMeta>,
}

impl DatasetMeta {
    pub fn component(&self, name: &str) -> PgmResult<&ComponentMeta> {
        self.components.get(name).ok_or_else(|| {
            PgmError::dataset(format!(
                "unknown component type '{}' for dataset '{}'",
                name, self.dataset_type
            ))
        })
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

/// On-disk shape of the registry document.
type RegistryDocument = BTreeMap<DatasetType, BTreeMap<String, Vec<(String, AttributeKind)>>>;

/// Meta data for every dataset type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerGridMetaData {
    datasets: BTreeMap<DatasetType, DatasetMeta>,
}

impl PowerGridMetaData {
    /// The registry shipped with the crate, parsed once.
    pub fn bundled() -> PgmResult<&'static PowerGridMetaData> {
        BUNDLED.get_or_try_init(|| Self::from_json_str(BUNDLED_REGISTRY))
    }

    pub fn from_path(path: &Path) -> PgmResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            PgmError::Config(format!("reading meta data registry '{}': {err}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> PgmResult<Self> {
        let document: RegistryDocument = serde_json::from_str(text)
            .map_err(|err| PgmError::Config(format!("parsing meta data registry: {err}")))?;

        let mut datasets = BTreeMap::new();
        for (dataset_type, components) in document {
            let mut metas = BTreeMap::new();
            for (component, attributes) in components {
                let meta = build_component(dataset_type, &component, attributes)?;
                metas.insert(component, meta);
            }
            datasets.insert(
                dataset_type,
                DatasetMeta {
                    dataset_type,
                    components: metas,
                },
            );
        }
        Ok(Self { datasets })
    }

    pub fn dataset(&self, dataset_type: DatasetType) -> PgmResult<&DatasetMeta> {
        self.datasets.get(&dataset_type).ok_or_else(|| {
            PgmError::Config(format!("meta data registry has no '{dataset_type}' dataset"))
        })
    }

    pub fn dataset_types(&self) -> impl Iterator<Item = DatasetType> + '_ {
        self.datasets.keys().copied()
    }
}

fn build_component(
    dataset_type: DatasetType,
    component: &str,
    attributes: Vec<(String, AttributeKind)>,
) -> PgmResult<ComponentMeta> {
    let mut seen = HashSet::new();
    for (name, _) in &attributes {
        if !seen.insert(name.as_str()) {
            return Err(PgmError::Config(format!(
                "attribute '{}' declared twice for {}/{}",
                name, dataset_type, component
            )));
        }
    }
    match attributes.iter().find(|(name, _)| name == ID_ATTRIBUTE) {
        Some((_, AttributeKind::Int32)) => {}
        Some((_, kind)) => {
            return Err(PgmError::Config(format!(
                "attribute 'id' of {}/{} must be int32, found {}",
                dataset_type, component, kind
            )))
        }
        None => {
            return Err(PgmError::Config(format!(
                "component {}/{} has no 'id' attribute",
                dataset_type, component
            )))
        }
    }
    Ok(ComponentMeta {
        name: component.to_string(),
        attributes: attributes
            .into_iter()
            .map(|(name, kind)| AttributeMeta { name, kind })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bundled_registry_parses_all_dataset_types() {
        let meta = PowerGridMetaData::bundled().unwrap();
        for name in DatasetType::available() {
            let dataset_type: DatasetType = name.parse().unwrap();
            assert!(meta.dataset(dataset_type).is_ok(), "missing {name}");
        }
        let node = meta
            .dataset(DatasetType::Input)
            .unwrap()
            .component("node")
            .unwrap();
        assert_eq!(node.attribute_names(), vec!["id", "u_rated"]);
        assert_eq!(node.kind_of("u_rated").unwrap(), AttributeKind::Double);
    }

    #[test]
    fn null_record_follows_canonical_order() {
        let meta = PowerGridMetaData::bundled().unwrap();
        let load = meta
            .dataset(DatasetType::Update)
            .unwrap()
            .component("sym_load")
            .unwrap();
        let record = load.null_record();
        assert_eq!(record.len(), 4);
        assert_eq!(record[0].kind(), AttributeKind::Int32);
        assert_eq!(record[1].kind(), AttributeKind::Int8);
        assert!(record.iter().all(|value| value.is_null()));
    }

    #[test]
    fn registry_rejects_missing_or_mistyped_id() {
        let missing =
            PowerGridMetaData::from_json_str(r#"{"input": {"node": [["u_rated", "double"]]}}"#);
        assert!(matches!(missing, Err(PgmError::Config(_))));

        let mistyped =
            PowerGridMetaData::from_json_str(r#"{"input": {"node": [["id", "double"]]}}"#);
        assert!(matches!(mistyped, Err(PgmError::Config(_))));

        let duplicate = PowerGridMetaData::from_json_str(
            r#"{"input": {"node": [["id", "int32"], ["id", "int32"]]}}"#,
        );
        assert!(matches!(duplicate, Err(PgmError::Config(_))));
    }

    #[test]
    fn unknown_component_is_a_dataset_error() {
        let meta = PowerGridMetaData::bundled().unwrap();
        let err = meta
            .dataset(DatasetType::Input)
            .unwrap()
            .component("transformer_tap_regulator")
            .unwrap_err();
        assert!(matches!(err, PgmError::Dataset(_)));
    }

    #[test]
    fn registry_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"update": {{"line": [["id", "int32"], ["from_status", "int8"]]}}}}"#
        )
        .unwrap();
        let meta = PowerGridMetaData::from_path(file.path()).unwrap();
        assert!(meta.dataset(DatasetType::Input).is_err());
        assert_eq!(
            meta.dataset_types().collect::<Vec<_>>(),
            vec![DatasetType::Update]
        );
    }

    #[test]
    fn output_dataset_selection() {
        assert_eq!(
            DatasetType::output_for(CalculationType::PowerFlow, true),
            DatasetType::SymOutput
        );
        assert_eq!(
            DatasetType::output_for(CalculationType::StateEstimation, false),
            DatasetType::AsymOutput
        );
        assert_eq!(
            DatasetType::output_for(CalculationType::ShortCircuit, true),
            DatasetType::ScOutput
        );
    }
}
