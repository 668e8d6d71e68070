//! Component/attribute selection.
//!
//! A [`ComponentAttributeMapping`] says which components and which of their
//! attributes a caller wants back. Resolution turns it into a concrete,
//! ordered attribute list per component type present in a dataset.
//!
//! ```
//! use pgm_core::{DatasetType, PowerGridMetaData};
//! use pgm_dataset::{
//!     resolve_component_attributes, AttributeSelection, ComponentAttributeMapping, Dataset,
//!     RecordArray,
//! };
//!
//! let meta = PowerGridMetaData::bundled().unwrap().dataset(DatasetType::Input).unwrap();
//! let nodes = RecordArray::initialize(meta.component("node").unwrap(), 1);
//! let dataset = Dataset::new().with("node", nodes);
//!
//! let mapping = ComponentAttributeMapping::per_component([(
//!     "node",
//!     AttributeSelection::set(["u_rated"]),
//! )]);
//! let resolved = resolve_component_attributes(&mapping, &dataset, meta).unwrap();
//! assert_eq!(resolved["node"], vec!["u_rated".to_string()]);
//! ```

use crate::buffer::{ColumnarData, ComponentBuffer, Layout, RecordArray};
use crate::column::Column;
use crate::data::Dataset;
use pgm_core::{
    AttributeMeta, ComponentAttributeFilterOptions, ComponentMeta, DatasetMeta, PgmError,
    PgmResult,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Attribute selection for one component type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeSelection {
    /// Every schema attribute
    #[default]
    All,
    Filter(ComponentAttributeFilterOptions),
    /// Resolved in canonical schema order
    Set(BTreeSet<String>),
    /// Resolved in the given order
    List(Vec<String>),
}

impl AttributeSelection {
    pub fn set<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeSelection::Set(names.into_iter().map(Into::into).collect())
    }

    pub fn list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeSelection::List(names.into_iter().map(Into::into).collect())
    }

    /// Explicit selections and filter policies produce columnar data.
    pub fn layout(&self) -> Layout {
        match self {
            AttributeSelection::All => Layout::Array,
            _ => Layout::Columnar,
        }
    }
}

/// Which components, and which of their attributes, to keep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComponentAttributeMapping {
    /// Every component present, every attribute
    #[default]
    All,
    Filter(ComponentAttributeFilterOptions),
    ComponentSet(BTreeSet<String>),
    ComponentList(Vec<String>),
    /// Components missing from the map keep every attribute
    PerComponent(BTreeMap<String, AttributeSelection>),
}

impl ComponentAttributeMapping {
    pub fn per_component<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, AttributeSelection)>,
        S: Into<String>,
    {
        ComponentAttributeMapping::PerComponent(
            entries
                .into_iter()
                .map(|(name, selection)| (name.into(), selection))
                .collect(),
        )
    }

    /// Output layout requested for one component.
    pub fn layout_for(&self, component: &str) -> Layout {
        match self {
            ComponentAttributeMapping::Filter(_) => Layout::Columnar,
            ComponentAttributeMapping::PerComponent(map) => map
                .get(component)
                .map(AttributeSelection::layout)
                .unwrap_or(Layout::Array),
            _ => Layout::Array,
        }
    }
}

/// Resolve a mapping to an ordered attribute list per component type.
///
/// Only component types present in `dataset` appear in the result.
pub fn resolve_component_attributes(
    mapping: &ComponentAttributeMapping,
    dataset: &Dataset,
    meta: &DatasetMeta,
) -> PgmResult<BTreeMap<String, Vec<String>>> {
    let mut resolved = BTreeMap::new();
    match mapping {
        ComponentAttributeMapping::All => {
            for name in dataset.component_names() {
                resolved.insert(name.to_string(), all_attributes(meta.component(name)?));
            }
        }
        ComponentAttributeMapping::Filter(option) => {
            for name in dataset.component_names() {
                let attributes = filtered_attributes(*option, name, dataset, meta.component(name)?);
                if *option == ComponentAttributeFilterOptions::Relevant && attributes.is_empty() {
                    continue;
                }
                resolved.insert(name.to_string(), attributes);
            }
        }
        ComponentAttributeMapping::ComponentSet(components) => {
            for name in components {
                select_component(&mut resolved, name, dataset, meta)?;
            }
        }
        ComponentAttributeMapping::ComponentList(components) => {
            reject_duplicates(components, "component type")?;
            for name in components {
                select_component(&mut resolved, name, dataset, meta)?;
            }
        }
        ComponentAttributeMapping::PerComponent(map) => {
            for name in map.keys() {
                require_component(meta, name)?;
            }
            for name in dataset.component_names() {
                let component_meta = meta.component(name)?;
                let attributes = match map.get(name) {
                    None | Some(AttributeSelection::All) => all_attributes(component_meta),
                    Some(AttributeSelection::Filter(option)) => {
                        filtered_attributes(*option, name, dataset, component_meta)
                    }
                    Some(AttributeSelection::Set(names)) => {
                        for attribute in names {
                            require_attribute(component_meta, attribute)?;
                        }
                        component_meta
                            .attributes
                            .iter()
                            .filter(|attr| names.contains(&attr.name))
                            .map(|attr| attr.name.clone())
                            .collect()
                    }
                    Some(AttributeSelection::List(names)) => {
                        reject_duplicates(names, "attribute")?;
                        for attribute in names {
                            require_attribute(component_meta, attribute)?;
                        }
                        names.clone()
                    }
                };
                resolved.insert(name.to_string(), attributes);
            }
        }
    }
    Ok(resolved)
}

fn all_attributes(meta: &ComponentMeta) -> Vec<String> {
    meta.attributes.iter().map(|a| a.name.clone()).collect()
}

fn filtered_attributes(
    option: ComponentAttributeFilterOptions,
    component: &str,
    dataset: &Dataset,
    meta: &ComponentMeta,
) -> Vec<String> {
    match option {
        ComponentAttributeFilterOptions::Everything => all_attributes(meta),
        ComponentAttributeFilterOptions::Relevant => {
            let Some(data) = dataset.get(component) else {
                return Vec::new();
            };
            let buffer = data.buffer();
            meta.attributes
                .iter()
                .filter(|attr| buffer.has_non_null(&attr.name))
                .map(|attr| attr.name.clone())
                .collect()
        }
    }
}

fn select_component(
    resolved: &mut BTreeMap<String, Vec<String>>,
    name: &str,
    dataset: &Dataset,
    meta: &DatasetMeta,
) -> PgmResult<()> {
    let component_meta = require_component(meta, name)?;
    if dataset.get(name).is_some() {
        resolved.insert(name.to_string(), all_attributes(component_meta));
    } else {
        tracing::debug!(component = name, "selected component absent from dataset");
    }
    Ok(())
}

fn require_component<'a>(meta: &'a DatasetMeta, name: &str) -> PgmResult<&'a ComponentMeta> {
    meta.components.get(name).ok_or_else(|| {
        PgmError::invalid_arguments(format!(
            "unknown component type '{}' for dataset '{}'",
            name, meta.dataset_type
        ))
    })
}

fn require_attribute(meta: &ComponentMeta, attribute: &str) -> PgmResult<()> {
    if meta.attribute(attribute).is_none() {
        return Err(PgmError::invalid_arguments(format!(
            "unknown attribute '{}' for component '{}'",
            attribute, meta.name
        )));
    }
    Ok(())
}

fn reject_duplicates(names: &[String], what: &str) -> PgmResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(PgmError::invalid_arguments(format!(
                "duplicate {} '{}' in list",
                what, name
            )));
        }
    }
    Ok(())
}

/// Project a dataset onto resolved attribute lists.
///
/// Components missing from `resolved` are dropped. A selected attribute the
/// data does not carry is filled with nulls. Each buffer keeps its layout.
pub fn filter_dataset(
    dataset: &Dataset,
    meta: &DatasetMeta,
    resolved: &BTreeMap<String, Vec<String>>,
) -> PgmResult<Dataset> {
    let mut out = Dataset::new();
    for (name, attributes) in resolved {
        let Some(data) = dataset.get(name) else {
            continue;
        };
        let component_meta = meta.component(name)?;
        let projected =
            data.map_buffer(|buffer| project_buffer(buffer, component_meta, attributes))?;
        out.insert(name.clone(), projected);
    }
    Ok(out)
}

/// Keep `attributes` in the given order, null-filling the ones the buffer lacks.
pub fn project_buffer(
    buffer: &ComponentBuffer,
    meta: &ComponentMeta,
    attributes: &[String],
) -> PgmResult<ComponentBuffer> {
    let len = buffer.len();
    match buffer {
        ComponentBuffer::Array(array) => {
            let fields = attributes
                .iter()
                .map(|name| {
                    Ok(AttributeMeta {
                        name: name.clone(),
                        kind: meta.kind_of(name)?,
                    })
                })
                .collect::<PgmResult<Vec<_>>>()?;
            let positions: Vec<Option<usize>> =
                attributes.iter().map(|name| array.position(name)).collect();
            let records = array
                .records
                .iter()
                .map(|record| {
                    positions
                        .iter()
                        .zip(&fields)
                        .map(|(pos, field)| match pos {
                            Some(pos) => record[*pos],
                            None => field.kind.null_value(),
                        })
                        .collect()
                })
                .collect();
            Ok(ComponentBuffer::Array(RecordArray { fields, records }))
        }
        ComponentBuffer::Columnar(columnar) => {
            let mut out = ColumnarData::new();
            for name in attributes {
                let column = match columnar.column(name) {
                    Some(column) => column.clone(),
                    None => Column::nulls(meta.kind_of(name)?, len),
                };
                out.columns.insert(name.clone(), column);
            }
            Ok(ComponentBuffer::Columnar(out))
        }
    }
}
