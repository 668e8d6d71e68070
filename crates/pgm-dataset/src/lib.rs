//! # pgm-dataset: power grid dataset shapes
//!
//! A dataset maps component types (`node`, `line`, `sym_load`, ...) to their
//! records. Each component's records come in one of six shapes:
//!
//! | shape        | array layout                | columnar layout               |
//! |--------------|-----------------------------|-------------------------------|
//! | single       | one [`RecordArray`]         | one [`ColumnarData`]          |
//! | dense batch  | scenario-major record array | scenario-major columns        |
//! | sparse batch | [`IndexPointer`] + records  | [`IndexPointer`] + columns    |
//!
//! This crate validates those shapes against the meta data registry
//! ([`validation`]), resolves attribute selections ([`filter`]), converts
//! between dense and sparse batches ([`sparse`]) and to and from the
//! list-of-map mirror used by JSON callers ([`native`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use pgm_core::{DatasetType, PowerGridMetaData};
//! use pgm_dataset::*;
//!
//! let meta = PowerGridMetaData::bundled().unwrap().dataset(DatasetType::Update).unwrap();
//! let load_meta = meta.component("sym_load").unwrap();
//!
//! let mut scenario = RecordArray::initialize(load_meta, 1);
//! scenario.set(0, "id", 7).unwrap();
//! scenario.set(0, "p_specified", 1e6).unwrap();
//!
//! let batch = DenseBatch::from_scenarios(&[scenario.clone().into(), scenario.into()]).unwrap();
//! let dataset = Dataset::new().with("sym_load", batch);
//!
//! let info = validate_dataset(&dataset, meta).unwrap();
//! assert!(info.is_batch);
//! assert_eq!(info.batch_size, 2);
//! ```

pub mod buffer;
pub mod column;
pub mod data;
pub mod filter;
pub mod index_pointer;
pub mod native;
pub mod sparse;
pub mod validation;

pub use buffer::{ColumnarData, ComponentBuffer, Layout, RecordArray};
pub use column::Column;
pub use data::{ComponentData, DataShape, Dataset, DenseBatch, ShapeKind, SparseBatch};
pub use filter::{
    filter_dataset, project_buffer, resolve_component_attributes, AttributeSelection,
    ComponentAttributeMapping,
};
pub use index_pointer::IndexPointer;
pub use native::{
    dataset_to_native, load_native_dataset, native_to_dataset, save_native_dataset, ExtraInfo,
    ExtraKey, ExtraPolicy, NativeDataset, NativeValue,
};
pub use sparse::{
    batch_list_to_component_data, component_data_to_batch_list, dataset_to_dense,
    dataset_to_sparse, dense_slot_ids, dense_to_sparse, sparse_to_dense, RecordTemplate, SlotIds,
    SparsePolicy,
};
pub use validation::{
    inspect_dataset, validate_batch_dataset, validate_dataset, validate_single_dataset,
    ComponentInfo, DatasetInfo,
};
