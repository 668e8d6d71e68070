//! # pgm-core: shared vocabulary for power grid datasets
//!
//! Everything the dataset and model crates agree on lives here:
//!
//! - [`error`] - the error taxonomy ([`PgmError`]) and batch error aggregation
//! - [`enums`] - calculation type/method, tap changing, short circuit and
//!   attribute filter options
//! - [`value`] - attribute kinds, values and null sentinels
//! - [`meta`] - the component meta data registry (which attributes exist)
//! - [`diagnostics`] - non-fatal dataset findings
//!
//! ## Quick Start
//!
//! ```rust
//! use pgm_core::*;
//!
//! let meta = PowerGridMetaData::bundled().unwrap();
//! let node = meta.dataset(DatasetType::Input).unwrap().component("node").unwrap();
//!
//! // A fresh record holds the null sentinel of every attribute
//! let template = node.null_record();
//! assert!(template.iter().all(AttributeValue::is_null));
//! assert_eq!(node.kind_of("id").unwrap(), AttributeKind::Int32);
//! ```

pub mod diagnostics;
pub mod enums;
pub mod error;
pub mod meta;
pub mod value;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use enums::{
    CalculationMethod, CalculationType, ComponentAttributeFilterOptions,
    ShortCircuitVoltageScaling, TapChangingStrategy,
};
pub use error::{BatchError, PgmError, PgmResult};
pub use meta::{
    AttributeMeta, ComponentMeta, DatasetMeta, DatasetType, PowerGridMetaData, ID_ATTRIBUTE,
};
pub use value::{
    AttributeKind, AttributeValue, ComponentId, NULL_DOUBLE, NULL_DOUBLE3, NULL_INT32, NULL_INT8,
};
