//! # pgm-model: the power grid model facade
//!
//! [`PowerGridModel`] owns validated input records, applies updates with
//! id lookup and hands scenarios to a [`CalculationEngine`]. Batch
//! calculations run every update scenario on its own copy of the model,
//! optionally in parallel, and stack the results into a dense batch.

mod batch;
pub mod engine;
pub mod model;
pub mod options;

pub use engine::{CalculationEngine, ModelState};
pub use model::{PowerGridModel, DEFAULT_SYSTEM_FREQUENCY};
pub use options::{CalculationOptions, Threading};
