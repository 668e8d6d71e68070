//! Seam between the model and the numerical calculation engine.
//!
//! The model owns validated, normalized component records ([`ModelState`]);
//! an engine turns them into result records. Solvers (Newton-Raphson, linear,
//! state estimation, short circuit) live behind [`CalculationEngine`].

use crate::options::CalculationOptions;
use pgm_core::{PgmResult, ID_ATTRIBUTE};
use pgm_dataset::RecordArray;
use std::collections::BTreeMap;

/// Input records of every component type, in canonical attribute order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    pub system_frequency: f64,
    pub components: BTreeMap<String, RecordArray>,
}

impl ModelState {
    pub fn component(&self, name: &str) -> Option<&RecordArray> {
        self.components.get(name)
    }

    pub fn component_count(&self, name: &str) -> usize {
        self.components.get(name).map(RecordArray::len).unwrap_or(0)
    }

    /// Ids of one component type, empty when the model has none.
    pub fn ids(&self, name: &str) -> PgmResult<Vec<i32>> {
        match self.components.get(name) {
            Some(array) if array.position(ID_ATTRIBUTE).is_some() => array.ids(),
            _ => Ok(Vec::new()),
        }
    }
}

/// A numerical engine computing results for one scenario.
///
/// Implementations must be usable from several worker threads at once;
/// batch calculations hand every scenario its own [`ModelState`].
pub trait CalculationEngine: Send + Sync {
    /// Result records per component type, one record per input record.
    fn calculate(
        &self,
        state: &ModelState,
        options: &CalculationOptions,
    ) -> PgmResult<BTreeMap<String, RecordArray>>;
}
