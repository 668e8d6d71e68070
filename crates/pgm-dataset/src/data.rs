//! Component data shapes and the dataset container.
//!
//! Every component type in a [`Dataset`] carries exactly one of three shapes:
//! single (one scenario), dense batch (same record count in every scenario)
//! or sparse batch (variable record count, delimited by an [`IndexPointer`]).
//! Crossed with the two buffer layouts this gives six recognized shapes, all
//! expressed by [`DataShape`].

use crate::buffer::{ColumnarData, ComponentBuffer, Layout, RecordArray};
use crate::index_pointer::IndexPointer;
use pgm_core::{PgmError, PgmResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Single,
    DenseBatch,
    SparseBatch,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Single => "single",
            ShapeKind::DenseBatch => "dense_batch",
            ShapeKind::SparseBatch => "sparse_batch",
        }
    }

    pub fn is_batch(&self) -> bool {
        !matches!(self, ShapeKind::Single)
    }
}

/// Shape tag of one component's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DataShape {
    pub kind: ShapeKind,
    pub layout: Layout,
}

impl fmt::Display for DataShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.layout)
    }
}

/// Fixed record count per scenario, stored scenario-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBatch {
    pub batch_size: usize,
    pub elements_per_scenario: usize,
    pub data: ComponentBuffer,
}

impl DenseBatch {
    pub fn new(
        batch_size: usize,
        elements_per_scenario: usize,
        data: ComponentBuffer,
    ) -> PgmResult<Self> {
        let batch = Self {
            batch_size,
            elements_per_scenario,
            data,
        };
        batch.check()?;
        Ok(batch)
    }

    /// Record count against `batch_size x elements_per_scenario`.
    pub fn check(&self) -> PgmResult<()> {
        let expected = self.expected_len()?;
        let len = self.data.checked_len()?;
        if len != expected {
            return Err(PgmError::dataset(format!(
                "dense batch data has {} records, expected {} scenarios x {} elements = {}",
                len, self.batch_size, self.elements_per_scenario, expected
            )));
        }
        Ok(())
    }

    pub fn expected_len(&self) -> PgmResult<usize> {
        self.batch_size
            .checked_mul(self.elements_per_scenario)
            .ok_or_else(|| {
                PgmError::dataset(format!(
                    "dense batch of {} scenarios x {} elements overflows",
                    self.batch_size, self.elements_per_scenario
                ))
            })
    }

    /// Stack equally sized scenario buffers.
    pub fn from_scenarios(scenarios: &[ComponentBuffer]) -> PgmResult<Self> {
        let first = scenarios.first().ok_or_else(|| {
            PgmError::invalid_arguments("a dense batch needs at least one scenario")
        })?;
        let elements_per_scenario = first.len();
        if let Some(pos) = scenarios
            .iter()
            .position(|scenario| scenario.len() != elements_per_scenario)
        {
            return Err(PgmError::dataset(format!(
                "scenario {} has {} records, scenario 0 has {}",
                pos,
                scenarios[pos].len(),
                elements_per_scenario
            )));
        }
        Self::new(
            scenarios.len(),
            elements_per_scenario,
            ComponentBuffer::concat(scenarios)?,
        )
    }

    pub fn scenario(&self, scenario: usize) -> PgmResult<ComponentBuffer> {
        if scenario >= self.batch_size {
            return Err(PgmError::invalid_arguments(format!(
                "scenario {} out of range for batch of size {}",
                scenario, self.batch_size
            )));
        }
        self.check()?;
        let start = scenario * self.elements_per_scenario;
        self.data.slice(start..start + self.elements_per_scenario)
    }
}

/// Variable record count per scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseBatch {
    pub indptr: IndexPointer,
    pub data: ComponentBuffer,
}

impl SparseBatch {
    pub fn new(indptr: IndexPointer, data: ComponentBuffer) -> PgmResult<Self> {
        let batch = Self { indptr, data };
        batch.check()?;
        Ok(batch)
    }

    pub fn from_scenarios(scenarios: &[ComponentBuffer]) -> PgmResult<Self> {
        if scenarios.is_empty() {
            return Err(PgmError::invalid_arguments("a sparse batch needs at least one scenario"));
        }
        let counts: Vec<usize> = scenarios.iter().map(ComponentBuffer::len).collect();
        Self::new(
            IndexPointer::from_counts(&counts),
            ComponentBuffer::concat(scenarios)?,
        )
    }

    /// Index pointer invariants and data length.
    pub fn check(&self) -> PgmResult<()> {
        self.indptr.validate()?;
        let total = self.indptr.total();
        let len = self.data.checked_len()?;
        if i64::try_from(len).ok() != Some(total) {
            return Err(PgmError::dataset(format!(
                "sparse data has {} records but indptr ends at {}",
                len, total
            )));
        }
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.indptr.batch_size()
    }

    pub fn scenario(&self, scenario: usize) -> PgmResult<ComponentBuffer> {
        self.check()?;
        let range = self.indptr.scenario_range(scenario)?;
        self.data.slice(range)
    }
}

/// One component type's data in one of the recognized shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentData {
    Single(ComponentBuffer),
    DenseBatch(DenseBatch),
    SparseBatch(SparseBatch),
}

impl ComponentData {
    pub fn shape(&self) -> DataShape {
        let (kind, buffer) = match self {
            ComponentData::Single(buffer) => (ShapeKind::Single, buffer),
            ComponentData::DenseBatch(dense) => (ShapeKind::DenseBatch, &dense.data),
            ComponentData::SparseBatch(sparse) => (ShapeKind::SparseBatch, &sparse.data),
        };
        DataShape {
            kind,
            layout: buffer.layout(),
        }
    }

    pub fn is_batch(&self) -> bool {
        self.shape().kind.is_batch()
    }

    /// Number of scenarios, `None` for single data.
    pub fn batch_size(&self) -> Option<usize> {
        match self {
            ComponentData::Single(_) => None,
            ComponentData::DenseBatch(dense) => Some(dense.batch_size),
            ComponentData::SparseBatch(sparse) => Some(sparse.batch_size()),
        }
    }

    /// Flattened buffer holding every record.
    pub fn buffer(&self) -> &ComponentBuffer {
        match self {
            ComponentData::Single(buffer) => buffer,
            ComponentData::DenseBatch(dense) => &dense.data,
            ComponentData::SparseBatch(sparse) => &sparse.data,
        }
    }

    pub fn total_elements(&self) -> usize {
        self.buffer().len()
    }

    /// Records of scenario `i`; single data belongs to every scenario.
    pub fn scenario(&self, scenario: usize) -> PgmResult<ComponentBuffer> {
        match self {
            ComponentData::Single(buffer) => Ok(buffer.clone()),
            ComponentData::DenseBatch(dense) => dense.scenario(scenario),
            ComponentData::SparseBatch(sparse) => sparse.scenario(scenario),
        }
    }

    /// Same shape with the buffer replaced.
    pub fn map_buffer<F>(&self, f: F) -> PgmResult<ComponentData>
    where
        F: FnOnce(&ComponentBuffer) -> PgmResult<ComponentBuffer>,
    {
        Ok(match self {
            ComponentData::Single(buffer) => ComponentData::Single(f(buffer)?),
            ComponentData::DenseBatch(dense) => ComponentData::DenseBatch(DenseBatch {
                batch_size: dense.batch_size,
                elements_per_scenario: dense.elements_per_scenario,
                data: f(&dense.data)?,
            }),
            ComponentData::SparseBatch(sparse) => ComponentData::SparseBatch(SparseBatch {
                indptr: sparse.indptr.clone(),
                data: f(&sparse.data)?,
            }),
        })
    }
}

impl From<ComponentBuffer> for ComponentData {
    fn from(buffer: ComponentBuffer) -> Self {
        ComponentData::Single(buffer)
    }
}

impl From<RecordArray> for ComponentData {
    fn from(array: RecordArray) -> Self {
        ComponentData::Single(ComponentBuffer::Array(array))
    }
}

impl From<ColumnarData> for ComponentData {
    fn from(columnar: ColumnarData) -> Self {
        ComponentData::Single(ComponentBuffer::Columnar(columnar))
    }
}

impl From<DenseBatch> for ComponentData {
    fn from(dense: DenseBatch) -> Self {
        ComponentData::DenseBatch(dense)
    }
}

impl From<SparseBatch> for ComponentData {
    fn from(sparse: SparseBatch) -> Self {
        ComponentData::SparseBatch(sparse)
    }
}

/// Mapping from component type to its data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub components: BTreeMap<String, ComponentData>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, component: impl Into<String>, data: impl Into<ComponentData>) {
        self.components.insert(component.into(), data.into());
    }

    /// Builder form of [`Dataset::insert`].
    pub fn with(mut self, component: impl Into<String>, data: impl Into<ComponentData>) -> Self {
        self.insert(component, data);
        self
    }

    pub fn get(&self, component: &str) -> Option<&ComponentData> {
        self.components.get(component)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_batch(&self) -> bool {
        self.components.values().any(ComponentData::is_batch)
    }

    /// Scenario count: the common batch size of batch components, 1 without any.
    ///
    /// Disagreeing batch sizes are reported by validation; here the first
    /// batch component wins.
    pub fn batch_size(&self) -> usize {
        self.components
            .values()
            .find_map(ComponentData::batch_size)
            .unwrap_or(1)
    }

    /// Single dataset holding scenario `i` of every component.
    pub fn scenario(&self, scenario: usize) -> PgmResult<Dataset> {
        let mut out = Dataset::new();
        for (name, data) in &self.components {
            let single = data.scenario(scenario)?;
            out.insert(name.clone(), ComponentData::Single(single));
        }
        Ok(out)
    }
}
