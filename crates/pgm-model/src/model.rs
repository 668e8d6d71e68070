//! The power grid model facade.

use crate::batch::run_scenarios;
use crate::engine::{CalculationEngine, ModelState};
use crate::options::CalculationOptions;
use pgm_core::{
    AttributeValue, BatchError, CalculationMethod, CalculationType, ComponentMeta, DatasetMeta,
    DatasetType, PgmError, PgmResult, PowerGridMetaData, ID_ATTRIBUTE, NULL_INT32,
};
use pgm_dataset::{
    filter_dataset, project_buffer, resolve_component_attributes, validate_dataset,
    validate_single_dataset, ComponentBuffer, ComponentData, Dataset, DenseBatch, RecordArray,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default grid frequency in Hz.
pub const DEFAULT_SYSTEM_FREQUENCY: f64 = 50.0;

/// Where a component id lives in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IdLocation {
    component: String,
    position: usize,
}

/// A grid model built from input data, updated in place and calculated by an
/// engine.
///
/// Ids are unique across all component types. Cloning gives an independent
/// model sharing only the (stateless) engine.
#[derive(Clone)]
pub struct PowerGridModel {
    meta: PowerGridMetaData,
    state: ModelState,
    index: HashMap<i32, IdLocation>,
    engine: Arc<dyn CalculationEngine>,
    batch_error: Option<BatchError>,
}

impl fmt::Debug for PowerGridModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PowerGridModel")
            .field("system_frequency", &self.state.system_frequency)
            .field("components", &self.all_component_count())
            .field("batch_error", &self.batch_error)
            .finish()
    }
}

impl PowerGridModel {
    /// Build a model from a single input dataset.
    pub fn new(
        input: &Dataset,
        meta: &PowerGridMetaData,
        system_frequency: f64,
        engine: Arc<dyn CalculationEngine>,
    ) -> PgmResult<Self> {
        let input_meta = meta.dataset(DatasetType::Input)?;
        validate_single_dataset(input, input_meta)?;

        let mut components = BTreeMap::new();
        for (name, data) in &input.components {
            let component_meta = input_meta.component(name)?;
            components.insert(name.clone(), normalize(data.buffer(), component_meta)?);
        }
        let state = ModelState {
            system_frequency,
            components,
        };
        let index = build_index(&state)?;

        info!(
            components = state.components.len(),
            records = index.len(),
            system_frequency,
            "constructed power grid model"
        );
        Ok(Self {
            meta: meta.clone(),
            state,
            index,
            engine,
            batch_error: None,
        })
    }

    /// Build a model with the bundled meta data at 50 Hz.
    pub fn with_engine(input: &Dataset, engine: Arc<dyn CalculationEngine>) -> PgmResult<Self> {
        Self::new(
            input,
            PowerGridMetaData::bundled()?,
            DEFAULT_SYSTEM_FREQUENCY,
            engine,
        )
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn meta(&self) -> &PowerGridMetaData {
        &self.meta
    }

    /// Record count per component type, leaving out empty types.
    pub fn all_component_count(&self) -> BTreeMap<String, usize> {
        self.state
            .components
            .iter()
            .filter(|(_, array)| !array.is_empty())
            .map(|(name, array)| (name.clone(), array.len()))
            .collect()
    }

    /// Positions of `ids` within the records of `component`.
    pub fn get_indexer(&self, component: &str, ids: &[i32]) -> PgmResult<Vec<usize>> {
        ids.iter()
            .map(|id| self.locate(component, *id))
            .collect()
    }

    fn locate(&self, component: &str, id: i32) -> PgmResult<usize> {
        let location = self.index.get(&id).ok_or(PgmError::IdNotFound { id })?;
        if location.component != component {
            return Err(PgmError::IdWrongType {
                id,
                expected: component.to_string(),
                actual: location.component.clone(),
            });
        }
        Ok(location.position)
    }

    /// Apply an update dataset: a single dataset or a batch of one scenario.
    ///
    /// Either every value is applied or, on error, none is.
    pub fn update(&mut self, update: &Dataset) -> PgmResult<()> {
        let update_meta = self.meta.dataset(DatasetType::Update)?;
        let info = validate_dataset(update, update_meta)?;
        if info.batch_size != 1 {
            return Err(PgmError::invalid_arguments(format!(
                "update expects a single scenario, got a batch of {}",
                info.batch_size
            )));
        }
        let scenario = update.scenario(0)?;
        let mut state = self.state.clone();
        self.apply_update(&mut state, &scenario)?;
        self.state = state;
        debug!(components = scenario.len(), "applied model update");
        Ok(())
    }

    fn apply_update(&self, state: &mut ModelState, update: &Dataset) -> PgmResult<()> {
        for (name, data) in &update.components {
            let buffer = match data {
                ComponentData::Single(buffer) => buffer,
                _ => {
                    return Err(PgmError::UnreachableHit(format!(
                        "update component '{}' is still batch data",
                        name
                    )))
                }
            };
            if buffer.is_empty() {
                continue;
            }
            let targets = self.update_targets(name, buffer)?;
            let array = state.components.get_mut(name).ok_or_else(|| {
                PgmError::UnreachableHit(format!("resolved ids for missing component '{}'", name))
            })?;
            let attributes: Vec<&str> = buffer
                .attribute_names()
                .into_iter()
                .filter(|attribute| *attribute != ID_ATTRIBUTE)
                .collect();
            for (row, target) in targets.into_iter().enumerate() {
                for attribute in &attributes {
                    let value = buffer.value(row, attribute)?;
                    if value.is_null() {
                        continue;
                    }
                    let merged = merge_value(array.get(target, attribute)?, value);
                    array.set(target, attribute, merged)?;
                }
            }
        }
        Ok(())
    }

    /// Model positions addressed by every update record.
    ///
    /// Records without id update positionally, which is only allowed when the
    /// update lists exactly as many records as the model holds.
    fn update_targets(&self, component: &str, buffer: &ComponentBuffer) -> PgmResult<Vec<usize>> {
        let count = self.state.component_count(component);
        let ids = buffer
            .ids()?
            .unwrap_or_else(|| vec![NULL_INT32; buffer.len()]);
        ids.iter()
            .enumerate()
            .map(|(row, id)| {
                if *id != NULL_INT32 {
                    return self.locate(component, *id);
                }
                if buffer.len() == count {
                    Ok(row)
                } else {
                    Err(PgmError::InvalidId(format!(
                        "update of '{}' without ids needs {} records, got {}",
                        component,
                        count,
                        buffer.len()
                    )))
                }
            })
            .collect()
    }

    /// Failures of the last batch calculation run with
    /// `continue_on_batch_error`.
    pub fn batch_error(&self) -> Option<&BatchError> {
        self.batch_error.as_ref()
    }

    /// Fails with [`PgmError::Batch`] when the last calculation continued
    /// past failing scenarios.
    pub fn check_batch_error(&self) -> PgmResult<()> {
        match &self.batch_error {
            Some(error) if !error.is_empty() => Err(PgmError::Batch(error.clone())),
            _ => Ok(()),
        }
    }

    /// Run a calculation, optionally over a batch of updates.
    ///
    /// Without update data the result is a single dataset; with update data
    /// it is a dense batch with one scenario per update scenario. The model
    /// itself is not changed by batch updates.
    pub fn calculate(
        &mut self,
        options: &CalculationOptions,
        update: Option<&Dataset>,
    ) -> PgmResult<Dataset> {
        self.batch_error = None;
        options.check()?;
        let output_type = DatasetType::output_for(options.calculation_type, options.symmetric);
        let output_meta = self.meta.dataset(output_type)?;

        let (result, batch_error) = match update {
            None => {
                let records = self.run_engine(&self.state, options, output_meta)?;
                let mut dataset = Dataset::new();
                for (name, array) in records {
                    dataset.insert(name, ComponentBuffer::Array(array));
                }
                (dataset, None)
            }
            Some(update) => self.calculate_batch(options, update, output_meta)?,
        };
        let shaped = shape_output(&result, output_meta, options)?;
        self.batch_error = batch_error;
        Ok(shaped)
    }

    pub fn calculate_power_flow(
        &mut self,
        options: CalculationOptions,
        update: Option<&Dataset>,
    ) -> PgmResult<Dataset> {
        let options = CalculationOptions {
            calculation_type: CalculationType::PowerFlow,
            ..options
        };
        self.calculate(&options, update)
    }

    pub fn calculate_state_estimation(
        &mut self,
        options: CalculationOptions,
        update: Option<&Dataset>,
    ) -> PgmResult<Dataset> {
        let options = CalculationOptions {
            calculation_type: CalculationType::StateEstimation,
            ..options
        };
        self.calculate(&options, update)
    }

    pub fn calculate_short_circuit(
        &mut self,
        options: CalculationOptions,
        update: Option<&Dataset>,
    ) -> PgmResult<Dataset> {
        let options = CalculationOptions {
            calculation_type: CalculationType::ShortCircuit,
            calculation_method: Some(
                options
                    .calculation_method
                    .unwrap_or(CalculationMethod::Iec60909),
            ),
            ..options
        };
        self.calculate(&options, update)
    }

    /// Batch results plus the failures when continuing past them.
    fn calculate_batch(
        &self,
        options: &CalculationOptions,
        update: &Dataset,
        output_meta: &DatasetMeta,
    ) -> PgmResult<(Dataset, Option<BatchError>)> {
        let update_meta = self.meta.dataset(DatasetType::Update)?;
        let info = validate_dataset(update, update_meta)?;
        let batch_size = info.batch_size;
        info!(
            batch_size,
            threading = options.threading,
            method = %options.method(),
            "starting batch calculation"
        );

        let outcome = run_scenarios(options.threading(), batch_size, |scenario| {
            let mut state = self.state.clone();
            self.apply_update(&mut state, &update.scenario(scenario)?)?;
            self.run_engine(&state, options, output_meta)
        })?;

        let failures = outcome.failure_count();
        if failures > 0 && !options.continue_on_batch_error {
            let error = outcome
                .results
                .into_iter()
                .find_map(Result::err)
                .unwrap_or_else(|| PgmError::UnreachableHit("failed scenario vanished".into()));
            return Err(error);
        }

        let layout = self.output_layout(output_meta)?;
        let mut per_component: BTreeMap<String, Vec<ComponentBuffer>> = BTreeMap::new();
        let batch_error = outcome.batch_error();
        for result in outcome.results {
            let mut records = match result {
                Ok(records) => records,
                Err(_) => layout
                    .iter()
                    .map(|(name, (meta, count))| {
                        (name.clone(), RecordArray::initialize(meta, *count))
                    })
                    .collect(),
            };
            for name in layout.keys() {
                let array = records.remove(name).ok_or_else(|| {
                    PgmError::UnreachableHit(format!("scenario output lost component '{}'", name))
                })?;
                per_component
                    .entry(name.clone())
                    .or_default()
                    .push(ComponentBuffer::Array(array));
            }
        }

        let mut dataset = Dataset::new();
        for (name, scenarios) in per_component {
            dataset.insert(name, DenseBatch::from_scenarios(&scenarios)?);
        }

        if failures > 0 {
            warn!(
                failed = failures,
                batch_size, "batch calculation finished with failed scenarios"
            );
            Ok((dataset, Some(batch_error)))
        } else {
            info!(batch_size, "batch calculation finished");
            Ok((dataset, None))
        }
    }

    /// Output component types with their schema and record count.
    fn output_layout<'m>(
        &self,
        output_meta: &'m DatasetMeta,
    ) -> PgmResult<BTreeMap<String, (&'m ComponentMeta, usize)>> {
        let mut layout = BTreeMap::new();
        for (name, array) in &self.state.components {
            if array.is_empty() {
                continue;
            }
            if let Some(meta) = output_meta.components.get(name) {
                layout.insert(name.clone(), (meta, array.len()));
            }
        }
        Ok(layout)
    }

    /// Call the engine and bring its output in line with the output schema.
    fn run_engine(
        &self,
        state: &ModelState,
        options: &CalculationOptions,
        output_meta: &DatasetMeta,
    ) -> PgmResult<BTreeMap<String, RecordArray>> {
        let mut produced = self.engine.calculate(state, options)?;
        let mut out = BTreeMap::new();
        for (name, (meta, count)) in self.output_layout(output_meta)? {
            let array = match produced.remove(&name) {
                Some(array) => {
                    if array.len() != count {
                        return Err(PgmError::dataset(format!(
                            "engine returned {} '{}' records, the model has {}",
                            array.len(),
                            name,
                            count
                        )));
                    }
                    normalize(&ComponentBuffer::Array(array), meta)?
                }
                None => {
                    let mut array = RecordArray::initialize(meta, count);
                    for (row, id) in state.ids(&name)?.into_iter().enumerate() {
                        array.set(row, ID_ATTRIBUTE, id)?;
                    }
                    array
                }
            };
            out.insert(name, array);
        }
        if let Some(name) = produced.keys().next() {
            return Err(PgmError::dataset(format!(
                "engine returned unexpected component '{}'",
                name
            )));
        }
        Ok(out)
    }
}

/// Full-schema record array in canonical attribute order.
fn normalize(buffer: &ComponentBuffer, meta: &ComponentMeta) -> PgmResult<RecordArray> {
    let attributes: Vec<String> = meta.attributes.iter().map(|a| a.name.clone()).collect();
    project_buffer(buffer, meta, &attributes)?.to_array(Some(meta))
}

fn build_index(state: &ModelState) -> PgmResult<HashMap<i32, IdLocation>> {
    let mut index = HashMap::new();
    for (component, array) in &state.components {
        for (position, id) in array.ids()?.into_iter().enumerate() {
            if id == NULL_INT32 {
                return Err(PgmError::InvalidId(format!(
                    "record {} of '{}' has no id",
                    position, component
                )));
            }
            let location = IdLocation {
                component: component.clone(),
                position,
            };
            if index.insert(id, location).is_some() {
                return Err(PgmError::ConflictId { id });
            }
        }
    }
    Ok(index)
}

/// Overlay an update value; unset phases of a per-phase value keep the old phase.
fn merge_value(old: AttributeValue, new: AttributeValue) -> AttributeValue {
    match (old, new) {
        (AttributeValue::Double3(old), AttributeValue::Double3(new)) => {
            let mut merged = old;
            for (slot, phase) in merged.iter_mut().zip(new) {
                if !phase.is_nan() {
                    *slot = phase;
                }
            }
            AttributeValue::Double3(merged)
        }
        (_, new) => new,
    }
}

/// Apply the requested output selection and layout.
fn shape_output(
    result: &Dataset,
    output_meta: &DatasetMeta,
    options: &CalculationOptions,
) -> PgmResult<Dataset> {
    let mapping = &options.output_component_types;
    let resolved = resolve_component_attributes(mapping, result, output_meta)?;
    let filtered = filter_dataset(result, output_meta, &resolved)?;
    let mut out = Dataset::new();
    for (name, data) in filtered.components {
        let layout = mapping.layout_for(&name);
        let shaped = data.map_buffer(|buffer| buffer.clone().into_layout(layout))?;
        out.insert(name, shaped);
    }
    Ok(out)
}
