//! Integration tests for the model facade.
//!
//! A one-node grid (source plus reactive load) is calculated by a small
//! fixed-point engine: `u = u_ref * u_rated - z * q / u_rated` with
//! `z = u_rated^2 / sk`. The base case gives 50 V.

use pgm_core::{
    AttributeValue, CalculationMethod, DatasetType, PgmError, PgmResult, PowerGridMetaData,
};
use pgm_dataset::*;
use pgm_model::*;
use std::collections::BTreeMap;
use std::sync::Arc;

struct SingleNodeEngine;

impl CalculationEngine for SingleNodeEngine {
    fn calculate(
        &self,
        state: &ModelState,
        options: &CalculationOptions,
    ) -> PgmResult<BTreeMap<String, RecordArray>> {
        let output = PowerGridMetaData::bundled()?.dataset(DatasetType::SymOutput)?;
        let nodes = state.component("node").expect("node input");
        let sources = state.component("source").expect("source input");
        let loads = state.component("sym_load").expect("load input");

        let mut result = RecordArray::initialize(output.component("node")?, nodes.len());
        for row in 0..nodes.len() {
            let node_id = nodes.get(row, "id")?.as_i32().unwrap();
            let u_rated = nodes.get(row, "u_rated")?.as_f64().unwrap();
            let connected = |array: &RecordArray, r: usize| -> PgmResult<bool> {
                Ok(array.get(r, "node")?.as_i32() == Some(node_id)
                    && array.get(r, "status")?.as_i32() == Some(1))
            };

            let mut u_ref = 0.0;
            let mut sk = f64::INFINITY;
            for r in 0..sources.len() {
                if connected(sources, r)? {
                    u_ref = sources.get(r, "u_ref")?.as_f64().unwrap();
                    sk = sources.get(r, "sk")?.as_f64().unwrap();
                }
            }
            let mut q = 0.0;
            for r in 0..loads.len() {
                if connected(loads, r)? {
                    q += loads.get(r, "q_specified")?.as_f64().unwrap();
                }
            }

            let z = u_rated * u_rated / sk;
            let mut u = u_rated;
            let mut converged = false;
            let mut deviation = f64::INFINITY;
            for _ in 0..options.max_iterations {
                let next = u_ref * u_rated - z * q / u_rated;
                deviation = (next - u).abs();
                u = next;
                if deviation < options.error_tolerance {
                    converged = true;
                    break;
                }
            }
            if !converged {
                return Err(PgmError::IterationDiverge {
                    iterations: options.max_iterations,
                    max_deviation: deviation,
                    tolerance: options.error_tolerance,
                });
            }

            result.set(row, "id", node_id)?;
            result.set(row, "energized", 1i8)?;
            result.set(row, "u", u)?;
            result.set(row, "u_pu", u / u_rated)?;
            result.set(row, "u_angle", 0.0)?;
        }
        Ok(BTreeMap::from([("node".to_string(), result)]))
    }
}

fn meta(dataset_type: DatasetType) -> &'static pgm_core::DatasetMeta {
    PowerGridMetaData::bundled()
        .unwrap()
        .dataset(dataset_type)
        .unwrap()
}

fn input_dataset(load_id: i32) -> Dataset {
    let input = meta(DatasetType::Input);
    let mut node = RecordArray::initialize(input.component("node").unwrap(), 1);
    node.set(0, "id", 0).unwrap();
    node.set(0, "u_rated", 100.0).unwrap();

    let mut source = RecordArray::initialize(input.component("source").unwrap(), 1);
    source.set(0, "id", 1).unwrap();
    source.set(0, "node", 0).unwrap();
    source.set(0, "status", 1i8).unwrap();
    source.set(0, "u_ref", 1.0).unwrap();
    source.set(0, "sk", 1000.0).unwrap();
    source.set(0, "rx_ratio", 0.0).unwrap();

    let mut load = RecordArray::initialize(input.component("sym_load").unwrap(), 1);
    load.set(0, "id", load_id).unwrap();
    load.set(0, "node", 0).unwrap();
    load.set(0, "status", 1i8).unwrap();
    load.set(0, "type", 1i8).unwrap();
    load.set(0, "p_specified", 0.0).unwrap();
    load.set(0, "q_specified", 500.0).unwrap();

    Dataset::new()
        .with("node", node)
        .with("source", source)
        .with("sym_load", load)
}

fn model() -> PowerGridModel {
    PowerGridModel::with_engine(&input_dataset(2), Arc::new(SingleNodeEngine)).unwrap()
}

fn load_update(id: i32, q: f64) -> RecordArray {
    let component = meta(DatasetType::Update).component("sym_load").unwrap();
    let mut load = RecordArray::initialize(component, 1);
    load.set(0, "id", id).unwrap();
    load.set(0, "q_specified", q).unwrap();
    load
}

fn source_update(u_ref: f64) -> RecordArray {
    let component = meta(DatasetType::Update).component("source").unwrap();
    let mut source = RecordArray::initialize(component, 1);
    source.set(0, "id", 1).unwrap();
    source.set(0, "u_ref", u_ref).unwrap();
    source
}

/// Scenario 0: u_ref 0.5 and q 100 (40 V). Scenario 1: q 300 (70 V).
fn batch_update(second_load_id: i32) -> Dataset {
    Dataset::new()
        .with(
            "source",
            SparseBatch::new(IndexPointer::new(vec![0, 1, 1]), source_update(0.5).into()).unwrap(),
        )
        .with(
            "sym_load",
            DenseBatch::from_scenarios(&[
                load_update(2, 100.0).into(),
                load_update(second_load_id, 300.0).into(),
            ])
            .unwrap(),
        )
}

fn node_u(result: &Dataset, scenario: usize) -> f64 {
    let node = result.get("node").unwrap().scenario(scenario).unwrap();
    node.value(0, "u").unwrap().as_f64().unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_simple_power_flow() {
    let mut model = model();
    let result = model
        .calculate_power_flow(CalculationOptions::default(), None)
        .unwrap();
    assert!(!result.is_batch());
    assert_close(node_u(&result, 0), 50.0);

    // Components the engine left out still come back with their ids
    let load = result.get("sym_load").unwrap().buffer();
    assert_eq!(load.ids().unwrap(), Some(vec![2]));
    assert!(load.value(0, "p").unwrap().is_null());
}

#[test]
fn test_update_changes_the_model() {
    let mut model = model();
    let update = Dataset::new()
        .with("source", source_update(0.5))
        .with("sym_load", load_update(2, 100.0));
    model.update(&update).unwrap();
    let result = model
        .calculate(&CalculationOptions::power_flow(), None)
        .unwrap();
    assert_close(node_u(&result, 0), 40.0);
}

#[test]
fn test_failed_update_leaves_model_untouched() {
    let mut model = model();
    let before = model.state().clone();
    let update = Dataset::new()
        .with("source", source_update(0.5))
        .with("sym_load", load_update(5, 100.0));
    let err = model.update(&update).unwrap_err();
    assert!(matches!(err, PgmError::IdNotFound { id: 5 }));
    assert_eq!(model.state(), &before);
}

#[test]
fn test_update_rejects_id_of_other_type() {
    let mut model = model();
    let err = model
        .update(&Dataset::new().with("sym_load", load_update(1, 100.0)))
        .unwrap_err();
    assert!(matches!(err, PgmError::IdWrongType { id: 1, .. }));
}

#[test]
fn test_positional_update_without_ids() {
    let mut model = model();
    let columns = ColumnarData::new().with_column("q_specified", Column::Double(vec![100.0]));
    model
        .update(&Dataset::new().with("sym_load", columns))
        .unwrap();
    let q = model
        .state()
        .component("sym_load")
        .unwrap()
        .get(0, "q_specified")
        .unwrap();
    assert_eq!(q, AttributeValue::Double(100.0));
}

#[test]
fn test_copied_model_is_independent() {
    let mut model = model();
    let mut copy = model.clone();
    copy.update(&Dataset::new().with("sym_load", load_update(2, 300.0)))
        .unwrap();

    let options = CalculationOptions::default();
    let original = model.calculate(&options, None).unwrap();
    let copied = copy.calculate(&options, None).unwrap();
    assert_close(node_u(&original, 0), 50.0);
    assert_close(node_u(&copied, 0), 70.0);
}

#[test]
fn test_get_indexer_and_counts() {
    let model = model();
    assert_eq!(model.get_indexer("sym_load", &[2, 2]).unwrap(), vec![0, 0]);
    assert!(matches!(
        model.get_indexer("sym_load", &[9]),
        Err(PgmError::IdNotFound { id: 9 })
    ));
    let counts = model.all_component_count();
    assert_eq!(counts.len(), 3);
    assert_eq!(counts["node"], 1);
}

#[test]
fn test_batch_power_flow_for_every_threading_mode() {
    for threading in [-1, 0, 2] {
        let mut model = model();
        let result = model
            .calculate_power_flow(
                CalculationOptions::default().with_threading(threading),
                Some(&batch_update(2)),
            )
            .unwrap();
        let node = result.get("node").unwrap();
        assert_eq!(node.shape().kind, ShapeKind::DenseBatch);
        assert_eq!(node.batch_size(), Some(2));
        assert_close(node_u(&result, 0), 40.0);
        assert_close(node_u(&result, 1), 70.0);
        assert!(model.batch_error().is_none());
    }
}

#[test]
fn test_batch_does_not_change_the_model() {
    let mut model = model();
    model
        .calculate(&CalculationOptions::default(), Some(&batch_update(2)))
        .unwrap();
    let result = model
        .calculate(&CalculationOptions::default(), None)
        .unwrap();
    assert_close(node_u(&result, 0), 50.0);
}

#[test]
fn test_conflicting_ids_fail_construction() {
    let err =
        PowerGridModel::with_engine(&input_dataset(0), Arc::new(SingleNodeEngine)).unwrap_err();
    assert!(matches!(err, PgmError::ConflictId { id: 0 }));
}

#[test]
fn test_single_calculation_errors() {
    let mut model = model();
    let options = CalculationOptions {
        max_iterations: 1,
        error_tolerance: 1e-100,
        ..CalculationOptions::default()
    };
    let err = model.calculate(&options, None).unwrap_err();
    assert!(matches!(err, PgmError::IterationDiverge { .. }));
    assert!(err.to_string().contains("failed to converge after"));

    let options =
        CalculationOptions::state_estimation().with_method(CalculationMethod::IterativeCurrent);
    let err = model.calculate(&options, None).unwrap_err();
    assert!(matches!(err, PgmError::InvalidCalculationMethod));
}

#[test]
fn test_batch_error_stops_by_default() {
    let mut model = model();
    let err = model
        .calculate(&CalculationOptions::default(), Some(&batch_update(5)))
        .unwrap_err();
    assert!(matches!(err, PgmError::IdNotFound { id: 5 }));
}

#[test]
fn test_continue_on_batch_error() {
    let mut model = model();
    let options = CalculationOptions::default()
        .with_threading(2)
        .continue_on_batch_error(true);
    let result = model.calculate(&options, Some(&batch_update(5))).unwrap();

    let error = model.batch_error().unwrap();
    assert_eq!(error.failed_scenarios, vec![1]);
    assert_eq!(error.succeeded_scenarios, vec![0]);
    assert!(error.error_messages[0].contains("The id cannot be found:"));
    let err = model.check_batch_error().unwrap_err();
    assert!(matches!(&err, PgmError::Batch(batch) if batch.failed_scenarios == vec![1]));
    assert_eq!(err.category(), "batch");

    assert_close(node_u(&result, 0), 40.0);
    assert!(result
        .get("node")
        .unwrap()
        .scenario(1)
        .unwrap()
        .value(0, "u")
        .unwrap()
        .is_null());

    // The next calculation starts with a clean slate
    model
        .calculate(&CalculationOptions::default(), None)
        .unwrap();
    assert!(model.batch_error().is_none());
    model.check_batch_error().unwrap();
}

#[test]
fn test_output_mapping_selects_columns() {
    let mut model = model();
    let mapping =
        ComponentAttributeMapping::per_component([("node", AttributeSelection::list(["id", "u"]))]);
    let options = CalculationOptions::default().with_output(mapping);
    let result = model.calculate(&options, Some(&batch_update(2))).unwrap();

    let node = result.get("node").unwrap();
    assert_eq!(node.shape().layout, Layout::Columnar);
    assert_eq!(node.buffer().attribute_names(), vec!["id", "u"]);
    assert_close(node_u(&result, 1), 70.0);

    // Components without a selection keep the full record layout
    let load = result.get("sym_load").unwrap();
    assert_eq!(load.shape().layout, Layout::Array);
    assert_eq!(
        load.buffer().attribute_names(),
        meta(DatasetType::SymOutput)
            .component("sym_load")
            .unwrap()
            .attribute_names()
    );
}

#[test]
fn test_component_set_output_drops_other_components() {
    let mut model = model();
    let mapping = ComponentAttributeMapping::ComponentSet(["node".to_string()].into());
    let options = CalculationOptions::default().with_output(mapping);
    let result = model.calculate(&options, None).unwrap();
    assert_eq!(result.component_names().collect::<Vec<_>>(), vec!["node"]);
    assert_eq!(result.get("node").unwrap().shape().layout, Layout::Array);
}
