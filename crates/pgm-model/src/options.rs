//! Calculation options.
//!
//! Every field has a default, so partial option documents (TOML or JSON)
//! deserialize into a complete [`CalculationOptions`].

use pgm_core::{
    CalculationMethod, CalculationType, PgmError, PgmResult, ShortCircuitVoltageScaling,
    TapChangingStrategy,
};
use pgm_dataset::ComponentAttributeMapping;
use serde::{Deserialize, Serialize};

/// How batch scenarios are spread over threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threading {
    Sequential,
    /// One thread per hardware thread
    HardwareThreads,
    Threads(usize),
}

impl Threading {
    /// `-1` sequential, `0` hardware threads, `n` exactly n threads.
    pub fn from_setting(value: i32) -> Self {
        match value {
            v if v < 0 => Threading::Sequential,
            0 => Threading::HardwareThreads,
            v => Threading::Threads(v as usize),
        }
    }

    /// Worker count, `None` when running sequentially.
    pub fn thread_count(&self) -> Option<usize> {
        match self {
            Threading::Sequential => None,
            Threading::HardwareThreads => Some(num_cpus::get()),
            Threading::Threads(n) => Some(*n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationOptions {
    #[serde(default = "default_calculation_type")]
    pub calculation_type: CalculationType,
    #[serde(default = "default_symmetric")]
    pub symmetric: bool,
    /// Defaults to the calculation type's own default method
    #[serde(default)]
    pub calculation_method: Option<CalculationMethod>,
    #[serde(default = "default_error_tolerance")]
    pub error_tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// `-1` sequential, `0` hardware threads, `n` threads
    #[serde(default = "default_threading")]
    pub threading: i32,
    #[serde(default)]
    pub continue_on_batch_error: bool,
    #[serde(default = "default_tap_changing_strategy")]
    pub tap_changing_strategy: TapChangingStrategy,
    #[serde(default = "default_short_circuit_voltage_scaling")]
    pub short_circuit_voltage_scaling: ShortCircuitVoltageScaling,
    #[serde(skip)]
    pub output_component_types: ComponentAttributeMapping,
}

fn default_calculation_type() -> CalculationType {
    CalculationType::PowerFlow
}

fn default_symmetric() -> bool {
    true
}

fn default_error_tolerance() -> f64 {
    1e-8
}

fn default_max_iterations() -> usize {
    20
}

fn default_threading() -> i32 {
    -1
}

fn default_tap_changing_strategy() -> TapChangingStrategy {
    TapChangingStrategy::Disabled
}

fn default_short_circuit_voltage_scaling() -> ShortCircuitVoltageScaling {
    ShortCircuitVoltageScaling::Maximum
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            calculation_type: default_calculation_type(),
            symmetric: default_symmetric(),
            calculation_method: None,
            error_tolerance: default_error_tolerance(),
            max_iterations: default_max_iterations(),
            threading: default_threading(),
            continue_on_batch_error: false,
            tap_changing_strategy: default_tap_changing_strategy(),
            short_circuit_voltage_scaling: default_short_circuit_voltage_scaling(),
            output_component_types: ComponentAttributeMapping::All,
        }
    }
}

impl CalculationOptions {
    pub fn power_flow() -> Self {
        Self::default()
    }

    pub fn state_estimation() -> Self {
        Self {
            calculation_type: CalculationType::StateEstimation,
            ..Self::default()
        }
    }

    pub fn short_circuit() -> Self {
        Self {
            calculation_type: CalculationType::ShortCircuit,
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: CalculationMethod) -> Self {
        self.calculation_method = Some(method);
        self
    }

    pub fn with_threading(mut self, threading: i32) -> Self {
        self.threading = threading;
        self
    }

    pub fn with_output(mut self, mapping: ComponentAttributeMapping) -> Self {
        self.output_component_types = mapping;
        self
    }

    pub fn continue_on_batch_error(mut self, enabled: bool) -> Self {
        self.continue_on_batch_error = enabled;
        self
    }

    /// Method actually used: the explicit one or the type's default.
    pub fn method(&self) -> CalculationMethod {
        self.calculation_method
            .unwrap_or_else(|| self.calculation_type.default_method())
    }

    pub fn threading(&self) -> Threading {
        Threading::from_setting(self.threading)
    }

    /// Checks done before any data reaches an engine.
    pub fn check(&self) -> PgmResult<()> {
        if !self.method().is_valid_for(self.calculation_type) {
            return Err(PgmError::InvalidCalculationMethod);
        }
        if self.error_tolerance.is_nan() || self.error_tolerance <= 0.0 {
            return Err(PgmError::invalid_arguments(format!(
                "error_tolerance must be positive, got {}",
                self.error_tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(PgmError::invalid_arguments("max_iterations must be at least 1"));
        }
        if self.calculation_type == CalculationType::ShortCircuit
            && self.tap_changing_strategy != TapChangingStrategy::Disabled
        {
            return Err(PgmError::invalid_arguments(
                "automatic tap changing is not available for short circuit calculations",
            ));
        }
        Ok(())
    }
}
