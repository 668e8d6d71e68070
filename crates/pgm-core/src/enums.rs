//! Calculation options enums.
//!
//! Every enum parses from its snake_case name (case-insensitive) and from
//! its integer discriminant, so options coming from TOML, JSON or the CLI
//! accept both `"newton_raphson"` and `"1"`.

use crate::error::PgmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generates the string/integer conversions shared by all option enums.
macro_rules! impl_option_enum {
    ($type:ident, $label:literal, { $($variant:ident => ($name:literal, $value:literal)),+ $(,)? }) => {
        impl $type {
            /// Canonical snake_case name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($type::$variant => $name,)+
                }
            }

            /// Integer discriminant used by the calculation engine.
            pub fn as_int(&self) -> i8 {
                match self {
                    $($type::$variant => $value,)+
                }
            }

            pub fn from_int(value: i8) -> Result<Self, PgmError> {
                match value {
                    $($value => Ok($type::$variant),)+
                    other => Err(PgmError::MissingCaseForEnum {
                        enum_name: $label.to_string(),
                        value: other.to_string(),
                    }),
                }
            }

            pub fn available() -> &'static [&'static str] {
                &[$($name),+]
            }
        }

        impl FromStr for $type {
            type Err = PgmError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                let normalized = input.trim().to_ascii_lowercase();
                match normalized.as_str() {
                    $($name => Ok($type::$variant),)+
                    other => match other.parse::<i8>() {
                        Ok(value) => Self::from_int(value),
                        Err(_) => Err(PgmError::MissingCaseForEnum {
                            enum_name: $label.to_string(),
                            value: input.to_string(),
                        }),
                    },
                }
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    Linear,
    NewtonRaphson,
    IterativeLinear,
    IterativeCurrent,
    LinearCurrent,
    Iec60909,
}

impl_option_enum!(CalculationMethod, "CalculationMethod", {
    Linear => ("linear", 0),
    NewtonRaphson => ("newton_raphson", 1),
    IterativeLinear => ("iterative_linear", 2),
    IterativeCurrent => ("iterative_current", 3),
    LinearCurrent => ("linear_current", 4),
    Iec60909 => ("iec60909", 5),
});

impl CalculationMethod {
    /// Whether the engine supports this method for the given calculation.
    pub fn is_valid_for(&self, calculation_type: CalculationType) -> bool {
        use CalculationMethod::*;
        match calculation_type {
            CalculationType::PowerFlow => {
                matches!(
                    self,
                    Linear | NewtonRaphson | IterativeCurrent | LinearCurrent
                )
            }
            CalculationType::StateEstimation => matches!(self, IterativeLinear | NewtonRaphson),
            CalculationType::ShortCircuit => matches!(self, Iec60909),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    PowerFlow,
    StateEstimation,
    ShortCircuit,
}

impl_option_enum!(CalculationType, "CalculationType", {
    PowerFlow => ("power_flow", 0),
    StateEstimation => ("state_estimation", 1),
    ShortCircuit => ("short_circuit", 2),
});

impl CalculationType {
    /// Method used when the caller does not pick one.
    pub fn default_method(&self) -> CalculationMethod {
        match self {
            CalculationType::PowerFlow => CalculationMethod::NewtonRaphson,
            CalculationType::StateEstimation => CalculationMethod::IterativeLinear,
            CalculationType::ShortCircuit => CalculationMethod::Iec60909,
        }
    }
}

/// Voltage scaling for short circuit calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortCircuitVoltageScaling {
    Minimum,
    Maximum,
}

impl_option_enum!(ShortCircuitVoltageScaling, "ShortCircuitVoltageScaling", {
    Minimum => ("minimum", 0),
    Maximum => ("maximum", 1),
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapChangingStrategy {
    /// Disable automatic tap adjustment
    Disabled,
    /// Optimize for any value in the voltage band
    AnyValidTap,
    /// Optimize for the lower end of the voltage band
    MinVoltageTap,
    /// Optimize for the higher end of the voltage band
    MaxVoltageTap,
    /// Any value in the voltage band, binary search
    FastAnyTap,
}

impl_option_enum!(TapChangingStrategy, "TapChangingStrategy", {
    Disabled => ("disabled", 0),
    AnyValidTap => ("any_valid_tap", 1),
    MinVoltageTap => ("min_voltage_tap", 2),
    MaxVoltageTap => ("max_voltage_tap", 3),
    FastAnyTap => ("fast_any_tap", 4),
});

/// Filter policy for component/attribute selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentAttributeFilterOptions {
    /// All components/attributes, including ones that only hold null values
    Everything,
    /// Only non-empty components/attributes that hold at least one non-null value
    Relevant,
}

impl_option_enum!(ComponentAttributeFilterOptions, "ComponentAttributeFilterOptions", {
    Everything => ("everything", 0),
    Relevant => ("relevant", 1),
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_accepts_names_and_discriminants() {
        assert_eq!(
            "newton_raphson".parse::<CalculationMethod>().unwrap(),
            CalculationMethod::NewtonRaphson
        );
        assert_eq!(
            "Iterative_Current".parse::<CalculationMethod>().unwrap(),
            CalculationMethod::IterativeCurrent
        );
        assert_eq!(
            "2".parse::<CalculationType>().unwrap(),
            CalculationType::ShortCircuit
        );
        assert!(matches!(
            "bogus".parse::<TapChangingStrategy>(),
            Err(PgmError::MissingCaseForEnum { .. })
        ));
        assert!(TapChangingStrategy::from_int(9).is_err());
    }

    #[test]
    fn method_validity_per_calculation_type() {
        assert!(CalculationMethod::NewtonRaphson.is_valid_for(CalculationType::PowerFlow));
        assert!(CalculationMethod::NewtonRaphson.is_valid_for(CalculationType::StateEstimation));
        assert!(
            !CalculationMethod::IterativeCurrent.is_valid_for(CalculationType::StateEstimation)
        );
        assert!(!CalculationMethod::Linear.is_valid_for(CalculationType::ShortCircuit));
        for kind in [
            CalculationType::PowerFlow,
            CalculationType::StateEstimation,
            CalculationType::ShortCircuit,
        ] {
            assert!(kind.default_method().is_valid_for(kind));
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ComponentAttributeFilterOptions::Relevant).unwrap();
        assert_eq!(json, "\"relevant\"");
        let parsed: ShortCircuitVoltageScaling = serde_json::from_str("\"maximum\"").unwrap();
        assert_eq!(parsed, ShortCircuitVoltageScaling::Maximum);
    }
}
