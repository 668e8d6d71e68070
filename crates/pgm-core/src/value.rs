//! Attribute kinds, values and their null sentinels.
//!
//! Grid records only ever hold four physical kinds of value:
//!
//! | kind      | rust type   | null sentinel      |
//! |-----------|-------------|--------------------|
//! | `int32`   | `i32`       | `i32::MIN`         |
//! | `int8`    | `i8`        | `i8::MIN`          |
//! | `double`  | `f64`       | `NaN`              |
//! | `double3` | `[f64; 3]`  | `[NaN, NaN, NaN]`  |
//!
//! Ids and node references are `int32`, statuses and enum-like attributes are
//! `int8`, symmetric quantities are `double` and per-phase quantities are
//! `double3`.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const NULL_INT32: i32 = i32::MIN;
pub const NULL_INT8: i8 = i8::MIN;
pub const NULL_DOUBLE: f64 = f64::NAN;
pub const NULL_DOUBLE3: [f64; 3] = [f64::NAN, f64::NAN, f64::NAN];

/// Physical kind of an attribute, as declared by the meta data registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Int32,
    Int8,
    Double,
    Double3,
}

impl AttributeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Int32 => "int32",
            AttributeKind::Int8 => "int8",
            AttributeKind::Double => "double",
            AttributeKind::Double3 => "double3",
        }
    }

    /// The "not set" value for this kind.
    pub fn null_value(&self) -> AttributeValue {
        match self {
            AttributeKind::Int32 => AttributeValue::Int32(NULL_INT32),
            AttributeKind::Int8 => AttributeValue::Int8(NULL_INT8),
            AttributeKind::Double => AttributeValue::Double(NULL_DOUBLE),
            AttributeKind::Double3 => AttributeValue::Double3(NULL_DOUBLE3),
        }
    }

    pub fn is_nominal(&self) -> bool {
        matches!(self, AttributeKind::Int32 | AttributeKind::Int8)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value of a component record.
#[derive(Debug, Clone, Copy)]
pub enum AttributeValue {
    Int32(i32),
    Int8(i8),
    Double(f64),
    /// One value per phase
    Double3([f64; 3]),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Int32(_) => AttributeKind::Int32,
            AttributeValue::Int8(_) => AttributeKind::Int8,
            AttributeValue::Double(_) => AttributeKind::Double,
            AttributeValue::Double3(_) => AttributeKind::Double3,
        }
    }

    /// A `double3` value only counts as null when every phase is NaN.
    pub fn is_null(&self) -> bool {
        match self {
            AttributeValue::Int32(v) => *v == NULL_INT32,
            AttributeValue::Int8(v) => *v == NULL_INT8,
            AttributeValue::Double(v) => v.is_nan(),
            AttributeValue::Double3(v) => v.iter().all(|x| x.is_nan()),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            AttributeValue::Int32(v) => Some(*v),
            AttributeValue::Int8(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64x3(&self) -> Option<[f64; 3]> {
        match self {
            AttributeValue::Double3(v) => Some(*v),
            _ => None,
        }
    }
}

/// Value equality where NaN equals NaN, so null values compare equal.
impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: f64, b: f64) -> bool {
            a == b || (a.is_nan() && b.is_nan())
        }
        match (self, other) {
            (AttributeValue::Int32(a), AttributeValue::Int32(b)) => a == b,
            (AttributeValue::Int8(a), AttributeValue::Int8(b)) => a == b,
            (AttributeValue::Double(a), AttributeValue::Double(b)) => same(*a, *b),
            (AttributeValue::Double3(a), AttributeValue::Double3(b)) => {
                a.iter().zip(b.iter()).all(|(x, y)| same(*x, *y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("null");
        }
        match self {
            AttributeValue::Int32(v) => write!(f, "{v}"),
            AttributeValue::Int8(v) => write!(f, "{v}"),
            AttributeValue::Double(v) => write!(f, "{v}"),
            AttributeValue::Double3(v) => write!(f, "({}, {}, {})", v[0], v[1], v[2]),
        }
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int32(value)
    }
}

impl From<i8> for AttributeValue {
    fn from(value: i8) -> Self {
        AttributeValue::Int8(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<[f64; 3]> for AttributeValue {
    fn from(value: [f64; 3]) -> Self {
        AttributeValue::Double3(value)
    }
}

/// Component identifier, unique across all component types of one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(i32);

impl ComponentId {
    pub const NULL: ComponentId = ComponentId(NULL_INT32);

    #[inline]
    pub fn new(value: i32) -> Self {
        ComponentId(value)
    }
    #[inline]
    pub fn value(&self) -> i32 {
        self.0
    }
    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == NULL_INT32
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
