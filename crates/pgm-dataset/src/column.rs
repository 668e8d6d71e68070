//! Homogeneous per-attribute value columns.

use pgm_core::{AttributeKind, AttributeValue, PgmError, PgmResult};
use std::ops::Range;

/// All values of one attribute across records, typed by kind.
#[derive(Debug, Clone)]
pub enum Column {
    Int32(Vec<i32>),
    Int8(Vec<i8>),
    Double(Vec<f64>),
    Double3(Vec<[f64; 3]>),
}

impl Column {
    pub fn with_capacity(kind: AttributeKind, capacity: usize) -> Self {
        match kind {
            AttributeKind::Int32 => Column::Int32(Vec::with_capacity(capacity)),
            AttributeKind::Int8 => Column::Int8(Vec::with_capacity(capacity)),
            AttributeKind::Double => Column::Double(Vec::with_capacity(capacity)),
            AttributeKind::Double3 => Column::Double3(Vec::with_capacity(capacity)),
        }
    }

    /// `len` null values of the given kind.
    pub fn nulls(kind: AttributeKind, len: usize) -> Self {
        match kind.null_value() {
            AttributeValue::Int32(v) => Column::Int32(vec![v; len]),
            AttributeValue::Int8(v) => Column::Int8(vec![v; len]),
            AttributeValue::Double(v) => Column::Double(vec![v; len]),
            AttributeValue::Double3(v) => Column::Double3(vec![v; len]),
        }
    }

    pub fn kind(&self) -> AttributeKind {
        match self {
            Column::Int32(_) => AttributeKind::Int32,
            Column::Int8(_) => AttributeKind::Int8,
            Column::Double(_) => AttributeKind::Double,
            Column::Double3(_) => AttributeKind::Double3,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int32(v) => v.len(),
            Column::Int8(v) => v.len(),
            Column::Double(v) => v.len(),
            Column::Double3(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<AttributeValue> {
        match self {
            Column::Int32(v) => v.get(index).map(|x| AttributeValue::Int32(*x)),
            Column::Int8(v) => v.get(index).map(|x| AttributeValue::Int8(*x)),
            Column::Double(v) => v.get(index).map(|x| AttributeValue::Double(*x)),
            Column::Double3(v) => v.get(index).map(|x| AttributeValue::Double3(*x)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = AttributeValue> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    pub fn push(&mut self, value: AttributeValue) -> PgmResult<()> {
        match (self, value) {
            (Column::Int32(v), AttributeValue::Int32(x)) => v.push(x),
            (Column::Int8(v), AttributeValue::Int8(x)) => v.push(x),
            (Column::Double(v), AttributeValue::Double(x)) => v.push(x),
            (Column::Double3(v), AttributeValue::Double3(x)) => v.push(x),
            (column, value) => return Err(kind_mismatch(column.kind(), value.kind())),
        }
        Ok(())
    }

    pub fn set(&mut self, index: usize, value: AttributeValue) -> PgmResult<()> {
        let len = self.len();
        let slot = match (self, value) {
            (Column::Int32(v), AttributeValue::Int32(x)) => v.get_mut(index).map(|slot| *slot = x),
            (Column::Int8(v), AttributeValue::Int8(x)) => v.get_mut(index).map(|slot| *slot = x),
            (Column::Double(v), AttributeValue::Double(x)) => {
                v.get_mut(index).map(|slot| *slot = x)
            }
            (Column::Double3(v), AttributeValue::Double3(x)) => {
                v.get_mut(index).map(|slot| *slot = x)
            }
            (column, value) => return Err(kind_mismatch(column.kind(), value.kind())),
        };
        slot.ok_or_else(|| {
            PgmError::invalid_arguments(format!(
                "row {} out of range for column of length {}",
                index, len
            ))
        })
    }

    pub fn slice(&self, range: Range<usize>) -> PgmResult<Column> {
        Ok(match self {
            Column::Int32(v) => Column::Int32(slice_rows(v, range)?),
            Column::Int8(v) => Column::Int8(slice_rows(v, range)?),
            Column::Double(v) => Column::Double(slice_rows(v, range)?),
            Column::Double3(v) => Column::Double3(slice_rows(v, range)?),
        })
    }

    /// Gather the given rows, in the given order.
    pub fn select(&self, rows: &[usize]) -> PgmResult<Column> {
        Ok(match self {
            Column::Int32(v) => Column::Int32(gather_rows(v, rows)?),
            Column::Int8(v) => Column::Int8(gather_rows(v, rows)?),
            Column::Double(v) => Column::Double(gather_rows(v, rows)?),
            Column::Double3(v) => Column::Double3(gather_rows(v, rows)?),
        })
    }

    pub fn extend_from(&mut self, other: &Column) -> PgmResult<()> {
        match (self, other) {
            (Column::Int32(a), Column::Int32(b)) => a.extend_from_slice(b),
            (Column::Int8(a), Column::Int8(b)) => a.extend_from_slice(b),
            (Column::Double(a), Column::Double(b)) => a.extend_from_slice(b),
            (Column::Double3(a), Column::Double3(b)) => a.extend_from_slice(b),
            (column, other) => return Err(kind_mismatch(column.kind(), other.kind())),
        }
        Ok(())
    }

    pub fn has_non_null(&self) -> bool {
        self.iter().any(|value| !value.is_null())
    }
}

/// Element-wise equality with NaN == NaN.
impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
            && self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

fn slice_rows<T: Copy>(values: &[T], range: Range<usize>) -> PgmResult<Vec<T>> {
    values.get(range.clone()).map(<[T]>::to_vec).ok_or_else(|| {
        PgmError::dataset(format!(
            "rows {}..{} out of range for column of length {}",
            range.start,
            range.end,
            values.len()
        ))
    })
}

fn gather_rows<T: Copy>(values: &[T], rows: &[usize]) -> PgmResult<Vec<T>> {
    rows.iter()
        .map(|&row| {
            values.get(row).copied().ok_or_else(|| {
                PgmError::dataset(format!(
                    "row {} out of range for column of length {}",
                    row,
                    values.len()
                ))
            })
        })
        .collect()
}

fn kind_mismatch(expected: AttributeKind, found: AttributeKind) -> PgmError {
    PgmError::dataset(format!(
        "value kind mismatch: expected {}, found {}",
        expected, found
    ))
}
