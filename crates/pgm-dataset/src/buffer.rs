//! Physical layouts of one component's records.
//!
//! A [`RecordArray`] groups values by record (row-major, like a structured
//! array), a [`ColumnarData`] groups them by attribute. Both describe the same
//! logical records and convert into each other without loss, keeping record
//! order.

use crate::column::Column;
use pgm_core::{
    AttributeKind, AttributeMeta, AttributeValue, ComponentMeta, PgmError, PgmResult, ID_ATTRIBUTE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Array,
    Columnar,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Array => f.write_str("array"),
            Layout::Columnar => f.write_str("columnar"),
        }
    }
}

/// Records of one component type, each holding one value per field.
///
/// `fields` plays the role of a structured dtype: it fixes the attribute
/// names, their kinds and their positions inside every record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordArray {
    pub fields: Vec<AttributeMeta>,
    pub records: Vec<Vec<AttributeValue>>,
}

impl RecordArray {
    pub fn new(fields: Vec<AttributeMeta>) -> Self {
        Self {
            fields,
            records: Vec::new(),
        }
    }

    /// `len` records with every schema attribute set to null.
    pub fn initialize(meta: &ComponentMeta, len: usize) -> Self {
        let template = meta.null_record();
        Self {
            fields: meta.attributes.clone(),
            records: vec![template; len],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position(&self, attribute: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == attribute)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn require_position(&self, attribute: &str) -> PgmResult<usize> {
        self.position(attribute).ok_or_else(|| {
            PgmError::invalid_arguments(format!("record array has no attribute '{}'", attribute))
        })
    }

    pub fn get(&self, row: usize, attribute: &str) -> PgmResult<AttributeValue> {
        let pos = self.require_position(attribute)?;
        self.records
            .get(row)
            .and_then(|record| record.get(pos))
            .copied()
            .ok_or_else(|| {
                PgmError::invalid_arguments(format!(
                    "row {} out of range for record array of length {}",
                    row,
                    self.len()
                ))
            })
    }

    pub fn set(
        &mut self,
        row: usize,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> PgmResult<()> {
        let value = value.into();
        let pos = self.require_position(attribute)?;
        let expected = self.fields[pos].kind;
        if value.kind() != expected {
            return Err(PgmError::invalid_arguments(format!(
                "attribute '{}' expects {}, got {}",
                attribute,
                expected,
                value.kind()
            )));
        }
        let len = self.len();
        let record = self.records.get_mut(row).ok_or_else(|| {
            PgmError::invalid_arguments(format!(
                "row {} out of range for record array of length {}",
                row, len
            ))
        })?;
        record[pos] = value;
        Ok(())
    }

    /// Set one attribute on every record.
    pub fn fill(&mut self, attribute: &str, value: impl Into<AttributeValue>) -> PgmResult<()> {
        let value = value.into();
        for row in 0..self.len() {
            self.set(row, attribute, value)?;
        }
        Ok(())
    }

    pub fn push_record(&mut self, record: Vec<AttributeValue>) -> PgmResult<()> {
        if record.len() != self.fields.len() {
            return Err(PgmError::dataset(format!(
                "record has {} values but the array has {} fields",
                record.len(),
                self.fields.len()
            )));
        }
        self.records.push(record);
        Ok(())
    }

    /// Values of the `id` attribute.
    pub fn ids(&self) -> PgmResult<Vec<i32>> {
        let pos = self.require_position(ID_ATTRIBUTE)?;
        self.records
            .iter()
            .map(|record| {
                record[pos]
                    .as_i32()
                    .ok_or_else(|| PgmError::dataset("attribute 'id' must be int32"))
            })
            .collect()
    }

    pub fn column(&self, attribute: &str) -> PgmResult<Column> {
        let pos = self.require_position(attribute)?;
        let mut column = Column::with_capacity(self.fields[pos].kind, self.len());
        for record in &self.records {
            column.push(record[pos])?;
        }
        Ok(column)
    }

    pub fn slice(&self, range: Range<usize>) -> PgmResult<RecordArray> {
        let records = self.records.get(range.clone()).ok_or_else(|| {
            PgmError::dataset(format!(
                "rows {}..{} out of range for record array of length {}",
                range.start,
                range.end,
                self.len()
            ))
        })?;
        Ok(Self {
            fields: self.fields.clone(),
            records: records.to_vec(),
        })
    }

    pub fn select(&self, rows: &[usize]) -> PgmResult<RecordArray> {
        let records = rows
            .iter()
            .map(|&row| {
                self.records.get(row).cloned().ok_or_else(|| {
                    PgmError::dataset(format!(
                        "row {} out of range for record array of length {}",
                        row,
                        self.len()
                    ))
                })
            })
            .collect::<PgmResult<Vec<_>>>()?;
        Ok(Self {
            fields: self.fields.clone(),
            records,
        })
    }

    /// Keep only the given attributes, in the given order.
    pub fn project(&self, attributes: &[String]) -> PgmResult<RecordArray> {
        let positions = attributes
            .iter()
            .map(|name| {
                self.position(name).ok_or_else(|| {
                    PgmError::dataset(format!("attribute '{}' not present in data", name))
                })
            })
            .collect::<PgmResult<Vec<_>>>()?;
        Ok(Self {
            fields: positions.iter().map(|&p| self.fields[p].clone()).collect(),
            records: self
                .records
                .iter()
                .map(|record| positions.iter().map(|&p| record[p]).collect())
                .collect(),
        })
    }

    pub fn to_columnar(&self) -> PgmResult<ColumnarData> {
        let mut columns = BTreeMap::new();
        for field in &self.fields {
            columns.insert(field.name.clone(), self.column(&field.name)?);
        }
        Ok(ColumnarData { columns })
    }
}

/// Records of one component type stored per attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnarData {
    pub columns: BTreeMap<String, Column>,
}

impl ColumnarData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    /// Length of the first column; see [`ColumnarData::checked_len`].
    pub fn len(&self) -> usize {
        self.columns.values().next().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Common length of all columns.
    pub fn checked_len(&self) -> PgmResult<usize> {
        let mut iter = self.columns.iter();
        let Some((first_name, first)) = iter.next() else {
            return Ok(0);
        };
        for (name, column) in iter {
            if column.len() != first.len() {
                return Err(PgmError::dataset(format!(
                    "columns have inconsistent lengths: '{}' has {}, '{}' has {}",
                    first_name,
                    first.len(),
                    name,
                    column.len()
                )));
            }
        }
        Ok(first.len())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Convert to a record array.
    ///
    /// Field order follows the component meta data when given, column name
    /// order otherwise. Attributes the meta data knows but the columns lack
    /// are not added.
    pub fn to_array(&self, meta: Option<&ComponentMeta>) -> PgmResult<RecordArray> {
        let len = self.checked_len()?;
        let names: Vec<&String> = match meta {
            Some(meta) => {
                let mut ordered: Vec<&String> = self.columns.keys().collect();
                ordered.sort_by_key(|name| meta.position(name).unwrap_or(usize::MAX));
                ordered
            }
            None => self.columns.keys().collect(),
        };
        let fields: Vec<AttributeMeta> = names
            .iter()
            .map(|name| AttributeMeta {
                name: (*name).clone(),
                kind: self.columns[*name].kind(),
            })
            .collect();
        let records = (0..len)
            .map(|row| {
                names
                    .iter()
                    .map(|name| {
                        self.columns[*name].get(row).ok_or_else(|| {
                            PgmError::UnreachableHit(format!(
                                "column '{}' shorter than {}",
                                name, len
                            ))
                        })
                    })
                    .collect::<PgmResult<Vec<_>>>()
            })
            .collect::<PgmResult<Vec<_>>>()?;
        Ok(RecordArray { fields, records })
    }

    pub fn slice(&self, range: Range<usize>) -> PgmResult<ColumnarData> {
        self.checked_len()?;
        let mut columns = BTreeMap::new();
        for (name, column) in &self.columns {
            columns.insert(name.clone(), column.slice(range.clone())?);
        }
        Ok(ColumnarData { columns })
    }

    pub fn select(&self, rows: &[usize]) -> PgmResult<ColumnarData> {
        self.checked_len()?;
        let mut columns = BTreeMap::new();
        for (name, column) in &self.columns {
            columns.insert(name.clone(), column.select(rows)?);
        }
        Ok(ColumnarData { columns })
    }

    /// Same columns with no rows.
    pub fn empty_like(&self) -> ColumnarData {
        ColumnarData {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), Column::with_capacity(column.kind(), 0)))
                .collect(),
        }
    }

    pub fn project(&self, attributes: &[String]) -> PgmResult<ColumnarData> {
        let mut columns = BTreeMap::new();
        for name in attributes {
            let column = self.columns.get(name).ok_or_else(|| {
                PgmError::dataset(format!("attribute '{}' not present in data", name))
            })?;
            columns.insert(name.clone(), column.clone());
        }
        Ok(ColumnarData { columns })
    }
}

/// One component's records in either layout.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentBuffer {
    Array(RecordArray),
    Columnar(ColumnarData),
}

impl ComponentBuffer {
    pub fn layout(&self) -> Layout {
        match self {
            ComponentBuffer::Array(_) => Layout::Array,
            ComponentBuffer::Columnar(_) => Layout::Columnar,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ComponentBuffer::Array(array) => array.len(),
            ComponentBuffer::Columnar(columnar) => columnar.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record count, failing when columnar data has ragged columns.
    pub fn checked_len(&self) -> PgmResult<usize> {
        match self {
            ComponentBuffer::Array(array) => Ok(array.len()),
            ComponentBuffer::Columnar(columnar) => columnar.checked_len(),
        }
    }

    /// An empty buffer with the same fields/columns and layout.
    pub fn empty_like(&self) -> ComponentBuffer {
        match self {
            ComponentBuffer::Array(array) => {
                ComponentBuffer::Array(RecordArray::new(array.fields.clone()))
            }
            ComponentBuffer::Columnar(columnar) => ComponentBuffer::Columnar(columnar.empty_like()),
        }
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        match self {
            ComponentBuffer::Array(array) => array.field_names(),
            ComponentBuffer::Columnar(columnar) => {
                columnar.columns.keys().map(String::as_str).collect()
            }
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        match self {
            ComponentBuffer::Array(array) => array.position(attribute).is_some(),
            ComponentBuffer::Columnar(columnar) => columnar.columns.contains_key(attribute),
        }
    }

    pub fn attribute_kind(&self, attribute: &str) -> Option<AttributeKind> {
        match self {
            ComponentBuffer::Array(array) => array
                .position(attribute)
                .map(|pos| array.fields[pos].kind),
            ComponentBuffer::Columnar(columnar) => columnar.column(attribute).map(Column::kind),
        }
    }

    pub fn value(&self, row: usize, attribute: &str) -> PgmResult<AttributeValue> {
        match self {
            ComponentBuffer::Array(array) => array.get(row, attribute),
            ComponentBuffer::Columnar(columnar) => columnar
                .column(attribute)
                .ok_or_else(|| {
                    PgmError::invalid_arguments(format!(
                        "columnar data has no attribute '{}'",
                        attribute
                    ))
                })?
                .get(row)
                .ok_or_else(|| {
                    PgmError::invalid_arguments(format!(
                        "row {} out of range for columnar data of length {}",
                        row,
                        columnar.len()
                    ))
                }),
        }
    }

    /// Ids of every record, or `None` when the buffer carries no id attribute.
    pub fn ids(&self) -> PgmResult<Option<Vec<i32>>> {
        match self {
            ComponentBuffer::Array(array) if array.position(ID_ATTRIBUTE).is_some() => {
                array.ids().map(Some)
            }
            ComponentBuffer::Columnar(columnar) => match columnar.column(ID_ATTRIBUTE) {
                Some(Column::Int32(ids)) => Ok(Some(ids.clone())),
                Some(_) => Err(PgmError::dataset("attribute 'id' must be int32")),
                None => Ok(None),
            },
            ComponentBuffer::Array(_) => Ok(None),
        }
    }

    /// Whether at least one record holds a non-null value for the attribute.
    pub fn has_non_null(&self, attribute: &str) -> bool {
        match self {
            ComponentBuffer::Array(array) => array
                .position(attribute)
                .map(|pos| array.records.iter().any(|record| !record[pos].is_null()))
                .unwrap_or(false),
            ComponentBuffer::Columnar(columnar) => columnar
                .column(attribute)
                .map(Column::has_non_null)
                .unwrap_or(false),
        }
    }

    pub fn slice(&self, range: Range<usize>) -> PgmResult<ComponentBuffer> {
        Ok(match self {
            ComponentBuffer::Array(array) => ComponentBuffer::Array(array.slice(range)?),
            ComponentBuffer::Columnar(columnar) => {
                ComponentBuffer::Columnar(columnar.slice(range)?)
            }
        })
    }

    pub fn select(&self, rows: &[usize]) -> PgmResult<ComponentBuffer> {
        Ok(match self {
            ComponentBuffer::Array(array) => ComponentBuffer::Array(array.select(rows)?),
            ComponentBuffer::Columnar(columnar) => {
                ComponentBuffer::Columnar(columnar.select(rows)?)
            }
        })
    }

    pub fn project(&self, attributes: &[String]) -> PgmResult<ComponentBuffer> {
        Ok(match self {
            ComponentBuffer::Array(array) => ComponentBuffer::Array(array.project(attributes)?),
            ComponentBuffer::Columnar(columnar) => {
                ComponentBuffer::Columnar(columnar.project(attributes)?)
            }
        })
    }

    pub fn to_array(&self, meta: Option<&ComponentMeta>) -> PgmResult<RecordArray> {
        match self {
            ComponentBuffer::Array(array) => Ok(array.clone()),
            ComponentBuffer::Columnar(columnar) => columnar.to_array(meta),
        }
    }

    pub fn to_columnar(&self) -> PgmResult<ColumnarData> {
        match self {
            ComponentBuffer::Array(array) => array.to_columnar(),
            ComponentBuffer::Columnar(columnar) => Ok(columnar.clone()),
        }
    }

    /// Same data in the requested layout.
    pub fn into_layout(self, layout: Layout) -> PgmResult<ComponentBuffer> {
        Ok(match (self, layout) {
            (buffer @ ComponentBuffer::Array(_), Layout::Array)
            | (buffer @ ComponentBuffer::Columnar(_), Layout::Columnar) => buffer,
            (ComponentBuffer::Array(array), Layout::Columnar) => {
                ComponentBuffer::Columnar(array.to_columnar()?)
            }
            (ComponentBuffer::Columnar(columnar), Layout::Array) => {
                ComponentBuffer::Array(columnar.to_array(None)?)
            }
        })
    }

    /// Concatenate buffers that share layout and fields.
    pub fn concat(parts: &[ComponentBuffer]) -> PgmResult<ComponentBuffer> {
        let first = parts
            .first()
            .ok_or_else(|| PgmError::invalid_arguments("cannot concatenate zero buffers"))?;
        match first {
            ComponentBuffer::Array(head) => {
                let mut out = RecordArray::new(head.fields.clone());
                for part in parts {
                    match part {
                        ComponentBuffer::Array(array) if array.fields == head.fields => {
                            out.records.extend(array.records.iter().cloned());
                        }
                        _ => {
                            return Err(PgmError::dataset(
                                "cannot concatenate buffers with different fields or layouts",
                            ))
                        }
                    }
                }
                Ok(ComponentBuffer::Array(out))
            }
            ComponentBuffer::Columnar(head) => {
                let mut out = head.empty_like();
                for part in parts {
                    let ComponentBuffer::Columnar(columnar) = part else {
                        return Err(PgmError::dataset(
                            "cannot concatenate buffers with different layouts",
                        ));
                    };
                    if columnar.columns.len() != out.columns.len() {
                        return Err(PgmError::dataset(
                            "cannot concatenate columnar data with different columns",
                        ));
                    }
                    for (name, column) in out.columns.iter_mut() {
                        let other = columnar.columns.get(name).ok_or_else(|| {
                            PgmError::dataset(format!(
                                "column '{}' missing from one of the concatenated buffers",
                                name
                            ))
                        })?;
                        column.extend_from(other)?;
                    }
                }
                Ok(ComponentBuffer::Columnar(out))
            }
        }
    }
}

impl From<RecordArray> for ComponentBuffer {
    fn from(array: RecordArray) -> Self {
        ComponentBuffer::Array(array)
    }
}

impl From<ColumnarData> for ComponentBuffer {
    fn from(columnar: ColumnarData) -> Self {
        ComponentBuffer::Columnar(columnar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgm_core::{DatasetType, PowerGridMetaData};

    fn node_meta() -> ComponentMeta {
        PowerGridMetaData::bundled()
            .unwrap()
            .dataset(DatasetType::Input)
            .unwrap()
            .component("node")
            .unwrap()
            .clone()
    }

    fn nodes() -> RecordArray {
        let mut array = RecordArray::initialize(&node_meta(), 2);
        array.set(0, "id", 1).unwrap();
        array.set(1, "id", 2).unwrap();
        array.set(0, "u_rated", 10500.0).unwrap();
        array
    }

    #[test]
    fn initialize_fills_nulls() {
        let array = RecordArray::initialize(&node_meta(), 3);
        assert_eq!(array.len(), 3);
        assert!(array.get(2, "u_rated").unwrap().is_null());
        assert_eq!(array.field_names(), vec!["id", "u_rated"]);
    }

    #[test]
    fn set_rejects_wrong_kind_and_unknown_attribute() {
        let mut array = nodes();
        assert!(array.set(0, "id", 1.5).is_err());
        assert!(array.set(0, "p_specified", 1.0).is_err());
        assert!(array.set(5, "id", 3).is_err());
    }

    #[test]
    fn columnar_round_trip_preserves_records() {
        let array = nodes();
        let columnar = array.to_columnar().unwrap();
        assert_eq!(columnar.len(), 2);
        assert_eq!(columnar.column("id"), Some(&Column::Int32(vec![1, 2])));
        let back = columnar.to_array(Some(&node_meta())).unwrap();
        assert_eq!(back, array);
    }

    #[test]
    fn inconsistent_columns_are_rejected() {
        let columnar = ColumnarData::new()
            .with_column("id", Column::Int32(vec![1, 2]))
            .with_column("u_rated", Column::Double(vec![1.0]));
        assert!(matches!(columnar.checked_len(), Err(PgmError::Dataset(_))));
        assert!(columnar.to_array(None).is_err());
    }

    #[test]
    fn concat_requires_matching_fields() {
        let a = ComponentBuffer::Array(nodes());
        let joined = ComponentBuffer::concat(&[a.clone(), a.clone()]).unwrap();
        assert_eq!(joined.len(), 4);
        assert_eq!(joined.ids().unwrap(), Some(vec![1, 2, 1, 2]));

        let projected = a.project(&["id".to_string()]).unwrap();
        assert!(ComponentBuffer::concat(&[a.clone(), projected]).is_err());

        let columnar = ComponentBuffer::Columnar(nodes().to_columnar().unwrap());
        assert!(ComponentBuffer::concat(&[a, columnar]).is_err());
    }

    #[test]
    fn buffer_queries_work_for_both_layouts() {
        for buffer in [
            ComponentBuffer::Array(nodes()),
            ComponentBuffer::Columnar(nodes().to_columnar().unwrap()),
        ] {
            assert_eq!(
                buffer.value(0, "u_rated").unwrap(),
                AttributeValue::Double(10500.0)
            );
            assert!(buffer.has_non_null("u_rated"));
            assert!(!buffer.has_non_null("missing"));
            assert_eq!(buffer.select(&[1]).unwrap().ids().unwrap(), Some(vec![2]));
            assert_eq!(buffer.empty_like().len(), 0);
            assert!(matches!(buffer.slice(1..3), Err(PgmError::Dataset(_))));
            assert!(matches!(buffer.select(&[2]), Err(PgmError::Dataset(_))));
        }
    }

    #[test]
    fn ragged_columns_cannot_be_sliced() {
        let buffer = ComponentBuffer::Columnar(
            ColumnarData::new()
                .with_column("id", Column::Int32(vec![1, 2, 3]))
                .with_column("u_rated", Column::Double(vec![1.0])),
        );
        assert_eq!(buffer.len(), 3);
        assert!(buffer.checked_len().is_err());
        assert!(buffer.slice(0..1).is_err());
        assert!(buffer.select(&[0]).is_err());
    }
}
