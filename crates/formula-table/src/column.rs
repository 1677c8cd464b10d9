use crate::bitmap::BitVec;
use crate::error::{TableError, TableResult};
use crate::types::{Scalar, ScalarKind};
use std::sync::Arc;

/// Row indices must fit in a `u32`.
pub const MAX_ROWS: usize = u32::MAX as usize;

pub(crate) fn check_row(row: usize) -> TableResult<()> {
    if row >= MAX_ROWS {
        return Err(TableError::RowOutOfBounds {
            row,
            max_rows: MAX_ROWS,
        });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
enum ColumnData {
    None,
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bool(BitVec),
    Str(Vec<Arc<str>>),
    DateTime(Vec<i64>),
}

impl ColumnData {
    fn new(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::None => ColumnData::None,
            ScalarKind::Int => ColumnData::Int(Vec::new()),
            ScalarKind::Float => ColumnData::Float(Vec::new()),
            ScalarKind::Bool => ColumnData::Bool(BitVec::new()),
            ScalarKind::Str => ColumnData::Str(Vec::new()),
            ScalarKind::DateTime => ColumnData::DateTime(Vec::new()),
        }
    }

    fn reserve(&mut self, additional: usize, total: usize) {
        match self {
            ColumnData::None => {}
            ColumnData::Int(v) | ColumnData::DateTime(v) => v.reserve(additional),
            ColumnData::Float(v) => v.reserve(additional),
            ColumnData::Bool(v) => v.reserve_total(total),
            ColumnData::Str(v) => v.reserve(additional),
        }
    }

    /// Push the storage placeholder used for null slots.
    fn push_placeholder(&mut self) {
        match self {
            ColumnData::None => {}
            ColumnData::Int(v) | ColumnData::DateTime(v) => v.push(0),
            ColumnData::Float(v) => v.push(0.0),
            ColumnData::Bool(v) => v.push(false),
            ColumnData::Str(v) => v.push(Arc::from("")),
        }
    }

    fn truncate(&mut self, len: usize) {
        match self {
            ColumnData::None => {}
            ColumnData::Int(v) | ColumnData::DateTime(v) => v.truncate(len),
            ColumnData::Float(v) => v.truncate(len),
            ColumnData::Bool(v) => v.resize(len, false),
            ColumnData::Str(v) => v.truncate(len),
        }
    }

    fn clear_slot(&mut self, row: usize) {
        match self {
            ColumnData::None => {}
            ColumnData::Int(v) | ColumnData::DateTime(v) => v[row] = 0,
            ColumnData::Float(v) => v[row] = 0.0,
            ColumnData::Bool(v) => v.set(row, false),
            ColumnData::Str(v) => v[row] = Arc::from(""),
        }
    }
}

/// A single typed column: values stored in a native vector plus a validity bitmap.
///
/// Null slots hold a zeroed placeholder so two columns with the same logical contents compare
/// equal regardless of the write history that produced them.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    kind: ScalarKind,
    data: ColumnData,
    validity: BitVec,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            data: ColumnData::new(kind),
            validity: BitVec::new(),
        }
    }

    pub fn with_nulls(name: impl Into<String>, kind: ScalarKind, len: usize) -> Self {
        let mut column = Self::new(name, kind);
        column.resize(len);
        column
    }

    pub fn from_values(
        name: impl Into<String>,
        kind: ScalarKind,
        values: impl IntoIterator<Item = Scalar>,
    ) -> TableResult<Self> {
        let mut column = Self::new(name, kind);
        for value in values {
            column.push(value)?;
        }
        Ok(column)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.validity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.validity.count_zeros()
    }

    /// Ensure capacity for `total_rows` rows in total.
    pub fn reserve(&mut self, total_rows: usize) {
        let additional = total_rows.saturating_sub(self.len());
        self.data.reserve(additional, total_rows);
        self.validity.reserve_total(total_rows);
    }

    /// Grow with nulls, or truncate, to exactly `len` rows.
    pub fn resize(&mut self, len: usize) {
        if len <= self.len() {
            self.data.truncate(len);
            self.validity.resize(len, false);
            return;
        }
        self.reserve(len);
        while self.len() < len {
            self.data.push_placeholder();
            self.validity.push(false);
        }
    }

    /// Read one cell. Rows past the end read as a null of the column's kind.
    pub fn get(&self, row: usize) -> Scalar {
        if row >= self.len() || !self.validity.get(row) {
            return Scalar::Null(self.kind);
        }
        match &self.data {
            ColumnData::None => Scalar::Null(self.kind),
            ColumnData::Int(v) => Scalar::Int(v[row]),
            ColumnData::Float(v) => Scalar::Float(v[row]),
            ColumnData::Bool(v) => Scalar::Bool(v.get(row)),
            ColumnData::Str(v) => Scalar::Str(v[row].clone()),
            ColumnData::DateTime(v) => Scalar::DateTime(v[row]),
        }
    }

    pub fn push(&mut self, value: Scalar) -> TableResult<()> {
        let row = self.len();
        self.data.push_placeholder();
        self.validity.push(false);
        if let Err(err) = self.set(row, value) {
            self.resize(row);
            return Err(err);
        }
        Ok(())
    }

    /// Write one cell, growing the column with nulls when `row` is past the end.
    ///
    /// Nulls of any kind are accepted; non-null values must match the column kind.
    pub fn set(&mut self, row: usize, value: Scalar) -> TableResult<()> {
        check_row(row)?;
        if !value.is_null() && value.kind() != self.kind {
            return Err(TableError::ColumnTypeMismatch {
                column: self.name.clone(),
                expected: self.kind,
                actual: value.kind(),
            });
        }
        if row >= self.len() {
            self.resize(row + 1);
        }

        match (&mut self.data, value) {
            (data, Scalar::Null(_)) => {
                data.clear_slot(row);
                self.validity.set(row, false);
                return Ok(());
            }
            (ColumnData::Int(v), Scalar::Int(x)) => v[row] = x,
            (ColumnData::Float(v), Scalar::Float(x)) => v[row] = x,
            (ColumnData::Bool(v), Scalar::Bool(x)) => v.set(row, x),
            (ColumnData::Str(v), Scalar::Str(x)) => v[row] = x,
            (ColumnData::DateTime(v), Scalar::DateTime(x)) => v[row] = x,
            (_, other) => {
                debug_assert!(false, "kind check admitted {other:?}");
                return Err(TableError::ColumnTypeMismatch {
                    column: self.name.clone(),
                    expected: self.kind,
                    actual: other.kind(),
                });
            }
        }
        self.validity.set(row, true);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.len()).map(move |row| self.get(row))
    }

    pub fn to_values(&self) -> Vec<Scalar> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_rejects_rows_past_the_limit() {
        let mut col = Column::new("x", ScalarKind::Int);
        let err = col.set(usize::MAX, Scalar::Int(7)).unwrap_err();
        assert_eq!(
            err,
            TableError::RowOutOfBounds {
                row: usize::MAX,
                max_rows: MAX_ROWS
            }
        );
        assert_eq!(col.len(), 0);
    }

    #[test]
    fn set_past_end_grows_with_nulls() {
        let mut col = Column::new("x", ScalarKind::Int);
        col.set(2, Scalar::Int(7)).unwrap();

        assert_eq!(col.len(), 3);
        assert_eq!(col.null_count(), 2);
        assert_eq!(
            col.to_values(),
            vec![
                Scalar::Null(ScalarKind::Int),
                Scalar::Null(ScalarKind::Int),
                Scalar::Int(7)
            ]
        );
    }

    #[test]
    fn rejects_values_of_another_kind() {
        let mut col = Column::new("x", ScalarKind::Float);
        let err = col.push(Scalar::Int(1)).unwrap_err();
        assert_eq!(
            err,
            TableError::ColumnTypeMismatch {
                column: "x".into(),
                expected: ScalarKind::Float,
                actual: ScalarKind::Int,
            }
        );
        assert!(col.is_empty(), "failed push must not leave a row behind");
    }

    #[test]
    fn accepts_nulls_of_any_kind() {
        let mut col = Column::new("s", ScalarKind::Str);
        col.push(Scalar::NONE).unwrap();
        col.push(Scalar::Null(ScalarKind::Int)).unwrap();
        col.push("hi".into()).unwrap();
        assert_eq!(col.get(0), Scalar::Null(ScalarKind::Str));
        assert_eq!(col.get(2), Scalar::from("hi"));
    }

    #[test]
    fn overwriting_with_null_matches_a_fresh_null() {
        let mut a = Column::new("b", ScalarKind::Bool);
        a.push(Scalar::Bool(true)).unwrap();
        a.set(0, Scalar::NONE).unwrap();

        let b = Column::with_nulls("b", ScalarKind::Bool, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn reads_past_end_are_typed_nulls() {
        let col = Column::from_values("d", ScalarKind::DateTime, [Scalar::DateTime(5)]).unwrap();
        assert_eq!(col.get(10), Scalar::Null(ScalarKind::DateTime));
    }
}
