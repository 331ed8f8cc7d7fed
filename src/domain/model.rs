use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// A single cell of the consolidated table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    /// An observation date that could not be parsed. Orders after every real date.
    InvalidDate,
}

impl Value {
    /// Types a raw CSV field: empty -> `Null`, integer -> `Int`, decimal -> `Float`, else `Text`.
    pub fn parse_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Textual form of any non-null, non-sentinel value.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Null | Value::InvalidDate => None,
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Date ordering used by the cleaner: real dates ascending, then the invalid sentinel.
    pub fn cmp_as_date(&self, other: &Value) -> Ordering {
        match (self.as_date(), other.as_date()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::InvalidDate => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One row, aligned with the owning table's columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }
}

/// Column-named, row-oriented table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(EtlError::ProcessingError {
                message: format!(
                    "row has {} values but the table has {} columns",
                    values.len(),
                    self.columns.len()
                ),
            });
        }
        self.rows.push(Record::new(values));
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Record] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of column `name`, or `None` when the column does not exist.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| r.get(idx)))
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| r.get(idx))
    }

    /// Removes every listed column that exists; missing names are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) -> Vec<String> {
        let mut dropped = Vec::new();
        for name in names {
            if let Some(idx) = self.column_index(name) {
                self.columns.remove(idx);
                for row in &mut self.rows {
                    if idx < row.values.len() {
                        row.values.remove(idx);
                    }
                }
                dropped.push((*name).to_string());
            }
        }
        dropped
    }

    /// Stable sort of the rows.
    pub fn sort_rows_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Record, &Record) -> Ordering,
    {
        self.rows.sort_by(compare);
    }
}

/// What the cleaner observed; reported to the log and the run report, never fed back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanSummary {
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub distinct_states: usize,
    pub distinct_cities: usize,
    pub total_rows: usize,
    pub invalid_dates: usize,
    pub unresolved_population_states: Vec<String>,
    pub unparsable_counters: usize,
    pub dropped_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub table: Table,
    pub summary: CleanSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_types() {
        assert_eq!(Value::parse_cell(""), Value::Null);
        assert_eq!(Value::parse_cell("  "), Value::Null);
        assert_eq!(Value::parse_cell("42"), Value::Int(42));
        assert_eq!(Value::parse_cell("-3"), Value::Int(-3));
        assert_eq!(Value::parse_cell("1.5"), Value::Float(1.5));
        assert_eq!(Value::parse_cell("SP"), Value::Text("SP".to_string()));
        assert_eq!(
            Value::parse_cell("2020-03-01"),
            Value::Text("2020-03-01".to_string())
        );
        assert_eq!(Value::parse_cell("NaN"), Value::Text("NaN".to_string()));
    }

    #[test]
    fn test_invalid_date_sorts_last() {
        let d = Value::Date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(d.cmp_as_date(&Value::InvalidDate), Ordering::Less);
        assert_eq!(Value::InvalidDate.cmp_as_date(&d), Ordering::Greater);
        assert_eq!(
            Value::InvalidDate.cmp_as_date(&Value::InvalidDate),
            Ordering::Equal
        );
    }

    #[test]
    fn test_drop_columns_is_idempotent() {
        let mut table = Table::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec![Value::Int(1), Value::Int(2), Value::Int(3)]],
        )
        .unwrap();

        assert_eq!(table.drop_columns(&["b", "missing"]), vec!["b".to_string()]);
        assert!(table.drop_columns(&["b"]).is_empty());
        assert_eq!(table.columns(), &["a".to_string(), "c".to_string()]);
        assert_eq!(table.rows()[0].values, vec![Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let mut table = Table::new(vec!["a".into()]);
        assert!(table.push_row(vec![Value::Null, Value::Null]).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_display_for_csv_fields() {
        let d = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        assert_eq!(Value::Date(d).to_string(), "2020-03-01");
        assert_eq!(Value::InvalidDate.to_string(), "");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }
}
