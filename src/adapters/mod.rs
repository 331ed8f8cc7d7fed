// Adapters layer: concrete sinks for the cleaned table.

pub mod csv_writer;
pub mod parquet_writer;
pub mod sql_writer;

pub use csv_writer::CsvTableWriter;
pub use parquet_writer::ParquetTableWriter;
pub use sql_writer::SqlTableWriter;

use crate::domain::model::Value;
use crate::domain::ports::TableWriter;
use crate::domain::settings::OutputSettings;
use crate::utils::error::{EtlError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Storage type of a column, inferred from the values it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Date,
    Text,
}

pub fn infer_kind<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let (mut int, mut float, mut date) = (false, false, false);
    for value in values {
        match value {
            Value::Null => {}
            Value::Int(_) => int = true,
            Value::Float(_) => float = true,
            Value::Date(_) | Value::InvalidDate => date = true,
            Value::Text(_) => return ColumnKind::Text,
        }
    }
    match (int, float, date) {
        (_, _, true) if int || float => ColumnKind::Text,
        (_, _, true) => ColumnKind::Date,
        (_, true, _) => ColumnKind::Float,
        (true, _, _) => ColumnKind::Int,
        _ => ColumnKind::Text,
    }
}

/// The writers selected by `outputs`, in the order they run.
pub fn writers_for(outputs: &OutputSettings) -> Vec<Box<dyn TableWriter>> {
    let mut writers: Vec<Box<dyn TableWriter>> = Vec::new();
    if let Some(path) = &outputs.csv {
        writers.push(Box::new(CsvTableWriter::new(path, outputs.csv_chunk_size)));
    }
    if let Some(path) = &outputs.parquet {
        writers.push(Box::new(ParquetTableWriter::new(path)));
    }
    if let Some(sql) = &outputs.sql {
        writers.push(Box::new(SqlTableWriter::new(sql.clone())));
    }
    writers
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes through `<path>.partial` and renames on success, so a failed
/// write never leaves a truncated file under the final name.
pub(crate) fn write_atomically<F>(path: &str, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    let target = Path::new(path);
    ensure_parent_dir(target)?;
    let partial = partial_path(target);

    let result = File::create(&partial)
        .map_err(EtlError::from)
        .and_then(write);
    match result {
        Ok(()) => {
            fs::rename(&partial, target)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::SqlSettings;
    use chrono::NaiveDate;

    #[test]
    fn test_infer_kind() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert_eq!(infer_kind([Value::Int(1), Value::Null].iter()), ColumnKind::Int);
        assert_eq!(infer_kind([Value::Int(1), Value::Float(1.5)].iter()), ColumnKind::Float);
        assert_eq!(infer_kind([date.clone(), Value::InvalidDate].iter()), ColumnKind::Date);
        assert_eq!(infer_kind([date, Value::Int(1)].iter()), ColumnKind::Text);
        assert_eq!(infer_kind([Value::Int(1), "x".into()].iter()), ColumnKind::Text);
        assert_eq!(infer_kind([Value::Null].iter()), ColumnKind::Text);
    }

    #[test]
    fn test_writers_for_selects_configured_outputs() {
        let outputs = OutputSettings {
            csv: Some("out.csv".into()),
            sql: Some(SqlSettings::new("covid.db")),
            ..OutputSettings::default()
        };
        let names: Vec<&str> = writers_for(&outputs).iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["csv", "sql"]);
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let path = path.to_str().unwrap();

        let result = write_atomically(path, |_file| {
            Err(EtlError::ProcessingError {
                message: "boom".into(),
            })
        });

        assert!(result.is_err());
        assert!(!Path::new(path).exists());
        assert!(!partial_path(Path::new(path)).exists());
    }
}
