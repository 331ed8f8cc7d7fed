use crate::adapters::{infer_kind, write_atomically, ColumnKind};
use crate::domain::model::{Table, Value};
use crate::domain::ports::{TableWriter, WriteOutcome};
use crate::utils::error::Result;
use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Datelike;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Snappy-compressed Parquet, written in one shot.
#[derive(Debug, Clone)]
pub struct ParquetTableWriter {
    path: String,
}

impl ParquetTableWriter {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

fn data_type(kind: ColumnKind) -> DataType {
    match kind {
        ColumnKind::Int => DataType::Int64,
        ColumnKind::Float => DataType::Float64,
        ColumnKind::Date => DataType::Date32,
        ColumnKind::Text => DataType::Utf8,
    }
}

fn build_array(table: &Table, idx: usize, kind: ColumnKind) -> ArrayRef {
    let values = table.rows().iter().map(|r| r.get(idx));
    match kind {
        ColumnKind::Int => Arc::new(Int64Array::from(
            values.map(Value::as_i64).collect::<Vec<_>>(),
        )),
        ColumnKind::Float => Arc::new(Float64Array::from(
            values.map(Value::as_f64).collect::<Vec<_>>(),
        )),
        ColumnKind::Date => Arc::new(Date32Array::from(
            values
                .map(|v| {
                    v.as_date()
                        .map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
                })
                .collect::<Vec<_>>(),
        )),
        ColumnKind::Text => Arc::new(StringArray::from(
            values
                .map(|v| v.as_text().map(|s| s.into_owned()))
                .collect::<Vec<_>>(),
        )),
    }
}

pub fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays = Vec::with_capacity(table.columns().len());
    for (idx, name) in table.columns().iter().enumerate() {
        let kind = infer_kind(table.rows().iter().map(|r| r.get(idx)));
        fields.push(Field::new(name, data_type(kind), true));
        arrays.push(build_array(table, idx, kind));
    }

    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, arrays)?)
}

impl TableWriter for ParquetTableWriter {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn write(&self, table: &Table) -> Result<WriteOutcome> {
        tracing::info!("Saving consolidated dataset as Parquet to {}", self.path);
        let batch = to_record_batch(table)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        write_atomically(&self.path, |file| {
            let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
            writer.write(&batch)?;
            writer.close()?;
            Ok(())
        })?;

        let size_mb = std::fs::metadata(&self.path)
            .map(|m| m.len() as f64 / 1024.0 / 1024.0)
            .unwrap_or(0.0);
        tracing::info!("Parquet saved: {} rows, {:.2} MB", table.len(), size_mb);

        Ok(WriteOutcome {
            writer: self.name().to_string(),
            destination: self.path.clone(),
            rows: table.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use chrono::NaiveDate;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn sample() -> Table {
        Table::from_rows(
            vec![
                "estado".into(),
                "data".into(),
                "casosNovos".into(),
                "populacaoTCU2019".into(),
            ],
            vec![
                vec![
                    "SP".into(),
                    Value::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()),
                    Value::Int(3),
                    Value::Float(10.5),
                ],
                vec!["RJ".into(), Value::InvalidDate, Value::Int(-1), Value::Int(7)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_record_batch_types() {
        let batch = to_record_batch(&sample()).unwrap();
        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Date32);
        assert_eq!(schema.field(2).data_type(), &DataType::Int64);
        assert_eq!(schema.field(3).data_type(), &DataType::Float64);

        let dates = batch
            .column(1)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(dates.value(0), 1);
        assert!(dates.is_null(1));
    }

    #[test]
    fn test_writes_readable_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");

        let outcome = ParquetTableWriter::new(path.to_str().unwrap())
            .write(&sample())
            .unwrap();
        assert_eq!(outcome.rows, 2);

        let file = std::fs::File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 2);
    }
}
