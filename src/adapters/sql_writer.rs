use crate::adapters::{ensure_parent_dir, infer_kind, ColumnKind};
use crate::domain::model::{Table, Value};
use crate::domain::ports::{TableWriter, WriteOutcome};
use crate::domain::settings::{SqlMode, SqlSettings};
use crate::utils::error::Result;
use crate::utils::progress::{chunk_count, create_progress_bar};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null | Value::InvalidDate => ToSqlOutput::Owned(SqlValue::Null),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format("%Y-%m-%d").to_string())),
        })
    }
}

/// Appends or replaces the table in a SQLite database, one transaction per batch.
///
/// Batches already committed stay in place when a later one fails; re-run in
/// [`SqlMode::Replace`] to get a clean table back.
#[derive(Debug, Clone)]
pub struct SqlTableWriter {
    settings: SqlSettings,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Int => "INTEGER",
        ColumnKind::Float => "REAL",
        ColumnKind::Date | ColumnKind::Text => "TEXT",
    }
}

pub fn create_table_sql(table_name: &str, table: &Table) -> String {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let kind = infer_kind(table.rows().iter().map(|r| r.get(idx)));
            format!("{} {}", quote_ident(name), sql_type(kind))
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table_name),
        columns.join(", ")
    )
}

pub fn insert_sql(table_name: &str, table: &Table) -> String {
    let columns: Vec<String> = table.columns().iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table_name),
        columns.join(", "),
        placeholders.join(", ")
    )
}

impl SqlTableWriter {
    pub fn new(settings: SqlSettings) -> Self {
        Self { settings }
    }

    fn open(&self) -> Result<Connection> {
        ensure_parent_dir(Path::new(&self.settings.database))?;
        Ok(Connection::open(&self.settings.database)?)
    }
}

impl TableWriter for SqlTableWriter {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn write(&self, table: &Table) -> Result<WriteOutcome> {
        let settings = &self.settings;
        let batch_size = settings.batch_size.max(1);
        tracing::info!(
            "Saving {} records to table '{}' in batches of {} rows ({:?})",
            table.len(),
            settings.table,
            batch_size,
            settings.mode
        );

        let mut conn = self.open()?;
        if settings.mode == SqlMode::Replace {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(&settings.table)))?;
        }
        conn.execute_batch(&create_table_sql(&settings.table, table))?;

        let insert = insert_sql(&settings.table, table);
        let batches = chunk_count(table.len(), batch_size);
        let pb = create_progress_bar(batches as u64, "batches", Some("Sending to SQL"));
        let mut written = 0;
        for batch in table.rows().chunks(batch_size) {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(&insert)?;
                for row in batch {
                    stmt.execute(params_from_iter(row.values.iter()))?;
                }
            }
            tx.commit()?;
            written += batch.len();
            tracing::debug!("Committed {}/{} rows", written, table.len());
            pb.inc(1);
        }
        pb.finish_and_clear();

        tracing::info!(
            "Table '{}' saved to {}",
            settings.table,
            settings.database
        );
        Ok(WriteOutcome {
            writer: self.name().to_string(),
            destination: format!("{}#{}", settings.database, settings.table),
            rows: written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Table {
        Table::from_rows(
            vec![
                "estado".into(),
                "interior/metropolitana".into(),
                "data".into(),
                "casosNovos".into(),
            ],
            vec![
                vec![
                    "SP".into(),
                    "1".into(),
                    Value::Date(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()),
                    Value::Int(3),
                ],
                vec!["RJ".into(), "0".into(), Value::InvalidDate, Value::Int(5)],
                vec!["AM".into(), "0".into(), Value::InvalidDate, Value::Int(7)],
            ],
        )
        .unwrap()
    }

    fn settings(dir: &tempfile::TempDir, mode: SqlMode) -> SqlSettings {
        SqlSettings {
            database: dir.path().join("covid.db").to_str().unwrap().to_string(),
            table: "covid19_painel".to_string(),
            mode,
            batch_size: 2,
        }
    }

    fn count_rows(settings: &SqlSettings) -> i64 {
        let conn = Connection::open(&settings.database).unwrap();
        conn.query_row("SELECT COUNT(*) FROM covid19_painel", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_append_adds_rows_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir, SqlMode::Append);
        let writer = SqlTableWriter::new(settings.clone());

        assert_eq!(writer.write(&sample()).unwrap().rows, 3);
        writer.write(&sample()).unwrap();
        assert_eq!(count_rows(&settings), 6);
    }

    #[test]
    fn test_replace_keeps_one_copy() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir, SqlMode::Replace);
        let writer = SqlTableWriter::new(settings.clone());

        writer.write(&sample()).unwrap();
        writer.write(&sample()).unwrap();
        assert_eq!(count_rows(&settings), 3);
    }

    #[test]
    fn test_values_are_stored_with_sql_types() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir, SqlMode::Replace);
        SqlTableWriter::new(settings.clone()).write(&sample()).unwrap();

        let conn = Connection::open(&settings.database).unwrap();
        let (date, area, cases): (String, String, i64) = conn
            .query_row(
                "SELECT data, \"interior/metropolitana\", casosNovos FROM covid19_painel WHERE estado = 'SP'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(date, "2020-03-01");
        assert_eq!(area, "1");
        assert_eq!(cases, 3);

        let invalid: Option<String> = conn
            .query_row(
                "SELECT data FROM covid19_painel WHERE estado = 'RJ'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!(invalid.is_none());
    }

    #[test]
    fn test_insert_sql_quotes_identifiers() {
        let sql = insert_sql("covid19_painel", &sample());
        assert_eq!(
            sql,
            "INSERT INTO \"covid19_painel\" (\"estado\", \"interior/metropolitana\", \"data\", \"casosNovos\") VALUES (?1, ?2, ?3, ?4)"
        );
    }
}
