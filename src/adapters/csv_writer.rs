use crate::adapters::write_atomically;
use crate::domain::model::Table;
use crate::domain::ports::{TableWriter, WriteOutcome};
use crate::utils::error::Result;
use crate::utils::progress::{chunk_count, create_progress_bar};
use std::io::BufWriter;

/// `;`-separated UTF-8 text with a header row, streamed out in row chunks.
#[derive(Debug, Clone)]
pub struct CsvTableWriter {
    path: String,
    chunk_size: usize,
}

impl CsvTableWriter {
    pub fn new(path: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl TableWriter for CsvTableWriter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write(&self, table: &Table) -> Result<WriteOutcome> {
        tracing::info!("Saving consolidated dataset to {}", self.path);

        write_atomically(&self.path, |file| {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(b';')
                .from_writer(BufWriter::new(file));
            writer.write_record(table.columns())?;

            let chunks = chunk_count(table.len(), self.chunk_size);
            let pb = create_progress_bar(chunks as u64, "chunks", Some("Saving CSV"));
            for chunk in table.rows().chunks(self.chunk_size) {
                for row in chunk {
                    writer.write_record(row.values.iter().map(|v| v.to_string()))?;
                }
                writer.flush()?;
                pb.inc(1);
            }
            pb.finish_and_clear();

            writer.flush()?;
            Ok(())
        })?;

        let size_mb = std::fs::metadata(&self.path)
            .map(|m| m.len() as f64 / 1024.0 / 1024.0)
            .unwrap_or(0.0);
        tracing::info!("CSV saved: {} rows, {:.2} MB", table.len(), size_mb);

        Ok(WriteOutcome {
            writer: self.name().to_string(),
            destination: self.path.clone(),
            rows: table.len(),
        })
    }
}
