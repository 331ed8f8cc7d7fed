use crate::adapters::writers_for;
use crate::core::cleaner::Cleaner;
use crate::core::loader::{extract_archive, load_files};
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{Table, TransformResult};
use crate::domain::ports::LoadReport;
use crate::domain::report::{build_dashboard, RunReport, DEFAULT_TOP_N};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_regex;

/// Archive -> CSV files -> canonical table -> configured sinks.
pub struct CovidPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> CovidPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    async fn write_report(
        &self,
        path: &str,
        focus_city: &str,
        result: &TransformResult,
    ) -> Result<()> {
        let sentinels = self.config.cleaning().locale.sentinels();
        let report = RunReport {
            summary: result.summary.clone(),
            dashboard: build_dashboard(&result.table, sentinels, DEFAULT_TOP_N, focus_city),
        };
        let json = serde_json::to_vec_pretty(&report)?;
        self.storage.write_file(path, &json).await?;
        tracing::info!("Run report saved to {}", path);
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for CovidPipeline<S, C> {
    async fn extract(&self) -> Result<Table> {
        let source = self.config.source();
        let pattern = validate_regex("file_pattern", &source.file_pattern)?;

        if let Some(archive) = &source.archive {
            let extracted =
                extract_archive(&self.storage, archive, &source.input_dir, &pattern).await?;
            if extracted.is_empty() {
                tracing::warn!("Archive {} held no file matching the pattern", archive);
            }
        }

        load_files(&self.storage, &source.input_dir, &pattern).await
    }

    async fn transform(&self, table: Table) -> Result<TransformResult> {
        Cleaner::new(self.config.cleaning()).clean(table)
    }

    async fn load(&self, result: TransformResult) -> Result<LoadReport> {
        let outputs = self.config.outputs();
        if outputs.is_empty() {
            tracing::warn!("No output configured; the cleaned table is discarded");
        }

        let mut report = LoadReport::default();
        let mut failures = Vec::new();

        for writer in writers_for(&outputs) {
            match writer.write(&result.table) {
                Ok(outcome) => report.outputs.push(outcome),
                Err(e) => {
                    tracing::error!("{} writer failed: {}", writer.name(), e);
                    failures.push(format!("{}: {}", writer.name(), e));
                }
            }
        }

        if let Some(path) = &outputs.report {
            if let Err(e) = self.write_report(path, &outputs.focus_city, &result).await {
                tracing::error!("report writer failed: {}", e);
                failures.push(format!("report: {}", e));
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(EtlError::WritersFailed { failures })
        }
    }
}
