use crate::core::Pipeline;
use crate::domain::ports::LoadReport;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<LoadReport> {
        tracing::info!("Starting COVID-19 consolidation");
        self.monitor.log_stats("start");

        // Extract
        tracing::info!("Extracting data...");
        let raw = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", raw.len());
        self.monitor.log_stats("extract");

        // Transform
        tracing::info!("Cleaning data...");
        let result = self.pipeline.transform(raw).await?;
        tracing::info!("Cleaned {} records", result.table.len());
        self.monitor.log_stats("transform");

        // Load
        tracing::info!("Saving outputs...");
        let report = self.pipeline.load(result).await?;
        for outcome in &report.outputs {
            tracing::info!(
                "{}: {} rows -> {}",
                outcome.writer,
                outcome.rows,
                outcome.destination
            );
        }
        self.monitor.log_stats("load");
        self.monitor.log_final_stats();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Table, TransformResult};
    use crate::domain::ports::WriteOutcome;
    use crate::utils::error::EtlError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPipeline {
        loads: AtomicUsize,
        fail_extract: bool,
    }

    #[async_trait::async_trait]
    impl Pipeline for CountingPipeline {
        async fn extract(&self) -> Result<Table> {
            if self.fail_extract {
                return Err(EtlError::NoInputFiles {
                    dir: "./output".into(),
                    pattern: ".*".into(),
                });
            }
            Table::from_rows(vec!["estado".into()], vec![vec!["SP".into()]])
        }

        async fn transform(&self, table: Table) -> Result<TransformResult> {
            Ok(TransformResult {
                table,
                summary: Default::default(),
            })
        }

        async fn load(&self, result: TransformResult) -> Result<LoadReport> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(LoadReport {
                outputs: vec![WriteOutcome {
                    writer: "csv".into(),
                    destination: "out.csv".into(),
                    rows: result.table.len(),
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_run_goes_through_all_phases() {
        let engine = EtlEngine::new(CountingPipeline::default());
        let report = engine.run().await.unwrap();
        assert_eq!(report.outputs[0].rows, 1);
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extract_failure_skips_load() {
        let engine = EtlEngine::new_with_monitoring(
            CountingPipeline {
                fail_extract: true,
                ..Default::default()
            },
            true,
        );
        assert!(engine.run().await.is_err());
        assert_eq!(engine.pipeline.loads.load(Ordering::SeqCst), 0);
    }
}
