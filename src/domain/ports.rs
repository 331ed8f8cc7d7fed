use crate::domain::model::{Table, TransformResult};
use crate::domain::settings::{CleanOptions, OutputSettings, SourceSettings};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// File names (not paths) directly inside `dir`.
    fn list_files(&self, dir: &str)
        -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn source(&self) -> SourceSettings;
    fn cleaning(&self) -> CleanOptions;
    fn outputs(&self) -> OutputSettings;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Table>;
    async fn transform(&self, table: Table) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<LoadReport>;
}

/// A sink for the cleaned table. Each writer runs on its own; one failing does not stop the others.
pub trait TableWriter: Send + Sync {
    fn name(&self) -> &'static str;
    fn write(&self, table: &Table) -> Result<WriteOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub writer: String,
    pub destination: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub outputs: Vec<WriteOutcome>,
}
