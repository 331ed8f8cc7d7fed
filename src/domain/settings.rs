use crate::domain::locale::Locale;
use crate::domain::schema::{DEFAULT_FILE_PATTERN, DEFAULT_TABLE_NAME};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INPUT_DIR: &str = "./output";
pub const DEFAULT_CSV_CHUNK_SIZE: usize = 100_000;
pub const DEFAULT_SQL_BATCH_SIZE: usize = 50_000;
pub const DEFAULT_FOCUS_CITY: &str = "São Paulo";

/// What to do when a state has no population value to take a median from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum PopulationFallback {
    /// Leave the nulls in place and report the state.
    #[default]
    Keep,
    /// Use the median over every state.
    Global,
    /// Abort the run.
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SqlMode {
    #[default]
    Append,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// ZIP archive to unpack into `input_dir` before loading.
    pub archive: Option<String>,
    pub input_dir: String,
    pub file_pattern: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            archive: None,
            input_dir: DEFAULT_INPUT_DIR.to_string(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    pub locale: Locale,
    pub population_fallback: PopulationFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlSettings {
    pub database: String,
    #[serde(default = "default_table_name")]
    pub table: String,
    #[serde(default)]
    pub mode: SqlMode,
    #[serde(default = "default_sql_batch_size")]
    pub batch_size: usize,
}

impl SqlSettings {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: default_table_name(),
            mode: SqlMode::default(),
            batch_size: DEFAULT_SQL_BATCH_SIZE,
        }
    }
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_sql_batch_size() -> usize {
    DEFAULT_SQL_BATCH_SIZE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub csv: Option<String>,
    pub csv_chunk_size: usize,
    pub parquet: Option<String>,
    pub sql: Option<SqlSettings>,
    /// JSON run report with the summary and dashboard aggregates.
    pub report: Option<String>,
    /// Municipality whose daily series the report carries.
    pub focus_city: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            csv: None,
            csv_chunk_size: DEFAULT_CSV_CHUNK_SIZE,
            parquet: None,
            sql: None,
            report: None,
            focus_city: DEFAULT_FOCUS_CITY.to_string(),
        }
    }
}

impl OutputSettings {
    pub fn is_empty(&self) -> bool {
        self.csv.is_none() && self.parquet.is_none() && self.sql.is_none() && self.report.is_none()
    }
}
