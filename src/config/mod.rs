pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::domain::locale::Locale;
#[cfg(feature = "cli")]
use crate::domain::settings::{
    CleanOptions, OutputSettings, PopulationFallback, SourceSettings, SqlMode, SqlSettings,
    DEFAULT_CSV_CHUNK_SIZE, DEFAULT_FOCUS_CITY, DEFAULT_INPUT_DIR, DEFAULT_SQL_BATCH_SIZE,
};
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_positive_number,
    validate_regex, validate_sql_identifier, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "covidbr-etl")]
#[command(about = "Consolidates the HIST_PAINEL_COVIDBR exports into CSV, Parquet and SQLite")]
pub struct CliConfig {
    /// ZIP archive to unpack into --input-dir before loading
    #[arg(long)]
    pub archive: Option<String>,

    #[arg(long, default_value = DEFAULT_INPUT_DIR)]
    pub input_dir: String,

    /// Regex the input file names must match
    #[arg(long, default_value = crate::domain::schema::DEFAULT_FILE_PATTERN)]
    pub file_pattern: String,

    #[arg(long)]
    pub csv_output: Option<String>,

    #[arg(long)]
    pub parquet_output: Option<String>,

    /// SQLite database file; enables the SQL output
    #[arg(long)]
    pub sqlite_db: Option<String>,

    #[arg(long, default_value = crate::domain::schema::DEFAULT_TABLE_NAME)]
    pub table_name: String,

    #[arg(long, value_enum, default_value_t = SqlMode::Append)]
    pub sql_mode: SqlMode,

    #[arg(long, default_value_t = DEFAULT_SQL_BATCH_SIZE)]
    pub sql_batch_size: usize,

    #[arg(long, default_value_t = DEFAULT_CSV_CHUNK_SIZE)]
    pub csv_chunk_size: usize,

    /// Language of the placeholder values written into missing fields
    #[arg(long, value_enum, default_value_t = Locale::En)]
    pub locale: Locale,

    #[arg(long, value_enum, default_value_t = PopulationFallback::Keep)]
    pub population_fallback: PopulationFallback,

    /// JSON file with the cleaning summary and dashboard aggregates
    #[arg(long)]
    pub report_output: Option<String>,

    /// Municipality whose daily series goes into the report
    #[arg(long, default_value = DEFAULT_FOCUS_CITY)]
    pub focus_city: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory after each phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn source(&self) -> SourceSettings {
        SourceSettings {
            archive: self.archive.clone(),
            input_dir: self.input_dir.clone(),
            file_pattern: self.file_pattern.clone(),
        }
    }

    fn cleaning(&self) -> CleanOptions {
        CleanOptions {
            locale: self.locale,
            population_fallback: self.population_fallback,
        }
    }

    fn outputs(&self) -> OutputSettings {
        OutputSettings {
            csv: self.csv_output.clone(),
            csv_chunk_size: self.csv_chunk_size,
            parquet: self.parquet_output.clone(),
            sql: self.sqlite_db.as_ref().map(|db| SqlSettings {
                database: db.clone(),
                table: self.table_name.clone(),
                mode: self.sql_mode,
                batch_size: self.sql_batch_size,
            }),
            report: self.report_output.clone(),
            focus_city: self.focus_city.clone(),
        }
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input_dir", &self.input_dir)?;
        validate_regex("file_pattern", &self.file_pattern)?;
        if let Some(archive) = &self.archive {
            validate_file_extension("archive", archive, &["zip"])?;
        }
        if let Some(path) = &self.csv_output {
            validate_path("csv_output", path)?;
        }
        if let Some(path) = &self.parquet_output {
            validate_path("parquet_output", path)?;
        }
        if let Some(path) = &self.sqlite_db {
            validate_path("sqlite_db", path)?;
        }
        if let Some(path) = &self.report_output {
            validate_path("report_output", path)?;
        }
        validate_non_empty_string("focus_city", &self.focus_city)?;
        validate_sql_identifier("table_name", &self.table_name)?;
        validate_positive_number("sql_batch_size", self.sql_batch_size, 1)?;
        validate_positive_number("csv_chunk_size", self.csv_chunk_size, 1)?;
        Ok(())
    }
}
