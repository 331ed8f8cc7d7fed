use crate::core::ConfigProvider;
use crate::domain::locale::Locale;
use crate::domain::schema::DEFAULT_FILE_PATTERN;
use crate::domain::settings::{
    CleanOptions, OutputSettings, PopulationFallback, SourceSettings, SqlSettings,
    DEFAULT_CSV_CHUNK_SIZE, DEFAULT_FOCUS_CITY, DEFAULT_INPUT_DIR,
};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_positive_number,
    validate_regex, validate_sql_identifier, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub archive: Option<String>,
    #[serde(default = "default_input_dir")]
    pub input_dir: String,
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            archive: None,
            input_dir: default_input_dir(),
            file_pattern: default_file_pattern(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub population_fallback: PopulationFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub csv: Option<String>,
    pub csv_chunk_size: Option<usize>,
    pub parquet: Option<String>,
    pub report: Option<String>,
    pub focus_city: Option<String>,
    pub sql: Option<SqlSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    /// `compact` (default) or `json`.
    pub log_format: Option<String>,
}

fn default_input_dir() -> String {
    DEFAULT_INPUT_DIR.to_string()
}

fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_string()
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validate_path("source.input_dir", &self.source.input_dir)?;
        validate_regex("source.file_pattern", &self.source.file_pattern)?;
        if let Some(archive) = &self.source.archive {
            validate_file_extension("source.archive", archive, &["zip"])?;
        }

        if let Some(csv) = &self.load.csv {
            validate_path("load.csv", csv)?;
        }
        if let Some(chunk) = self.load.csv_chunk_size {
            validate_positive_number("load.csv_chunk_size", chunk, 1)?;
        }
        if let Some(parquet) = &self.load.parquet {
            validate_path("load.parquet", parquet)?;
        }
        if let Some(report) = &self.load.report {
            validate_path("load.report", report)?;
        }
        if let Some(city) = &self.load.focus_city {
            validate_non_empty_string("load.focus_city", city)?;
        }
        if let Some(sql) = &self.load.sql {
            validate_path("load.sql.database", &sql.database)?;
            validate_sql_identifier("load.sql.table", &sql.table)?;
            validate_positive_number("load.sql.batch_size", sql.batch_size, 1)?;
        }

        if let Some(format) = self.log_format() {
            if !["compact", "json"].contains(&format) {
                return Err(EtlError::InvalidConfigValueError {
                    field: "monitoring.log_format".to_string(),
                    value: format.to_string(),
                    reason: "Unsupported format. Valid formats: compact, json".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    pub fn log_format(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_format.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn source(&self) -> SourceSettings {
        SourceSettings {
            archive: self.source.archive.clone(),
            input_dir: self.source.input_dir.clone(),
            file_pattern: self.source.file_pattern.clone(),
        }
    }

    fn cleaning(&self) -> CleanOptions {
        CleanOptions {
            locale: self.transform.locale,
            population_fallback: self.transform.population_fallback,
        }
    }

    fn outputs(&self) -> OutputSettings {
        OutputSettings {
            csv: self.load.csv.clone(),
            csv_chunk_size: self.load.csv_chunk_size.unwrap_or(DEFAULT_CSV_CHUNK_SIZE),
            parquet: self.load.parquet.clone(),
            sql: self.load.sql.clone(),
            report: self.load.report.clone(),
            focus_city: self
                .load
                .focus_city
                .clone()
                .unwrap_or_else(|| DEFAULT_FOCUS_CITY.to_string()),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::SqlMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[pipeline]
name = "covid19-brasil"
version = "1.0.0"

[source]
archive = "data/HIST_PAINEL_COVIDBR.zip"

[transform]
locale = "pt"
population_fallback = "global"

[load]
csv = "output/covid19_brasil_consolidado.csv"
parquet = "output/covid19_brasil_consolidado.parquet"

[load.sql]
database = "covid19_brasil.db"
mode = "replace"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.pipeline.name, "covid19-brasil");
        assert_eq!(config.source().input_dir, "./output");
        assert_eq!(config.source().file_pattern, DEFAULT_FILE_PATTERN);
        assert_eq!(config.cleaning().locale, Locale::Pt);
        assert_eq!(
            config.cleaning().population_fallback,
            PopulationFallback::Global
        );

        let outputs = config.outputs();
        assert_eq!(outputs.csv_chunk_size, DEFAULT_CSV_CHUNK_SIZE);
        assert_eq!(outputs.focus_city, DEFAULT_FOCUS_CITY);
        let sql = outputs.sql.unwrap();
        assert_eq!(sql.table, "covid19_painel");
        assert_eq!(sql.mode, SqlMode::Replace);
        assert_eq!(sql.batch_size, 50_000);
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("COVIDBR_TEST_INPUT_DIR", "/data/covid");

        let toml_content = r#"
[pipeline]
name = "test"
version = "1.0"

[source]
input_dir = "${COVIDBR_TEST_INPUT_DIR}"

[load]
report = "${COVIDBR_TEST_UNSET_VAR}/run.json"
focus_city = "Manaus"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.source.input_dir, "/data/covid");
        assert_eq!(
            config.load.report.as_deref(),
            Some("${COVIDBR_TEST_UNSET_VAR}/run.json")
        );
        assert_eq!(config.outputs().focus_city, "Manaus");
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pipeline.version, "1.0.0");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_table = BASIC.replace(
            "mode = \"replace\"",
            "mode = \"replace\"\ntable = \"drop table\"",
        );
        let config = TomlConfig::from_toml_str(&bad_table).unwrap();
        assert!(config.validate().is_err());

        let bad_format = format!("{}\n[monitoring]\nenabled = true\nlog_format = \"xml\"\n", BASIC);
        let config = TomlConfig::from_toml_str(&bad_format).unwrap();
        assert!(config.monitoring_enabled());
        assert!(matches!(
            config.validate(),
            Err(EtlError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_unknown_sql_mode_is_a_parse_error() {
        let config = BASIC.replace("mode = \"replace\"", "mode = \"upsert\"");
        assert!(matches!(
            TomlConfig::from_toml_str(&config),
            Err(EtlError::ConfigValidationError { .. })
        ));
    }
}
