use crate::utils::error::{EtlError, Result};
use regex::Regex;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    validate_path(field_name, file)?;

    let extension = std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        })?;

    if !allowed_extensions.contains(&extension) {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        });
    }

    Ok(())
}

pub fn validate_regex(field_name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| EtlError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: pattern.to_string(),
        reason: format!("Invalid regular expression: {}", e),
    })
}

/// SQL table names are interpolated into statements, so only plain identifiers pass.
pub fn validate_sql_identifier(field_name: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Only letters, digits and '_' are allowed, not starting with a digit"
                .to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("sql_batch_size", 5, 1).is_ok());
        assert!(validate_positive_number("sql_batch_size", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("csv_output", "out/data.csv", &["csv"]).is_ok());
        assert!(validate_file_extension("csv_output", "out/data.txt", &["csv"]).is_err());
        assert!(validate_file_extension("csv_output", "out/data", &["csv"]).is_err());
    }

    #[test]
    fn test_validate_regex() {
        assert!(validate_regex("file_pattern", r"^HIST_PAINEL_COVIDBR_.*\.csv$").is_ok());
        assert!(validate_regex("file_pattern", "([").is_err());
    }

    #[test]
    fn test_validate_sql_identifier() {
        assert!(validate_sql_identifier("table_name", "covid19_painel").is_ok());
        assert!(validate_sql_identifier("table_name", "_staging").is_ok());
        assert!(validate_sql_identifier("table_name", "1table").is_err());
        assert!(validate_sql_identifier("table_name", "x; DROP TABLE y").is_err());
        assert!(validate_sql_identifier("table_name", "").is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("input_dir", "./output").is_ok());
        assert!(validate_path("input_dir", "").is_err());
        assert!(validate_non_empty_string("table_name", "  ").is_err());
    }
}
