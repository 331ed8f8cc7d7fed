use crate::domain::model::{Table, Value};
use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use crate::utils::progress::create_progress_bar;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Rows of one delimited file, typed but not yet aligned with the other files.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// An absent archive or input directory is missing input, not a system failure.
fn source_not_found(path: &str) -> impl FnOnce(EtlError) -> EtlError + '_ {
    move |err| match err {
        EtlError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
            EtlError::InputNotFound {
                path: path.to_string(),
            }
        }
        other => other,
    }
}

pub fn join_path(dir: &str, name: &str) -> String {
    Path::new(dir).join(name).to_string_lossy().into_owned()
}

/// Entries of a ZIP archive whose file name matches `pattern`, flattened to their file names.
pub fn read_archive_entries(bytes: Vec<u8>, pattern: &Regex) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let Some(path) = file.enclosed_name() else {
            tracing::warn!("Skipping archive entry with unsafe path: {}", file.name());
            continue;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !pattern.is_match(&name) {
            tracing::debug!("Skipping archive entry {}", name);
            continue;
        }

        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        entries.push((name, data));
    }

    Ok(entries)
}

/// Unpacks the matching CSV files of `archive` into `target_dir`; returns their names.
pub async fn extract_archive<S: Storage>(
    storage: &S,
    archive: &str,
    target_dir: &str,
    pattern: &Regex,
) -> Result<Vec<String>> {
    tracing::info!("Extracting files from: {}", archive);
    let bytes = storage
        .read_file(archive)
        .await
        .map_err(source_not_found(archive))?;
    let entries = read_archive_entries(bytes, pattern)?;

    let mut names = Vec::with_capacity(entries.len());
    for (name, data) in entries {
        storage.write_file(&join_path(target_dir, &name), &data).await?;
        names.push(name);
    }

    tracing::info!(
        "Extraction completed. {} file(s) saved to: {}",
        names.len(),
        target_dir
    );
    Ok(names)
}

/// Parses one `;`-separated UTF-8 file with a header row.
pub fn parse_csv(name: &str, bytes: &[u8]) -> Result<ParsedFile> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Value::parse_cell).collect());
    }

    Ok(ParsedFile {
        name: name.to_string(),
        headers,
        rows,
    })
}

/// Stacks files on top of each other. Columns are the union of all headers in
/// order of first appearance; a file without a column contributes nulls.
pub fn concat(files: Vec<ParsedFile>) -> Result<Table> {
    let mut columns: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for file in &files {
        for header in &file.headers {
            if !positions.contains_key(header) {
                positions.insert(header.clone(), columns.len());
                columns.push(header.clone());
            }
        }
    }

    let width = columns.len();
    let mut table = Table::new(columns);
    for file in files {
        let targets: Vec<usize> = file.headers.iter().map(|h| positions[h]).collect();
        for row in file.rows {
            let mut values = vec![Value::Null; width];
            for (value, &target) in row.into_iter().zip(&targets) {
                values[target] = value;
            }
            table.push_row(values)?;
        }
    }

    Ok(table)
}

/// Reads every file of `dir` matching `pattern`, in file-name order, into one table.
pub async fn load_files<S: Storage>(storage: &S, dir: &str, pattern: &Regex) -> Result<Table> {
    let mut names: Vec<String> = storage
        .list_files(dir)
        .await
        .map_err(source_not_found(dir))?
        .into_iter()
        .filter(|name| pattern.is_match(name))
        .collect();
    names.sort();

    if names.is_empty() {
        return Err(EtlError::NoInputFiles {
            dir: dir.to_string(),
            pattern: pattern.as_str().to_string(),
        });
    }
    tracing::info!("{} CSV file(s) found", names.len());

    let pb = create_progress_bar(names.len() as u64, "files", Some("Reading CSV files"));
    let mut files = Vec::with_capacity(names.len());
    for name in &names {
        let bytes = storage.read_file(&join_path(dir, name)).await?;
        let parsed = parse_csv(name, &bytes)?;
        tracing::debug!("Read {} ({} rows)", name, parsed.rows.len());
        files.push(parsed);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let table = concat(files)?;
    tracing::info!(
        "Unified dataset: {} rows × {} columns",
        table.len(),
        table.columns().len()
    );
    Ok(table)
}
