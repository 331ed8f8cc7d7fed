//! Turns the concatenated export into the canonical table.
//!
//! The steps run in a fixed order because each one relies on the previous:
//! dates are parsed before the sort, the sort happens before the fills, and
//! the population median is grouped by the already filled state code.

use crate::domain::locale::Sentinels;
use crate::domain::model::{CleanSummary, Record, Table, TransformResult, Value};
use crate::domain::schema::{
    AREA_CLASSIFICATION, CITY, COUNTER_COLUMNS, DATE, HEALTH_REGION_CODE, HEALTH_REGION_NAME,
    LEGACY_COLUMNS, POPULATION_2019, REQUIRED_COLUMNS, STATE,
};
use crate::domain::settings::{CleanOptions, PopulationFallback};
use crate::utils::error::{EtlError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Cleaner {
    options: CleanOptions,
}

impl Cleaner {
    pub fn new(options: CleanOptions) -> Self {
        Self { options }
    }

    pub fn clean(&self, mut table: Table) -> Result<TransformResult> {
        check_required_columns(&table)?;
        let sentinels = self.options.locale.sentinels();
        let input_rows = table.len();

        let invalid_dates = normalize_dates(&mut table);
        tracing::debug!("Parsed dates, {} invalid", invalid_dates);

        sort_rows(&mut table, sentinels);
        fill_categoricals(&mut table, sentinels);

        let unresolved = impute_population(&mut table, self.options.population_fallback)?;
        if !unresolved.is_empty() {
            tracing::warn!(
                "No population data to impute from for state(s): {}",
                unresolved.join(", ")
            );
        }

        let unparsable_counters = zero_fill_counters(&mut table);
        if unparsable_counters > 0 {
            tracing::warn!(
                "{} counter value(s) could not be parsed and were set to 0",
                unparsable_counters
            );
        }

        let dropped = drop_legacy_columns(&mut table);
        if !dropped.is_empty() {
            tracing::debug!("Dropped legacy columns: {}", dropped.join(", "));
        }

        debug_assert_eq!(table.len(), input_rows);

        let summary = CleanSummary {
            invalid_dates,
            unresolved_population_states: unresolved,
            unparsable_counters,
            dropped_columns: dropped,
            ..summarize(&table)
        };
        log_summary(&summary);

        Ok(TransformResult { table, summary })
    }
}

pub fn check_required_columns(table: &Table) -> Result<()> {
    for column in REQUIRED_COLUMNS {
        if !table.has_column(column) {
            return Err(EtlError::MissingColumn {
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

pub fn parse_date(value: &Value) -> Value {
    let raw = match value {
        Value::Date(_) | Value::InvalidDate => return value.clone(),
        Value::Text(s) => s.trim().to_string(),
        Value::Int(i) => i.to_string(),
        Value::Null | Value::Float(_) => return Value::InvalidDate,
    };

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&raw, format) {
            return Value::Date(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(&raw, format) {
            return Value::Date(datetime.date());
        }
    }
    Value::InvalidDate
}

/// Parses the date column in place; returns how many rows got the invalid-date sentinel.
pub fn normalize_dates(table: &mut Table) -> usize {
    let Some(idx) = table.column_index(DATE) else {
        return 0;
    };
    let mut invalid = 0;
    for row in table.rows_mut() {
        let parsed = parse_date(&row.values[idx]);
        if parsed == Value::InvalidDate {
            invalid += 1;
        }
        row.values[idx] = parsed;
    }
    invalid
}

fn key_text<'a>(row: &'a Record, idx: Option<usize>, missing: &'a str) -> Cow<'a, str> {
    idx.and_then(|i| row.get(i).as_text())
        .unwrap_or(Cow::Borrowed(missing))
}

/// Stable sort by (state, city, date). Missing state and city sort as the
/// placeholder they will be filled with, so the order survives the fill.
pub fn sort_rows(table: &mut Table, sentinels: &Sentinels) {
    let state = table.column_index(STATE);
    let city = table.column_index(CITY);
    let date = table.column_index(DATE);

    table.sort_rows_by(|a, b| {
        key_text(a, state, sentinels.state)
            .cmp(&key_text(b, state, sentinels.state))
            .then_with(|| key_text(a, city, sentinels.city).cmp(&key_text(b, city, sentinels.city)))
            .then_with(|| match date {
                Some(i) => a.get(i).cmp_as_date(b.get(i)),
                None => Ordering::Equal,
            })
    });
}

pub fn fill_categoricals(table: &mut Table, sentinels: &Sentinels) {
    let state = table.column_index(STATE);
    let city = table.column_index(CITY);
    let region_name = table.column_index(HEALTH_REGION_NAME);
    let region_code = table.column_index(HEALTH_REGION_CODE);
    let area = table.column_index(AREA_CLASSIFICATION);

    for row in table.rows_mut() {
        for (idx, placeholder) in [
            (state, sentinels.state),
            (city, sentinels.city),
            (region_name, sentinels.health_region_name),
        ] {
            if let Some(i) = idx {
                if row.values[i].is_null() {
                    row.values[i] = Value::Text(placeholder.to_string());
                }
            }
        }

        if let Some(i) = region_code {
            let cell = &mut row.values[i];
            match *cell {
                Value::Null => *cell = Value::Int(sentinels.health_region_code),
                Value::Float(_) => {
                    if let Some(code) = cell.as_i64() {
                        *cell = Value::Int(code);
                    }
                }
                _ => {}
            }
        }

        // Arrives as 0/1 codes in some exports and words in others.
        if let Some(i) = area {
            let text = row.values[i]
                .as_text()
                .map(|s| s.into_owned())
                .unwrap_or_else(|| sentinels.area_classification.to_string());
            row.values[i] = Value::Text(text);
        }
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn number_value(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
        Value::Int(x as i64)
    } else {
        Value::Float(x)
    }
}

/// Fills missing population values with the median of their state group.
///
/// Returns the states that still have missing values because the group had
/// nothing to take a median from (only with [`PopulationFallback::Keep`], or
/// `Global` on a table without any population value at all).
pub fn impute_population(table: &mut Table, fallback: PopulationFallback) -> Result<Vec<String>> {
    let (Some(pop), Some(state)) = (
        table.column_index(POPULATION_2019),
        table.column_index(STATE),
    ) else {
        return Ok(Vec::new());
    };

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut missing_states: HashSet<String> = HashSet::new();
    for row in table.rows() {
        let key = row.get(state).as_text().unwrap_or_default().into_owned();
        let values = groups.entry(key.clone()).or_default();
        match row.get(pop).as_f64() {
            Some(x) => values.push(x),
            None => {
                missing_states.insert(key);
            }
        }
    }

    if missing_states.is_empty() {
        return Ok(Vec::new());
    }

    let global = match fallback {
        PopulationFallback::Global => {
            let mut all: Vec<f64> = groups.values().flatten().copied().collect();
            median(&mut all)
        }
        _ => None,
    };

    let medians: BTreeMap<String, Option<f64>> = groups
        .into_iter()
        .map(|(key, mut values)| (key, median(&mut values).or(global)))
        .collect();

    let mut unresolved: Vec<String> = missing_states
        .iter()
        .filter(|s| medians.get(*s).copied().flatten().is_none())
        .cloned()
        .collect();
    unresolved.sort();

    if fallback == PopulationFallback::Fail && !unresolved.is_empty() {
        return Err(EtlError::UnresolvedPopulation { states: unresolved });
    }

    for row in table.rows_mut() {
        if row.values[pop].as_f64().is_some() {
            continue;
        }
        let fill = {
            let key = row.values[state].as_text().unwrap_or_default();
            medians.get(key.as_ref()).copied().flatten()
        };
        if let Some(m) = fill {
            row.values[pop] = number_value(m);
        }
    }

    Ok(unresolved)
}

/// Replaces missing counters with 0. Negative values are kept as they are.
/// A cell that is not a whole number, `2.5` included, is counted and set to 0.
/// Returns that count.
pub fn zero_fill_counters(table: &mut Table) -> usize {
    let indices: Vec<usize> = COUNTER_COLUMNS
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();

    let mut unparsable = 0;
    for row in table.rows_mut() {
        for &i in &indices {
            let cell = &mut row.values[i];
            match *cell {
                Value::Null => *cell = Value::Int(0),
                Value::Int(_) => {}
                Value::Float(_) => match cell.as_i64() {
                    Some(n) => *cell = Value::Int(n),
                    None => {
                        unparsable += 1;
                        *cell = Value::Int(0);
                    }
                },
                Value::Text(_) | Value::Date(_) | Value::InvalidDate => {
                    unparsable += 1;
                    *cell = Value::Int(0);
                }
            }
        }
    }
    unparsable
}

pub fn drop_legacy_columns(table: &mut Table) -> Vec<String> {
    table.drop_columns(&LEGACY_COLUMNS)
}

/// Date range, distinct states/cities and row count of a cleaned table.
pub fn summarize(table: &Table) -> CleanSummary {
    let mut first_date: Option<NaiveDate> = None;
    let mut last_date: Option<NaiveDate> = None;
    if let Some(dates) = table.column(DATE) {
        for date in dates.filter_map(Value::as_date) {
            first_date = Some(first_date.map_or(date, |d| d.min(date)));
            last_date = Some(last_date.map_or(date, |d| d.max(date)));
        }
    }

    let distinct = |column: &str| -> usize {
        table
            .column(column)
            .map(|values| {
                values
                    .filter_map(|v| v.as_text())
                    .collect::<HashSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    };

    CleanSummary {
        first_date,
        last_date,
        distinct_states: distinct(STATE),
        distinct_cities: distinct(CITY),
        total_rows: table.len(),
        ..CleanSummary::default()
    }
}

fn log_summary(summary: &CleanSummary) {
    match (summary.first_date, summary.last_date) {
        (Some(first), Some(last)) => tracing::info!("Period: {} → {}", first, last),
        _ => tracing::info!("Period: no valid dates"),
    }
    tracing::info!("Unique states: {}", summary.distinct_states);
    tracing::info!("Unique cities: {}", summary.distinct_cities);
    tracing::info!("Total rows: {}", summary.total_rows);
    if summary.invalid_dates > 0 {
        tracing::info!("Rows with invalid dates: {}", summary.invalid_dates);
    }
}
