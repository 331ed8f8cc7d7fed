//! Dashboard aggregates computed from the cleaned table.
//!
//! Rows with a negative daily case or death count are left out of every
//! aggregate, the same way the dashboard filters them at render time.

use crate::domain::locale::Sentinels;
use crate::domain::model::{CleanSummary, Record, Table};
use crate::domain::schema::{
    CITY, CUMULATIVE_CASES, CUMULATIVE_DEATHS, DATE, NEW_CASES, NEW_DEATHS, POPULATION_2019,
    REGION, STATE,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_TOP_N: usize = 10;

/// Daily counts at or above these caps are reporting backlogs, not a day's
/// activity, and are left out of the focus-city series.
pub const CITY_MAX_DAILY_CASES: i64 = 10_000;
pub const CITY_MAX_DAILY_DEATHS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Norte,
    Nordeste,
    CentroOeste,
    Sudeste,
    Sul,
}

impl Region {
    pub fn name(&self) -> &'static str {
        match self {
            Region::Norte => "Norte",
            Region::Nordeste => "Nordeste",
            Region::CentroOeste => "Centro-Oeste",
            Region::Sudeste => "Sudeste",
            Region::Sul => "Sul",
        }
    }
}

/// Macro-region of a state code; `None` for anything outside the 27 units.
pub fn region_of(state: &str) -> Option<Region> {
    match state {
        "AC" | "AM" | "AP" | "PA" | "RO" | "RR" | "TO" => Some(Region::Norte),
        "AL" | "BA" | "CE" | "MA" | "PB" | "PE" | "PI" | "RN" | "SE" => Some(Region::Nordeste),
        "DF" | "GO" | "MT" | "MS" => Some(Region::CentroOeste),
        "ES" | "MG" | "RJ" | "SP" => Some(Region::Sudeste),
        "PR" | "RS" | "SC" => Some(Region::Sul),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub new_cases: i64,
    pub new_deaths: i64,
    pub cases_mm7: f64,
    pub deaths_mm7: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityDaily {
    pub date: NaiveDate,
    pub new_cases: i64,
    pub new_deaths: i64,
    pub cases_mm7: f64,
    pub deaths_mm7: f64,
    pub cases_mm30: f64,
    pub deaths_mm30: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitySeries {
    pub city: String,
    pub daily: Vec<CityDaily>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionTotals {
    pub region: String,
    pub new_cases: i64,
    pub new_deaths: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityRanking {
    pub city: String,
    pub cumulative_cases: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateMortality {
    pub state: String,
    pub cumulative_deaths: i64,
    pub population: Option<f64>,
    pub deaths_per_100k: Option<f64>,
    /// Cumulative deaths as a percentage of the 2019 population.
    pub deaths_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub national_daily: Vec<DailyTotals>,
    pub focus_city: CitySeries,
    pub regions: Vec<RegionTotals>,
    pub top_cities: Vec<CityRanking>,
    pub mortality: Vec<StateMortality>,
    /// Unweighted mean of `deaths_percent` over the states that have one.
    pub national_mean_rate: Option<f64>,
}

/// Everything the run writes to its JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: CleanSummary,
    pub dashboard: DashboardReport,
}

fn rate(deaths: Option<f64>, population: Option<f64>, scale: f64) -> Option<f64> {
    let population = population.filter(|p| *p > 0.0)?;
    Some(deaths.unwrap_or(0.0) * scale / population)
}

/// Deaths per 100 000 inhabitants. A missing death count counts as zero; no population, no rate.
pub fn mortality_rate_per_100k(deaths: Option<f64>, population: Option<f64>) -> Option<f64> {
    rate(deaths, population, 100_000.0)
}

/// Same rules as [`mortality_rate_per_100k`], expressed in percent.
pub fn mortality_percent(deaths: Option<f64>, population: Option<f64>) -> Option<f64> {
    rate(deaths, population, 100.0)
}

/// Trailing mean over `window` points, averaging whatever is available at the start.
pub fn rolling_mean(series: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(series.len());
    let mut sum = 0.0;
    for (i, value) in series.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= series[i - window];
        }
        let n = (i + 1).min(window);
        out.push(sum / n as f64);
    }
    out
}

struct Columns {
    state: Option<usize>,
    city: Option<usize>,
    date: Option<usize>,
    region: Option<usize>,
    new_cases: Option<usize>,
    new_deaths: Option<usize>,
    cumulative_cases: Option<usize>,
    cumulative_deaths: Option<usize>,
    population: Option<usize>,
}

impl Columns {
    fn of(table: &Table) -> Self {
        Self {
            state: table.column_index(STATE),
            city: table.column_index(CITY),
            date: table.column_index(DATE),
            region: table.column_index(REGION),
            new_cases: table.column_index(NEW_CASES),
            new_deaths: table.column_index(NEW_DEATHS),
            cumulative_cases: table.column_index(CUMULATIVE_CASES),
            cumulative_deaths: table.column_index(CUMULATIVE_DEATHS),
            population: table.column_index(POPULATION_2019),
        }
    }
}

fn int_at(row: &Record, idx: Option<usize>) -> i64 {
    idx.and_then(|i| row.get(i).as_i64()).unwrap_or(0)
}

fn text_at(row: &Record, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row.get(i).as_text()).map(|s| s.into_owned())
}

fn reportable<'a>(table: &'a Table, cols: &'a Columns) -> impl Iterator<Item = &'a Record> + 'a {
    table
        .rows()
        .iter()
        .filter(move |row| int_at(row, cols.new_cases) >= 0 && int_at(row, cols.new_deaths) >= 0)
}

/// Sums daily cases and deaths per valid date. Saturates instead of overflowing.
fn sum_by_date<'a>(
    rows: impl Iterator<Item = &'a Record>,
    cols: &Columns,
) -> BTreeMap<NaiveDate, (i64, i64)> {
    let mut by_date: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for row in rows {
        let Some(date) = cols.date.and_then(|i| row.get(i).as_date()) else {
            continue;
        };
        let entry = by_date.entry(date).or_default();
        entry.0 = entry.0.saturating_add(int_at(row, cols.new_cases));
        entry.1 = entry.1.saturating_add(int_at(row, cols.new_deaths));
    }
    by_date
}

fn series(by_date: &BTreeMap<NaiveDate, (i64, i64)>) -> (Vec<f64>, Vec<f64>) {
    by_date
        .values()
        .map(|(cases, deaths)| (*cases as f64, *deaths as f64))
        .unzip()
}

pub fn national_daily(table: &Table) -> Vec<DailyTotals> {
    let cols = Columns::of(table);
    let by_date = sum_by_date(reportable(table, &cols), &cols);

    let (cases, deaths) = series(&by_date);
    let cases_mm7 = rolling_mean(&cases, 7);
    let deaths_mm7 = rolling_mean(&deaths, 7);

    by_date
        .into_iter()
        .enumerate()
        .map(|(i, (date, (new_cases, new_deaths)))| DailyTotals {
            date,
            new_cases,
            new_deaths,
            cases_mm7: cases_mm7[i],
            deaths_mm7: deaths_mm7[i],
        })
        .collect()
}

/// Daily series of one municipality with 7- and 30-day means. Days reported
/// at or above [`CITY_MAX_DAILY_CASES`] or [`CITY_MAX_DAILY_DEATHS`] are dropped.
pub fn city_daily(table: &Table, city: &str) -> Vec<CityDaily> {
    let cols = Columns::of(table);
    let rows = reportable(table, &cols).filter(|row| {
        text_at(row, cols.city).as_deref() == Some(city)
            && int_at(row, cols.new_cases) < CITY_MAX_DAILY_CASES
            && int_at(row, cols.new_deaths) < CITY_MAX_DAILY_DEATHS
    });
    let by_date = sum_by_date(rows, &cols);

    let (cases, deaths) = series(&by_date);
    let cases_mm7 = rolling_mean(&cases, 7);
    let deaths_mm7 = rolling_mean(&deaths, 7);
    let cases_mm30 = rolling_mean(&cases, 30);
    let deaths_mm30 = rolling_mean(&deaths, 30);

    by_date
        .into_iter()
        .enumerate()
        .map(|(i, (date, (new_cases, new_deaths)))| CityDaily {
            date,
            new_cases,
            new_deaths,
            cases_mm7: cases_mm7[i],
            deaths_mm7: deaths_mm7[i],
            cases_mm30: cases_mm30[i],
            deaths_mm30: deaths_mm30[i],
        })
        .collect()
}

/// Totals per macro-region; the `regiao` column wins over the state lookup when
/// present. States outside the five regions are grouped under `unknown_region`.
pub fn region_totals(table: &Table, unknown_region: &str) -> Vec<RegionTotals> {
    let cols = Columns::of(table);
    let mut totals: HashMap<String, (i64, i64)> = HashMap::new();
    for row in reportable(table, &cols) {
        let region = text_at(row, cols.region).unwrap_or_else(|| {
            let state = text_at(row, cols.state).unwrap_or_default();
            region_of(&state)
                .map_or(unknown_region, |r| r.name())
                .to_string()
        });
        let entry = totals.entry(region).or_default();
        entry.0 = entry.0.saturating_add(int_at(row, cols.new_cases));
        entry.1 = entry.1.saturating_add(int_at(row, cols.new_deaths));
    }

    let mut out: Vec<RegionTotals> = totals
        .into_iter()
        .map(|(region, (new_cases, new_deaths))| RegionTotals {
            region,
            new_cases,
            new_deaths,
        })
        .collect();
    out.sort_by(|a, b| b.new_cases.cmp(&a.new_cases).then_with(|| a.region.cmp(&b.region)));
    out
}

/// Cities ranked by their highest cumulative case count. Rows carrying the
/// missing-city placeholder are state or country aggregates and are skipped.
pub fn top_cities_by_cases(table: &Table, n: usize, missing_city: &str) -> Vec<CityRanking> {
    let cols = Columns::of(table);
    let mut best: HashMap<String, i64> = HashMap::new();
    for row in reportable(table, &cols) {
        let Some(city) = text_at(row, cols.city) else {
            continue;
        };
        if city == missing_city {
            continue;
        }
        let cases = int_at(row, cols.cumulative_cases);
        let entry = best.entry(city).or_insert(cases);
        *entry = (*entry).max(cases);
    }

    let mut out: Vec<CityRanking> = best
        .into_iter()
        .map(|(city, cumulative_cases)| CityRanking {
            city,
            cumulative_cases,
        })
        .collect();
    out.sort_by(|a, b| {
        b.cumulative_cases
            .cmp(&a.cumulative_cases)
            .then_with(|| a.city.cmp(&b.city))
    });
    out.truncate(n);
    out
}

/// Highest cumulative deaths and population per state, ranked by deaths.
pub fn mortality_by_state(table: &Table) -> Vec<StateMortality> {
    let cols = Columns::of(table);
    let mut per_state: HashMap<String, (i64, Option<f64>)> = HashMap::new();
    for row in reportable(table, &cols) {
        let Some(state) = text_at(row, cols.state) else {
            continue;
        };
        let deaths = int_at(row, cols.cumulative_deaths);
        let population = cols.population.and_then(|i| row.get(i).as_f64());
        let entry = per_state.entry(state).or_insert((deaths, population));
        entry.0 = entry.0.max(deaths);
        entry.1 = match (entry.1, population) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    let mut out: Vec<StateMortality> = per_state
        .into_iter()
        .map(|(state, (cumulative_deaths, population))| StateMortality {
            deaths_per_100k: mortality_rate_per_100k(Some(cumulative_deaths as f64), population),
            deaths_percent: mortality_percent(Some(cumulative_deaths as f64), population),
            state,
            cumulative_deaths,
            population,
        })
        .collect();
    out.sort_by(|a, b| {
        b.cumulative_deaths
            .cmp(&a.cumulative_deaths)
            .then_with(|| a.state.cmp(&b.state))
    });
    out
}

/// Mean of the per-state percentage rates; states without population are skipped.
pub fn national_mean_rate(mortality: &[StateMortality]) -> Option<f64> {
    let rates: Vec<f64> = mortality.iter().filter_map(|m| m.deaths_percent).collect();
    if rates.is_empty() {
        return None;
    }
    Some(rates.iter().sum::<f64>() / rates.len() as f64)
}

pub fn build_dashboard(
    table: &Table,
    sentinels: &Sentinels,
    top_n: usize,
    focus_city: &str,
) -> DashboardReport {
    let mortality = mortality_by_state(table);
    DashboardReport {
        national_daily: national_daily(table),
        focus_city: CitySeries {
            city: focus_city.to_string(),
            daily: city_daily(table, focus_city),
        },
        regions: region_totals(table, sentinels.region),
        top_cities: top_cities_by_cases(table, top_n, sentinels.city),
        national_mean_rate: national_mean_rate(&mortality),
        mortality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locale::Locale;
    use crate::domain::model::Value;

    fn date(d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(2021, 1, d).unwrap())
    }

    fn columns() -> Vec<String> {
        vec![
            STATE.into(),
            CITY.into(),
            DATE.into(),
            NEW_CASES.into(),
            NEW_DEATHS.into(),
            CUMULATIVE_CASES.into(),
            CUMULATIVE_DEATHS.into(),
            POPULATION_2019.into(),
        ]
    }

    fn daily_row(state: &str, city: &str, day: u32, cases: i64, deaths: i64) -> Vec<Value> {
        vec![
            state.into(),
            city.into(),
            date(day),
            Value::Int(cases),
            Value::Int(deaths),
            Value::Null,
            Value::Null,
            Value::Null,
        ]
    }

    fn sample() -> Table {
        Table::from_rows(
            columns(),
            vec![
                vec!["SP".into(), "Campinas".into(), date(1), Value::Int(10), Value::Int(1), Value::Int(10), Value::Int(1), Value::Int(1_000_000)],
                vec!["SP".into(), "Campinas".into(), date(2), Value::Int(5), Value::Int(0), Value::Int(15), Value::Int(1), Value::Int(1_000_000)],
                vec!["SP".into(), "São Paulo".into(), date(1), Value::Int(30), Value::Int(3), Value::Int(30), Value::Int(3), Value::Int(12_000_000)],
                vec!["SP".into(), "São Paulo".into(), date(2), Value::Int(-4), Value::Int(0), Value::Int(26), Value::Int(3), Value::Int(12_000_000)],
                vec!["AM".into(), "Manaus".into(), date(2), Value::Int(7), Value::Int(2), Value::Int(7), Value::Int(2), Value::Int(2_000_000)],
                vec!["BR".into(), "Not informed".into(), date(1), Value::Int(0), Value::Int(0), Value::Int(999), Value::Int(0), Value::Null],
            ],
        )
        .unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_rolling_mean_uses_partial_windows() {
        let mm = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(mm, vec![1.0, 1.5, 2.5, 3.5]);
        assert!(rolling_mean(&[], 7).is_empty());
    }

    #[test]
    fn test_mortality_rate_with_missing_deaths_is_zero() {
        assert_eq!(mortality_rate_per_100k(None, Some(2_000_000.0)), Some(0.0));
        assert_eq!(mortality_rate_per_100k(Some(20.0), Some(2_000_000.0)), Some(1.0));
        assert_eq!(mortality_rate_per_100k(Some(5.0), None), None);
        assert_eq!(mortality_rate_per_100k(Some(5.0), Some(0.0)), None);
        assert_eq!(mortality_percent(Some(50.0), Some(1_000.0)), Some(5.0));
        assert_eq!(mortality_percent(None, Some(1_000.0)), Some(0.0));
    }

    #[test]
    fn test_national_daily_skips_negative_rows() {
        let daily = national_daily(&sample());
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].new_cases, 40);
        // São Paulo's -4 row is excluded
        assert_eq!(daily[1].new_cases, 12);
        assert_eq!(daily[1].cases_mm7, 26.0);
    }

    #[test]
    fn test_daily_sums_saturate_instead_of_overflowing() {
        let table = Table::from_rows(
            columns(),
            vec![
                daily_row("SP", "Campinas", 1, i64::MAX, i64::MAX),
                daily_row("SP", "Santos", 1, 1, 1),
            ],
        )
        .unwrap();

        let daily = national_daily(&table);
        assert_eq!(daily[0].new_cases, i64::MAX);
        assert_eq!(daily[0].new_deaths, i64::MAX);

        let regions = region_totals(&table, "Unknown");
        assert_eq!(regions[0].new_cases, i64::MAX);
    }

    #[test]
    fn test_city_daily_drops_backlog_days() {
        let table = Table::from_rows(
            columns(),
            vec![
                daily_row("SP", "São Paulo", 1, 100, 10),
                daily_row("SP", "São Paulo", 2, CITY_MAX_DAILY_CASES, 0),
                daily_row("SP", "São Paulo", 3, 300, CITY_MAX_DAILY_DEATHS),
                daily_row("SP", "São Paulo", 4, 200, 20),
                daily_row("SP", "São Paulo", 5, -1, 0),
                daily_row("SP", "Campinas", 1, 50, 5),
            ],
        )
        .unwrap();

        let daily = city_daily(&table, "São Paulo");
        let days: Vec<NaiveDate> = daily.iter().map(|d| d.date).collect();
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2021, 1, 4).unwrap(),
            ]
        );
        assert_eq!(daily[1].new_cases, 200);
        assert_eq!(daily[1].cases_mm7, 150.0);
        assert_eq!(daily[1].cases_mm30, 150.0);
        assert_eq!(daily[1].deaths_mm30, 15.0);

        assert!(city_daily(&table, "Manaus").is_empty());
    }

    #[test]
    fn test_region_totals() {
        let regions = region_totals(&sample(), Locale::En.sentinels().region);
        assert_eq!(regions[0].region, "Sudeste");
        assert_eq!(regions[0].new_cases, 45);
        assert!(regions.iter().any(|r| r.region == "Norte" && r.new_deaths == 2));
        assert!(regions.iter().any(|r| r.region == "Unknown"));
    }

    #[test]
    fn test_region_label_follows_locale() {
        let regions = region_totals(&sample(), Locale::Pt.sentinels().region);
        assert!(regions.iter().any(|r| r.region == "Desconhecida"));
        assert!(!regions.iter().any(|r| r.region == "Unknown"));
    }

    #[test]
    fn test_top_cities_excludes_placeholder() {
        let top = top_cities_by_cases(&sample(), 2, Locale::En.sentinels().city);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].city, "São Paulo");
        assert_eq!(top[0].cumulative_cases, 30);
        assert_eq!(top[1].city, "Campinas");
    }

    #[test]
    fn test_mortality_by_state() {
        let mortality = mortality_by_state(&sample());
        let sp = mortality.iter().find(|m| m.state == "SP").unwrap();
        assert_eq!(sp.cumulative_deaths, 3);
        assert_eq!(sp.population, Some(12_000_000.0));
        assert_eq!(sp.deaths_per_100k, Some(0.025));
        assert!(close(sp.deaths_percent.unwrap(), 0.000025));
        let br = mortality.iter().find(|m| m.state == "BR").unwrap();
        assert_eq!(br.deaths_per_100k, None);
        assert_eq!(br.deaths_percent, None);
    }

    #[test]
    fn test_national_mean_rate_skips_states_without_population() {
        let mortality = mortality_by_state(&sample());
        // SP 0.000025 %, AM 0.0001 %, BR has no population
        let mean = national_mean_rate(&mortality).unwrap();
        assert!(close(mean, 0.0000625));
        assert_eq!(national_mean_rate(&[]), None);
    }

    #[test]
    fn test_build_dashboard_includes_focus_city() {
        let report = build_dashboard(&sample(), Locale::En.sentinels(), 3, "São Paulo");
        assert_eq!(report.focus_city.city, "São Paulo");
        assert_eq!(report.focus_city.daily.len(), 1);
        assert_eq!(report.focus_city.daily[0].new_cases, 30);
        assert_eq!(report.top_cities.len(), 3);
        assert!(report.national_mean_rate.is_some());
    }

    #[test]
    fn test_region_of() {
        assert_eq!(region_of("SP"), Some(Region::Sudeste));
        assert_eq!(region_of("DF"), Some(Region::CentroOeste));
        assert_eq!(region_of("BR"), None);
    }
}
