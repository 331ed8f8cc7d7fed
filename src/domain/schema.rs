//! Column headers of the HIST_PAINEL_COVIDBR exports.

pub const STATE: &str = "estado";
pub const CITY: &str = "municipio";
pub const DATE: &str = "data";
pub const REGION: &str = "regiao";
pub const HEALTH_REGION_NAME: &str = "nomeRegiaoSaude";
pub const HEALTH_REGION_CODE: &str = "codRegiaoSaude";
pub const AREA_CLASSIFICATION: &str = "interior/metropolitana";
pub const POPULATION_2019: &str = "populacaoTCU2019";
pub const CUMULATIVE_CASES: &str = "casosAcumulado";
pub const NEW_CASES: &str = "casosNovos";
pub const CUMULATIVE_DEATHS: &str = "obitosAcumulado";
pub const NEW_DEATHS: &str = "obitosNovos";

/// Without these the table cannot be ordered.
pub const REQUIRED_COLUMNS: [&str; 3] = [DATE, STATE, CITY];

pub const COUNTER_COLUMNS: [&str; 4] = [CUMULATIVE_CASES, NEW_CASES, CUMULATIVE_DEATHS, NEW_DEATHS];

/// recovered_new, active_monitoring_new, city_ibge_code
pub const LEGACY_COLUMNS: [&str; 3] = ["Recuperadosnovos", "emAcompanhamentoNovos", "codmun"];

pub const DEFAULT_FILE_PATTERN: &str = r"^HIST_PAINEL_COVIDBR_.*\.csv$";
pub const DEFAULT_TABLE_NAME: &str = "covid19_painel";
