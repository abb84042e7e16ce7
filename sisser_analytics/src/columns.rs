//! Column names of the SISSER open-data export.

use crate::error::{PipelineError, Result};
use polars::prelude::DataFrame;

pub const POLICY: &str = "NR_APOLICE";
pub const COMPANY: &str = "NM_RAZAO_SOCIAL";
pub const STATE: &str = "SG_UF_PROPRIEDADE";
pub const MUNICIPALITY: &str = "NM_MUNICIPIO_PROPRIEDADE";

pub const AREA: &str = "NR_AREA_TOTAL";
pub const PREMIUM: &str = "VL_PREMIO_LIQUIDO";
pub const GUARANTEE_LIMIT: &str = "VL_LIMITE_GARANTIA";
pub const ESTIMATED_PRODUCTIVITY: &str = "NR_PRODUTIVIDADE_ESTIMADA";
pub const INSURED_PRODUCTIVITY: &str = "NR_PRODUTIVIDADE_SEGURADA";
pub const FEDERAL_SUBSIDY: &str = "VL_SUBVENCAO_FEDERAL";

/// State code attribute on the IBGE boundary features.
pub const BOUNDARY_STATE: &str = "SIGLA_UF";

/// Numeric columns, in correlation-matrix order.
pub const NUMERIC_COLUMNS: [&str; 6] = [
    AREA,
    PREMIUM,
    GUARANTEE_LIMIT,
    ESTIMATED_PRODUCTIVITY,
    INSURED_PRODUCTIVITY,
    FEDERAL_SUBSIDY,
];

/// Text columns used as grouping keys.
pub const KEY_COLUMNS: [&str; 4] = [POLICY, COMPANY, STATE, MUNICIPALITY];

/// Columns dropped from the raw export before the snapshot is written.
pub const EXCLUDED_COLUMNS: [&str; 22] = [
    "CD_PROCESSO_SUSEP",
    "NR_PROPOSTA",
    "ID_PROPOSTA",
    "DT_PROPOSTA",
    "DT_INICIO_VIGENCIA",
    "DT_FIM_VIGENCIA",
    "NM_SEGURADO",
    "NR_DOCUMENTO_SEGURADO",
    "LATITUDE",
    "NR_GRAU_LAT",
    "NR_MIN_LAT",
    "NR_SEG_LAT",
    "LONGITUDE",
    "NR_GRAU_LONG",
    "NR_MIN_LONG",
    "NR_SEG_LONG",
    "NR_DECIMAL_LATITUDE",
    "NR_DECIMAL_LONGITUDE",
    "NivelDeCobertura",
    "DT_APOLICE",
    "ANO_APOLICE",
    "CD_GEOCMU",
];

/// Canonical form of a state code as typed or as published: trimmed, ASCII upper case.
pub fn reconcile_state_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Every column the aggregation engine reads.
pub fn required_columns() -> impl Iterator<Item = &'static str> {
    KEY_COLUMNS.into_iter().chain(NUMERIC_COLUMNS)
}

/// Names from `expected` that are absent from `present`.
pub fn missing_from<'a, S: AsRef<str>>(
    present: &[S],
    expected: impl IntoIterator<Item = &'a str>,
) -> Vec<&'a str> {
    expected
        .into_iter()
        .filter(|name| !present.iter().any(|p| p.as_ref() == *name))
        .collect()
}

pub fn require_columns(df: &DataFrame) -> Result<()> {
    let missing = missing_from(&df.get_column_names(), required_columns());
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::missing_columns(&missing))
    }
}
