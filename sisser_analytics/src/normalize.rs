use crate::columns::{KEY_COLUMNS, NUMERIC_COLUMNS};
use crate::error::{PipelineError, Result};
use log::debug;
use polars::prelude::*;

/// Parse a decimal that may use a comma as the decimal separator.
pub fn parse_decimal(text: &str) -> Option<f64> {
    text.trim().replace(',', ".").parse::<f64>().ok()
}

/// Convert one column to Float64.
///
/// Text is parsed with [`parse_decimal`]; numeric columns are cast and
/// Float64 columns pass through untouched, so the conversion is idempotent.
/// Nulls stay null. Any non-null text that does not parse fails the batch.
pub fn normalize_series(series: &Series) -> Result<Series> {
    match series.dtype() {
        DataType::Float64 => Ok(series.clone()),
        DataType::Utf8 => {
            let text = series.utf8()?;
            let mut values: Vec<Option<f64>> = Vec::with_capacity(text.len());
            for (row, value) in text.into_iter().enumerate() {
                let parsed = match value {
                    Some(raw) => Some(parse_decimal(raw).ok_or_else(|| PipelineError::Conversion {
                        column: series.name().to_string(),
                        row,
                        value: raw.to_string(),
                    })?),
                    None => None,
                };
                values.push(parsed);
            }
            Ok(Series::new(series.name(), values))
        }
        DataType::Null => Ok(series.cast(&DataType::Float64)?),
        dtype if dtype.is_numeric() => Ok(series.cast(&DataType::Float64)?),
        other => Err(PipelineError::SchemaMismatch(format!(
            "column {} has type {other} and cannot hold numbers",
            series.name()
        ))),
    }
}

/// Normalize the numeric columns and make the grouping keys text.
pub fn normalize_records(mut df: DataFrame) -> Result<DataFrame> {
    for name in NUMERIC_COLUMNS {
        let normalized = normalize_series(df.column(name)?)?;
        debug!("normalized {name}: {} nulls", normalized.null_count());
        df.with_column(normalized)?;
    }

    for name in KEY_COLUMNS {
        let series = df.column(name)?;
        if series.dtype() != &DataType::Utf8 {
            let text = series.cast(&DataType::Utf8)?;
            df.with_column(text)?;
        }
    }

    Ok(df)
}
