use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use polars::prelude::*;
use sisser_analytics::columns::{self, EXCLUDED_COLUMNS};
use sisser_analytics::PipelineError;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// PSR 2024 open-data export published by the Ministry of Agriculture.
pub const DEFAULT_SOURCE: &str = "https://dados.agricultura.gov.br/dataset/baefdc68-9bad-4204-83e8-f2888b79ab48/resource/ac7e4351-974f-4958-9294-627c5cbf289a/download/psrdadosabertos2024csv.csv";
pub const DEFAULT_OUTPUT: &str = "assets/dados_filtrado.parquet";

/// Where the raw semicolon-separated export comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSource {
    Url(String),
    File(PathBuf),
}

impl RecordSource {
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            RecordSource::Url(source.to_string())
        } else {
            RecordSource::File(PathBuf::from(source))
        }
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            RecordSource::File(path) => {
                fs::read(path).with_context(|| format!("reading {}", path.display()))
            }
            RecordSource::Url(url) => {
                info!("downloading {url}");
                let client = reqwest::blocking::Client::builder()
                    .timeout(Duration::from_secs(600))
                    .build()?;
                let response = client.get(url).send()?.error_for_status()?;
                let bytes = response.bytes()?;
                info!("downloaded {} bytes", bytes.len());
                Ok(bytes.to_vec())
            }
        }
    }
}

/// Drops the excluded columns from the raw export and writes the rest as a
/// Parquet snapshot of text columns.
pub struct RecordFilter {
    source: RecordSource,
    output: PathBuf,
}

impl RecordFilter {
    pub fn new(source: RecordSource, output: PathBuf) -> Self {
        Self { source, output }
    }

    pub fn run(&self) -> Result<DataFrame> {
        let raw = self.source.fetch()?;
        let mut df = filter_records(raw.as_slice())?;
        write_parquet(&mut df, &self.output)?;
        info!(
            "wrote {} rows x {} columns to {}",
            df.height(),
            df.width(),
            self.output.display()
        );
        Ok(df)
    }
}

/// ISO-8859-1 maps every byte to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Parse a Latin-1, `;`-separated export and keep every non-excluded column.
///
/// Empty fields become nulls; everything else stays as text so decimal
/// commas survive until load time.
pub fn filter_records<R: Read>(reader: R) -> Result<DataFrame> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.byte_headers()?.iter().map(decode_latin1).collect();

    let missing_excluded = columns::missing_from(&headers, EXCLUDED_COLUMNS);
    if !missing_excluded.is_empty() {
        return Err(PipelineError::missing_columns(&missing_excluded).into());
    }
    let missing_required = columns::missing_from(&headers, columns::required_columns());
    if !missing_required.is_empty() {
        return Err(PipelineError::missing_columns(&missing_required).into());
    }

    let kept: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| !EXCLUDED_COLUMNS.contains(&name.as_str()))
        .collect();
    debug!(
        "keeping {} of {} columns",
        kept.len(),
        headers.len()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} rows {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); kept.len()];
    for (row, record) in rdr.byte_records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                spinner.abandon();
                return Err(e.into());
            }
        };
        if record.len() != headers.len() {
            spinner.abandon();
            return Err(PipelineError::SchemaMismatch(format!(
                "row {row} has {} fields, header has {}",
                record.len(),
                headers.len()
            ))
            .into());
        }
        for (slot, (idx, _)) in kept.iter().enumerate() {
            let field = &record[*idx];
            values[slot].push((!field.is_empty()).then(|| decode_latin1(field)));
        }
        spinner.inc(1);
    }
    spinner.finish_with_message("read");

    let series: Vec<Series> = kept
        .iter()
        .zip(values)
        .map(|((_, name), column)| Series::new(name.as_str(), column))
        .collect();

    Ok(DataFrame::new(series)?)
}

pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}
