use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use sisser_analytics::columns::reconcile_state_code;
use sisser_analytics::{
    compute_aggregates, join_boundaries, state_view, AnalysisMode, CompanyMetric, DataLoader,
    ReportConfig, ReportWriter,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sisser_analytics")]
#[command(about = "Aggregate rural insurance policies by state and insurer")]
struct Args {
    /// Filtered records snapshot (Parquet)
    #[arg(long, default_value = "assets/dados_filtrado.parquet")]
    records: PathBuf,

    /// Simplified state boundaries (GeoJSON)
    #[arg(long, default_value = "assets/BR_UF_2022_filtrado.geojson")]
    boundaries: PathBuf,

    /// Directory for the summary, charts and exports
    #[arg(short, long, default_value = "report")]
    output: PathBuf,

    /// Analysis mode
    #[arg(short, long, value_enum, default_value = "by-company")]
    mode: Mode,

    /// State code for by-state mode (defaults to the first available state)
    #[arg(short, long)]
    state: Option<String>,

    /// Company metric to rank by
    #[arg(long, value_enum, default_value = "numero-seguros")]
    metric: Metric,

    /// Municipalities listed per top chart
    #[arg(long, default_value = "10")]
    top_n: usize,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    ByCompany,
    ByState,
}

#[derive(Clone, Copy, ValueEnum)]
enum Metric {
    NumeroSeguros,
    ContagemEstados,
    AreaTotal,
}

impl From<Metric> for CompanyMetric {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::NumeroSeguros => CompanyMetric::PolicyCount,
            Metric::ContagemEstados => CompanyMetric::StateCount,
            Metric::AreaTotal => CompanyMetric::AreaTotal,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let loader = DataLoader::new();
    let records = loader.load_records(&args.records)?;
    let boundaries = loader.load_boundaries(&args.boundaries)?;

    let bundle = compute_aggregates(&records)?;
    info!(
        "{} states, {} companies, {} company-state pairs",
        bundle.states.len(),
        bundle.companies.len(),
        bundle.company_states.len()
    );

    let mode = match args.mode {
        Mode::ByCompany => AnalysisMode::ByCompany,
        Mode::ByState => {
            let code = match args.state {
                Some(code) => reconcile_state_code(&code),
                None => match bundle.available_states.first() {
                    Some(code) => {
                        warn!("no state given, using {code}");
                        code.clone()
                    }
                    None => anyhow::bail!("records contain no state codes"),
                },
            };
            AnalysisMode::ByState(code)
        }
    };

    let view = match &mode {
        AnalysisMode::ByState(code) => Some(state_view(&records, &bundle, code, args.top_n)?),
        AnalysisMode::ByCompany => None,
    };

    let joined = join_boundaries(&boundaries, &bundle.states);

    let writer = ReportWriter::new(ReportConfig {
        output_dir: args.output,
        metric: args.metric.into(),
    })?;
    let written = writer.write_all(&bundle, &mode, view.as_ref(), &joined)?;

    for path in written {
        println!("{}", path.display());
    }

    Ok(())
}
