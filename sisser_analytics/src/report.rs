//! Static rendition of the dashboard: Markdown summary, bar charts and
//! JSON/GeoJSON exports for the interactive front end.

use crate::boundary::write_feature_collection;
use crate::geo_join::JoinedBoundaries;
use crate::models::{
    AggregateBundle, AnalysisMode, CompanyMetric, CompanyStateAggregate, MunicipalityAggregate,
    StateView,
};
use anyhow::Result;
use log::info;
use plotters::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// Metric used to rank companies in by-company mode.
    pub metric: CompanyMetric,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("report"),
            metric: CompanyMetric::PolicyCount,
        }
    }
}

pub struct ReportWriter {
    config: ReportConfig,
}

impl ReportWriter {
    pub fn new(config: ReportConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(Self { config })
    }

    /// Write every artifact for `mode`; `view` is required in by-state mode.
    pub fn write_all(
        &self,
        bundle: &AggregateBundle,
        mode: &AnalysisMode,
        view: Option<&StateView>,
        joined: &JoinedBoundaries,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let summary_path = self.path("summary.md");
        let mut file = std::fs::File::create(&summary_path)?;
        render_summary(&mut file, bundle, mode, view, self.config.metric)?;
        written.push(summary_path);

        let json_path = self.path("aggregates.json");
        serde_json::to_writer_pretty(std::fs::File::create(&json_path)?, bundle)?;
        written.push(json_path);

        let map_path = self.path("choropleth.geojson");
        write_feature_collection(&map_path, joined.to_features())?;
        written.push(map_path);

        match (mode, view) {
            (AnalysisMode::ByCompany, _) => written.extend(self.company_charts(bundle)?),
            (AnalysisMode::ByState(code), Some(view)) => {
                let view_path = self.path(&format!("estado_{code}.json"));
                serde_json::to_writer_pretty(std::fs::File::create(&view_path)?, view)?;
                written.push(view_path);
                written.extend(self.state_charts(view)?);
            }
            (AnalysisMode::ByState(code), None) => {
                anyhow::bail!("by-state report for {code} needs a state view")
            }
        }

        info!("report written to {}", self.config.output_dir.display());
        Ok(written)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.config.output_dir.join(name)
    }

    fn company_charts(&self, bundle: &AggregateBundle) -> Result<Vec<PathBuf>> {
        let metric = self.config.metric;
        let ranked: Vec<(String, f64)> = bundle
            .companies_ranked_by(metric)
            .into_iter()
            .map(|c| (c.company.clone(), metric.value(c)))
            .collect();
        let metric_path = self.path(&format!("{}_por_razao_social.png", chart_slug(metric)));
        render_bar_chart(
            &metric_path,
            &format!("{} por Razão Social", metric.label()),
            metric.label(),
            &ranked,
        )?;

        // the dashboard shows this as a pie; a bar chart carries the same shares
        let mut premiums: Vec<(String, f64)> = bundle
            .companies
            .iter()
            .map(|c| (c.company.clone(), c.premium_total))
            .collect();
        premiums.sort_by(|a, b| b.1.total_cmp(&a.1));
        let premium_path = self.path("valor_total_por_razao_social.png");
        render_bar_chart(
            &premium_path,
            "Valor Total Assegurado por Razão Social",
            "Valor Total (R$)",
            &premiums,
        )?;

        Ok(vec![metric_path, premium_path])
    }

    fn state_charts(&self, view: &StateView) -> Result<Vec<PathBuf>> {
        let specs = state_chart_specs(view);
        let mut written = Vec::with_capacity(specs.len());
        for spec in specs {
            let path = self.path(&spec.file_name);
            render_bar_chart(&path, &spec.title, spec.y_desc, &spec.bars)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// One bar chart to render: file name, caption, y axis and bars.
#[derive(Debug, Clone, PartialEq)]
struct ChartSpec {
    file_name: String,
    title: String,
    y_desc: &'static str,
    bars: Vec<(String, f64)>,
}

fn state_chart_specs(view: &StateView) -> Vec<ChartSpec> {
    let code = &view.state_code;
    let municipalities = |rows: &[MunicipalityAggregate], area: bool| {
        rows.iter()
            .map(|m| {
                let value = if area { m.area_total } else { m.premium_total };
                (m.municipality.clone(), value)
            })
            .collect::<Vec<_>>()
    };
    let per_company = |value: fn(&CompanyStateAggregate) -> f64| {
        view.companies
            .iter()
            .map(|c| (c.company.clone(), value(c)))
            .collect::<Vec<_>>()
    };

    vec![
        ChartSpec {
            file_name: format!("top_area_{code}.png"),
            title: format!("Top {} Municípios com Maior Área em {code}", view.top_by_area.len()),
            y_desc: "Área Total",
            bars: municipalities(&view.top_by_area, true),
        },
        ChartSpec {
            file_name: format!("top_valor_{code}.png"),
            title: format!(
                "Top {} Municípios com Maior Valor Assegurado em {code}",
                view.top_by_premium.len()
            ),
            y_desc: "Valor Total",
            bars: municipalities(&view.top_by_premium, false),
        },
        ChartSpec {
            file_name: format!("seguros_por_razao_social_{code}.png"),
            title: format!("Número de Seguros em {code} por Razão Social"),
            y_desc: "Número de Seguros",
            bars: per_company(|c| c.policy_count as f64),
        },
        ChartSpec {
            file_name: format!("area_por_razao_social_{code}.png"),
            title: format!("Área Total Assegurada em {code} por Razão Social"),
            y_desc: "Área Total",
            bars: per_company(|c| c.area_total),
        },
        ChartSpec {
            file_name: format!("valor_por_razao_social_{code}.png"),
            title: format!("Distribuição do Valor Total em {code} por Razão Social"),
            y_desc: "Valor Total (R$)",
            bars: per_company(|c| c.premium_total),
        },
    ]
}

fn chart_slug(metric: CompanyMetric) -> &'static str {
    match metric {
        CompanyMetric::PolicyCount => "numero_seguros",
        CompanyMetric::StateCount => "contagem_estados",
        CompanyMetric::AreaTotal => "area_total",
    }
}

/// Format a statistic, printing undefined values as `n/a`.
pub fn fmt_stat(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        "n/a".to_string()
    }
}

fn short_label(name: &str) -> String {
    const MAX: usize = 16;
    if name.chars().count() <= MAX {
        name.to_string()
    } else {
        let cut: String = name.chars().take(MAX - 1).collect();
        format!("{cut}…")
    }
}

/// Vertical bars in input order. Non-finite values are drawn as zero.
pub fn render_bar_chart(path: &Path, title: &str, y_desc: &str, data: &[(String, f64)]) -> Result<()> {
    let root = BitMapBackend::new(path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let bars: Vec<(String, f64)> = data
        .iter()
        .map(|(name, value)| (short_label(name), if value.is_finite() { *value } else { 0.0 }))
        .collect();
    let max_val = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);

    if bars.is_empty() || max_val <= 0.0 {
        root.present()?;
        return Ok(());
    }

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d((0..bars.len()).into_segmented(), 0.0..max_val * 1.1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_desc)
        .x_labels(bars.len())
        .x_label_formatter(&|x| match x {
            SegmentValue::CenterOf(i) => bars.get(*i).map(|(n, _)| n.clone()).unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
        Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *value)],
            BLUE.filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Markdown summary of the aggregates for `mode`.
pub fn render_summary<W: Write>(
    out: &mut W,
    bundle: &AggregateBundle,
    mode: &AnalysisMode,
    view: Option<&StateView>,
    metric: CompanyMetric,
) -> std::io::Result<()> {
    writeln!(out, "# Análise de Seguros Agrícolas - Brasil")?;
    writeln!(
        out,
        "\nGerado em: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    match mode {
        AnalysisMode::ByCompany => {
            render_state_leaders(out, bundle)?;
            render_company_cards(out, bundle)?;
            render_company_ranking(out, bundle, metric)?;
            render_correlation(out, bundle)?;
        }
        AnalysisMode::ByState(code) => {
            writeln!(out, "## Análise por Estado: {code}\n")?;
            if let Some(view) = view {
                render_state_view(out, view)?;
            }
        }
    }
    Ok(())
}

fn render_state_leaders<W: Write>(out: &mut W, bundle: &AggregateBundle) -> std::io::Result<()> {
    let leaders = &bundle.state_leaders;
    writeln!(out, "## Destaques por Estado\n")?;
    if let Some(s) = &leaders.by_policy_count {
        writeln!(
            out,
            "- **Estado com maior número de apólices:** {} com {} apólices.",
            s.state_code, s.policy_count
        )?;
    }
    if let Some(s) = &leaders.by_area {
        writeln!(
            out,
            "- **Estado com maior área total assegurada:** {} com {} ha.",
            s.state_code,
            fmt_stat(s.area_total, 2)
        )?;
    }
    if let Some(s) = &leaders.by_premium {
        writeln!(
            out,
            "- **Estado com maior valor total assegurado:** {} com R$ {}.",
            s.state_code,
            fmt_stat(s.premium_total, 2)
        )?;
    }
    writeln!(out)
}

fn render_company_cards<W: Write>(out: &mut W, bundle: &AggregateBundle) -> std::io::Result<()> {
    writeln!(out, "## Análise por Razão Social\n")?;
    writeln!(out, "| Métrica | Máximo | Razão Social | Em relação à média |")?;
    writeln!(out, "|---------|--------|--------------|--------------------|")?;
    for metric in CompanyMetric::ALL {
        if let Some(card) = bundle.company_summary.get(metric) {
            writeln!(
                out,
                "| {} | {} | {} | {}% |",
                metric.label(),
                fmt_stat(card.max, metric.precision()),
                card.company,
                fmt_stat(card.variance_pct, 2)
            )?;
        }
    }
    writeln!(out)
}

fn render_company_ranking<W: Write>(
    out: &mut W,
    bundle: &AggregateBundle,
    metric: CompanyMetric,
) -> std::io::Result<()> {
    writeln!(out, "### {} por Razão Social\n", metric.label())?;
    writeln!(out, "| Razão Social | {} |", metric.label())?;
    writeln!(out, "|--------------|------|")?;
    for company in bundle.companies_ranked_by(metric) {
        writeln!(
            out,
            "| {} | {} |",
            company.company,
            fmt_stat(metric.value(company), metric.precision())
        )?;
    }
    writeln!(out)
}

fn render_correlation<W: Write>(out: &mut W, bundle: &AggregateBundle) -> std::io::Result<()> {
    let matrix = &bundle.correlation;
    writeln!(out, "## Correlação entre Parâmetros\n")?;
    writeln!(out, "| | {} |", matrix.columns.join(" | "))?;
    writeln!(out, "|---|{}", "---|".repeat(matrix.len()))?;
    for (i, name) in matrix.columns.iter().enumerate() {
        let cells: Vec<String> = (0..matrix.len())
            .map(|j| fmt_stat(matrix.get(i, j), 2))
            .collect();
        writeln!(out, "| {} | {} |", name, cells.join(" | "))?;
    }
    writeln!(out)
}

fn render_state_view<W: Write>(out: &mut W, view: &StateView) -> std::io::Result<()> {
    writeln!(
        out,
        "Analisando os dados de Área Total e Valor do Prêmio Líquido nota-se uma correlação de {}.\n",
        fmt_stat(view.notable_correlation, 2)
    )?;

    writeln!(out, "### Municípios com Maior Área\n")?;
    writeln!(out, "| Município | Área Total |")?;
    writeln!(out, "|-----------|------------|")?;
    for m in &view.top_by_area {
        writeln!(out, "| {} | {} |", m.municipality, fmt_stat(m.area_total, 2))?;
    }

    writeln!(out, "\n### Municípios com Maior Valor Assegurado\n")?;
    writeln!(out, "| Município | Valor Total |")?;
    writeln!(out, "|-----------|-------------|")?;
    for m in &view.top_by_premium {
        writeln!(out, "| {} | {} |", m.municipality, fmt_stat(m.premium_total, 2))?;
    }

    writeln!(out, "\n### Razões Sociais em {}\n", view.state_code)?;
    writeln!(out, "| Razão Social | Número de Seguros | Área Total | Valor Total |")?;
    writeln!(out, "|--------------|-------------------|------------|-------------|")?;
    for c in &view.companies {
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            c.company,
            c.policy_count,
            fmt_stat(c.area_total, 2),
            fmt_stat(c.premium_total, 2)
        )?;
    }
    writeln!(out)
}
