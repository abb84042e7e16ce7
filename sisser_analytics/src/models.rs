use crate::correlation::CorrelationMatrix;
use crate::stats::{first_argmax, mean, percent_over_mean};
use serde::{Deserialize, Serialize};

/// Totals for one state (`SG_UF_PROPRIEDADE`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAggregate {
    #[serde(rename = "SG_UF_PROPRIEDADE")]
    pub state_code: String,
    pub area_total: f64,
    #[serde(rename = "valor_total")]
    pub premium_total: f64,
    #[serde(rename = "numero_seguros")]
    pub policy_count: u64,
}

/// Totals for one insurer (`NM_RAZAO_SOCIAL`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyAggregate {
    #[serde(rename = "NM_RAZAO_SOCIAL")]
    pub company: String,
    #[serde(rename = "numero_seguros")]
    pub policy_count: u64,
    pub area_total: f64,
    #[serde(rename = "valor_total")]
    pub premium_total: f64,
    /// Distinct state codes, ascending.
    #[serde(rename = "estados")]
    pub states: Vec<String>,
    #[serde(rename = "contagem_estados")]
    pub state_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyStateAggregate {
    #[serde(rename = "NM_RAZAO_SOCIAL")]
    pub company: String,
    #[serde(rename = "SG_UF_PROPRIEDADE")]
    pub state_code: String,
    #[serde(rename = "numero_seguros")]
    pub policy_count: u64,
    pub area_total: f64,
    #[serde(rename = "valor_total")]
    pub premium_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityAggregate {
    #[serde(rename = "NM_MUNICIPIO_PROPRIEDADE")]
    pub municipality: String,
    pub area_total: f64,
    #[serde(rename = "valor_total")]
    pub premium_total: f64,
}

/// Company metrics offered for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyMetric {
    PolicyCount,
    StateCount,
    AreaTotal,
}

impl CompanyMetric {
    pub const ALL: [CompanyMetric; 3] = [
        CompanyMetric::PolicyCount,
        CompanyMetric::StateCount,
        CompanyMetric::AreaTotal,
    ];

    pub fn value(&self, company: &CompanyAggregate) -> f64 {
        match self {
            CompanyMetric::PolicyCount => company.policy_count as f64,
            CompanyMetric::StateCount => company.state_count as f64,
            CompanyMetric::AreaTotal => company.area_total,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompanyMetric::PolicyCount => "Número de Seguros",
            CompanyMetric::StateCount => "Contagem de Estados",
            CompanyMetric::AreaTotal => "Área Total",
        }
    }

    /// Decimal places used when the metric is displayed.
    pub fn precision(&self) -> usize {
        match self {
            CompanyMetric::AreaTotal => 2,
            _ => 0,
        }
    }
}

/// Summary card for one company metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: CompanyMetric,
    pub max: f64,
    pub mean: f64,
    /// `(max - mean) / mean * 100`, NaN when the mean is zero.
    pub variance_pct: f64,
    /// First company in name order attaining `max`.
    pub company: String,
}

impl MetricSummary {
    /// `None` when there are no companies to summarize.
    pub fn from_companies(metric: CompanyMetric, companies: &[CompanyAggregate]) -> Option<Self> {
        let idx = first_argmax(companies.iter().map(|c| metric.value(c)))?;
        let max = metric.value(&companies[idx]);
        let mean = mean(companies.iter().map(|c| metric.value(c)))?;
        Some(Self {
            metric,
            max,
            mean,
            variance_pct: percent_over_mean(max, mean),
            company: companies[idx].company.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub policy_count: Option<MetricSummary>,
    pub state_count: Option<MetricSummary>,
    pub area_total: Option<MetricSummary>,
}

impl CompanySummary {
    pub fn from_companies(companies: &[CompanyAggregate]) -> Self {
        Self {
            policy_count: MetricSummary::from_companies(CompanyMetric::PolicyCount, companies),
            state_count: MetricSummary::from_companies(CompanyMetric::StateCount, companies),
            area_total: MetricSummary::from_companies(CompanyMetric::AreaTotal, companies),
        }
    }

    pub fn get(&self, metric: CompanyMetric) -> Option<&MetricSummary> {
        match metric {
            CompanyMetric::PolicyCount => self.policy_count.as_ref(),
            CompanyMetric::StateCount => self.state_count.as_ref(),
            CompanyMetric::AreaTotal => self.area_total.as_ref(),
        }
    }
}

/// States with the most policies, area and premium. Ties go to the lowest state code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateLeaders {
    pub by_policy_count: Option<StateAggregate>,
    pub by_area: Option<StateAggregate>,
    pub by_premium: Option<StateAggregate>,
}

impl StateLeaders {
    /// `states` must be sorted by state code.
    pub fn from_states(states: &[StateAggregate]) -> Self {
        let pick = |idx: Option<usize>| idx.map(|i| states[i].clone());
        Self {
            by_policy_count: pick(first_argmax(states.iter().map(|s| s.policy_count as f64))),
            by_area: pick(first_argmax(states.iter().map(|s| s.area_total))),
            by_premium: pick(first_argmax(states.iter().map(|s| s.premium_total))),
        }
    }
}

/// Everything the presentation layer needs, computed in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateBundle {
    pub states: Vec<StateAggregate>,
    pub companies: Vec<CompanyAggregate>,
    pub company_states: Vec<CompanyStateAggregate>,
    pub company_summary: CompanySummary,
    pub state_leaders: StateLeaders,
    pub correlation: CorrelationMatrix,
    /// Distinct state codes present in the records, ascending.
    pub available_states: Vec<String>,
}

impl AggregateBundle {
    pub fn company_states_in<'a>(
        &'a self,
        state_code: &'a str,
    ) -> impl Iterator<Item = &'a CompanyStateAggregate> + 'a {
        self.company_states
            .iter()
            .filter(move |row| row.state_code == state_code)
    }

    /// Companies ordered by `metric`, largest first; ties keep name order.
    pub fn companies_ranked_by(&self, metric: CompanyMetric) -> Vec<&CompanyAggregate> {
        let mut ranked: Vec<&CompanyAggregate> = self.companies.iter().collect();
        ranked.sort_by(|a, b| metric.value(b).total_cmp(&metric.value(a)));
        ranked
    }
}

/// Breakdown of a single state.
#[derive(Debug, Clone, Serialize)]
pub struct StateView {
    pub state_code: String,
    pub companies: Vec<CompanyStateAggregate>,
    pub top_by_area: Vec<MunicipalityAggregate>,
    pub top_by_premium: Vec<MunicipalityAggregate>,
    /// Union of both top lists, area list first, without duplicates.
    pub notable: Vec<MunicipalityAggregate>,
    /// Pearson correlation of area and premium over `notable`; NaN when undefined.
    pub notable_correlation: f64,
}

/// Analysis requested by the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisMode {
    ByCompany,
    ByState(String),
}
