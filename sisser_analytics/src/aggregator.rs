use crate::columns::{self, AREA, COMPANY, NUMERIC_COLUMNS, POLICY, PREMIUM, STATE};
use crate::correlation::correlation_matrix;
use crate::error::Result;
use crate::models::{
    AggregateBundle, CompanyAggregate, CompanyStateAggregate, CompanySummary, StateAggregate,
    StateLeaders,
};
use crate::normalize::normalize_records;
use log::info;
use polars::prelude::*;
use std::collections::BTreeMap;

pub(crate) const AREA_TOTAL: &str = "area_total";
pub(crate) const PREMIUM_TOTAL: &str = "valor_total";
const POLICY_COUNT: &str = "numero_seguros";

/// Compute every aggregate view from a records snapshot.
///
/// Pure with respect to `records`: numeric columns are normalized on a
/// cheap clone and nothing outside the returned bundle is touched.
pub fn compute_aggregates(records: &DataFrame) -> Result<AggregateBundle> {
    columns::require_columns(records)?;
    let records = normalize_records(records.clone())?;

    let states = aggregate_by_state(&records)?;
    let company_states = aggregate_by_company_state(&records)?;
    let companies = aggregate_by_company(&records, &company_states)?;
    let correlation = correlation_matrix(&records, &NUMERIC_COLUMNS)?;
    let available_states = states.iter().map(|s| s.state_code.clone()).collect();

    info!(
        "aggregated {} rows into {} states, {} companies, {} company/state pairs",
        records.height(),
        states.len(),
        companies.len(),
        company_states.len()
    );

    Ok(AggregateBundle {
        company_summary: CompanySummary::from_companies(&companies),
        state_leaders: StateLeaders::from_states(&states),
        states,
        companies,
        company_states,
        correlation,
        available_states,
    })
}

/// Distinct non-null policy ids in the group.
fn distinct_policies() -> Expr {
    col(POLICY)
        .drop_nulls()
        .n_unique()
        .cast(DataType::UInt64)
        .alias(POLICY_COUNT)
}

fn totals() -> [Expr; 2] {
    [
        col(AREA).sum().alias(AREA_TOTAL),
        col(PREMIUM).sum().alias(PREMIUM_TOTAL),
    ]
}

pub fn aggregate_by_state(records: &DataFrame) -> Result<Vec<StateAggregate>> {
    let [area, premium] = totals();
    let grouped = records
        .clone()
        .lazy()
        .filter(col(STATE).is_not_null())
        .group_by([col(STATE)])
        .agg([area, premium, distinct_policies()])
        .sort(STATE, Default::default())
        .collect()?;

    let codes = grouped.column(STATE)?.utf8()?;
    let areas = grouped.column(AREA_TOTAL)?.f64()?;
    let premiums = grouped.column(PREMIUM_TOTAL)?.f64()?;
    let policies = grouped.column(POLICY_COUNT)?.u64()?;

    let mut states = Vec::with_capacity(grouped.height());
    for idx in 0..grouped.height() {
        if let Some(code) = codes.get(idx) {
            states.push(StateAggregate {
                state_code: code.to_string(),
                area_total: areas.get(idx).unwrap_or(0.0),
                premium_total: premiums.get(idx).unwrap_or(0.0),
                policy_count: policies.get(idx).unwrap_or(0),
            });
        }
    }

    Ok(states)
}

pub fn aggregate_by_company_state(records: &DataFrame) -> Result<Vec<CompanyStateAggregate>> {
    let [area, premium] = totals();
    let grouped = records
        .clone()
        .lazy()
        .filter(col(COMPANY).is_not_null().and(col(STATE).is_not_null()))
        .group_by([col(COMPANY), col(STATE)])
        .agg([distinct_policies(), area, premium])
        .sort_by_exprs([col(COMPANY), col(STATE)], [false, false], false, false)
        .collect()?;

    let companies = grouped.column(COMPANY)?.utf8()?;
    let codes = grouped.column(STATE)?.utf8()?;
    let areas = grouped.column(AREA_TOTAL)?.f64()?;
    let premiums = grouped.column(PREMIUM_TOTAL)?.f64()?;
    let policies = grouped.column(POLICY_COUNT)?.u64()?;

    let mut rows = Vec::with_capacity(grouped.height());
    for idx in 0..grouped.height() {
        if let (Some(company), Some(code)) = (companies.get(idx), codes.get(idx)) {
            rows.push(CompanyStateAggregate {
                company: company.to_string(),
                state_code: code.to_string(),
                policy_count: policies.get(idx).unwrap_or(0),
                area_total: areas.get(idx).unwrap_or(0.0),
                premium_total: premiums.get(idx).unwrap_or(0.0),
            });
        }
    }

    Ok(rows)
}

/// Company totals; the state set comes from the company/state pairs,
/// which are already sorted by company then state.
pub fn aggregate_by_company(
    records: &DataFrame,
    company_states: &[CompanyStateAggregate],
) -> Result<Vec<CompanyAggregate>> {
    let [area, premium] = totals();
    let grouped = records
        .clone()
        .lazy()
        .filter(col(COMPANY).is_not_null())
        .group_by([col(COMPANY)])
        .agg([distinct_policies(), area, premium])
        .sort(COMPANY, Default::default())
        .collect()?;

    let mut states_by_company: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for row in company_states {
        states_by_company
            .entry(row.company.as_str())
            .or_default()
            .push(row.state_code.clone());
    }

    let names = grouped.column(COMPANY)?.utf8()?;
    let areas = grouped.column(AREA_TOTAL)?.f64()?;
    let premiums = grouped.column(PREMIUM_TOTAL)?.f64()?;
    let policies = grouped.column(POLICY_COUNT)?.u64()?;

    let mut companies = Vec::with_capacity(grouped.height());
    for idx in 0..grouped.height() {
        if let Some(name) = names.get(idx) {
            let states = states_by_company.remove(name).unwrap_or_default();
            companies.push(CompanyAggregate {
                company: name.to_string(),
                policy_count: policies.get(idx).unwrap_or(0),
                area_total: areas.get(idx).unwrap_or(0.0),
                premium_total: premiums.get(idx).unwrap_or(0.0),
                state_count: states.len(),
                states,
            });
        }
    }

    Ok(companies)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::columns::*;

    /// Build a records frame; numeric fields use the export's comma decimals.
    pub(crate) fn records(rows: &[(&str, &str, &str, &str, &str, &str)]) -> DataFrame {
        let policies: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let companies: Vec<&str> = rows.iter().map(|r| r.1).collect();
        let states: Vec<&str> = rows.iter().map(|r| r.2).collect();
        let towns: Vec<&str> = rows.iter().map(|r| r.3).collect();
        let areas: Vec<&str> = rows.iter().map(|r| r.4).collect();
        let premiums: Vec<&str> = rows.iter().map(|r| r.5).collect();
        let ones: Vec<&str> = rows.iter().enumerate().map(|(i, _)| if i % 2 == 0 { "1,0" } else { "2,5" }).collect();

        df!(
            POLICY => policies,
            COMPANY => companies,
            STATE => states,
            MUNICIPALITY => towns,
            AREA => areas,
            PREMIUM => premiums,
            GUARANTEE_LIMIT => ones.clone(),
            ESTIMATED_PRODUCTIVITY => ones.clone(),
            INSURED_PRODUCTIVITY => ones.clone(),
            FEDERAL_SUBSIDY => ones
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_policy_counted_once() {
        let df = records(&[
            ("1", "Acme", "SP", "Campinas", "10", "5"),
            ("1", "Acme", "SP", "Campinas", "20", "5"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        assert_eq!(bundle.states.len(), 1);
        let sp = &bundle.states[0];
        assert_eq!(sp.state_code, "SP");
        assert_eq!(sp.area_total, 30.0);
        assert_eq!(sp.policy_count, 1);
    }

    #[test]
    fn test_state_area_is_conserved() {
        let df = records(&[
            ("1", "Acme", "SP", "Campinas", "10,5", "1"),
            ("2", "Acme", "RJ", "Niterói", "4,25", "1"),
            ("3", "Beta", "SP", "Sorocaba", "0,25", "1"),
            ("4", "Beta", "MT", "Sorriso", "100", "1"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let total: f64 = bundle.states.iter().map(|s| s.area_total).sum();
        assert!((total - 115.0).abs() < 1e-9);
    }

    #[test]
    fn test_policy_spanning_states_counts_in_each() {
        let df = records(&[
            ("7", "Acme", "SP", "Campinas", "1", "1"),
            ("7", "Acme", "MG", "Uberaba", "1", "1"),
            ("8", "Acme", "MG", "Uberaba", "1", "1"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let per_state: u64 = bundle.states.iter().map(|s| s.policy_count).sum();
        assert_eq!(per_state, 3);
        assert_eq!(bundle.companies[0].policy_count, 2);
    }

    #[test]
    fn test_argmax_by_premium() {
        let df = records(&[
            ("1", "Acme", "SP", "Campinas", "1", "60"),
            ("2", "Acme", "SP", "Campinas", "1", "40"),
            ("3", "Beta", "RJ", "Niterói", "5", "50"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let leader = bundle.state_leaders.by_premium.unwrap();
        assert_eq!(leader.state_code, "SP");
        assert_eq!(leader.premium_total, 100.0);
        assert_eq!(bundle.state_leaders.by_area.unwrap().state_code, "RJ");
    }

    #[test]
    fn test_company_states_and_counts() {
        let df = records(&[
            ("1", "Beta", "PR", "Cascavel", "1", "1"),
            ("2", "Acme", "SP", "Campinas", "1", "1"),
            ("3", "Acme", "GO", "Rio Verde", "1", "1"),
            ("3", "Acme", "GO", "Rio Verde", "1", "1"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let names: Vec<&str> = bundle.companies.iter().map(|c| c.company.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Beta"]);

        let acme = &bundle.companies[0];
        assert_eq!(acme.states, vec!["GO".to_string(), "SP".to_string()]);
        assert_eq!(acme.state_count, 2);
        assert_eq!(acme.policy_count, 2);

        assert_eq!(bundle.company_states.len(), 3);
        let go = bundle.company_states_in("GO").next().unwrap();
        assert_eq!(go.company, "Acme");
        assert_eq!(go.policy_count, 1);
        assert_eq!(go.area_total, 2.0);

        let summary = bundle.company_summary.state_count.as_ref().unwrap();
        assert_eq!(summary.company, "Acme");
        assert_eq!(summary.max, 2.0);
        assert_eq!(summary.mean, 1.5);
    }

    #[test]
    fn test_available_states_sorted() {
        let df = records(&[
            ("1", "Acme", "SP", "Campinas", "1", "1"),
            ("2", "Acme", "BA", "Barreiras", "1", "1"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        assert_eq!(bundle.available_states, vec!["BA".to_string(), "SP".to_string()]);
    }

    #[test]
    fn test_malformed_number_fails_batch() {
        let df = records(&[("1", "Acme", "SP", "Campinas", "dez", "1")]);
        assert!(matches!(
            compute_aggregates(&df),
            Err(crate::error::PipelineError::Conversion { .. })
        ));
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let df = df!(POLICY => &["1"]).unwrap();
        assert!(matches!(
            compute_aggregates(&df),
            Err(crate::error::PipelineError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_correlation_matrix_covers_numeric_columns() {
        let df = records(&[
            ("1", "Acme", "SP", "Campinas", "1", "2"),
            ("2", "Acme", "SP", "Campinas", "2", "4"),
            ("3", "Acme", "SP", "Campinas", "3", "7"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let matrix = &bundle.correlation;
        assert_eq!(matrix.len(), 6);
        assert!(matrix.is_symmetric());
        assert_eq!(matrix.get(0, 0), 1.0);
        assert!(matrix.get(0, 1) > 0.9);
    }
}
