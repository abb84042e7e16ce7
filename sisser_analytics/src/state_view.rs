use crate::aggregator::{AREA_TOTAL, PREMIUM_TOTAL};
use crate::columns::{reconcile_state_code, AREA, MUNICIPALITY, PREMIUM, STATE};
use crate::error::{PipelineError, Result};
use crate::models::{AggregateBundle, MunicipalityAggregate, StateView};
use crate::normalize::normalize_records;
use crate::stats::pearson;
use log::debug;
use polars::prelude::*;

pub const DEFAULT_TOP_N: usize = 10;

/// Company and municipality breakdown for one state.
pub fn state_view(
    records: &DataFrame,
    bundle: &AggregateBundle,
    state_code: &str,
    top_n: usize,
) -> Result<StateView> {
    let wanted = reconcile_state_code(state_code);
    let state_code = bundle
        .available_states
        .iter()
        .find(|s| reconcile_state_code(s) == wanted)
        .ok_or_else(|| PipelineError::UnknownState(state_code.to_string()))?
        .as_str();

    let municipalities = aggregate_municipalities(records, state_code)?;
    let top_by_area = top_by(&municipalities, top_n, |m| m.area_total);
    let top_by_premium = top_by(&municipalities, top_n, |m| m.premium_total);
    let notable = union_by_name(&top_by_area, &top_by_premium);

    let (areas, premiums): (Vec<f64>, Vec<f64>) = notable
        .iter()
        .map(|m| (m.area_total, m.premium_total))
        .unzip();
    let notable_correlation = pearson(&areas, &premiums);

    debug!(
        "{state_code}: {} municipalities, {} notable, r = {notable_correlation:.2}",
        municipalities.len(),
        notable.len()
    );

    Ok(StateView {
        state_code: state_code.to_string(),
        companies: bundle.company_states_in(state_code).cloned().collect(),
        top_by_area,
        top_by_premium,
        notable,
        notable_correlation,
    })
}

/// Area and premium per municipality of `state_code`, sorted by name.
pub fn aggregate_municipalities(
    records: &DataFrame,
    state_code: &str,
) -> Result<Vec<MunicipalityAggregate>> {
    let records = normalize_records(records.clone())?;
    let grouped = records
        .lazy()
        .filter(
            col(STATE)
                .eq(lit(state_code))
                .and(col(MUNICIPALITY).is_not_null()),
        )
        .group_by([col(MUNICIPALITY)])
        .agg([
            col(AREA).sum().alias(AREA_TOTAL),
            col(PREMIUM).sum().alias(PREMIUM_TOTAL),
        ])
        .sort(MUNICIPALITY, Default::default())
        .collect()?;

    let names = grouped.column(MUNICIPALITY)?.utf8()?;
    let areas = grouped.column(AREA_TOTAL)?.f64()?;
    let premiums = grouped.column(PREMIUM_TOTAL)?.f64()?;

    let mut rows = Vec::with_capacity(grouped.height());
    for idx in 0..grouped.height() {
        if let Some(name) = names.get(idx) {
            rows.push(MunicipalityAggregate {
                municipality: name.to_string(),
                area_total: areas.get(idx).unwrap_or(0.0),
                premium_total: premiums.get(idx).unwrap_or(0.0),
            });
        }
    }

    Ok(rows)
}

/// The `n` largest rows by `key`. The sort is stable, so ties keep input order.
fn top_by<F>(rows: &[MunicipalityAggregate], n: usize, key: F) -> Vec<MunicipalityAggregate>
where
    F: Fn(&MunicipalityAggregate) -> f64,
{
    let mut ranked: Vec<MunicipalityAggregate> =
        rows.iter().filter(|m| !key(m).is_nan()).cloned().collect();
    ranked.sort_by(|a, b| key(b).total_cmp(&key(a)));
    ranked.truncate(n);
    ranked
}

fn union_by_name(
    first: &[MunicipalityAggregate],
    second: &[MunicipalityAggregate],
) -> Vec<MunicipalityAggregate> {
    let mut union = first.to_vec();
    for row in second {
        if !union.iter().any(|m| m.municipality == row.municipality) {
            union.push(row.clone());
        }
    }
    union
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::compute_aggregates;
    use crate::aggregator::tests::records;

    fn many_towns(count: usize) -> DataFrame {
        let names: Vec<String> = (0..count).map(|i| format!("Cidade {i:02}")).collect();
        let areas: Vec<String> = (0..count).map(|i| format!("{},5", i + 1)).collect();
        let premiums: Vec<String> = (0..count).map(|i| format!("{}", (count - i) * 3)).collect();
        let rows: Vec<(String, &str, &str, &str, &str, &str)> = (0..count)
            .map(|i| {
                (
                    i.to_string(),
                    "Acme",
                    "MT",
                    names[i].as_str(),
                    areas[i].as_str(),
                    premiums[i].as_str(),
                )
            })
            .collect();
        let borrowed: Vec<(&str, &str, &str, &str, &str, &str)> = rows
            .iter()
            .map(|r| (r.0.as_str(), r.1, r.2, r.3, r.4, r.5))
            .collect();
        records(&borrowed)
    }

    #[test]
    fn test_union_of_top_lists_between_ten_and_twenty() {
        let df = many_towns(25);
        let bundle = compute_aggregates(&df).unwrap();
        let view = state_view(&df, &bundle, "MT", DEFAULT_TOP_N).unwrap();
        assert_eq!(view.top_by_area.len(), 10);
        assert_eq!(view.top_by_premium.len(), 10);
        assert!(view.notable.len() >= 10 && view.notable.len() <= 20);
        // area grows with the index and premium shrinks, so the lists are disjoint
        assert_eq!(view.notable.len(), 20);
        assert_eq!(view.top_by_area[0].municipality, "Cidade 24");
        assert_eq!(view.top_by_premium[0].municipality, "Cidade 00");
        assert!(view.notable_correlation < 0.0);
    }

    #[test]
    fn test_overlapping_top_lists_are_deduplicated() {
        let df = records(&[
            ("1", "Acme", "SP", "Campinas", "30", "300"),
            ("2", "Acme", "SP", "Sorocaba", "20", "200"),
            ("3", "Beta", "SP", "Ribeirão Preto", "10", "100"),
            ("4", "Beta", "RJ", "Niterói", "99", "999"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let view = state_view(&df, &bundle, "SP", DEFAULT_TOP_N).unwrap();
        assert_eq!(view.notable.len(), 3);
        assert!((view.notable_correlation - 1.0).abs() < 1e-12);
        let companies: Vec<&str> = view.companies.iter().map(|c| c.company.as_str()).collect();
        assert_eq!(companies, vec!["Acme", "Beta"]);
    }

    #[test]
    fn test_single_municipality_correlation_is_nan() {
        let df = records(&[
            ("1", "Acme", "GO", "Rio Verde", "10", "1"),
            ("2", "Acme", "GO", "Rio Verde", "5", "1"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let view = state_view(&df, &bundle, "GO", DEFAULT_TOP_N).unwrap();
        assert_eq!(view.notable.len(), 1);
        assert_eq!(view.notable[0].area_total, 15.0);
        assert!(view.notable_correlation.is_nan());
    }

    #[test]
    fn test_ties_keep_name_order() {
        let df = records(&[
            ("1", "Acme", "PR", "Toledo", "5", "1"),
            ("2", "Acme", "PR", "Cascavel", "5", "2"),
            ("3", "Acme", "PR", "Maringá", "5", "3"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let view = state_view(&df, &bundle, "PR", 2).unwrap();
        let names: Vec<&str> = view.top_by_area.iter().map(|m| m.municipality.as_str()).collect();
        assert_eq!(names, vec!["Cascavel", "Maringá"]);
    }

    #[test]
    fn test_state_code_is_reconciled() {
        let df = records(&[
            ("1", "Acme", "SP", "Campinas", "10", "100"),
            ("2", "Beta", "SP", "Sorocaba", "5", "10"),
        ]);
        let bundle = compute_aggregates(&df).unwrap();
        let view = state_view(&df, &bundle, " sp", DEFAULT_TOP_N).unwrap();
        assert_eq!(view.state_code, "SP");
        assert_eq!(view.companies.len(), 2);
        assert_eq!(view.notable.len(), 2);
    }

    #[test]
    fn test_unknown_state_is_rejected() {
        let df = records(&[("1", "Acme", "SP", "Campinas", "1", "1")]);
        let bundle = compute_aggregates(&df).unwrap();
        assert!(matches!(
            state_view(&df, &bundle, "XX", DEFAULT_TOP_N),
            Err(PipelineError::UnknownState(code)) if code == "XX"
        ));
    }
}
