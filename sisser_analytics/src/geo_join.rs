use crate::boundary::GeoBoundary;
use crate::columns::{reconcile_state_code, STATE};
use crate::models::StateAggregate;
use geojson::{Feature, JsonValue};
use log::warn;
use std::collections::HashMap;

/// A boundary with the state totals attached, if any matched.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedBoundary<'a> {
    pub boundary: &'a GeoBoundary,
    pub aggregate: Option<&'a StateAggregate>,
}

impl JoinedBoundary<'_> {
    /// Boundary-side code (`SIGLA_UF`).
    pub fn sigla_uf(&self) -> &str {
        &self.boundary.code
    }

    /// Aggregate-side code (`SG_UF_PROPRIEDADE`), absent when unmatched.
    pub fn state_code(&self) -> Option<&str> {
        self.aggregate.map(|a| a.state_code.as_str())
    }

    /// Boundary feature with the state totals as properties, null when unmatched.
    pub fn to_feature(&self) -> Feature {
        let mut feature = self.boundary.to_feature();
        let (code, area, premium, policies) = match self.aggregate {
            Some(a) => (
                JsonValue::from(a.state_code.as_str()),
                JsonValue::from(a.area_total),
                JsonValue::from(a.premium_total),
                JsonValue::from(a.policy_count),
            ),
            None => (JsonValue::Null, JsonValue::Null, JsonValue::Null, JsonValue::Null),
        };
        feature.set_property(STATE, code);
        feature.set_property("area_total", area);
        feature.set_property("valor_total", premium);
        feature.set_property("numero_seguros", policies);
        feature
    }
}

/// Codes that found no partner on the other side of the join.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinReport {
    pub unmatched_boundaries: Vec<String>,
    pub unmatched_states: Vec<String>,
}

impl JoinReport {
    pub fn is_complete(&self) -> bool {
        self.unmatched_boundaries.is_empty() && self.unmatched_states.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct JoinedBoundaries<'a> {
    pub rows: Vec<JoinedBoundary<'a>>,
    pub report: JoinReport,
}

impl JoinedBoundaries<'_> {
    pub fn to_features(&self) -> Vec<Feature> {
        self.rows.iter().map(JoinedBoundary::to_feature).collect()
    }
}

/// Left join of state totals onto boundaries by state code.
///
/// Every boundary yields exactly one row, in input order.
pub fn join_boundaries<'a>(
    boundaries: &'a [GeoBoundary],
    states: &'a [StateAggregate],
) -> JoinedBoundaries<'a> {
    let by_code: HashMap<String, &StateAggregate> =
        states.iter().map(|s| (reconcile_state_code(&s.state_code), s)).collect();

    let mut report = JoinReport::default();
    let rows: Vec<JoinedBoundary> = boundaries
        .iter()
        .map(|boundary| {
            let aggregate = by_code.get(&reconcile_state_code(&boundary.code)).copied();
            if aggregate.is_none() {
                report.unmatched_boundaries.push(boundary.code.clone());
            }
            JoinedBoundary {
                boundary,
                aggregate,
            }
        })
        .collect();

    for state in states {
        let code = reconcile_state_code(&state.state_code);
        if !boundaries.iter().any(|b| reconcile_state_code(&b.code) == code) {
            report.unmatched_states.push(state.state_code.clone());
        }
    }

    if !report.unmatched_boundaries.is_empty() {
        warn!(
            "boundaries without insurance records: {}",
            report.unmatched_boundaries.join(", ")
        );
    }
    if !report.unmatched_states.is_empty() {
        warn!(
            "states without a boundary: {}",
            report.unmatched_states.join(", ")
        );
    }

    JoinedBoundaries { rows, report }
}
