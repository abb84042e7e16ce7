use crate::error::Result;
use crate::stats::{pearson, round_to};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Square Pearson matrix over a fixed set of numeric columns, rounded to two places.
///
/// Undefined cells (zero variance or fewer than two complete pairs) hold NaN,
/// including diagonal cells of constant columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.len()).all(|i| {
            (0..self.len()).all(|j| {
                let (a, b) = (self.get(i, j), self.get(j, i));
                a == b || (a.is_nan() && b.is_nan())
            })
        })
    }
}

/// Correlation of each pair of `columns`, using the rows where both are present.
pub fn correlation_matrix(records: &DataFrame, columns: &[&str]) -> Result<CorrelationMatrix> {
    let mut data: Vec<Vec<Option<f64>>> = Vec::with_capacity(columns.len());
    for name in columns {
        let values = records.column(name)?.f64()?;
        data.push(
            values
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect(),
        );
    }

    Ok(CorrelationMatrix {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        values: pairwise_correlations(&data),
    })
}

fn pairwise_correlations(data: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
    let n = data.len();
    let mut matrix = vec![vec![f64::NAN; n]; n];

    for i in 0..n {
        for j in i..n {
            let (xs, ys): (Vec<f64>, Vec<f64>) = data[i]
                .iter()
                .zip(&data[j])
                .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                .unzip();
            let r = pearson(&xs, &ys);
            let cell = if i == j {
                // exactly one when the column varies at all
                if r.is_nan() { f64::NAN } else { 1.0 }
            } else {
                round_to(r, 2)
            };
            matrix[i][j] = cell;
            matrix[j][i] = cell;
        }
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "a" => &[1.0, 2.0, 3.0, 4.0],
            "b" => &[2.0, 4.1, 6.0, 8.2],
            "c" => &[4.0, 3.0, 2.0, 1.0],
            "flat" => &[5.0, 5.0, 5.0, 5.0]
        )
        .unwrap()
    }

    #[test]
    fn test_matrix_symmetric_with_unit_diagonal() {
        let matrix = correlation_matrix(&frame(), &["a", "b", "c"]).unwrap();
        assert_eq!(matrix.len(), 3);
        assert!(matrix.is_symmetric());
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), 1.0);
        }
        assert_eq!(matrix.get(0, 2), -1.0);
        assert_eq!(matrix.get(0, 1), 1.0);
    }

    #[test]
    fn test_constant_column_is_nan_including_diagonal() {
        let matrix = correlation_matrix(&frame(), &["a", "flat"]).unwrap();
        assert!(matrix.get(1, 1).is_nan());
        assert!(matrix.get(0, 1).is_nan());
        assert!(matrix.get(1, 0).is_nan());
        assert_eq!(matrix.get(0, 0), 1.0);
        assert!(matrix.is_symmetric());
    }

    #[test]
    fn test_cells_are_rounded_to_two_places() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "y" => &[2.0, 1.0, 4.0, 3.0, 5.0]
        )
        .unwrap();
        let matrix = correlation_matrix(&df, &["x", "y"]).unwrap();
        // r = 0.8 exactly for this sample
        assert_eq!(matrix.get(0, 1), 0.8);
        let r = matrix.get(1, 0);
        assert_eq!(r, round_to(r, 2));
    }

    #[test]
    fn test_missing_values_use_complete_pairs() {
        let df = df!(
            "x" => &[Some(1.0), Some(2.0), None, Some(3.0)],
            "y" => &[Some(1.0), Some(2.0), Some(100.0), Some(3.0)]
        )
        .unwrap();
        let matrix = correlation_matrix(&df, &["x", "y"]).unwrap();
        assert_eq!(matrix.get(0, 1), 1.0);
    }
}
