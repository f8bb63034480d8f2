//! Заполнение пропусков по ближайшим соседям

#![allow(non_snake_case)]

use std::cmp::Ordering;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// KNN-импьютер. Хранит обучающие строки (с пропусками) и средние по колонкам.
/// Работает по позициям колонок, порядок должен совпадать с порядком при обучении.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnImputer {
    n_neighbors: usize,
    /// Обучающие строки, `None` на месте пропуска
    rows: Vec<Vec<Option<f64>>>,
    column_means: Vec<f64>,
}

impl KnnImputer {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            rows: Vec::new(),
            column_means: Vec::new(),
        }
    }

    pub fn n_features(&self) -> usize {
        self.column_means.len()
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Проверка параметров после десериализации: все строки шириной n_features
    pub fn validate(&self) -> Result<()> {
        if self.n_neighbors == 0 {
            return Err(PipelineError::Configuration("n_neighbors must be positive".to_string()));
        }
        let width = self.column_means.len();
        if let Some(row) = self.rows.iter().find(|r| r.len() != width) {
            return Err(PipelineError::ShapeMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        if self.column_means.iter().any(|m| !m.is_finite()) {
            return Err(PipelineError::Configuration("imputer column mean is not finite".to_string()));
        }
        Ok(())
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<()> {
        if X.nrows() == 0 {
            return Err(PipelineError::Training("Empty dataset".to_string()));
        }

        self.rows = X
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|&v| if v.is_finite() { Some(v) } else { None })
                    .collect()
            })
            .collect();

        // Колонка без единого значения заполняется нулём
        self.column_means = (0..X.ncols())
            .map(|j| {
                let present: Vec<f64> = self.rows.iter().filter_map(|r| r[j]).collect();
                if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                }
            })
            .collect();

        Ok(())
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        if X.ncols() != self.column_means.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.column_means.len(),
                actual: X.ncols(),
            });
        }

        let mut imputed = X.clone();
        for (i, row) in X.rows().into_iter().enumerate() {
            let sample: Vec<f64> = row.to_vec();
            if sample.iter().all(|v| v.is_finite()) {
                continue;
            }

            // Расстояния до всех обучающих строк не зависят от заполняемой колонки
            let distances: Vec<Option<f64>> =
                self.rows.iter().map(|r| nan_euclidean(&sample, r)).collect();

            for (j, value) in sample.iter().enumerate() {
                if value.is_finite() {
                    continue;
                }
                imputed[[i, j]] = self.impute_value(&distances, j);
            }
        }

        Ok(imputed)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X)
    }

    fn impute_value(&self, distances: &[Option<f64>], column: usize) -> f64 {
        // Доноры: строки с известным значением в колонке и определённым расстоянием
        let mut donors: Vec<(f64, usize)> = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(idx, r)| match (r[column], distances[idx]) {
                (Some(_), Some(d)) => Some((d, idx)),
                _ => None,
            })
            .collect();

        if donors.is_empty() {
            return self.column_means[column];
        }

        donors.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then(a.1.cmp(&b.1)));
        let k = self.n_neighbors.min(donors.len());
        let sum: f64 = donors[..k]
            .iter()
            .filter_map(|&(_, idx)| self.rows[idx][column])
            .sum();
        sum / k as f64
    }
}

impl Default for KnnImputer {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Евклидово расстояние с учётом пропусков:
/// sqrt(n / n_shared * сумма квадратов по общим координатам).
/// `None`, если общих координат нет.
fn nan_euclidean(a: &[f64], b: &[Option<f64>]) -> Option<f64> {
    let mut shared = 0usize;
    let mut accum = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        if let (true, Some(y)) = (x.is_finite(), y) {
            let d = x - y;
            accum += d * d;
            shared += 1;
        }
    }
    if shared == 0 {
        return None;
    }
    Some((a.len() as f64 / shared as f64 * accum).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_imputes_from_nearest_rows() {
        let train = array![[1.0, 10.0], [2.0, 20.0], [100.0, 1000.0]];
        let mut imputer = KnnImputer::new(2);
        imputer.fit(&train).unwrap();

        let out = imputer.transform(&array![[1.5, f64::NAN]]).unwrap();
        assert!((out[[0, 1]] - 15.0).abs() < 1e-12);
        assert_eq!(out[[0, 0]], 1.5);
    }

    #[test]
    fn test_fully_missing_row_falls_back_to_means() {
        let train = array![[1.0, 2.0], [3.0, 4.0]];
        let mut imputer = KnnImputer::new(5);
        imputer.fit(&train).unwrap();

        let out = imputer.transform(&array![[f64::NAN, f64::NAN]]).unwrap();
        assert_eq!(out[[0, 0]], 2.0);
        assert_eq!(out[[0, 1]], 3.0);
    }

    #[test]
    fn test_donors_need_the_missing_column() {
        let train = array![[1.0, f64::NAN], [5.0, 50.0]];
        let mut imputer = KnnImputer::new(1);
        imputer.fit(&train).unwrap();

        let out = imputer.transform(&array![[1.0, f64::NAN]]).unwrap();
        assert_eq!(out[[0, 1]], 50.0);
    }

    #[test]
    fn test_nan_euclidean_weighting() {
        let d = nan_euclidean(&[1.0, f64::NAN], &[Some(3.0), Some(7.0)]).unwrap();
        // sqrt(2 / 1 * 4)
        assert!((d - 8.0_f64.sqrt()).abs() < 1e-12);
        assert!(nan_euclidean(&[f64::NAN], &[Some(1.0)]).is_none());
    }

    #[test]
    fn test_serde_keeps_missing_cells() {
        let mut imputer = KnnImputer::new(3);
        imputer.fit(&array![[1.0, f64::NAN]]).unwrap();
        let json = serde_json::to_string(&imputer).unwrap();
        let restored: KnnImputer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.rows, vec![vec![Some(1.0), None]]);
    }
}
