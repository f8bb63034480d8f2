//! Нормализация данных

#![allow(non_snake_case)]

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Стандартизация признаков: (x - mean) / scale.
/// Работает по позициям колонок, а не по именам.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: mean.len(),
                actual: scale.len(),
            });
        }
        Ok(Self { mean, scale })
    }

    /// Проверка параметров после десериализации
    pub fn validate(&self) -> Result<()> {
        if self.scale.len() != self.mean.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.mean.len(),
                actual: self.scale.len(),
            });
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(PipelineError::Configuration("scaler mean is not finite".to_string()));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(PipelineError::Configuration(
                "scaler scale must be finite and non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        !self.mean.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<()> {
        if X.nrows() == 0 {
            return Err(PipelineError::Training("Empty dataset".to_string()));
        }

        // Среднее и стандартное отклонение по каждому признаку
        let mean = X
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::Training("Failed to compute mean".to_string()))?;
        let std = X.std_axis(Axis(0), 0.0);

        self.mean = mean.to_vec();
        // Избегаем деления на ноль
        self.scale = std
            .iter()
            .map(|&s| if s < 1e-10 || !s.is_finite() { 1.0 } else { s })
            .collect();

        Ok(())
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        if X.ncols() != self.mean.len() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.mean.len(),
                actual: X.ncols(),
            });
        }

        let mut normalized = X.clone();
        for mut row in normalized.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = (*val - self.mean[i]) / self.scale[i];
            }
        }

        Ok(normalized)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X)
    }
}
