//! Рекурсивное исключение признаков (RFE)

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::models::classifier::{BoostingConfig, GradientBoostingClassifier};

/// Отбор признаков по важности в бустинге.
/// Применяется только при обучении; на инференсе используется сохранённый список.
pub struct FeatureSelector {
    n_features_to_select: usize,
    step: usize,
    config: BoostingConfig,
}

impl FeatureSelector {
    pub fn new(n_features_to_select: usize, step: usize) -> Self {
        Self {
            n_features_to_select: n_features_to_select.max(1),
            step: step.max(1),
            config: BoostingConfig {
                iterations: 50,
                learning_rate: 0.1,
                max_depth: 4,
                ..BoostingConfig::default()
            },
        }
    }

    pub fn with_config(mut self, config: BoostingConfig) -> Self {
        self.config = config;
        self
    }

    /// Возвращает выбранные имена в исходном относительном порядке
    pub fn select(&self, X: &Array2<f64>, y: &Array1<f64>, names: &[String]) -> Result<Vec<String>> {
        if names.len() != X.ncols() {
            return Err(PipelineError::ShapeMismatch {
                expected: names.len(),
                actual: X.ncols(),
            });
        }

        let n_select = self.n_features_to_select.min(names.len());
        let mut remaining: Vec<usize> = (0..names.len()).collect();

        while remaining.len() > n_select {
            let subset = X.select(Axis(1), &remaining);
            let subset_names: Vec<String> = remaining.iter().map(|&i| names[i].clone()).collect();
            let model = GradientBoostingClassifier::fit(&subset, y, subset_names, &self.config)?;
            let importances = model.feature_importances();

            // Сначала удаляем наименее важные
            let mut order: Vec<usize> = (0..remaining.len()).collect();
            order.sort_by(|&a, &b| importances[a].total_cmp(&importances[b]).then(b.cmp(&a)));

            let n_to_remove = self.step.min(remaining.len() - n_select);
            let mut removed: Vec<usize> = order.into_iter().take(n_to_remove).collect();
            removed.sort_unstable_by(|a, b| b.cmp(a));
            for pos in removed {
                let feature = remaining.remove(pos);
                tracing::debug!(feature = %names[feature], "RFE eliminated feature");
            }
        }

        Ok(remaining.into_iter().map(|i| names[i].clone()).collect())
    }
}

impl Default for FeatureSelector {
    fn default() -> Self {
        Self::new(15, 1)
    }
}
