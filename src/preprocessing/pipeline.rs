//! Конвейер предобработки: удаление колонок, выравнивание, KNN-импутация,
//! стандартизация и отбор признаков. Порядок шагов строго фиксирован и
//! совпадает с порядком при обучении.

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::preprocessing::imputation::KnnImputer;
use crate::preprocessing::normalization::StandardScaler;
use crate::preprocessing::table::{Cell, RawTable};

/// Обученные артефакты предобработки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingArtifacts {
    pub scaler: StandardScaler,
    pub imputer: KnnImputer,
    /// Порядок значим: импьютер и скейлер обучены именно на нём
    pub cols_to_keep: Vec<String>,
    pub selected_features: Vec<String>,
    pub columns_to_drop: Vec<String>,
}

impl PreprocessingArtifacts {
    /// Проверка согласованности артефактов между собой
    pub fn validate(&self) -> Result<()> {
        self.scaler.validate()?;
        self.imputer.validate()?;

        let width = self.cols_to_keep.len();
        for actual in [self.imputer.n_features(), self.scaler.n_features()] {
            if actual != width {
                return Err(PipelineError::ShapeMismatch { expected: width, actual });
            }
        }
        self.selected_indices().map(|_| ())
    }

    fn selected_indices(&self) -> Result<Vec<usize>> {
        self.selected_features
            .iter()
            .map(|name| {
                self.cols_to_keep
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| PipelineError::UnknownFeature(name.clone()))
            })
            .collect()
    }
}

/// Итоговая матрица признаков: колонки = selected_features, строки = строки входа
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }
}

/// Колонка с исходом и значения классов для режима дообучения
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSpec {
    pub column: String,
    pub positive: String,
    pub negative: String,
}

impl Default for LabelSpec {
    fn default() -> Self {
        Self {
            column: "koi_disposition".to_string(),
            positive: "CONFIRMED".to_string(),
            negative: "FALSE POSITIVE".to_string(),
        }
    }
}

impl LabelSpec {
    /// 1.0 для положительного класса, 0.0 для отрицательного, `None` для прочих
    pub fn label_of(&self, cell: &Cell) -> Option<f64> {
        let value = cell.as_text()?.trim();
        if value == self.positive {
            Some(1.0)
        } else if value == self.negative {
            Some(0.0)
        } else {
            None
        }
    }

    /// Фильтрует строки до двух известных классов, возвращает таблицу без
    /// колонки с меткой и вектор меток той же длины
    pub fn split_labels(&self, table: &RawTable) -> Result<(RawTable, Array1<f64>)> {
        let column = table
            .column(&self.column)
            .ok_or_else(|| PipelineError::Configuration(self.column.clone()))?;

        let labels: Vec<Option<f64>> = column.cells.iter().map(|c| self.label_of(c)).collect();
        let mask: Vec<bool> = labels.iter().map(Option::is_some).collect();

        let mut filtered = table.filter_rows(&mask);
        filtered.drop_columns(&[self.column.as_str()]);
        let y: Array1<f64> = labels.into_iter().flatten().collect();

        tracing::debug!(
            input_rows = table.n_rows(),
            labeled_rows = y.len(),
            "Derived labels from disposition column"
        );
        Ok((filtered, y))
    }
}

pub struct Preprocessor;

impl Preprocessor {
    /// Режим инференса
    pub fn transform(table: &RawTable, artifacts: &PreprocessingArtifacts) -> Result<FeatureMatrix> {
        tracing::debug!(rows = table.n_rows(), cols = table.n_cols(), "Preprocessing input");

        // 1. Удаление ненужных колонок (отсутствующие игнорируются)
        let mut cleaned = table.clone();
        cleaned.drop_columns(&artifacts.columns_to_drop);
        tracing::debug!(cols = cleaned.n_cols(), "After dropping columns");

        // 2. Недостающие колонки добавляются целиком из пропусков
        for name in &artifacts.cols_to_keep {
            if !cleaned.contains(name) {
                tracing::debug!(column = %name, "Filling absent column with missing values");
                cleaned.insert_missing(name);
            }
        }

        // 3. Ровно cols_to_keep и в том же порядке
        let filtered = cleaned.select(&artifacts.cols_to_keep);
        let X = filtered.numeric_matrix(&artifacts.cols_to_keep)?;
        tracing::debug!(rows = X.nrows(), cols = X.ncols(), "After filtering to cols_to_keep");

        // 4. KNN-импутация
        let imputed = artifacts.imputer.transform(&X)?;
        tracing::debug!(rows = imputed.nrows(), cols = imputed.ncols(), "After imputation");

        // 5. Стандартизация всех сохранённых колонок
        let scaled = artifacts.scaler.transform(&imputed)?;
        tracing::debug!(rows = scaled.nrows(), cols = scaled.ncols(), "After scaling");

        // 6. Отбор признаков RFE
        let indices = artifacts.selected_indices()?;
        let values = scaled.select(Axis(1), &indices);
        tracing::debug!(rows = values.nrows(), cols = values.ncols(), "After RFE selection");

        Ok(FeatureMatrix {
            columns: artifacts.selected_features.clone(),
            values,
        })
    }

    /// Режим дообучения: метки извлекаются и строки фильтруются до выравнивания колонок
    pub fn transform_labeled(
        table: &RawTable,
        artifacts: &PreprocessingArtifacts,
        labels: &LabelSpec,
    ) -> Result<(FeatureMatrix, Array1<f64>)> {
        let (features, y) = labels.split_labels(table)?;
        let matrix = Self::transform(&features, artifacts)?;
        Ok((matrix, y))
    }
}
