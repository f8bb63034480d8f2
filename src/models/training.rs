//! Обучение полного набора артефактов на размеченных данных KOI

#![allow(non_snake_case)]

use ndarray::Axis;

use crate::error::{PipelineError, Result};
use crate::models::artifacts::Artifacts;
use crate::models::classifier::{BoostingConfig, GradientBoostingClassifier};
use crate::preprocessing::feature_selection::FeatureSelector;
use crate::preprocessing::imputation::KnnImputer;
use crate::preprocessing::normalization::StandardScaler;
use crate::preprocessing::pipeline::{LabelSpec, PreprocessingArtifacts};
use crate::preprocessing::table::RawTable;

/// Идентификаторы и поля, которые раскрывают ответ
pub const DEFAULT_COLUMNS_TO_DROP: [&str; 9] = [
    "rowid",
    "kepid",
    "kepoi_name",
    "kepler_name",
    "koi_disposition",
    "koi_pdisposition",
    "koi_score",
    "koi_tce_delivname",
    "koi_comment",
];

#[derive(Debug, Clone)]
pub struct FitOptions {
    pub labels: LabelSpec,
    pub columns_to_drop: Vec<String>,
    /// Колонка остаётся, если доля пропусков строго меньше порога
    pub max_missing_fraction: f64,
    pub n_neighbors: usize,
    pub n_features: usize,
    pub rfe_step: usize,
    pub boosting: BoostingConfig,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            labels: LabelSpec::default(),
            columns_to_drop: DEFAULT_COLUMNS_TO_DROP.iter().map(|s| s.to_string()).collect(),
            max_missing_fraction: 0.5,
            n_neighbors: 5,
            n_features: 15,
            rfe_step: 1,
            boosting: BoostingConfig::default(),
        }
    }
}

pub fn fit_artifacts(table: &RawTable, options: &FitOptions) -> Result<Artifacts> {
    // Метки и фильтрация строк до отбора колонок
    let (mut features, y) = options.labels.split_labels(table)?;
    if y.is_empty() {
        return Err(PipelineError::Training(format!(
            "no rows labeled `{}` or `{}`",
            options.labels.positive, options.labels.negative
        )));
    }

    features.drop_columns(&options.columns_to_drop);

    // Числовые колонки с долей пропусков < порога, в порядке таблицы
    let cols_to_keep: Vec<String> = features
        .column_names()
        .into_iter()
        .filter(|name| features.is_numeric(name))
        .filter(|name| {
            features
                .missing_fraction(name)
                .map_or(false, |f| f < options.max_missing_fraction)
        })
        .map(str::to_string)
        .collect();
    if cols_to_keep.is_empty() {
        return Err(PipelineError::Training("no usable numeric columns".to_string()));
    }
    tracing::info!(
        rows = y.len(),
        kept = cols_to_keep.len(),
        "Selected columns with less than {:.0}% missing",
        options.max_missing_fraction * 100.0
    );

    let X = features.numeric_matrix(&cols_to_keep)?;

    let mut imputer = KnnImputer::new(options.n_neighbors);
    let X_imputed = imputer.fit_transform(&X)?;

    let mut scaler = StandardScaler::new();
    let X_scaled = scaler.fit_transform(&X_imputed)?;

    let selected_features = FeatureSelector::new(options.n_features, options.rfe_step)
        .select(&X_scaled, &y, &cols_to_keep)?;
    tracing::info!(features = ?selected_features, "RFE selected features");

    let indices: Vec<usize> = selected_features
        .iter()
        .filter_map(|name| cols_to_keep.iter().position(|c| c == name))
        .collect();
    let X_selected = X_scaled.select(Axis(1), &indices);

    let classifier =
        GradientBoostingClassifier::fit(&X_selected, &y, selected_features.clone(), &options.boosting)?;

    Ok(Artifacts {
        classifier,
        preprocessing: PreprocessingArtifacts {
            scaler,
            imputer,
            cols_to_keep,
            selected_features,
            columns_to_drop: options.columns_to_drop.clone(),
        },
    })
}
