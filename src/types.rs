/// Типы ответов API

use serde::{Deserialize, Serialize};

use crate::models::artifacts::ClassifierSource;

/// JSON не умеет NaN/Inf: такие значения заменяются нулём
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    #[serde(rename = "Prediction")]
    pub prediction: String,
    #[serde(rename = "Probability")]
    pub probability: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionInfo {
    pub planet_volume: Vec<f64>,
    pub star_volume: Vec<f64>,
    pub explanations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub status: String,
    pub preview: Vec<PredictionRow>,
    pub total_predictions: usize,
    pub total: usize,
    pub exoplanets: usize,
    pub false_positives: usize,
    /// Средняя вероятность предсказанного класса, в процентах
    pub confidence: f64,
    pub info: PredictionInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub status: String,
    pub message: String,
    pub rows_used: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model_source: Option<ClassifierSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
