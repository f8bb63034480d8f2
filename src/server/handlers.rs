//! HTTP-обработчики

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::models::explanations::{
    column_volumes, explain_disposition, label_name, planet_volume, star_volume, EXOPLANET_LABEL,
};
use crate::preprocessing::pipeline::Preprocessor;
use crate::preprocessing::table::{CsvOptions, RawTable};
use crate::types::{
    finite_or_zero, HealthResponse, PredictResponse, PredictionInfo, PredictionRow, RetrainResponse,
};

use super::error::{Result, ServerError};
use super::state::AppState;

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Exoplanet Detection API is running!",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: state.model_loaded().await,
        model_source: state.model_source().await,
    })
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>> {
    let (file_name, data) = read_csv_upload(multipart).await?;
    info!(file = %file_name, bytes = data.len(), "Predict request");

    let preprocessing = state.preprocessing()?;
    let classifier = state.classifier().await?;

    // Обработка синхронная и блокирует задачу запроса
    let table = RawTable::from_csv(&data, &CsvOptions::default())?;
    let features = Preprocessor::transform(&table, &preprocessing)?;
    let predictions = classifier.model.predict(&features.values)?;
    let probabilities = classifier.model.predict_proba(&features.values)?;

    let response = build_predict_response(&table, &predictions.to_vec(), &probabilities.to_vec());
    info!(
        rows = response.total,
        exoplanets = response.exoplanets,
        confidence = response.confidence,
        "Predictions computed"
    );
    Ok(Json(response))
}

pub async fn retrain(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<RetrainResponse>> {
    let (file_name, data) = read_csv_upload(multipart).await?;
    info!(file = %file_name, bytes = data.len(), "Retrain request");

    let preprocessing = state.preprocessing()?;
    let current = state.classifier().await?;

    let table = RawTable::from_csv(&data, &CsvOptions::with_comments(b'#'))?;
    let (features, labels) = Preprocessor::transform_labeled(&table, &preprocessing, &state.labels)?;

    // Дообучение от текущей модели; до записи в хранилище ничего не меняется
    let tuned = current
        .model
        .fit_warm(&features.values, &labels, &state.config.retrain_boosting())?;
    state.store.save_finetuned_classifier(&tuned)?;

    let (reloaded, source) = state.store.load_classifier()?;
    let trees = reloaded.n_trees();
    state.swap_classifier(reloaded, source).await;

    info!(rows = labels.len(), trees, source = ?source, "Classifier retrained and swapped");
    Ok(Json(RetrainResponse {
        status: "success".to_string(),
        message: "Model retrained successfully".to_string(),
        rows_used: labels.len(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Ответ на предсказание; строки идут в порядке входа.
/// Нечисловые значения заменяются нулём.
pub fn build_predict_response(table: &RawTable, predictions: &[u8], probabilities: &[f64]) -> PredictResponse {
    let preview: Vec<PredictionRow> = predictions
        .iter()
        .zip(probabilities)
        .map(|(&class, &probability)| PredictionRow {
            prediction: label_name(class).to_string(),
            probability: finite_or_zero(probability),
        })
        .collect();

    let total = preview.len();
    let exoplanets = preview.iter().filter(|r| r.prediction == EXOPLANET_LABEL).count();

    // Уверенность: вероятность предсказанного класса
    let confidence = if total > 0 {
        let sum: f64 = preview
            .iter()
            .map(|r| {
                if r.prediction == EXOPLANET_LABEL {
                    r.probability
                } else {
                    1.0 - r.probability
                }
            })
            .sum();
        (sum / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    let explanations = preview
        .iter()
        .enumerate()
        .map(|(row, r)| explain_disposition(table, row, &r.prediction))
        .collect();

    PredictResponse {
        status: "success".to_string(),
        total_predictions: total,
        total,
        exoplanets,
        false_positives: total - exoplanets,
        confidence: finite_or_zero(confidence),
        info: PredictionInfo {
            planet_volume: column_volumes(table, "koi_prad", planet_volume),
            star_volume: column_volumes(table, "koi_srad", star_volume),
            explanations,
        },
        preview,
    }
}

/// Достаёт CSV-файл из multipart-запроса (поле `file`)
async fn read_csv_upload(
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(String, Bytes)> {
    let mut multipart = multipart.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(ServerError::BadRequest(
                "Invalid file type. Please upload a CSV file.".to_string(),
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        return Ok((file_name, data));
    }

    Err(ServerError::BadRequest("No file provided".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RawTable {
        RawTable::from_csv(csv.as_bytes(), &CsvOptions::default()).unwrap()
    }

    #[test]
    fn test_non_finite_probability_becomes_zero() {
        let t = table("kepoi_name\nK1\nK2\n");
        let response = build_predict_response(&t, &[1, 0], &[f64::NAN, f64::INFINITY]);

        assert_eq!(response.preview[0].probability, 0.0);
        assert_eq!(response.preview[1].probability, 0.0);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("null"));
        assert!(!json.contains("NaN"));
    }

    #[test]
    fn test_counts_and_confidence() {
        let t = table("kepoi_name,koi_prad\nK1,1\nK2,2\nK3,\n");
        let response = build_predict_response(&t, &[1, 0, 1], &[0.9, 0.2, 0.7]);

        assert_eq!(response.total, 3);
        assert_eq!(response.total_predictions, 3);
        assert_eq!(response.exoplanets, 2);
        assert_eq!(response.false_positives, 1);
        // (0.9 + 0.8 + 0.7) / 3
        assert_eq!(response.confidence, 80.0);
        assert_eq!(response.info.planet_volume.len(), 3);
        assert_eq!(response.info.planet_volume[2], 0.0);
        assert!(response.info.star_volume.is_empty());
        assert_eq!(response.info.explanations.len(), 3);
        assert_eq!(response.preview[1].prediction, "False Positive");
    }

    #[test]
    fn test_empty_input() {
        let t = table("kepoi_name\n");
        let response = build_predict_response(&t, &[], &[]);
        assert_eq!(response.total, 0);
        assert_eq!(response.confidence, 0.0);
    }

    #[test]
    fn test_preview_serializes_with_capitalized_keys() {
        let t = table("a\n1\n");
        let response = build_predict_response(&t, &[1], &[0.75]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["preview"][0]["Prediction"], "Exoplanet");
        assert_eq!(value["preview"][0]["Probability"], 0.75);
    }
}
