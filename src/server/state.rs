//! Общее состояние сервиса

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::ServiceConfig;
use crate::models::artifacts::{ArtifactStore, ClassifierSource};
use crate::models::classifier::GradientBoostingClassifier;
use crate::preprocessing::pipeline::{LabelSpec, PreprocessingArtifacts};

use super::error::{Result, ServerError};

#[derive(Clone)]
pub struct LoadedClassifier {
    pub model: Arc<GradientBoostingClassifier>,
    pub source: ClassifierSource,
}

/// Кэш артефактов в памяти. Заполняется при старте; классификатор
/// заменяется только после успешной записи дообученной модели в хранилище.
/// Хранилище остаётся источником истины, версий и отката нет.
pub struct AppState {
    pub config: ServiceConfig,
    pub store: ArtifactStore,
    pub labels: LabelSpec,
    preprocessing: std::result::Result<Arc<PreprocessingArtifacts>, String>,
    classifier: RwLock<Option<LoadedClassifier>>,
}

impl AppState {
    /// Загрузка артефактов. Отсутствие файлов не роняет сервис:
    /// он стартует с `model_loaded = false`.
    pub fn load(config: ServiceConfig) -> Self {
        let store = ArtifactStore::open(config.models_dir.clone());

        let preprocessing = match store.load_preprocessing() {
            Ok(artifacts) => Ok(Arc::new(artifacts)),
            Err(e) => {
                tracing::error!(error = %e, dir = %store.dir().display(), "Preprocessing artifacts unavailable");
                Err(e.to_string())
            }
        };

        let classifier = match store.load_classifier() {
            Ok((model, source)) => {
                tracing::info!(
                    source = ?source,
                    trees = model.n_trees(),
                    features = model.n_features(),
                    trained_at = %model.trained_at().to_rfc3339(),
                    "Classifier loaded"
                );
                Some(LoadedClassifier {
                    model: Arc::new(model),
                    source,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, dir = %store.dir().display(), "Classifier unavailable");
                None
            }
        };

        if let (Ok(pre), Some(loaded)) = (&preprocessing, &classifier) {
            if pre.selected_features.as_slice() != loaded.model.feature_names() {
                tracing::warn!(
                    selected = ?pre.selected_features,
                    classifier = ?loaded.model.feature_names(),
                    "Classifier was trained on different feature names"
                );
            }
        }

        Self {
            config,
            store,
            labels: LabelSpec::default(),
            preprocessing,
            classifier: RwLock::new(classifier),
        }
    }

    pub fn preprocessing(&self) -> Result<Arc<PreprocessingArtifacts>> {
        self.preprocessing
            .as_ref()
            .map(Arc::clone)
            .map_err(|e| ServerError::ModelNotLoaded(e.clone()))
    }

    pub async fn classifier(&self) -> Result<LoadedClassifier> {
        self.classifier
            .read()
            .await
            .clone()
            .ok_or_else(|| ServerError::ModelNotLoaded("no classifier artifact found".to_string()))
    }

    pub async fn model_source(&self) -> Option<ClassifierSource> {
        self.classifier.read().await.as_ref().map(|c| c.source)
    }

    /// Модель считается загруженной, когда доступны и классификатор, и предобработка
    pub async fn model_loaded(&self) -> bool {
        self.preprocessing.is_ok() && self.classifier.read().await.is_some()
    }

    pub async fn swap_classifier(&self, model: GradientBoostingClassifier, source: ClassifierSource) {
        let mut slot = self.classifier.write().await;
        *slot = Some(LoadedClassifier {
            model: Arc::new(model),
            source,
        });
    }
}
