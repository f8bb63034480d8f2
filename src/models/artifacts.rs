//! Хранилище обученных артефактов (JSON-файлы в каталоге моделей)

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::models::classifier::GradientBoostingClassifier;
use crate::preprocessing::imputation::KnnImputer;
use crate::preprocessing::normalization::StandardScaler;
use crate::preprocessing::pipeline::PreprocessingArtifacts;

pub const BASE_CLASSIFIER_FILE: &str = "classifier.json";
pub const FINETUNED_CLASSIFIER_FILE: &str = "classifier_finetuned.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const IMPUTER_FILE: &str = "imputer.json";
pub const COLS_TO_KEEP_FILE: &str = "cols_to_keep.json";
pub const SELECTED_FEATURES_FILE: &str = "selected_features.json";
pub const COLUMNS_TO_DROP_FILE: &str = "columns_to_drop.json";

/// Откуда загружен классификатор
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierSource {
    Base,
    FineTuned,
}

/// Полный набор из шести артефактов
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub classifier: GradientBoostingClassifier,
    pub preprocessing: PreprocessingArtifacts,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self) -> Result<(Artifacts, ClassifierSource)> {
        let preprocessing = self.load_preprocessing()?;
        let (classifier, source) = self.load_classifier()?;
        Ok((
            Artifacts {
                classifier,
                preprocessing,
            },
            source,
        ))
    }

    pub fn load_preprocessing(&self) -> Result<PreprocessingArtifacts> {
        let artifacts = PreprocessingArtifacts {
            scaler: self.read::<StandardScaler>(SCALER_FILE)?,
            imputer: self.read::<KnnImputer>(IMPUTER_FILE)?,
            cols_to_keep: self.read::<Vec<String>>(COLS_TO_KEEP_FILE)?,
            selected_features: self.read::<Vec<String>>(SELECTED_FEATURES_FILE)?,
            columns_to_drop: self.read::<Vec<String>>(COLUMNS_TO_DROP_FILE)?,
        };
        artifacts.validate().map_err(|e| PipelineError::ArtifactLoad {
            name: "preprocessing".to_string(),
            reason: e.to_string(),
        })?;
        Ok(artifacts)
    }

    /// Дообученная модель имеет приоритет над базовой
    pub fn load_classifier(&self) -> Result<(GradientBoostingClassifier, ClassifierSource)> {
        let (name, source) = if self.dir.join(FINETUNED_CLASSIFIER_FILE).exists() {
            (FINETUNED_CLASSIFIER_FILE, ClassifierSource::FineTuned)
        } else {
            (BASE_CLASSIFIER_FILE, ClassifierSource::Base)
        };

        let model: GradientBoostingClassifier = self.read(name)?;
        model.validate().map_err(|e| PipelineError::ArtifactLoad {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok((model, source))
    }

    pub fn save(&self, artifacts: &Artifacts) -> Result<()> {
        self.save_preprocessing(&artifacts.preprocessing)?;
        self.save_base_classifier(&artifacts.classifier)
    }

    pub fn save_preprocessing(&self, artifacts: &PreprocessingArtifacts) -> Result<()> {
        self.write(SCALER_FILE, &artifacts.scaler)?;
        self.write(IMPUTER_FILE, &artifacts.imputer)?;
        self.write(COLS_TO_KEEP_FILE, &artifacts.cols_to_keep)?;
        self.write(SELECTED_FEATURES_FILE, &artifacts.selected_features)?;
        self.write(COLUMNS_TO_DROP_FILE, &artifacts.columns_to_drop)
    }

    pub fn save_base_classifier(&self, model: &GradientBoostingClassifier) -> Result<()> {
        self.write(BASE_CLASSIFIER_FILE, model)
    }

    pub fn save_finetuned_classifier(&self, model: &GradientBoostingClassifier) -> Result<()> {
        self.write(FINETUNED_CLASSIFIER_FILE, model)
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let load_error = |reason: String| PipelineError::ArtifactLoad {
            name: name.to_string(),
            reason,
        };

        let bytes = fs::read(&path).map_err(|e| load_error(format!("{}: {}", path.display(), e)))?;
        let value = serde_json::from_slice(&bytes).map_err(|e| load_error(e.to_string()))?;
        tracing::debug!(artifact = name, bytes = bytes.len(), "Loaded artifact");
        Ok(value)
    }

    /// Запись через временный файл и переименование: читатели не видят частичный файл
    fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let store_error = |reason: String| PipelineError::ArtifactStore {
            name: name.to_string(),
            reason,
        };

        fs::create_dir_all(&self.dir).map_err(|e| store_error(e.to_string()))?;
        let bytes = serde_json::to_vec(value).map_err(|e| store_error(e.to_string()))?;
        let tmp = self.dir.join(format!(".{}.tmp", name));
        fs::write(&tmp, &bytes).map_err(|e| store_error(e.to_string()))?;
        fs::rename(&tmp, self.dir.join(name)).map_err(|e| store_error(e.to_string()))?;

        tracing::info!(artifact = name, bytes = bytes.len(), dir = %self.dir.display(), "Stored artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::BoostingConfig;
    use crate::preprocessing::pipeline::tests::toy_artifacts;
    use ndarray::{array, Array1};

    fn toy_classifier(iterations: usize) -> GradientBoostingClassifier {
        let x = array![[0.0, 1.0], [1.0, 0.0], [0.5, 0.5], [0.9, 0.1]];
        let y = Array1::from(vec![1.0, 0.0, 1.0, 0.0]);
        let config = BoostingConfig {
            iterations,
            ..BoostingConfig::default()
        };
        GradientBoostingClassifier::fit(&x, &y, vec!["c".into(), "a".into()], &config).unwrap()
    }

    #[test]
    fn test_roundtrip_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let artifacts = Artifacts {
            classifier: toy_classifier(3),
            preprocessing: toy_artifacts(),
        };
        store.save(&artifacts).unwrap();

        let (loaded, source) = store.load().unwrap();
        assert_eq!(source, ClassifierSource::Base);
        assert_eq!(loaded.classifier.n_trees(), 3);
        assert_eq!(loaded.preprocessing.cols_to_keep, artifacts.preprocessing.cols_to_keep);
        assert_eq!(loaded.preprocessing.selected_features, artifacts.preprocessing.selected_features);
    }

    #[test]
    fn test_finetuned_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        store.save_base_classifier(&toy_classifier(2)).unwrap();
        store.save_finetuned_classifier(&toy_classifier(7)).unwrap();

        let (model, source) = store.load_classifier().unwrap();
        assert_eq!(source, ClassifierSource::FineTuned);
        assert_eq!(model.n_trees(), 7);
    }

    #[test]
    fn test_missing_artifact_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let err = store.load_preprocessing().unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactLoad { ref name, .. } if name == SCALER_FILE));
    }

    /// Сохраняет артефакты, правит один JSON-файл и записывает его обратно
    fn tamper(dir: &Path, name: &str, edit: impl FnOnce(&mut serde_json::Value)) {
        let path = dir.join(name);
        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        edit(&mut value);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    fn saved_store(dir: &Path) -> ArtifactStore {
        let store = ArtifactStore::open(dir);
        store
            .save(&Artifacts {
                classifier: toy_classifier(3),
                preprocessing: toy_artifacts(),
            })
            .unwrap();
        store
    }

    fn is_load_error(err: &PipelineError, file: &str) -> bool {
        matches!(err, PipelineError::ArtifactLoad { name, .. } if name == file)
    }

    #[test]
    fn test_scaler_with_short_scale_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = saved_store(dir.path());
        tamper(dir.path(), SCALER_FILE, |v| {
            v["scale"].as_array_mut().unwrap().pop();
        });

        let err = store.load_preprocessing().unwrap_err();
        assert!(is_load_error(&err, "preprocessing"), "{:?}", err);
    }

    #[test]
    fn test_ragged_imputer_rows_are_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = saved_store(dir.path());
        tamper(dir.path(), IMPUTER_FILE, |v| {
            v["rows"][0].as_array_mut().unwrap().pop();
        });

        let err = store.load_preprocessing().unwrap_err();
        assert!(is_load_error(&err, "preprocessing"), "{:?}", err);
    }

    #[test]
    fn test_tree_feature_out_of_range_is_load_error() {
        fn push_features_out(value: &mut serde_json::Value) {
            match value {
                serde_json::Value::Object(map) => {
                    if let Some(feature) = map.get_mut("feature") {
                        *feature = serde_json::json!(99);
                    }
                    map.values_mut().for_each(push_features_out);
                }
                serde_json::Value::Array(items) => items.iter_mut().for_each(push_features_out),
                _ => {}
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = saved_store(dir.path());
        let model = toy_classifier(10);
        assert!(model.max_depth() > 0);
        store.save_base_classifier(&model).unwrap();
        tamper(dir.path(), BASE_CLASSIFIER_FILE, push_features_out);

        let err = store.load_classifier().unwrap_err();
        assert!(is_load_error(&err, BASE_CLASSIFIER_FILE), "{:?}", err);
    }

    #[test]
    fn test_corrupt_artifact_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        fs::write(dir.path().join(BASE_CLASSIFIER_FILE), b"{not json").unwrap();
        let err = store.load_classifier().unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactLoad { .. }));
    }
}
