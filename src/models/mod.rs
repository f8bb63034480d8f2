/// ML модели и артефакты

pub mod artifacts;
pub mod classifier;
pub mod explanations;
pub mod training;

pub use artifacts::{ArtifactStore, Artifacts, ClassifierSource};
pub use classifier::{BoostingConfig, GradientBoostingClassifier};
pub use training::{fit_artifacts, FitOptions};
