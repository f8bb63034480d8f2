/// Модуль предобработки данных

pub mod feature_selection;
pub mod imputation;
pub mod normalization;
pub mod pipeline;
pub mod table;

pub use feature_selection::FeatureSelector;
pub use imputation::KnnImputer;
pub use normalization::StandardScaler;
pub use pipeline::{FeatureMatrix, LabelSpec, PreprocessingArtifacts, Preprocessor};
pub use table::{Cell, CsvOptions, RawTable};
