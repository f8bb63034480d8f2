//! Exo Predictor - классификатор экзопланет по данным транзитов KOI

pub mod config;
pub mod error;
pub mod types;
pub mod models;
pub mod preprocessing;
pub mod server;

pub use error::{PipelineError, Result};
pub use types::*;
pub use models::*;
pub use preprocessing::*;
