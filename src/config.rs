//! Конфигурация сервиса

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;

use crate::models::classifier::BoostingConfig;

/// Параметры сервиса: переменные окружения, переопределяемые флагами командной строки
#[derive(Debug, Clone, Args)]
pub struct ServiceConfig {
    #[arg(long, env = "EXO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "EXO_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Каталог с артефактами модели
    #[arg(long, env = "EXO_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Максимальный размер загружаемого файла
    #[arg(long, env = "EXO_MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Количество деревьев, добавляемых при каждом дообучении
    #[arg(long, env = "EXO_RETRAIN_ITERATIONS", default_value_t = 500)]
    pub retrain_iterations: usize,
}

impl ServiceConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }

    pub fn retrain_boosting(&self) -> BoostingConfig {
        BoostingConfig {
            iterations: self.retrain_iterations,
            ..BoostingConfig::default()
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            models_dir: PathBuf::from("models"),
            max_upload_bytes: 50 * 1024 * 1024,
            retrain_iterations: 500,
        }
    }
}
