/// API сервер классификатора экзопланет

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exo_predictor::{
    config::ServiceConfig,
    models::{fit_artifacts, ArtifactStore, FitOptions},
    preprocessing::{CsvOptions, RawTable},
    server,
};

#[derive(Parser)]
#[command(name = "exo-predictor", version, about = "Exoplanet detection API")]
struct Cli {
    #[command(flatten)]
    config: ServiceConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Запуск HTTP API (по умолчанию)
    Serve,
    /// Обучение полного набора артефактов на размеченном CSV
    Fit {
        /// CSV с колонкой koi_disposition
        #[arg(long)]
        data: PathBuf,
        /// Количество признаков после RFE
        #[arg(long, default_value_t = 15)]
        n_features: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::run_server(cli.config).await,
        Command::Fit { data, n_features } => fit(&cli.config, &data, n_features),
    }
}

fn fit(config: &ServiceConfig, data: &Path, n_features: usize) -> anyhow::Result<()> {
    let bytes = std::fs::read(data).with_context(|| format!("read training data: {}", data.display()))?;
    let table = RawTable::from_csv(&bytes, &CsvOptions::with_comments(b'#'))?;
    tracing::info!(rows = table.n_rows(), cols = table.n_cols(), "Training data loaded");

    let options = FitOptions {
        n_features,
        ..FitOptions::default()
    };
    let artifacts = fit_artifacts(&table, &options)?;

    let store = ArtifactStore::open(config.models_dir.clone());
    store.save(&artifacts)?;
    tracing::info!(
        dir = %store.dir().display(),
        features = ?artifacts.preprocessing.selected_features,
        trees = artifacts.classifier.n_trees(),
        "Artifacts written"
    );
    Ok(())
}
