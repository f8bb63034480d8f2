//! Общие помощники для интеграционных тестов

#![allow(dead_code)]

use std::path::Path;

use exo_predictor::models::{fit_artifacts, ArtifactStore, BoostingConfig, FitOptions};
use exo_predictor::preprocessing::{CsvOptions, RawTable};

pub const BOUNDARY: &str = "exo-test-boundary";

/// Синтетические данные в формате KOI: подтверждённые планеты имеют
/// неглубокий транзит, ложные срабатывания - глубокий
pub fn koi_csv(rows: usize) -> String {
    let mut csv = String::from(
        "kepid,kepoi_name,koi_disposition,koi_period,koi_depth,koi_duration,koi_prad,koi_srad,koi_fpflag_nt,koi_fpflag_ec\n",
    );
    for i in 0..rows {
        let (disposition, depth, flag) = match i % 3 {
            0 => ("CONFIRMED", 120.0 + (i % 11) as f64, 0),
            1 => ("FALSE POSITIVE", 4000.0 + (i % 13) as f64 * 10.0, 1),
            _ => ("CANDIDATE", 900.0, 0),
        };
        csv.push_str(&format!(
            "{},K{:05}.01,{},{:.3},{},{:.2},{:.2},{:.2},{},{}\n",
            10_000 + i,
            i,
            disposition,
            2.0 + (i % 17) as f64 * 0.7,
            depth,
            1.5 + (i % 5) as f64 * 0.3,
            1.0 + (i % 4) as f64 * 0.5,
            0.8 + (i % 3) as f64 * 0.2,
            flag,
            flag
        ));
    }
    csv
}

pub fn test_fit_options() -> FitOptions {
    FitOptions {
        n_features: 3,
        boosting: BoostingConfig {
            iterations: 25,
            learning_rate: 0.3,
            max_depth: 3,
            ..BoostingConfig::default()
        },
        ..FitOptions::default()
    }
}

/// Обучает артефакты на синтетических данных и сохраняет их в каталог
pub fn write_artifacts(dir: &Path) {
    let table = RawTable::from_csv(koi_csv(60).as_bytes(), &CsvOptions::default()).unwrap();
    let artifacts = fit_artifacts(&table, &test_fit_options()).unwrap();
    ArtifactStore::open(dir).save(&artifacts).unwrap();
}

/// Тело multipart-запроса с одним файлом в поле `file`
pub fn multipart_body(file_name: &str, content: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = file_name,
        c = content
    )
}
