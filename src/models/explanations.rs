/// Производная информация для ответа: объёмы и текстовые объяснения

use std::f64::consts::PI;

use crate::preprocessing::table::RawTable;

const EARTH_VOLUME_KM3: f64 = 1.08321e12;
const SOLAR_VOLUME_KM3: f64 = 1.412e18;

pub const EXOPLANET_LABEL: &str = "Exoplanet";
pub const FALSE_POSITIVE_LABEL: &str = "False Positive";

/// Флаги ложноположительного сигнала KOI и их описание
const FALSE_POSITIVE_FLAGS: [(&str, &str); 4] = [
    (
        "koi_fpflag_nt",
        "the signal's light curve was not transit-like in shape",
    ),
    (
        "koi_fpflag_ss",
        "the source of the transit signal is offset from the target star, suggesting a background star (stellar scintillation)",
    ),
    (
        "koi_fpflag_co",
        "the center-of-light for the target star shifted during the transit, indicating the source is a nearby star (centroid offset)",
    ),
    (
        "koi_fpflag_ec",
        "the light curve's shape is characteristic of an eclipsing binary star system",
    ),
];

/// Текстовая метка для класса
pub fn label_name(class: u8) -> &'static str {
    if class == 1 {
        EXOPLANET_LABEL
    } else {
        FALSE_POSITIVE_LABEL
    }
}

/// Объём планеты в км³ по радиусу в радиусах Земли
pub fn planet_volume(radius: f64) -> f64 {
    (4.0 / 3.0) * PI * radius.powi(3) * EARTH_VOLUME_KM3
}

/// Объём звезды в км³ по радиусу в радиусах Солнца
pub fn star_volume(radius: f64) -> f64 {
    (4.0 / 3.0) * PI * radius.powi(3) * SOLAR_VOLUME_KM3
}

/// Объёмы по колонке радиусов; пустой список, если колонки нет
pub fn column_volumes(table: &RawTable, column: &str, volume: fn(f64) -> f64) -> Vec<f64> {
    if !table.contains(column) {
        return Vec::new();
    }
    (0..table.n_rows())
        .map(|row| {
            table
                .number(column, row)
                .map(volume)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        })
        .collect()
}

/// Объяснение предсказания для одной строки
pub fn explain_disposition(table: &RawTable, row: usize, label: &str) -> String {
    let name = table
        .text("kepoi_name", row)
        .unwrap_or_else(|| format!("row {}", row));
    let mut explanation = format!("Explanation for {} (Disposition: {}):\n", name, label);

    match label {
        EXOPLANET_LABEL => {
            explanation.push_str(
                "This signal is a confirmed exoplanet. It has successfully passed all automated \
                 and manual vetting checks, showing no signs of being a false positive.",
            );
        }
        FALSE_POSITIVE_LABEL => {
            let reasons: Vec<&str> = FALSE_POSITIVE_FLAGS
                .iter()
                .filter(|(flag, _)| table.number(flag, row) == Some(1.0))
                .map(|(_, reason)| *reason)
                .collect();

            if reasons.is_empty() {
                explanation.push_str(
                    "This signal is a false positive. While no primary flags were raised in this dataset, \
                     it was identified as non-planetary through other vetting procedures.",
                );
            } else {
                explanation.push_str(&format!(
                    "This signal is a false positive because {}.",
                    reasons.join(", and ")
                ));
            }
        }
        other => {
            return format!(
                "The status of {} is '{}', which is pending further analysis.",
                name, other
            );
        }
    }

    explanation
}
