//! Классификатор: градиентный бустинг деревьев решений (log-loss)

#![allow(non_snake_case)]

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Параметры бустинга
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Количество деревьев (итераций) за один вызов обучения
    pub iterations: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Доля строк для каждого дерева
    pub subsample: f64,
    /// Максимальное количество корзин гистограммы на признак
    pub max_bins: usize,
    /// L2-регуляризация значений листьев
    pub reg_lambda: f64,
    pub seed: u64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            iterations: 500,
            learning_rate: 0.03,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 0.8,
            max_bins: 32,
            reg_lambda: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                // NaN уходит вправо
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    /// Наибольший индекс признака в поддереве
    fn max_feature(&self) -> Option<usize> {
        match self {
            TreeNode::Leaf { .. } => None,
            TreeNode::Split {
                feature, left, right, ..
            } => [Some(*feature), left.max_feature(), right.max_feature()]
                .into_iter()
                .flatten()
                .max(),
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Бинарный классификатор. Значения листьев уже умножены на learning rate,
/// поэтому деревья из разных сессий обучения просто суммируются.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    feature_names: Vec<String>,
    base_score: f64,
    trees: Vec<TreeNode>,
    feature_gains: Vec<f64>,
    trained_at: DateTime<Utc>,
}

impl GradientBoostingClassifier {
    /// Обучение с нуля
    pub fn fit(
        X: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: Vec<String>,
        config: &BoostingConfig,
    ) -> Result<Self> {
        validate_training_data(X, y)?;
        if feature_names.len() != X.ncols() {
            return Err(PipelineError::ShapeMismatch {
                expected: feature_names.len(),
                actual: X.ncols(),
            });
        }

        let positive_rate = (y.sum() / y.len() as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (positive_rate / (1.0 - positive_rate)).ln();

        let mut model = Self {
            feature_names,
            base_score,
            trees: Vec::new(),
            feature_gains: vec![0.0; X.ncols()],
            trained_at: Utc::now(),
        };
        let scores = Array1::from_elem(X.nrows(), base_score);
        model.boost(X, y, scores, config)?;

        Ok(model)
    }

    /// Дообучение: продолжает бустинг от текущей модели и возвращает новую
    pub fn fit_warm(&self, X: &Array2<f64>, y: &Array1<f64>, config: &BoostingConfig) -> Result<Self> {
        validate_training_data(X, y)?;
        if X.ncols() != self.n_features() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.n_features(),
                actual: X.ncols(),
            });
        }

        let mut model = self.clone();
        model.trained_at = Utc::now();
        let scores = self.decision_function(X)?;
        model.boost(X, y, scores, config)?;

        Ok(model)
    }

    /// Метки классов (1 = экзопланета)
    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<u8>> {
        let probs = self.predict_proba(X)?;
        Ok(probs.mapv(|p| if p >= 0.5 { 1 } else { 0 }))
    }

    /// Вероятность положительного класса
    pub fn predict_proba(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(X)?.mapv(sigmoid))
    }

    /// Сырые log-odds
    pub fn decision_function(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if X.ncols() != self.n_features() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.n_features(),
                actual: X.ncols(),
            });
        }

        let scores = X
            .rows()
            .into_iter()
            .map(|row| self.base_score + self.trees.iter().map(|t| t.predict(&row)).sum::<f64>())
            .collect();
        Ok(scores)
    }

    /// Проверка модели после десериализации: разбиения ссылаются только на известные признаки
    pub fn validate(&self) -> Result<()> {
        let width = self.n_features();
        if self.feature_gains.len() != width {
            return Err(PipelineError::ShapeMismatch {
                expected: width,
                actual: self.feature_gains.len(),
            });
        }
        if !self.base_score.is_finite() {
            return Err(PipelineError::Configuration("base score is not finite".to_string()));
        }
        if let Some(feature) = self.trees.iter().filter_map(TreeNode::max_feature).max() {
            if feature >= width {
                return Err(PipelineError::Configuration(format!(
                    "tree splits on feature {} of {}",
                    feature, width
                )));
            }
        }
        Ok(())
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(TreeNode::depth).max().unwrap_or(0)
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Нормированная важность признаков (суммарный прирост на разбиениях)
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.feature_gains.iter().sum();
        if total > 0.0 {
            self.feature_gains.iter().map(|g| g / total).collect()
        } else {
            vec![0.0; self.feature_gains.len()]
        }
    }

    fn boost(
        &mut self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        mut scores: Array1<f64>,
        config: &BoostingConfig,
    ) -> Result<()> {
        let binned = BinnedMatrix::new(X, config.max_bins.max(2));
        let mut rng = StdRng::seed_from_u64(config.seed);
        let all_rows: Vec<usize> = (0..X.nrows()).collect();

        for _ in 0..config.iterations {
            // Градиенты log-loss: остаток и гессиан
            let probs = scores.mapv(sigmoid);
            let grad: Vec<f64> = y.iter().zip(probs.iter()).map(|(yi, pi)| yi - pi).collect();
            let hess: Vec<f64> = probs.iter().map(|p| (p * (1.0 - p)).max(1e-12)).collect();

            let mut rows: Vec<usize> = if config.subsample < 1.0 {
                all_rows
                    .iter()
                    .copied()
                    .filter(|_| rng.gen::<f64>() < config.subsample)
                    .collect()
            } else {
                all_rows.clone()
            };
            if rows.is_empty() {
                rows = all_rows.clone();
            }

            let builder = TreeBuilder {
                binned: &binned,
                grad: &grad,
                hess: &hess,
                config,
            };
            let tree = builder.build(rows, 0, &mut self.feature_gains);

            for (i, row) in X.rows().into_iter().enumerate() {
                scores[i] += tree.predict(&row);
            }
            self.trees.push(tree);
        }

        let mean_loss = log_loss(y, &scores);
        tracing::info!(
            trees = self.trees.len(),
            rows = X.nrows(),
            log_loss = mean_loss,
            "Gradient boosting fit finished"
        );

        Ok(())
    }
}

fn validate_training_data(X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if X.nrows() == 0 {
        return Err(PipelineError::Training("No labeled rows to train on".to_string()));
    }
    if X.nrows() != y.len() {
        return Err(PipelineError::ShapeMismatch {
            expected: X.nrows(),
            actual: y.len(),
        });
    }
    if X.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Training("Feature matrix contains non-finite values".to_string()));
    }
    Ok(())
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn log_loss(y: &Array1<f64>, scores: &Array1<f64>) -> f64 {
    let total: f64 = y
        .iter()
        .zip(scores.iter())
        .map(|(yi, s)| {
            let p = sigmoid(*s).clamp(1e-15, 1.0 - 1e-15);
            -(yi * p.ln() + (1.0 - yi) * (1.0 - p).ln())
        })
        .sum();
    total / y.len().max(1) as f64
}

/// Матрица, разбитая на корзины по квантилям каждого признака
struct BinnedMatrix {
    /// Границы корзин: значение x попадает в корзину b, если x <= edges[b]
    edges: Vec<Vec<f64>>,
    /// bins[feature][row]
    bins: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    fn new(X: &Array2<f64>, max_bins: usize) -> Self {
        let mut edges = Vec::with_capacity(X.ncols());
        let mut bins = Vec::with_capacity(X.ncols());

        for column in X.columns() {
            let mut distinct: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
            distinct.sort_by(|a, b| a.total_cmp(b));
            distinct.dedup();

            let feature_edges: Vec<f64> = if distinct.len() <= max_bins {
                distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
            } else {
                let mut cuts: Vec<f64> = (1..max_bins)
                    .map(|k| distinct[k * distinct.len() / max_bins])
                    .collect();
                cuts.dedup();
                cuts
            };

            let feature_bins = column
                .iter()
                .map(|&v| {
                    if v.is_finite() {
                        feature_edges.partition_point(|e| *e < v) as u16
                    } else {
                        feature_edges.len() as u16
                    }
                })
                .collect();

            edges.push(feature_edges);
            bins.push(feature_bins);
        }

        Self { edges, bins }
    }
}

struct TreeBuilder<'a> {
    binned: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    config: &'a BoostingConfig,
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, rows: Vec<usize>, depth: usize, gains: &mut [f64]) -> TreeNode {
        let (g_sum, h_sum) = self.sums(&rows);

        if depth >= self.config.max_depth || rows.len() < 2 * self.config.min_samples_leaf.max(1) {
            return self.leaf(g_sum, h_sum);
        }

        let Some(best) = self.find_best_split(&rows, g_sum, h_sum) else {
            return self.leaf(g_sum, h_sum);
        };

        gains[best.feature] += best.gain;
        let feature_bins = &self.binned.bins[best.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| (feature_bins[i] as usize) <= best.bin);

        TreeNode::Split {
            feature: best.feature,
            threshold: self.binned.edges[best.feature][best.bin],
            left: Box::new(self.build(left_rows, depth + 1, gains)),
            right: Box::new(self.build(right_rows, depth + 1, gains)),
        }
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]))
    }

    fn leaf(&self, g_sum: f64, h_sum: f64) -> TreeNode {
        TreeNode::Leaf {
            value: self.config.learning_rate * g_sum / (h_sum + self.config.reg_lambda),
        }
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.reg_lambda)
    }

    fn find_best_split(&self, rows: &[usize], g_sum: f64, h_sum: f64) -> Option<SplitCandidate> {
        let parent_score = self.score(g_sum, h_sum);
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;

        for (feature, feature_edges) in self.binned.edges.iter().enumerate() {
            if feature_edges.is_empty() {
                continue;
            }

            // Гистограмма (сумма градиентов, сумма гессианов, количество) по корзинам
            let mut hist = vec![(0.0, 0.0, 0usize); feature_edges.len() + 1];
            let feature_bins = &self.binned.bins[feature];
            for &i in rows {
                let slot = &mut hist[feature_bins[i] as usize];
                slot.0 += self.grad[i];
                slot.1 += self.hess[i];
                slot.2 += 1;
            }

            let (mut g_left, mut h_left, mut n_left) = (0.0, 0.0, 0usize);
            for (bin, &(g, h, n)) in hist.iter().enumerate().take(feature_edges.len()) {
                g_left += g;
                h_left += h;
                n_left += n;
                let n_right = rows.len() - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let gain = self.score(g_left, h_left) + self.score(g_sum - g_left, h_sum - h_left)
                    - parent_score;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let mut X = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let positive = i % 2 == 0;
            X[[i, 0]] = if positive { 2.0 + i as f64 * 0.01 } else { -2.0 - i as f64 * 0.01 };
            X[[i, 1]] = (i % 5) as f64;
            y[i] = if positive { 1.0 } else { 0.0 };
        }
        (X, y)
    }

    fn small_config() -> BoostingConfig {
        BoostingConfig {
            iterations: 30,
            learning_rate: 0.3,
            max_depth: 3,
            ..BoostingConfig::default()
        }
    }

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_fit_separates_classes() {
        let (X, y) = separable_data();
        let model = GradientBoostingClassifier::fit(&X, &y, names(), &small_config()).unwrap();

        let predictions = model.predict(&X).unwrap();
        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, t)| **p as f64 == **t)
            .count();
        assert_eq!(correct, y.len());
        assert_eq!(model.n_trees(), 30);
        assert!(model.max_depth() <= 3);

        let importances = model.feature_importances();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (X, y) = separable_data();
        let model = GradientBoostingClassifier::fit(&X, &y, names(), &small_config()).unwrap();
        for p in model.predict_proba(&X).unwrap() {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_warm_start_appends_trees() {
        let (X, y) = separable_data();
        let base = GradientBoostingClassifier::fit(&X, &y, names(), &small_config()).unwrap();
        let config = BoostingConfig {
            iterations: 5,
            ..small_config()
        };
        let tuned = base.fit_warm(&X, &y, &config).unwrap();

        assert_eq!(tuned.n_trees(), base.n_trees() + 5);
        // базовая модель не изменилась
        assert_eq!(base.n_trees(), 30);

        let after = tuned.predict_proba(&X).unwrap();
        assert!(after[0] > 0.5);
        assert!(after[1] < 0.5);
    }

    #[test]
    fn test_warm_start_rejects_other_width() {
        let (X, y) = separable_data();
        let base = GradientBoostingClassifier::fit(&X, &y, names(), &small_config()).unwrap();
        let wider = Array2::zeros((y.len(), 3));
        let err = base.fit_warm(&wider, &y, &small_config()).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_fit_rejects_empty_data() {
        let X = Array2::zeros((0, 2));
        let y = Array1::zeros(0);
        let err = GradientBoostingClassifier::fit(&X, &y, names(), &small_config()).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }

    #[test]
    fn test_serde_preserves_predictions() {
        let (X, y) = separable_data();
        let model = GradientBoostingClassifier::fit(&X, &y, names(), &small_config()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: GradientBoostingClassifier = serde_json::from_str(&json).unwrap();
        let before = model.predict_proba(&X).unwrap();
        let after = restored.predict_proba(&X).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(restored.feature_names(), model.feature_names());
    }
}
