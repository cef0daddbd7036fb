//! Random forest regressor.
//!
//! Bagged CART regression trees (squared-error splits, every feature
//! considered at every node). Prediction averages the trees; feature
//! importance is the mean per-tree share of total impurity decrease.
//!
//! # Tree Layout
//!
//! Nodes live in a flat vector, root at index 0:
//! - `feature == -1` marks a leaf, whose `value` is the prediction
//! - otherwise `features[feature] <= threshold` goes `left`, else `right`

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Regressor;
use crate::config::MlConfig;
use crate::error::{ClubError, Result};

/// A single node in a regression tree.
#[derive(Debug, Clone)]
struct TreeNode {
    /// Feature index to split on (-1 for leaf nodes).
    feature: i32,
    threshold: f64,
    left: i32,
    right: i32,
    /// Mean target of the training samples that reached this node.
    value: f64,
}

impl TreeNode {
    fn leaf(value: f64) -> Self {
        TreeNode {
            feature: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            value,
        }
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    /// Sum of squared errors of both children
    sse: f64,
}

/// Growth limits for one tree
#[derive(Debug, Clone, Copy)]
struct TreeLimits {
    max_depth: Option<usize>,
    min_samples_split: usize,
}

fn sum_squared_error(y: &[f64], indices: &[usize]) -> f64 {
    let n = indices.len() as f64;
    let (sum, sum_sq) = indices
        .iter()
        .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
    (sum_sq - sum * sum / n).max(0.0)
}

fn best_split(x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> Option<Split> {
    let n_features = x[indices[0]].len();
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let n = indices.len();

    let mut best: Option<Split> = None;
    let mut order = indices.to_vec();

    for feature in 0..n_features {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 0..n - 1 {
            let i = order[pos];
            left_sum += y[i];
            left_sq += y[i] * y[i];

            let here = x[i][feature];
            let next = x[order[pos + 1]][feature];
            if here == next {
                continue;
            }

            let n_left = (pos + 1) as f64;
            let n_right = (n - pos - 1) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left).max(0.0)
                + (right_sq - right_sum * right_sum / n_right).max(0.0);

            if best.as_ref().map_or(true, |b| sse < b.sse) {
                best = Some(Split {
                    feature,
                    threshold: (here + next) / 2.0,
                    sse,
                });
            }
        }
    }

    best
}

/// Grow a subtree over `indices`; returns the index of its root node
fn grow(
    nodes: &mut Vec<TreeNode>,
    importances: &mut [f64],
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
    depth: usize,
    limits: TreeLimits,
) -> usize {
    let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
    let node_idx = nodes.len();
    nodes.push(TreeNode::leaf(mean));

    let depth_reached = limits.max_depth.is_some_and(|max| depth >= max);
    if indices.len() < limits.min_samples_split || depth_reached {
        return node_idx;
    }

    let parent_sse = sum_squared_error(y, indices);
    if parent_sse <= f64::EPSILON {
        return node_idx;
    }

    let Some(split) = best_split(x, y, indices) else {
        return node_idx;
    };
    let decrease = parent_sse - split.sse;
    if decrease <= 0.0 {
        return node_idx;
    }
    importances[split.feature] += decrease;

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| x[i][split.feature] <= split.threshold);

    let left = grow(nodes, importances, x, y, &left_idx, depth + 1, limits);
    let right = grow(nodes, importances, x, y, &right_idx, depth + 1, limits);

    let node = &mut nodes[node_idx];
    node.feature = split.feature as i32;
    node.threshold = split.threshold;
    node.left = left as i32;
    node.right = right as i32;

    node_idx
}

fn traverse(nodes: &[TreeNode], features: &[f64]) -> f64 {
    let mut node_idx = 0usize;
    loop {
        let node = &nodes[node_idx];
        if node.feature == -1 {
            return node.value;
        }
        node_idx = if features[node.feature as usize] <= node.threshold {
            node.left as usize
        } else {
            node.right as usize
        };
    }
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter_mut().for_each(|v| *v /= total);
    }
}

/// Random forest regressor trained in-process.
#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    seed: u64,
    limits: TreeLimits,
    n_features: usize,
    trees: Vec<Vec<TreeNode>>,
    importances: Vec<f64>,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        RandomForestRegressor {
            n_estimators: n_estimators.max(1),
            seed,
            limits: TreeLimits {
                max_depth: None,
                min_samples_split: 2,
            },
            n_features: 0,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.limits.max_depth = Some(max_depth);
        self
    }

    /// Number of trees in the fitted ensemble (0 before `fit`).
    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn check_rows(features: &[Vec<f64>], width: usize) -> Result<()> {
        for (i, row) in features.iter().enumerate() {
            if row.len() != width {
                return Err(ClubError::Model(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(ClubError::Model(format!("row {} has a non-finite feature", i)));
            }
        }
        Ok(())
    }
}

impl From<&MlConfig> for RandomForestRegressor {
    fn from(config: &MlConfig) -> Self {
        RandomForestRegressor::new(config.n_estimators, config.seed)
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, features: &[Vec<f64>], target: &[f64]) -> Result<()> {
        if features.is_empty() {
            return Err(ClubError::Model("no training examples".to_string()));
        }
        if features.len() != target.len() {
            return Err(ClubError::Model(format!(
                "{} feature rows but {} targets",
                features.len(),
                target.len()
            )));
        }
        let width = features[0].len();
        Self::check_rows(features, width)?;
        if target.iter().any(|v| !v.is_finite()) {
            return Err(ClubError::Model("non-finite target value".to_string()));
        }

        let n = features.len();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut importances = vec![0.0; width];

        for _ in 0..self.n_estimators {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

            let mut nodes = Vec::new();
            let mut tree_importances = vec![0.0; width];
            grow(&mut nodes, &mut tree_importances, features, target, &sample, 0, self.limits);

            normalize(&mut tree_importances);
            for (total, value) in importances.iter_mut().zip(&tree_importances) {
                *total += value;
            }
            trees.push(nodes);
        }

        normalize(&mut importances);
        self.n_features = width;
        self.trees = trees;
        self.importances = importances;
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(ClubError::Model("model has not been fitted".to_string()));
        }
        Self::check_rows(features, self.n_features)?;

        let n = self.trees.len() as f64;
        Ok(features
            .iter()
            .map(|row| self.trees.iter().map(|tree| traverse(tree, row)).sum::<f64>() / n)
            .collect())
    }

    fn feature_importances(&self) -> Vec<f64> {
        self.importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // Target depends on the first column only; the second is noise
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 10.0 } else { 50.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(25, 42);
        forest.fit(&x, &y).unwrap();

        let preds = forest.predict(&[vec![2.0, 1.0], vec![37.0, 3.0]]).unwrap();
        assert!(preds[0] < 20.0, "low side predicted {}", preds[0]);
        assert!(preds[1] > 40.0, "high side predicted {}", preds[1]);

        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 2);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = step_data();
        let mut a = RandomForestRegressor::new(10, 7);
        let mut b = RandomForestRegressor::new(10, 7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        let probe = vec![vec![19.5, 2.0], vec![21.0, 0.0]];
        assert_eq!(a.predict(&probe).unwrap(), b.predict(&probe).unwrap());
    }

    #[test]
    fn test_constant_target_predicts_constant() {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let y = vec![1.0; 8];
        let mut forest = RandomForestRegressor::new(5, 1);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.predict(&[vec![100.0]]).unwrap(), vec![1.0]);
        assert_eq!(forest.feature_importances(), vec![0.0]);
    }

    #[test]
    fn test_shape_errors() {
        let mut forest = RandomForestRegressor::new(3, 1);
        assert!(forest.predict(&[vec![1.0]]).is_err());
        assert!(forest.fit(&[], &[]).is_err());
        assert!(forest.fit(&[vec![1.0], vec![2.0]], &[1.0]).is_err());
        assert!(forest.fit(&[vec![1.0], vec![2.0, 3.0]], &[1.0, 2.0]).is_err());

        forest.fit(&[vec![1.0, 2.0], vec![2.0, 3.0]], &[1.0, 2.0]).unwrap();
        assert!(forest.is_fitted());
        assert_eq!(forest.n_estimators(), 3);
        assert!(forest.predict(&[vec![1.0]]).is_err());
    }
}
