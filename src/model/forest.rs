//! Random forest regression
//!
//! Bootstrap-aggregated CART trees with variance-reduction splits. Training
//! is seeded, so the same rows always give the same forest.

use crate::model::{check_training_data, Regressor};
use crate::{ForestConfig, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree stored as a node arena; index 0 is the root
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Sum of squares explained (higher is better)
    score: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestConfig,
    dim: usize,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self, indices: &mut [usize], rng: &mut StdRng) -> RegressionTree {
        self.grow(indices, 0, rng);
        RegressionTree { nodes: self.nodes }
    }

    fn grow(&mut self, indices: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let node_idx = self.nodes.len();
        let value = indices.iter().map(|&i| self.y[i]).sum::<f64>() / indices.len() as f64;
        self.nodes.push(Node::Leaf(value));

        let depth_reached = self.params.max_depth.map_or(false, |d| depth >= d);
        let pure = indices.iter().all(|&i| self.y[i] == self.y[indices[0]]);
        if depth_reached || pure || indices.len() < self.params.min_samples_split.max(2) {
            return node_idx;
        }

        let split = match self.best_split(indices, rng) {
            Some(split) => split,
            None => return node_idx,
        };

        let x = self.x;
        indices.sort_by(|&a, &b| x[a][split.feature].total_cmp(&x[b][split.feature]));
        let pos = indices
            .iter()
            .take_while(|&&i| x[i][split.feature] <= split.threshold)
            .count();
        let (left_indices, right_indices) = indices.split_at_mut(pos);

        let left = self.grow(left_indices, depth + 1, rng);
        let right = self.grow(right_indices, depth + 1, rng);
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<SplitCandidate> {
        let max_features = self.params.max_features.unwrap_or(self.dim).clamp(1, self.dim);
        let features: Vec<usize> = if max_features < self.dim {
            rand::seq::index::sample(rng, self.dim, max_features).into_vec()
        } else {
            (0..self.dim).collect()
        };

        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = indices.len();
        let total: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let mut best: Option<SplitCandidate> = None;

        let mut sorted = indices.to_vec();
        for feature in features {
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            for k in 1..n {
                left_sum += self.y[sorted[k - 1]];
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[sorted[k - 1]][feature];
                let hi = self.x[sorted[k]][feature];
                if lo >= hi {
                    continue;
                }

                let right_sum = total - left_sum;
                let score =
                    left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
                if best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        score,
                    });
                }
            }
        }

        best
    }
}

/// Random forest regressor
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    dim: usize,
}

impl RandomForest {
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl Regressor for RandomForest {
    type Params = ForestConfig;

    const NAME: &'static str = "Random Forest NBA";

    fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestConfig) -> Result<Self> {
        let dim = check_training_data(x, y)?;
        let n = x.len();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                TreeBuilder {
                    x,
                    y,
                    params,
                    dim,
                    nodes: Vec::new(),
                }
                .build(&mut sample, &mut rng)
            })
            .collect();

        Ok(RandomForest { trees, dim })
    }

    fn predict(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, (i % 7) as f64]).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|r| if r[0] < 30.0 { 200.0 } else { 240.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(&x, &y, &ForestConfig::default()).unwrap();

        assert_eq!(forest.trees().len(), 100);
        assert!((forest.predict(&[5.0, 1.0]) - 200.0).abs() < 5.0);
        assert!((forest.predict(&[55.0, 1.0]) - 240.0).abs() < 5.0);
    }

    #[test]
    fn test_seeded_training_is_deterministic() {
        let (x, y) = step_data();
        let params = ForestConfig {
            n_trees: 10,
            max_features: Some(1),
            ..ForestConfig::default()
        };
        let a = RandomForest::fit(&x, &y, &params).unwrap();
        let b = RandomForest::fit(&x, &y, &params).unwrap();
        for probe in [[0.0, 0.0], [29.5, 3.0], [31.0, 6.0]] {
            assert_eq!(a.predict(&probe), b.predict(&probe));
        }
    }

    #[test]
    fn test_max_depth_limits_trees() {
        let (x, y) = step_data();
        let params = ForestConfig {
            n_trees: 5,
            max_depth: Some(1),
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&x, &y, &params).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 1));
        assert!(forest.trees().iter().all(|t| t.leaf_count() <= 2));
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y = vec![215.0; 20];
        let forest = RandomForest::fit(&x, &y, &ForestConfig::default()).unwrap();
        assert_eq!(forest.predict(&[3.0]), 215.0);
        assert!(forest.trees().iter().all(|t| t.leaf_count() == 1));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(RandomForest::fit(&[], &[], &ForestConfig::default()).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[1.0, 2.0], &ForestConfig::default()).is_err());
        assert!(RandomForest::fit(&[vec![f64::NAN]], &[1.0], &ForestConfig::default()).is_err());
    }
}
