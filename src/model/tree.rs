//! CART classification tree with the Gini criterion
//!
//! Nodes are stored in a flat vector in depth-first order; a split node
//! records the positions of its children. Candidate thresholds are the
//! midpoints between consecutive distinct feature values, found with one
//! sorted sweep per feature.

use rand::prelude::*;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{Classifier, Params, param_usize};

/// Gain below which a split is not worth making
const MIN_GAIN: f64 = 1e-12;

/// Growth limits of a single tree
#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features considered at each split; `None` considers all of them
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

impl TreeConfig {
    /// Read `max_depth` and `min_samples_leaf`, defaulting absent ones
    pub fn from_params(params: &Params) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_depth: param_usize(params, "max_depth", defaults.max_depth)?,
            min_samples_leaf: param_usize(params, "min_samples_leaf", defaults.min_samples_leaf)?
                .max(1),
            max_features: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [u8],
    config: &'a TreeConfig,
    width: usize,
}

impl TreeBuilder<'_> {
    fn positives(&self, indices: &[usize]) -> usize {
        indices.iter().filter(|i| self.labels[**i] == 1).count()
    }

    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        rng: &mut StdRng,
    ) -> usize {
        let current = nodes.len();
        let positives = self.positives(indices);
        let probability = if indices.is_empty() {
            0.5
        } else {
            positives as f64 / indices.len() as f64
        };

        let pure = positives == 0 || positives == indices.len();
        if pure
            || depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf
        {
            nodes.push(Node::Leaf { probability });
            return current;
        }

        let Some(split) = self.find_best_split(indices, positives, rng) else {
            nodes.push(Node::Leaf { probability });
            return current;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|i| self.rows[**i][split.feature] <= split.threshold);

        nodes.push(Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, rng);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, rng);

        if let Node::Split { left, right, .. } = &mut nodes[current] {
            *left = left_idx;
            *right = right_idx;
        }
        current
    }

    fn candidate_features(&self, rng: &mut StdRng) -> Vec<usize> {
        match self.config.max_features {
            Some(m) if m > 0 && m < self.width => index::sample(rng, self.width, m).into_vec(),
            _ => (0..self.width).collect(),
        }
    }

    fn find_best_split(
        &self,
        indices: &[usize],
        positives: usize,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let parent = gini(positives, n);
        let min_leaf = self.config.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;

        for feature in self.candidate_features(rng) {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|a, b| self.rows[*a][feature].total_cmp(&self.rows[*b][feature]));

            let mut left_positives = 0;
            for position in 0..n - 1 {
                left_positives += usize::from(self.labels[sorted[position]] == 1);

                let left_n = position + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let value = self.rows[sorted[position]][feature];
                let next = self.rows[sorted[position + 1]][feature];
                if value >= next {
                    continue;
                }

                let weighted = (left_n as f64 * gini(left_positives, left_n)
                    + right_n as f64 * gini(positives - left_positives, right_n))
                    / n as f64;
                let gain = parent - weighted;

                if gain > MIN_GAIN && best.is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: value + (next - value) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// A fitted classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Fit on all rows
    #[must_use]
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], config: &TreeConfig, seed: u64) -> Self {
        let indices: Vec<usize> = (0..rows.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        Self::fit_indices(rows, labels, &indices, config, &mut rng)
    }

    /// Fit on the rows at `indices`, which may repeat
    pub(crate) fn fit_indices(
        rows: &[Vec<f64>],
        labels: &[u8],
        indices: &[usize],
        config: &TreeConfig,
        rng: &mut StdRng,
    ) -> Self {
        let builder = TreeBuilder {
            rows,
            labels,
            config,
            width: rows.first().map_or(0, Vec::len),
        };
        let mut nodes = Vec::new();
        builder.build_node(indices, 0, &mut nodes, rng);
        Self { nodes }
    }

    /// Number of nodes, leaves included
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path
    #[must_use]
    pub fn depth(&self) -> usize {
        fn depth_from(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_from(nodes, *left).max(depth_from(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_from(&self.nodes, 0)
        }
    }
}

impl Classifier for DecisionTree {
    fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { probability }) => return *probability,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row.get(*feature).is_some_and(|v| v <= threshold) {
                        *left
                    } else {
                        *right
                    };
                }
                None => return 0.5,
            }
        }
    }
}
