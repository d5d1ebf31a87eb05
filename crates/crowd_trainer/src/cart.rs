//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy regression trees fitted to fixed-point gradients and
//! hessians. Each node sorts its rows per feature once and sweeps prefix sums
//! to score every distinct threshold.

use crowdcast_core::gbdt::{Node, Tree, SCALE};

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 regularisation on leaf values (fixed-point)
    pub lambda: i64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_leaf: 20,
            lambda: SCALE,
        }
    }
}

/// A fitted tree plus the gain of every split it made
#[derive(Clone, Debug)]
pub struct BuiltTree {
    pub tree: Tree,
    /// `(feature_idx, gain)` per internal node
    pub split_gains: Vec<(usize, i128)>,
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: i64,
    gain: i128,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: i64, gain: i128) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Build a regression tree using the exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<i64>],
    gradients: &'a [i64],
    hessians: &'a [i64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    /// All three slices must have one entry per row.
    pub fn new(
        features: &'a [Vec<i64>],
        gradients: &'a [i64],
        hessians: &'a [i64],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());

        Self {
            config,
            features,
            gradients,
            hessians,
            feature_count: features.first().map(Vec::len).unwrap_or(0),
        }
    }

    /// Fit a tree with unit weight; callers set the learning rate.
    pub fn build(&self) -> BuiltTree {
        let mut nodes = Vec::new();
        let mut split_gains = Vec::new();
        let indices: Vec<usize> = (0..self.features.len()).collect();

        self.build_node(&indices, 0, &mut nodes, &mut split_gains);

        BuiltTree {
            tree: Tree::new(nodes, SCALE),
            split_gains,
        }
    }

    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        split_gains: &mut Vec<(usize, i128)>,
    ) -> i32 {
        let current = nodes.len() as i32;

        let split = if depth < self.config.max_depth
            && indices.len() >= 2 * self.config.min_samples_leaf.max(1)
        {
            self.find_best_split(indices)
        } else {
            None
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current, self.leaf_value(indices)));
            return current;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[i][split.feature_idx] <= split.threshold);

        // Placeholder; children are appended after it so links point forward
        nodes.push(Node::internal(
            current,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));
        split_gains.push((split.feature_idx, split.gain));

        let left_idx = self.build_node(&left, depth + 1, nodes, split_gains);
        let right_idx = self.build_node(&right, depth + 1, nodes, split_gains);

        let node = &mut nodes[current as usize];
        node.left = left_idx;
        node.right = right_idx;
        current
    }

    /// Best positive-gain split over every feature and distinct threshold
    fn find_best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let (g_total, h_total) = self.sum_gradients_hessians(indices);
        let parent_score = self.score(g_total, h_total);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature_idx in 0..self.feature_count {
            order.sort_by_key(|&i| (self.features[i][feature_idx], i));

            let mut g_left = 0i128;
            let mut h_left = 0i128;
            for pos in 0..order.len() - 1 {
                let row = order[pos];
                g_left += self.gradients[row] as i128;
                h_left += self.hessians[row] as i128;

                let value = self.features[row][feature_idx];
                if value == self.features[order[pos + 1]][feature_idx] {
                    continue;
                }

                let n_left = pos + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }

                let gain = self.score(g_left, h_left)
                    + self.score(g_total - g_left, h_total - h_left)
                    - parent_score;
                if gain <= 0 {
                    continue;
                }

                let candidate = SplitCandidate::new(feature_idx, value, gain);
                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    /// Structure score `G² / (H + lambda)`
    fn score(&self, g: i128, h: i128) -> i128 {
        let denom = h + self.config.lambda as i128;
        if denom <= 0 {
            return 0;
        }
        g * g / denom
    }

    fn sum_gradients_hessians(&self, indices: &[usize]) -> (i128, i128) {
        indices.iter().fold((0i128, 0i128), |(g, h), &i| {
            (g + self.gradients[i] as i128, h + self.hessians[i] as i128)
        })
    }

    /// Newton step `-G / (H + lambda)` at `SCALE`
    fn leaf_value(&self, indices: &[usize]) -> i64 {
        let (g, h) = self.sum_gradients_hessians(indices);
        let denom = h + self.config.lambda as i128;
        if denom <= 0 {
            return 0;
        }
        let value = -(g * SCALE as i128) / denom;
        value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}
