//! Decision tree structures for GBDT inference
//!
//! Nodes live in a flat vector with the root at index 0. Thresholds and leaf
//! values are fixed-point integers at the model's scale.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// Internal nodes carry a feature index and child indices. Leaves carry
/// `feature_idx == -1`, children `-1` and a `leaf` value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: i32,
    pub left: i32,
    pub right: i32,
    pub feature_idx: i32,
    /// Split threshold; samples with `value <= threshold` go left
    pub threshold: i64,
    pub leaf: Option<i64>,
}

impl Node {
    pub fn internal(id: i32, feature_idx: i32, threshold: i64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    pub fn leaf(id: i32, value: i64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree of a boosted ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tree {
    pub nodes: Vec<Node>,

    /// Multiplier applied to leaf values (fixed-point; the learning rate)
    pub weight: i64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: i64) -> Self {
        Self { nodes, weight }
    }

    /// Leaf value reached by `features`.
    ///
    /// Structurally invalid trees evaluate to 0; [`Tree::validate`] rejects
    /// them at load time.
    pub fn evaluate(&self, features: &[i64]) -> i64 {
        let mut idx = 0usize;

        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0;
            };

            if node.is_leaf() {
                return node.leaf.unwrap_or(0);
            }

            let Some(value) = features.get(node.feature_idx as usize) else {
                return 0;
            };

            let next = if *value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0;
            }
            idx = next as usize;
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, budget: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() && budget > 0 => {
                    1 + walk(nodes, node.left as usize, budget - 1)
                        .max(walk(nodes, node.right as usize, budget - 1))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0, self.nodes.len())
    }

    /// Check child links, feature indices and leaf values.
    ///
    /// Children must point forward so traversal always terminates.
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                if node.leaf.is_none() {
                    return Err(format!("Leaf node {i} has no leaf value"));
                }
                continue;
            }

            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child <= i as i32 || child >= len {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }

            if node.feature_idx < 0 || node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "Node {} splits on feature {} but the model has {} features",
                    i, node.feature_idx, feature_count
                ));
            }
        }

        Ok(())
    }
}
