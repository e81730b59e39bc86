//! Decision trees of a boosted ensemble.

use serde::{Deserialize, Serialize};

/// A node of a decision tree.
///
/// Children always sit at a higher index than their parent, which keeps every
/// tree acyclic and lets evaluation walk forward from the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Numeric split: route left when `x < threshold`
    Numeric {
        /// Feature index in model order
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
        /// Branch taken by missing values
        #[serde(default)]
        default_left: bool,
        /// Training-sample weight reaching this node
        cover: f64,
    },
    /// Categorical split: route right when the category code is listed
    Categorical {
        /// Feature index in model order
        feature: usize,
        /// Category codes routed right
        categories: Vec<u32>,
        /// Left child index
        left: usize,
        /// Right child index
        right: usize,
        /// Branch taken by missing values
        #[serde(default)]
        default_left: bool,
        /// Training-sample weight reaching this node
        cover: f64,
    },
    /// Terminal node
    Leaf {
        /// Raw contribution to the log-odds
        value: f64,
        /// Training-sample weight reaching this node
        #[serde(default)]
        cover: f64,
    },
}

impl Node {
    /// Training-sample weight reaching this node.
    pub const fn cover(&self) -> f64 {
        match self {
            Self::Numeric { cover, .. } | Self::Categorical { cover, .. } | Self::Leaf { cover, .. } => {
                *cover
            }
        }
    }

    /// Feature index of a split node.
    pub const fn split_feature(&self) -> Option<usize> {
        match self {
            Self::Numeric { feature, .. } | Self::Categorical { feature, .. } => Some(*feature),
            Self::Leaf { .. } => None,
        }
    }

    /// Left and right children of a split node.
    pub const fn children(&self) -> Option<(usize, usize)> {
        match self {
            Self::Numeric { left, right, .. } | Self::Categorical { left, right, .. } => {
                Some((*left, *right))
            }
            Self::Leaf { .. } => None,
        }
    }

    /// Whether this node is a leaf.
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Child reached by a feature value, `None` for leaves.
    pub fn next(&self, value: f64) -> Option<usize> {
        match self {
            Self::Numeric {
                threshold,
                left,
                right,
                default_left,
                ..
            } => Some(if value.is_nan() {
                if *default_left { *left } else { *right }
            } else if value < *threshold {
                *left
            } else {
                *right
            }),
            Self::Categorical {
                categories,
                left,
                right,
                default_left,
                ..
            } => Some(if value.is_nan() || value < 0.0 {
                if *default_left { *left } else { *right }
            } else if categories.binary_search(&(value as u32)).is_ok() {
                *right
            } else {
                *left
            }),
            Self::Leaf { .. } => None,
        }
    }
}

/// A single regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Nodes, root first
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Raw output of this tree for one row of features.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            match node {
                Node::Leaf { value, .. } => return *value,
                _ => {
                    let feature = node.split_feature().unwrap_or_default();
                    let value = row.get(feature).copied().unwrap_or(f64::NAN);
                    index = node.next(value).unwrap_or(index);
                }
            }
        }
    }

    /// Cover-weighted mean output of the tree.
    pub fn expected_value(&self) -> f64 {
        self.node_mean(0)
    }

    fn node_mean(&self, index: usize) -> f64 {
        let node = &self.nodes[index];
        match node.children() {
            None => match node {
                Node::Leaf { value, .. } => *value,
                _ => 0.0,
            },
            Some((left, right)) => {
                let left_cover = self.nodes[left].cover();
                let right_cover = self.nodes[right].cover();
                (left_cover * self.node_mean(left) + right_cover * self.node_mean(right))
                    / node.cover()
            }
        }
    }

    /// Depth of the deepest leaf (a lone leaf has depth 0).
    pub fn max_depth(&self) -> usize {
        let mut depth = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some((left, right)) = node.children() {
                depth[left] = depth[index] + 1;
                depth[right] = depth[index] + 1;
                deepest = deepest.max(depth[index] + 1);
            }
        }
        deepest
    }

    /// Check structural invariants against the feature layout.
    pub(crate) fn validate(
        &mut self,
        tree_index: usize,
        categorical: &[bool],
    ) -> std::result::Result<(), String> {
        let n_nodes = self.nodes.len();
        if n_nodes == 0 {
            return Err(format!("tree {tree_index} has no nodes"));
        }

        let mut referenced = vec![false; n_nodes];
        for (index, node) in self.nodes.iter_mut().enumerate() {
            if n_nodes > 1 && !(node.cover() > 0.0 && node.cover().is_finite()) {
                return Err(format!(
                    "tree {tree_index} node {index} has non-positive cover {}",
                    node.cover()
                ));
            }

            let Some((left, right)) = node.children() else {
                continue;
            };
            for child in [left, right] {
                if child <= index || child >= n_nodes {
                    return Err(format!(
                        "tree {tree_index} node {index} has out-of-order child {child}"
                    ));
                }
                if referenced[child] {
                    return Err(format!(
                        "tree {tree_index} node {child} has more than one parent"
                    ));
                }
                referenced[child] = true;
            }
            if left == right {
                return Err(format!("tree {tree_index} node {index} has identical children"));
            }

            match node {
                Node::Numeric {
                    feature, threshold, ..
                } => {
                    match categorical.get(*feature) {
                        None => {
                            return Err(format!(
                                "tree {tree_index} node {index} splits on unknown feature {feature}"
                            ));
                        }
                        Some(true) => {
                            return Err(format!(
                                "tree {tree_index} node {index} applies a numeric split to categorical feature {feature}"
                            ));
                        }
                        Some(false) => {}
                    }
                    if !threshold.is_finite() {
                        return Err(format!(
                            "tree {tree_index} node {index} has non-finite threshold"
                        ));
                    }
                }
                Node::Categorical {
                    feature, categories, ..
                } => {
                    match categorical.get(*feature) {
                        None => {
                            return Err(format!(
                                "tree {tree_index} node {index} splits on unknown feature {feature}"
                            ));
                        }
                        Some(false) => {
                            return Err(format!(
                                "tree {tree_index} node {index} applies a categorical split to numeric feature {feature}"
                            ));
                        }
                        Some(true) => {}
                    }
                    categories.sort_unstable();
                    categories.dedup();
                }
                Node::Leaf { .. } => {}
            }
        }

        if let Some(orphan) = (1..n_nodes).find(|&i| !referenced[i]) {
            return Err(format!("tree {tree_index} node {orphan} is unreachable"));
        }

        Ok(())
    }
}
