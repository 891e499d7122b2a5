//! Typed ensemble representation

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// A node of a regression tree, stored in pre-order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        /// Sum of hessians reaching this node
        cover: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Shrunk leaf weight (learning rate already applied)
        value: f64,
        cover: f64,
    },
}

impl Node {
    /// Numeric fields in dump order: split -> threshold, gain, cover; leaf -> value, cover
    pub fn numeric_values(&self) -> Vec<f64> {
        match self {
            Node::Split { threshold, gain, cover, .. } => vec![*threshold, *gain, *cover],
            Node::Leaf { value, cover } => vec![*value, *cover],
        }
    }

    /// Same node kind, and same split feature for splits
    pub fn same_shape(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Split { feature: a, .. }, Node::Split { feature: b, .. }) => a == b,
            (Node::Leaf { .. }, Node::Leaf { .. }) => true,
            _ => false,
        }
    }
}

/// A single regression tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// A tree made of a single leaf
    pub fn leaf(value: f64, cover: f64) -> Self {
        Self { nodes: vec![Node::Leaf { value, cover }] }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    pub fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split { feature, threshold, left, right, .. } => {
                    idx = if sample[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Numeric fields of every node, concatenated in pre-order
    pub fn numeric_values(&self) -> Vec<f64> {
        self.nodes.iter().flat_map(|n| n.numeric_values()).collect()
    }

    /// XGBoost-style text dump, one line per node
    pub fn dump(&self) -> Vec<String> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| match node {
                Node::Split { feature, threshold, gain, cover, left, right } => format!(
                    "{}:[f{}<{}] yes={},no={},missing={},gain={},cover={}",
                    i, feature, threshold, left, right, left, gain, cover
                ),
                Node::Leaf { value, cover } => format!("{}:leaf={},cover={}", i, value, cover),
            })
            .collect()
    }
}

/// Ordered sequence of trees plus the shared base margin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl Ensemble {
    pub fn new(base_score: f64) -> Self {
        Self { base_score, trees: Vec::new() }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds margin for one sample
    pub fn margin(&self, sample: ArrayView1<f64>) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(sample)).sum::<f64>()
    }

}
