//! Exact greedy tree growing with second-order gain
//!
//! - Leaf weight: w* = -G / (H + lambda), soft-thresholded by alpha
//! - Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)]
//! - A split is kept only when its gain exceeds gamma

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use super::classifier::BoosterConfig;
use super::tree::{Node, Tree};

/// Best split found for one feature
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Gradient statistics shared by every node of one tree
pub(crate) struct GrowContext<'a> {
    pub x: &'a Array2<f64>,
    pub grad: &'a Array1<f64>,
    pub hess: &'a Array1<f64>,
    pub features: &'a [usize],
    pub config: &'a BoosterConfig,
}

/// Grow a tree over `rows`; leaf values are multiplied by the learning rate
pub(crate) fn grow_tree(ctx: &GrowContext<'_>, rows: &[usize]) -> Tree {
    let mut nodes = Vec::new();
    grow_node(ctx, rows, 0, &mut nodes);
    Tree::new(nodes)
}

fn grow_node(ctx: &GrowContext<'_>, rows: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
    let config = ctx.config;
    let g_sum: f64 = rows.iter().map(|&i| ctx.grad[i]).sum();
    let h_sum: f64 = rows.iter().map(|&i| ctx.hess[i]).sum();

    let idx = nodes.len();
    let leaf = Node::Leaf {
        value: config.learning_rate * leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha),
        cover: h_sum,
    };

    if depth >= config.max_depth || rows.len() < 2 || h_sum < config.min_child_weight {
        nodes.push(leaf);
        return idx;
    }

    let best = ctx
        .features
        .par_iter()
        .filter_map(|&f| best_split_for_feature(ctx, rows, f))
        .max_by(|a, b| a.gain.partial_cmp(&b.gain).unwrap_or(std::cmp::Ordering::Equal));

    let split = match best {
        Some(split) if split.gain > config.gamma => split,
        _ => {
            nodes.push(leaf);
            return idx;
        }
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
        rows.iter().partition(|&&i| ctx.x[[i, split.feature]] < split.threshold);

    if left_rows.is_empty() || right_rows.is_empty() {
        nodes.push(leaf);
        return idx;
    }

    // Placeholder; children indices are known once both subtrees are grown
    nodes.push(leaf);
    let left = grow_node(ctx, &left_rows, depth + 1, nodes);
    let right = grow_node(ctx, &right_rows, depth + 1, nodes);
    nodes[idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        gain: split.gain,
        cover: h_sum,
        left,
        right,
    };
    idx
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

fn best_split_for_feature(ctx: &GrowContext<'_>, rows: &[usize], feature: usize) -> Option<SplitCandidate> {
    let x = ctx.x;
    let mut sorted: Vec<usize> = rows.to_vec();
    sorted.sort_by(|&a, &b| {
        x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted.iter().map(|&i| ctx.grad[i]).sum();
    let h_total: f64 = sorted.iter().map(|&i| ctx.hess[i]).sum();
    let lambda = ctx.config.reg_lambda;
    let parent_score = (g_total * g_total) / (h_total + lambda);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<SplitCandidate> = None;

    for pos in 0..sorted.len() - 1 {
        let idx = sorted[pos];
        let next = sorted[pos + 1];
        g_left += ctx.grad[idx];
        h_left += ctx.hess[idx];

        // No threshold can separate identical values
        if (x[[next, feature]] - x[[idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < ctx.config.min_child_weight || h_right < ctx.config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - parent_score);

        if best.as_ref().map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature,
                threshold: (x[[idx, feature]] + x[[next, feature]]) / 2.0,
                gain,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_leaf_weight_regularization() {
        assert_eq!(leaf_weight(-4.0, 3.0, 1.0, 0.0), 1.0);
        assert_eq!(leaf_weight(0.5, 3.0, 1.0, 1.0), 0.0);
        assert_eq!(leaf_weight(3.0, 1.0, 1.0, 1.0), -1.0);
    }

    #[test]
    fn test_grow_stump_on_separable_data() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let grad = array![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        let hess = Array1::from_elem(6, 1.0);
        let config = BoosterConfig { max_depth: 1, min_child_weight: 0.0, ..Default::default() };
        let ctx = GrowContext { x: &x, grad: &grad, hess: &hess, features: &[0], config: &config };

        let tree = grow_tree(&ctx, &[0, 1, 2, 3, 4, 5]);
        assert_eq!(tree.nodes().len(), 3);
        match &tree.nodes()[0] {
            Node::Split { feature, threshold, cover, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 6.5);
                assert_eq!(*cover, 6.0);
            }
            other => panic!("expected split, got {:?}", other),
        }
        // -G/(H+λ) * lr = 3/4 * 0.3
        assert!((tree.predict(array![0.0].view()) - 0.225).abs() < 1e-12);
        assert!((tree.predict(array![20.0].view()) + 0.225).abs() < 1e-12);
    }

    #[test]
    fn test_constant_feature_yields_leaf() {
        let x = array![[1.0], [1.0], [1.0]];
        let grad = array![-1.0, 1.0, -1.0];
        let hess = Array1::from_elem(3, 1.0);
        let config = BoosterConfig::default();
        let ctx = GrowContext { x: &x, grad: &grad, hess: &hess, features: &[0], config: &config };

        let tree = grow_tree(&ctx, &[0, 1, 2]);
        assert_eq!(tree.nodes().len(), 1);
    }
}
