//! Exact path-dependent TreeSHAP for a single tree and row.
//!
//! Follows Lundberg et al., "Consistent Individualized Feature Attribution for
//! Tree Ensembles" (Algorithm 2). Each recursion level owns a copy of the
//! unique-feature path so sibling subtrees never observe each other's updates.

use crate::ensemble::Tree;

/// Marker for the synthetic root element of a path.
const NO_FEATURE: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: usize,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

impl Default for PathElement {
    fn default() -> Self {
        Self {
            feature: NO_FEATURE,
            zero_fraction: 0.0,
            one_fraction: 0.0,
            weight: 0.0,
        }
    }
}

/// Add the SHAP values of `tree` for row `x` into `phi`.
pub(crate) fn accumulate(tree: &Tree, x: &[f64], phi: &mut [f64]) {
    if tree.nodes.len() < 2 {
        return;
    }
    recurse(tree, 0, x, phi, &[], 0, 1.0, 1.0, NO_FEATURE);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    node_index: usize,
    x: &[f64],
    phi: &mut [f64],
    parent_path: &[PathElement],
    unique_depth: usize,
    parent_zero: f64,
    parent_one: f64,
    parent_feature: usize,
) {
    let mut path = Vec::with_capacity(unique_depth + 2);
    path.extend_from_slice(&parent_path[..unique_depth]);
    path.push(PathElement::default());
    extend(&mut path, unique_depth, parent_zero, parent_one, parent_feature);

    let node = &tree.nodes[node_index];
    let (Some(feature), Some((left, right))) = (node.split_feature(), node.children()) else {
        if let crate::ensemble::Node::Leaf { value, .. } = node {
            for i in 1..=unique_depth {
                let weight = unwound_sum(&path, unique_depth, i);
                let element = path[i];
                phi[element.feature] +=
                    weight * (element.one_fraction - element.zero_fraction) * value;
            }
        }
        return;
    };

    let value = x.get(feature).copied().unwrap_or(f64::NAN);
    let hot = node.next(value).unwrap_or(left);
    let cold = if hot == left { right } else { left };
    let cover = node.cover();
    let hot_zero = tree.nodes[hot].cover() / cover;
    let cold_zero = tree.nodes[cold].cover() / cover;

    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;
    let mut depth = unique_depth;
    if let Some(k) = (1..=unique_depth).find(|&k| path[k].feature == feature) {
        incoming_zero = path[k].zero_fraction;
        incoming_one = path[k].one_fraction;
        unwind(&mut path, depth, k);
        depth -= 1;
    }

    recurse(
        tree,
        hot,
        x,
        phi,
        &path,
        depth + 1,
        hot_zero * incoming_zero,
        incoming_one,
        feature,
    );
    recurse(
        tree,
        cold,
        x,
        phi,
        &path,
        depth + 1,
        cold_zero * incoming_zero,
        0.0,
        feature,
    );
}

fn extend(path: &mut [PathElement], depth: usize, zero: f64, one: f64, feature: usize) {
    path[depth] = PathElement {
        feature,
        zero_fraction: zero,
        one_fraction: one,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    };
    let scale = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one * path[i].weight * (i + 1) as f64 / scale;
        path[i].weight = zero * path[i].weight * (depth - i) as f64 / scale;
    }
}

fn unwind(path: &mut [PathElement], depth: usize, index: usize) {
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let previous = path[i].weight;
            path[i].weight = next_one_portion * scale / ((i + 1) as f64 * one);
            next_one_portion = previous - path[i].weight * zero * (depth - i) as f64 / scale;
        } else {
            path[i].weight = path[i].weight * scale / (zero * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

fn unwound_sum(path: &[PathElement], depth: usize, index: usize) -> f64 {
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let tmp = next_one_portion * scale / ((i + 1) as f64 * one);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero * ((depth - i) as f64 / scale);
        } else if zero != 0.0 {
            total += (path[i].weight / zero) / ((depth - i) as f64 / scale);
        }
    }

    total
}
