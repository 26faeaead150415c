//! CART decision tree used as the forest's base learner
//!
//! Splits minimise weighted Gini impurity. At each node the candidate
//! features are visited in a random order; the first `max_features` are
//! always evaluated and further features are only tried while no valid
//! split has been found.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Minimum impurity decrease for a split to be accepted
const MIN_GAIN: f64 = 1e-12;

/// Node of a fitted tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        class: usize,
        n_samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Largest feature and class index referenced by this subtree
    pub(crate) fn max_indices(&self) -> (usize, usize) {
        match self {
            TreeNode::Leaf { class, .. } => (0, *class),
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } => {
                let (lf, lc) = left.max_indices();
                let (rf, rc) = right.max_indices();
                ((*feature).max(lf).max(rf), lc.max(rc))
            }
        }
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: usize,
    pub n_classes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

impl DecisionTree {
    /// Grow a tree over the rows named by `sample` (repeats allowed)
    pub fn fit<R: Rng + ?Sized>(
        x: &[Vec<f64>],
        y: &[usize],
        sample: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let builder = TreeBuilder { x, y, params };
        Self {
            root: builder.build(sample, 0, rng),
        }
    }

    pub fn predict(&self, row: &[f64]) -> usize {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { class, .. } => return *class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    params: &'a TreeParams,
}

impl TreeBuilder<'_> {
    fn build<R: Rng + ?Sized>(&self, indices: Vec<usize>, depth: usize, rng: &mut R) -> TreeNode {
        let counts = self.class_counts(&indices);
        let n_samples = indices.len();
        let leaf = TreeNode::Leaf {
            class: majority_class(&counts),
            n_samples,
        };

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if is_pure || depth_reached || n_samples < self.params.min_samples_split {
            return leaf;
        }

        let Some((feature, threshold)) = self.best_split(&indices, &counts, rng) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][feature] <= threshold);
        if left.is_empty() || right.is_empty() {
            return leaf;
        }

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(left, depth + 1, rng)),
            right: Box::new(self.build(right, depth + 1, rng)),
        }
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.params.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn best_split<R: Rng + ?Sized>(
        &self,
        indices: &[usize],
        counts: &[usize],
        rng: &mut R,
    ) -> Option<(usize, f64)> {
        let n_features = self.x[indices[0]].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(rng);

        let parent = gini(counts, indices.len());
        let mut best: Option<(usize, f64, f64)> = None;

        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.params.max_features && best.is_some() {
                break;
            }
            if let Some((threshold, gain)) = self.best_threshold(indices, counts, feature, parent) {
                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, threshold, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    /// Sweep sorted values of one feature, returning (threshold, gain)
    fn best_threshold(
        &self,
        indices: &[usize],
        counts: &[usize],
        feature: usize,
        parent: f64,
    ) -> Option<(f64, f64)> {
        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (self.x[i][feature], self.y[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let n = sorted.len();
        let mut left = vec![0usize; counts.len()];
        let mut right = counts.to_vec();
        let mut best: Option<(f64, f64)> = None;

        for k in 0..n - 1 {
            let (value, class) = sorted[k];
            left[class] += 1;
            right[class] -= 1;

            let next = sorted[k + 1].0;
            if next <= value {
                continue;
            }

            let n_left = k + 1;
            let n_right = n - n_left;
            let weighted = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(&right, n_right))
                / n as f64;
            let gain = parent - weighted;

            if gain > MIN_GAIN && best.map_or(true, |(_, g)| gain > g) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some((threshold, gain));
            }
        }

        best
    }
}

/// Gini impurity: 1 - Σ p_i²
pub fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Most frequent class; ties go to the lowest index
pub fn majority_class(counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}
