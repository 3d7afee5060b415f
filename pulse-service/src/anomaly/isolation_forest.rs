//! Isolation forest (Liu, Ting & Zhou, 2008) over fixed-width feature rows.
//!
//! Scores follow the usual convention: `s(x) = 2^(-E[h(x)] / c(psi))`, close
//! to 1 for points that isolate quickly. The decision threshold is the
//! `contamination` quantile of the training scores.

use rand::{seq::index, Rng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful BST search among `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_samples: usize,
    pub contamination: f64,
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn build<const D: usize, R: Rng>(
    data: &[[f64; D]],
    idx: &mut [usize],
    depth: usize,
    limit: usize,
    rng: &mut R,
) -> Node {
    if idx.len() <= 1 || depth >= limit {
        return Node::Leaf { size: idx.len() };
    }

    // Only features that still vary within this node, over a finite range,
    // can split it.
    let mut candidates: Vec<(usize, f64, f64)> = Vec::with_capacity(D);
    for f in 0..D {
        let (lo, hi) = idx
            .iter()
            .map(|&i| data[i][f])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo < hi && lo.is_finite() && hi.is_finite() {
            candidates.push((f, lo, hi));
        }
    }

    if candidates.is_empty() {
        return Node::Leaf { size: idx.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);

    // Partition in place: `< threshold` to the front.
    let mut split = 0;
    for j in 0..idx.len() {
        if data[idx[j]][feature] < threshold {
            idx.swap(split, j);
            split += 1;
        }
    }
    // Empty side only when the draw hit `lo` exactly.
    if split == 0 || split == idx.len() {
        return Node::Leaf { size: idx.len() };
    }

    let (left_idx, right_idx) = idx.split_at_mut(split);
    Node::Split {
        feature,
        threshold,
        left: Box::new(build(data, left_idx, depth + 1, limit, rng)),
        right: Box::new(build(data, right_idx, depth + 1, limit, rng)),
    }
}

fn path_length<const D: usize>(node: &Node, x: &[f64; D], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if x[*feature] < *threshold {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Linear-interpolated percentile (`q` in 0..=100) of unsorted values.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

pub struct IsolationForest {
    trees: Vec<Node>,
    subsample: usize,
    /// Negated-score threshold; rows with `-score < offset` are outliers.
    offset: f64,
}

impl IsolationForest {
    /// Fits on `data` and calibrates the outlier threshold on the same rows.
    /// Returns `None` for empty input.
    pub fn fit<const D: usize, R: Rng>(data: &[[f64; D]], params: ForestParams, rng: &mut R) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let subsample = params.max_samples.clamp(1, data.len());
        let limit = (subsample as f64).log2().ceil().max(0.0) as usize;

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let mut idx = index::sample(&mut *rng, data.len(), subsample).into_vec();
                build(data, &mut idx, 0, limit, &mut *rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            subsample,
            offset: 0.0,
        };

        let negated: Vec<f64> = data.iter().map(|x| -forest.score(x)).collect();
        forest.offset = percentile(&negated, 100.0 * params.contamination).unwrap_or(0.0);

        Some(forest)
    }

    /// Anomaly score in (0, 1]; higher is more anomalous.
    pub fn score<const D: usize>(&self, x: &[f64; D]) -> f64 {
        let mean_depth =
            self.trees.iter().map(|t| path_length(t, x, 0)).sum::<f64>() / self.trees.len() as f64;
        let norm = average_path_length(self.subsample);
        if norm == 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_depth / norm)
    }

    pub fn is_outlier<const D: usize>(&self, x: &[f64; D]) -> bool {
        -self.score(x) < self.offset
    }
}
