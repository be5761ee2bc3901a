// ============================================================
// Layer 5 — CART Regression Tree
// ============================================================
// The shared building block of every tree ensemble here.
//
//   Random forest / extra trees: fit on 0/1 labels, so a leaf's
//   mean is the fraction of churners that reached it. Variance
//   reduction on a 0/1 target picks the same splits as Gini.
//
//   Gradient boosting: fit on log-loss residuals, then the
//   booster overwrites every leaf with its Newton step.
//
// Nodes live in a flat Vec and reference their children by
// index. Trees are grown depth-first with an explicit stack so
// unbounded depth cannot overflow a worker thread's stack.
//
// Split search per node:
//   1. Visit features in random order
//   2. Skip features that are constant within the node
//   3. Stop once `max_features` non-constant features were tried
//   4. Best: sweep every midpoint between sorted distinct values
//      Random: draw one threshold uniformly in (min, max)
//   5. Keep the candidate with the largest variance reduction

use ndarray::ArrayView2;
use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

/// Threshold search used at each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splitter {
    /// Exhaustive search over all midpoints (CART, random forest, boosting).
    Best,
    /// One uniformly drawn threshold per feature (extra trees).
    Random,
}

/// Growth limits for a single tree. `max_features` is already
/// resolved to a count for the matrix being fitted.
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    pub max_features:      usize,
    pub splitter:          Splitter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Candidate {
    feature:   usize,
    threshold: f64,
    score:     f64,
}

struct Pending {
    node:  usize,
    rows:  Vec<usize>,
    depth: usize,
}

// Minimum gain (in sum-of-squares units) for a split to count.
const MIN_GAIN: f64 = 1e-12;

impl RegressionTree {
    /// Grow a tree on `x[rows]` against `y[rows]`.
    ///
    /// `rows` may contain duplicates (bootstrap samples); each copy
    /// counts as one sample.
    pub fn fit(
        x:      ArrayView2<f64>,
        y:      &[f64],
        rows:   Vec<usize>,
        params: &TreeParams,
        rng:    &mut StdRng,
    ) -> Self {
        let n_features = x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();

        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![Pending { node: 0, rows, depth: 0 }];

        while let Some(Pending { node, rows, depth }) = stack.pop() {
            let value = mean(y, &rows);

            let can_split = params.max_depth.map_or(true, |d| depth < d)
                && rows.len() >= params.min_samples_split
                && rows.len() >= 2 * params.min_samples_leaf;

            let best = if can_split {
                features.shuffle(rng);
                best_split(x, y, &rows, &features, params, rng)
            } else {
                None
            };

            match best {
                None => nodes[node] = Node::Leaf { value },
                Some(c) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                        rows.iter().partition(|&&r| x[[r, c.feature]] <= c.threshold);

                    let left = nodes.len();
                    nodes.push(Node::Leaf { value: 0.0 });
                    let right = nodes.len();
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes[node] = Node::Split {
                        feature: c.feature,
                        threshold: c.threshold,
                        left,
                        right,
                    };

                    stack.push(Pending { node: right, rows: right_rows, depth: depth + 1 });
                    stack.push(Pending { node: left,  rows: left_rows,  depth: depth + 1 });
                }
            }
        }

        Self { nodes }
    }

    /// Index of the leaf `row` falls into.
    pub fn leaf_of(&self, row: &[f64]) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split { feature, threshold, left, right } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        match &self.nodes[self.leaf_of(row)] {
            Node::Leaf { value } => *value,
            Node::Split { .. } => unreachable!("leaf_of always stops at a leaf"),
        }
    }

    /// Overwrite a leaf's output. Non-leaf indices are ignored.
    pub fn set_leaf_value(&mut self, idx: usize, new_value: f64) {
        if let Some(Node::Leaf { value }) = self.nodes.get_mut(idx) {
            *value = new_value;
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            max = max.max(d);
            if let Node::Split { left, right, .. } = self.nodes[idx] {
                stack.push((left, d + 1));
                stack.push((right, d + 1));
            }
        }
        max
    }
}

fn mean(y: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64
}

/// Search `features` (already shuffled) for the split with the
/// largest reduction in sum of squared errors.
fn best_split(
    x:        ArrayView2<f64>,
    y:        &[f64],
    rows:     &[usize],
    features: &[usize],
    params:   &TreeParams,
    rng:      &mut StdRng,
) -> Option<Candidate> {
    let n = rows.len() as f64;
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    // Maximising sum_l²/n_l + sum_r²/n_r is equivalent to
    // minimising the children's squared error.
    let parent_score = total * total / n;

    let mut best: Option<Candidate> = None;
    let mut tried = 0;

    for &f in features {
        if tried >= params.max_features {
            break;
        }
        let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            let v = x[[r, f]];
            (lo.min(v), hi.max(v))
        });
        if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
            continue;
        }
        tried += 1;

        let candidate = match params.splitter {
            Splitter::Best   => best_threshold(x, y, rows, f, total, params.min_samples_leaf),
            Splitter::Random => {
                let t = rng.gen_range(lo..hi);
                random_threshold(x, y, rows, f, t, total, params.min_samples_leaf)
            }
        };

        if let Some(c) = candidate {
            if c.score > parent_score + MIN_GAIN
                && best.as_ref().map_or(true, |b| c.score > b.score)
            {
                best = Some(c);
            }
        }
    }
    best
}

fn best_threshold(
    x:        ArrayView2<f64>,
    y:        &[f64],
    rows:     &[usize],
    feature:  usize,
    total:    f64,
    min_leaf: usize,
) -> Option<Candidate> {
    let mut sorted: Vec<(f64, f64)> = rows.iter().map(|&r| (x[[r, feature]], y[r])).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = sorted.len();
    let mut best: Option<Candidate> = None;
    let mut left_sum = 0.0;

    for i in 0..n - 1 {
        left_sum += sorted[i].1;
        let n_left = i + 1;
        let n_right = n - n_left;
        if n_left < min_leaf {
            continue;
        }
        if n_right < min_leaf {
            break;
        }
        // only cut between distinct values
        if sorted[i].0 == sorted[i + 1].0 {
            continue;
        }
        let right_sum = total - left_sum;
        let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
        if best.as_ref().map_or(true, |b| score > b.score) {
            let mut threshold = (sorted[i].0 + sorted[i + 1].0) / 2.0;
            // midpoint can round up to the right value
            if threshold >= sorted[i + 1].0 {
                threshold = sorted[i].0;
            }
            best = Some(Candidate { feature, threshold, score });
        }
    }
    best
}

fn random_threshold(
    x:         ArrayView2<f64>,
    y:         &[f64],
    rows:      &[usize],
    feature:   usize,
    threshold: f64,
    total:     f64,
    min_leaf:  usize,
) -> Option<Candidate> {
    let (mut n_left, mut left_sum) = (0usize, 0.0);
    for &r in rows {
        if x[[r, feature]] <= threshold {
            n_left += 1;
            left_sum += y[r];
        }
    }
    let n_right = rows.len() - n_left;
    if n_left < min_leaf || n_right < min_leaf || n_left == 0 || n_right == 0 {
        return None;
    }
    let right_sum = total - left_sum;
    let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
    Some(Candidate { feature, threshold, score })
}
