// ============================================================
// Layer 4 — Stratified Train/Test Splitter
// ============================================================
// Partitions row indices into a training and a test set while
// keeping the churn/retain proportions of both sets equal to the
// full dataset's.
//
//   1. Group row indices by class label
//   2. Shuffle each group with a seeded RNG
//   3. Give every class floor(count * n_test / n) test rows and
//      hand the leftover test slots to the classes with the
//      largest fractional remainders
//   4. Shuffle the resulting train and test index lists
//
// n_test = ceil(n * test_fraction). The same labels and seed
// always produce the same split.

use anyhow::{bail, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::BTreeMap;

/// Row indices of the two partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test:  Vec<usize>,
}

/// Seeded stratified split of `labels` into train/test row indices.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        bail!("test fraction must be in (0, 1), got {test_fraction}");
    }
    let total = labels.len();
    if total < 2 {
        bail!("need at least 2 rows to split, got {total}");
    }

    let mut rng = StdRng::seed_from_u64(seed);

    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(row);
    }
    for rows in by_class.values_mut() {
        rows.shuffle(&mut rng);
    }

    let n_test = ((total as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.clamp(1, total - 1);

    // (class, floor allocation, fractional remainder)
    let mut alloc: Vec<(u8, usize, f64)> = by_class
        .iter()
        .map(|(&class, rows)| {
            let exact = rows.len() as f64 * n_test as f64 / total as f64;
            (class, exact.floor() as usize, exact - exact.floor())
        })
        .collect();

    let assigned: usize = alloc.iter().map(|a| a.1).sum();
    let mut leftover = n_test - assigned;
    let mut order: Vec<usize> = (0..alloc.len()).collect();
    order.sort_by(|&a, &b| alloc[b].2.total_cmp(&alloc[a].2).then(alloc[a].0.cmp(&alloc[b].0)));
    for i in order {
        if leftover == 0 {
            break;
        }
        let available = by_class[&alloc[i].0].len();
        if alloc[i].1 < available {
            alloc[i].1 += 1;
            leftover -= 1;
        }
    }

    let mut train = Vec::with_capacity(total - n_test);
    let mut test  = Vec::with_capacity(n_test);
    for (class, n_class_test, _) in alloc {
        let rows = &by_class[&class];
        test.extend_from_slice(&rows[..n_class_test]);
        train.extend_from_slice(&rows[n_class_test..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    tracing::debug!(
        "Stratified split: {} train, {} test (seed {})",
        train.len(),
        test.len(),
        seed
    );

    Ok(Split { train, test })
}

/// Gather `values[i]` for every index, in index order.
pub fn take<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}
