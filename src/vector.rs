use hashbrown::HashMap;

use crate::feature::FeatureSet;
use crate::model::{Cell, LinearModel};

/// Difference between the cell activations of two labelings of one sentence.
///
/// Entries are kept sorted by cell so that updates allocate weight indices in a reproducible
/// order.
#[derive(Debug, Default)]
pub struct SparseDiffVector {
    diffs: Vec<(Cell, f64)>,
}

impl SparseDiffVector {
    /// Computes `phi(gold) - phi(candidate)`.
    pub fn new(positions: &[FeatureSet], gold: &[u32], candidate: &[u32], with_bigram: bool) -> Self {
        let mut counts = HashMap::new();
        LinearModel::visit_cells(positions, gold, with_bigram, |cell| {
            *counts.entry(cell).or_insert(0.0) += 1.0;
        });
        LinearModel::visit_cells(positions, candidate, with_bigram, |cell| {
            *counts.entry(cell).or_insert(0.0) -= 1.0;
        });
        let mut diffs: Vec<(Cell, f64)> = counts.into_iter().filter(|&(_, v)| v != 0.0).collect();
        diffs.sort_unstable_by_key(|&(cell, _)| cell);
        Self { diffs }
    }

    /// Returns the squared L2 norm.
    pub fn squared_norm(&self) -> f64 {
        self.diffs.iter().map(|&(_, v)| v * v).sum()
    }

    /// Adds `step` times this vector to the model.
    ///
    /// `f` receives the weight index and the added value of every touched weight.
    pub fn apply<F>(&self, model: &mut LinearModel, step: f64, mut f: F)
    where
        F: FnMut(usize, f64),
    {
        for &(cell, v) in &self.diffs {
            if let Some(widx) = model.add(cell, step * v) {
                f(widx, step * v);
            }
        }
    }
}
