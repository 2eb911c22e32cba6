use crate::feature::FeatureSet;
use crate::model::LinearModel;

/// Scores of every labeling choice of one sentence under a model.
///
/// Uni-gram scores are stored per `(position, label)`. Edge scores are the label transition
/// weights plus, when bi-gram features are enabled, per-position scores of
/// `(position, previous label, label)`.
#[derive(Debug)]
pub struct Lattice {
    len: usize,
    num_labels: usize,
    unigram: Vec<f64>,
    transition: Vec<f64>,
    bigram: Vec<f64>,
}

impl Lattice {
    /// Scores all choices of the given positions.
    ///
    /// # Arguments
    ///
    /// * `model` - Scoring model.
    /// * `positions` - Feature sets of the sentence.
    /// * `with_bigram` - Whether to score bi-gram features.
    pub fn new(model: &LinearModel, positions: &[FeatureSet], with_bigram: bool) -> Self {
        let len = positions.len();
        let num_labels = model.num_labels();
        let mut unigram = Vec::with_capacity(len * num_labels);
        for fs in positions {
            for label in 0..num_labels as u32 {
                unigram.push(model.score(fs.unigram(), label));
            }
        }
        let mut transition = Vec::with_capacity(num_labels * num_labels);
        for prev in 0..num_labels as u32 {
            for label in 0..num_labels as u32 {
                transition.push(model.transition_score(prev, label));
            }
        }
        let mut bigram = vec![];
        if with_bigram {
            bigram.reserve(len * num_labels * num_labels);
            for fs in positions {
                for prev in 0..num_labels as u32 {
                    for label in 0..num_labels as u32 {
                        bigram.push(model.bigram_score(fs.bigram(), prev, label));
                    }
                }
            }
        }
        Self {
            len,
            num_labels,
            unigram,
            transition,
            bigram,
        }
    }

    /// Adds `penalty` to every label that differs from the reference at each position.
    ///
    /// # Panics
    ///
    /// `reference` must have the same length as the lattice.
    pub fn add_penalty(&mut self, reference: &[u32], penalty: f64) {
        assert_eq!(self.len, reference.len());
        for (t, &gold) in reference.iter().enumerate() {
            for label in 0..self.num_labels {
                if label as u32 != gold {
                    self.unigram[t * self.num_labels + label] += penalty;
                }
            }
        }
    }

    /// Returns the number of positions.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of labels.
    #[inline(always)]
    pub const fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Gets the score of `label` at `position`.
    #[inline(always)]
    pub fn unigram(&self, position: usize, label: usize) -> f64 {
        self.unigram[position * self.num_labels + label]
    }

    /// Gets the score of moving from `prev` to `label` at `position`.
    #[inline(always)]
    pub fn edge(&self, position: usize, prev: usize, label: usize) -> f64 {
        let idx = prev * self.num_labels + label;
        let mut score = self.transition[idx];
        if !self.bigram.is_empty() {
            score += self.bigram[position * self.num_labels * self.num_labels + idx];
        }
        score
    }
}
