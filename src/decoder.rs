use core::fmt;
use core::str::FromStr;

use bincode::{Decode, Encode};

use crate::alphabet::UNKNOWN_ID;
use crate::feature::FeatureSet;
use crate::lattice::Lattice;
use crate::model::LinearModel;

/// Order of the label dependencies the decoder scores.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Decode, Encode)]
pub enum DecoderOrder {
    /// Uni-gram features and label transitions.
    #[default]
    Linear,

    /// Additionally scores features conjoined with the previous label.
    ///
    /// Those cells depend on one previous label only, so they fold into the edge score of
    /// each `(position, previous label, label)` transition. The search keeps the same
    /// `(position, label)` states as [`DecoderOrder::Linear`] and stays exact.
    HigherOrder,
}

impl DecoderOrder {
    /// Returns `true` if bi-gram features are scored.
    #[inline(always)]
    pub const fn with_bigram(self) -> bool {
        matches!(self, Self::HigherOrder)
    }
}

impl fmt::Display for DecoderOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::HigherOrder => write!(f, "higher-order"),
        }
    }
}

impl FromStr for DecoderOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "higher-order" | "higher" => Ok(Self::HigherOrder),
            _ => Err(format!("unknown decoder order: {s}")),
        }
    }
}

/// Viterbi decoder.
///
/// Ties are broken in favor of lower label IDs, so an all-zero model labels every position
/// with label 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct Decoder {
    order: DecoderOrder,
}

impl Decoder {
    /// Creates a new decoder.
    #[inline(always)]
    pub const fn new(order: DecoderOrder) -> Self {
        Self { order }
    }

    /// Gets the order.
    #[inline(always)]
    pub const fn order(&self) -> DecoderOrder {
        self.order
    }

    /// Returns the best labeling of the given positions.
    ///
    /// Always returns one label per position. If the model has no label, every position gets
    /// [`UNKNOWN_ID`].
    pub fn decode(&self, model: &LinearModel, positions: &[FeatureSet]) -> Vec<u32> {
        let lattice = Lattice::new(model, positions, self.order.with_bigram());
        search_best_path(&lattice)
    }

    /// Returns the labeling that maximizes the model score plus the Hamming distance from
    /// `gold`.
    ///
    /// # Panics
    ///
    /// `gold` must have the same length as `positions`.
    pub fn decode_loss_augmented(
        &self,
        model: &LinearModel,
        positions: &[FeatureSet],
        gold: &[u32],
    ) -> Vec<u32> {
        let mut lattice = Lattice::new(model, positions, self.order.with_bigram());
        lattice.add_penalty(gold, 1.0);
        search_best_path(&lattice)
    }
}

fn search_best_path(lattice: &Lattice) -> Vec<u32> {
    let len = lattice.len();
    let num_labels = lattice.num_labels();
    if num_labels == 0 {
        return vec![UNKNOWN_ID; len];
    }
    if len == 0 {
        return vec![];
    }
    let mut best_scores = vec![0.0; len * num_labels];
    let mut back_pointers = vec![0; len * num_labels];
    for label in 0..num_labels {
        best_scores[label] = lattice.unigram(0, label);
    }
    for t in 1..len {
        for label in 0..num_labels {
            let mut best_score = f64::NEG_INFINITY;
            let mut best_prev = 0;
            for prev in 0..num_labels {
                let score = best_scores[(t - 1) * num_labels + prev] + lattice.edge(t, prev, label);
                if score > best_score {
                    best_score = score;
                    best_prev = prev;
                }
            }
            best_scores[t * num_labels + label] = best_score + lattice.unigram(t, label);
            back_pointers[t * num_labels + label] = best_prev;
        }
    }
    let mut best_score = f64::NEG_INFINITY;
    let mut idx = 0;
    for label in 0..num_labels {
        let score = best_scores[(len - 1) * num_labels + label];
        if score > best_score {
            best_score = score;
            idx = label;
        }
    }
    let mut best_path = vec![0; len];
    for t in (0..len).rev() {
        best_path[t] = idx as u32;
        idx = back_pointers[t * num_labels + idx];
    }
    best_path
}
