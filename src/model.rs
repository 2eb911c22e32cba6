use core::hash::Hash;

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use hashbrown::HashMap;

use crate::errors::{Result, RutagError};
use crate::feature::FeatureSet;

/// A weight cell of the model.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Cell {
    /// Feature paired with the current label.
    Unigram {
        /// Feature ID.
        feature: u32,
        /// Current label.
        label: u32,
    },

    /// Transition between two adjacent labels.
    Transition {
        /// Previous label.
        prev: u32,
        /// Current label.
        label: u32,
    },

    /// Feature paired with the previous and the current label.
    Bigram {
        /// Feature ID.
        feature: u32,
        /// Previous label.
        prev: u32,
        /// Current label.
        label: u32,
    },
}

/// Sparse linear scoring model.
///
/// Weights are stored in one vector and cells are mapped to weight indices on first write, so
/// absent cells score zero and occupy no memory.
#[derive(Clone, Debug, Default)]
pub struct LinearModel {
    /// Weight vector
    pub(crate) weights: Vec<f64>,

    /// Map of uni-gram cells to weight indices, indexed by feature ID and keyed by label
    pub(crate) unigram_fids: Vec<HashMap<u32, usize>>,

    /// Map of label transitions to weight indices, indexed by previous label and keyed by label
    pub(crate) transition_fids: Vec<HashMap<u32, usize>>,

    /// Map of bi-gram cells to weight indices, indexed by feature ID and keyed by label pair
    pub(crate) bigram_fids: Vec<HashMap<(u32, u32), usize>>,
}

impl LinearModel {
    /// Creates an all-zero model.
    ///
    /// # Arguments
    ///
    /// * `num_features` - Size of the feature alphabet.
    /// * `num_labels` - Size of the label alphabet.
    pub fn new(num_features: usize, num_labels: usize) -> Self {
        let mut model = Self::default();
        model.grow(num_features, num_labels);
        model
    }

    /// Extends the dimensions. Existing weights are kept. Smaller sizes are ignored.
    pub fn grow(&mut self, num_features: usize, num_labels: usize) {
        if num_features > self.unigram_fids.len() {
            self.unigram_fids.resize_with(num_features, HashMap::new);
            self.bigram_fids.resize_with(num_features, HashMap::new);
        }
        if num_labels > self.transition_fids.len() {
            self.transition_fids.resize_with(num_labels, HashMap::new);
        }
    }

    /// Returns the number of features.
    #[inline(always)]
    pub fn num_features(&self) -> usize {
        self.unigram_fids.len()
    }

    /// Returns the number of labels.
    #[inline(always)]
    pub fn num_labels(&self) -> usize {
        self.transition_fids.len()
    }

    /// Gets the weight vector.
    #[inline(always)]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Returns `true` if every weight is zero.
    pub fn is_zero(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }

    #[inline(always)]
    fn in_range(&self, id: u32, size: usize) -> bool {
        usize::try_from(id).is_ok_and(|id| id < size)
    }

    /// Gets the weight index of the given cell if it has been written.
    pub fn weight_index(&self, cell: Cell) -> Option<usize> {
        match cell {
            Cell::Unigram { feature, label } => self
                .unigram_fids
                .get(usize::try_from(feature).ok()?)?
                .get(&label)
                .copied(),
            Cell::Transition { prev, label } => self
                .transition_fids
                .get(usize::try_from(prev).ok()?)?
                .get(&label)
                .copied(),
            Cell::Bigram {
                feature,
                prev,
                label,
            } => self
                .bigram_fids
                .get(usize::try_from(feature).ok()?)?
                .get(&(prev, label))
                .copied(),
        }
    }

    /// Gets the weight of the given cell.
    #[inline(always)]
    pub fn weight(&self, cell: Cell) -> f64 {
        self.weight_index(cell).map_or(0.0, |i| self.weights[i])
    }

    /// Adds `delta` to the given cell and returns its weight index.
    ///
    /// Cells referring to IDs outside the model dimensions are ignored and `None` is returned.
    pub fn add(&mut self, cell: Cell, delta: f64) -> Option<usize> {
        let num_features = self.num_features();
        let num_labels = self.num_labels();
        let next = self.weights.len();
        let widx = match cell {
            Cell::Unigram { feature, label } => {
                if !self.in_range(feature, num_features) || !self.in_range(label, num_labels) {
                    return None;
                }
                *self.unigram_fids[feature as usize]
                    .entry(label)
                    .or_insert(next)
            }
            Cell::Transition { prev, label } => {
                if !self.in_range(prev, num_labels) || !self.in_range(label, num_labels) {
                    return None;
                }
                *self.transition_fids[prev as usize]
                    .entry(label)
                    .or_insert(next)
            }
            Cell::Bigram {
                feature,
                prev,
                label,
            } => {
                if !self.in_range(feature, num_features)
                    || !self.in_range(prev, num_labels)
                    || !self.in_range(label, num_labels)
                {
                    return None;
                }
                *self.bigram_fids[feature as usize]
                    .entry((prev, label))
                    .or_insert(next)
            }
        };
        if widx == next {
            self.weights.push(0.0);
        }
        self.weights[widx] += delta;
        Some(widx)
    }

    /// Adds `delta` to the uni-gram cell of every given feature paired with `label`.
    pub fn update(&mut self, feature_ids: &[u32], label: u32, delta: f64) {
        for &feature in feature_ids {
            self.add(Cell::Unigram { feature, label }, delta);
        }
    }

    /// Sums the uni-gram weights of the given features paired with `label`.
    #[inline(always)]
    pub fn score(&self, feature_ids: &[u32], label: u32) -> f64 {
        feature_ids
            .iter()
            .map(|&feature| self.weight(Cell::Unigram { feature, label }))
            .sum()
    }

    /// Gets the transition weight between two labels.
    #[inline(always)]
    pub fn transition_score(&self, prev: u32, label: u32) -> f64 {
        self.weight(Cell::Transition { prev, label })
    }

    /// Sums the bi-gram weights of the given features paired with a label pair.
    #[inline(always)]
    pub fn bigram_score(&self, feature_ids: &[u32], prev: u32, label: u32) -> f64 {
        feature_ids
            .iter()
            .map(|&feature| {
                self.weight(Cell::Bigram {
                    feature,
                    prev,
                    label,
                })
            })
            .sum()
    }

    /// Calls `f` for every cell activated by labeling `positions` with `labels`.
    ///
    /// Bi-gram cells are visited only if `with_bigram` is true.
    pub fn visit_cells<F>(positions: &[FeatureSet], labels: &[u32], with_bigram: bool, mut f: F)
    where
        F: FnMut(Cell),
    {
        let mut prev = None;
        for (fs, &label) in positions.iter().zip(labels) {
            for &feature in fs.unigram() {
                f(Cell::Unigram { feature, label });
            }
            if let Some(prev) = prev {
                f(Cell::Transition { prev, label });
                if with_bigram {
                    for &feature in fs.bigram() {
                        f(Cell::Bigram {
                            feature,
                            prev,
                            label,
                        });
                    }
                }
            }
            prev = Some(label);
        }
    }

    /// Computes the score of a labeling.
    pub fn score_path(&self, positions: &[FeatureSet], labels: &[u32], with_bigram: bool) -> f64 {
        let mut score = 0.0;
        Self::visit_cells(positions, labels, with_bigram, |cell| {
            score += self.weight(cell);
        });
        score
    }

    /// Removes cells whose weights are zero and compacts the weight vector.
    pub fn prune(&mut self) {
        let weights = std::mem::take(&mut self.weights);
        let mut new_weights = vec![];
        compact(&mut self.unigram_fids, &weights, &mut new_weights);
        compact(&mut self.transition_fids, &weights, &mut new_weights);
        compact(&mut self.bigram_fids, &weights, &mut new_weights);
        self.weights = new_weights;
    }

    /// Checks that every stored index and ID is within the model dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`RutagError::InvalidModel`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.bigram_fids.len() != self.unigram_fids.len() {
            return Err(RutagError::invalid_model(
                "uni-gram and bi-gram tables have different sizes",
            ));
        }
        let num_labels = self.num_labels();
        let num_weights = self.weights.len();
        let check = |label: u32, widx: usize| {
            if !self.in_range(label, num_labels) {
                return Err(RutagError::invalid_model(format!(
                    "label {label} exceeds the number of labels {num_labels}"
                )));
            }
            if widx >= num_weights {
                return Err(RutagError::invalid_model(format!(
                    "weight index {widx} exceeds the number of weights {num_weights}"
                )));
            }
            Ok(())
        };
        for hm in self.unigram_fids.iter().chain(&self.transition_fids) {
            for (&label, &widx) in hm {
                check(label, widx)?;
            }
        }
        for hm in &self.bigram_fids {
            for (&(prev, label), &widx) in hm {
                check(prev, widx)?;
                check(label, widx)?;
            }
        }
        Ok(())
    }
}

fn compact<K>(maps: &mut [HashMap<K, usize>], weights: &[f64], new_weights: &mut Vec<f64>)
where
    K: Copy + Eq + Hash + Ord,
{
    for hm in maps {
        // sorted so that the compacted layout does not depend on the hasher
        let mut cells: Vec<(K, usize)> = hm
            .drain()
            .filter(|&(_, widx)| weights[widx].abs() > f64::EPSILON)
            .collect();
        cells.sort_unstable();
        for (key, widx) in cells {
            hm.insert(key, new_weights.len());
            new_weights.push(weights[widx]);
        }
    }
}

impl<Context> Decode<Context> for LinearModel {
    #[allow(clippy::type_complexity)]
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let weights = Decode::decode(decoder)?;
        let unigram_fids: Vec<Vec<(u32, usize)>> = Decode::decode(decoder)?;
        let transition_fids: Vec<Vec<(u32, usize)>> = Decode::decode(decoder)?;
        let bigram_fids: Vec<Vec<(u32, u32, usize)>> = Decode::decode(decoder)?;
        Ok(Self {
            weights,
            unigram_fids: unigram_fids
                .into_iter()
                .map(|v| v.into_iter().collect())
                .collect(),
            transition_fids: transition_fids
                .into_iter()
                .map(|v| v.into_iter().collect())
                .collect(),
            bigram_fids: bigram_fids
                .into_iter()
                .map(|v| v.into_iter().map(|(p, l, w)| ((p, l), w)).collect())
                .collect(),
        })
    }
}

impl Encode for LinearModel {
    #[allow(clippy::type_complexity)]
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        // sorted so that equal models produce equal bytes
        let sorted = |hm: &HashMap<u32, usize>| {
            let mut v: Vec<(u32, usize)> = hm.iter().map(|(&k, &v)| (k, v)).collect();
            v.sort_unstable();
            v
        };
        let unigram_fids: Vec<Vec<(u32, usize)>> = self.unigram_fids.iter().map(sorted).collect();
        let transition_fids: Vec<Vec<(u32, usize)>> =
            self.transition_fids.iter().map(sorted).collect();
        let bigram_fids: Vec<Vec<(u32, u32, usize)>> = self
            .bigram_fids
            .iter()
            .map(|hm| {
                let mut v: Vec<(u32, u32, usize)> =
                    hm.iter().map(|(&(p, l), &w)| (p, l, w)).collect();
                v.sort_unstable();
                v
            })
            .collect();
        Encode::encode(&self.weights, encoder)?;
        Encode::encode(&unigram_fids, encoder)?;
        Encode::encode(&transition_fids, encoder)?;
        Encode::encode(&bigram_fids, encoder)?;
        Ok(())
    }
}
