use crate::alphabet::{Alphabet, UNKNOWN_ID};
use crate::corpus::Sentence;
use crate::errors::Result;
use crate::template::TemplateGroup;

/// Manages the feature IDs active at one position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FeatureSet {
    pub(crate) unigram: Vec<u32>,
    pub(crate) bigram: Vec<u32>,
}

impl FeatureSet {
    /// Creates a new [`FeatureSet`].
    ///
    /// # Arguments
    ///
    /// * `unigram` - Features paired with the current label.
    /// * `bigram` - Features paired with the previous and the current label.
    #[inline(always)]
    #[must_use]
    pub fn new(unigram: &[u32], bigram: &[u32]) -> Self {
        Self {
            unigram: unigram.to_vec(),
            bigram: bigram.to_vec(),
        }
    }

    /// Gets uni-gram feature IDs.
    #[inline(always)]
    #[must_use]
    pub fn unigram(&self) -> &[u32] {
        &self.unigram
    }

    /// Gets bi-gram feature IDs.
    #[inline(always)]
    #[must_use]
    pub fn bigram(&self) -> &[u32] {
        &self.bigram
    }
}

/// A materialized example.
#[derive(Clone, Debug)]
pub struct Instance {
    positions: Vec<FeatureSet>,
    labels: Option<Vec<u32>>,
    sentence: Sentence,
}

impl Instance {
    /// Creates an instance from precomputed feature sets.
    ///
    /// `sentence` is kept for output formatting only.
    #[inline(always)]
    pub fn new(positions: Vec<FeatureSet>, labels: Option<Vec<u32>>, sentence: Sentence) -> Self {
        Self {
            positions,
            labels,
            sentence,
        }
    }

    /// Gets the feature sets, one per token.
    #[inline(always)]
    pub fn positions(&self) -> &[FeatureSet] {
        &self.positions
    }

    /// Gets the gold label IDs if present.
    #[inline(always)]
    pub fn labels(&self) -> Option<&[u32]> {
        self.labels.as_deref()
    }

    /// Gets the source sentence.
    #[inline(always)]
    pub fn sentence(&self) -> &Sentence {
        &self.sentence
    }

    /// Returns the number of positions.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the instance has no position.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// An ordered collection of instances.
#[derive(Clone, Debug, Default)]
pub struct InstanceSet {
    instances: Vec<Instance>,
}

impl InstanceSet {
    /// Creates an empty set.
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instance.
    #[inline(always)]
    pub fn push(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    /// Gets the instances.
    #[inline(always)]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Returns the number of instances.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if the set has no instance.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Returns the total number of positions.
    pub fn num_tokens(&self) -> usize {
        self.instances.iter().map(Instance::len).sum()
    }
}

impl FromIterator<Instance> for InstanceSet {
    fn from_iter<I: IntoIterator<Item = Instance>>(iter: I) -> Self {
        Self {
            instances: iter.into_iter().collect(),
        }
    }
}

/// Applies a template group to sentences and interns the results.
///
/// Features unknown to a frozen feature alphabet are dropped. Gold labels unknown to a frozen
/// label alphabet become [`UNKNOWN_ID`].
pub struct FeatureExtractor<'a> {
    templates: &'a TemplateGroup,
}

impl<'a> FeatureExtractor<'a> {
    /// Creates a new extractor.
    #[inline(always)]
    pub const fn new(templates: &'a TemplateGroup) -> Self {
        Self { templates }
    }

    fn extract_with<F, G>(
        &self,
        sentence: Sentence,
        mut feature_id: F,
        mut label_id: G,
    ) -> Result<Instance>
    where
        F: FnMut(&str) -> Result<u32>,
        G: FnMut(&str) -> Result<u32>,
    {
        let tokens = sentence.tokens();
        let mut positions = Vec::with_capacity(tokens.len());
        for i in 0..tokens.len() {
            let mut feature_set = FeatureSet::default();
            for template in self.templates.templates() {
                // label bi-gram features start at the second token
                if template.order() > 0 && i == 0 {
                    continue;
                }
                let fid = feature_id(&template.render(tokens, i)?)?;
                if fid == UNKNOWN_ID {
                    continue;
                }
                if template.order() == 0 {
                    feature_set.unigram.push(fid);
                } else {
                    feature_set.bigram.push(fid);
                }
            }
            positions.push(feature_set);
        }
        let label_ids = match sentence.labels() {
            Some(ls) => Some(
                ls.iter()
                    .map(|l| label_id(l))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };
        Ok(Instance::new(positions, label_ids, sentence))
    }

    /// Extracts one sentence, adding unseen strings to alphabets that are not frozen.
    ///
    /// # Errors
    ///
    /// Returns an error if the sentence does not fit the templates or an alphabet overflows.
    pub fn extract(
        &self,
        sentence: Sentence,
        features: &mut Alphabet,
        labels: &mut Alphabet,
    ) -> Result<Instance> {
        self.extract_with(sentence, |f| features.intern(f), |l| labels.intern(l))
    }

    /// Extracts one sentence without modifying the alphabets.
    ///
    /// # Errors
    ///
    /// Returns an error if the sentence does not fit the templates.
    pub fn lookup(
        &self,
        sentence: Sentence,
        features: &Alphabet,
        labels: &Alphabet,
    ) -> Result<Instance> {
        self.extract_with(
            sentence,
            |f| Ok(features.get(f).unwrap_or(UNKNOWN_ID)),
            |l| Ok(labels.get(l).unwrap_or(UNKNOWN_ID)),
        )
    }

    /// Extracts all sentences in order.
    ///
    /// # Errors
    ///
    /// See [`FeatureExtractor::extract`].
    pub fn extract_all<I>(
        &self,
        sentences: I,
        features: &mut Alphabet,
        labels: &mut Alphabet,
    ) -> Result<InstanceSet>
    where
        I: IntoIterator<Item = Sentence>,
    {
        sentences
            .into_iter()
            .map(|s| self.extract(s, features, labels))
            .collect()
    }
}
