use core::fmt;

/// Counts positions where two label sequences differ.
///
/// Positions beyond the shorter sequence count as mismatches.
pub fn hamming_loss(gold: &[u32], predicted: &[u32]) -> usize {
    let mismatches = gold
        .iter()
        .zip(predicted)
        .filter(|(g, p)| g != p)
        .count();
    mismatches + gold.len().abs_diff(predicted.len())
}

/// [`hamming_loss`] divided by the length of `gold`. Returns 0 for empty sequences.
pub fn normalized_hamming_loss(gold: &[u32], predicted: &[u32]) -> f64 {
    if gold.is_empty() {
        return if predicted.is_empty() { 0.0 } else { 1.0 };
    }
    hamming_loss(gold, predicted) as f64 / gold.len() as f64
}

/// Accumulates token and sentence level accuracy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Evaluation {
    num_tokens: usize,
    num_token_errors: usize,
    num_sentences: usize,
    num_sentence_errors: usize,
}

impl Evaluation {
    /// Creates an empty evaluation.
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one sentence and returns its Hamming loss.
    pub fn add(&mut self, gold: &[u32], predicted: &[u32]) -> usize {
        let loss = hamming_loss(gold, predicted);
        self.num_tokens += gold.len();
        self.num_token_errors += loss;
        self.num_sentences += 1;
        if loss != 0 {
            self.num_sentence_errors += 1;
        }
        loss
    }

    /// Returns the number of tokens.
    #[inline(always)]
    pub const fn num_tokens(&self) -> usize {
        self.num_tokens
    }

    /// Returns the number of sentences.
    #[inline(always)]
    pub const fn num_sentences(&self) -> usize {
        self.num_sentences
    }

    /// Returns the total Hamming loss.
    #[inline(always)]
    pub const fn loss(&self) -> usize {
        self.num_token_errors
    }

    /// Returns `1 - errors / tokens`, or 1 if nothing was evaluated.
    pub fn token_accuracy(&self) -> f64 {
        if self.num_tokens == 0 {
            return 1.0;
        }
        1.0 - self.num_token_errors as f64 / self.num_tokens as f64
    }

    /// Returns the ratio of sentences without error, or 1 if nothing was evaluated.
    pub fn sentence_accuracy(&self) -> f64 {
        if self.num_sentences == 0 {
            return 1.0;
        }
        1.0 - self.num_sentence_errors as f64 / self.num_sentences as f64
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "token accuracy: {:.6} ({}/{}), sentence accuracy: {:.6} ({}/{}), loss: {}",
            self.token_accuracy(),
            self.num_tokens - self.num_token_errors.min(self.num_tokens),
            self.num_tokens,
            self.sentence_accuracy(),
            self.num_sentences - self.num_sentence_errors,
            self.num_sentences,
            self.num_token_errors,
        )
    }
}
