//! # rutag
//!
//! Structured sequence tagger implemented in pure Rust.
//!
//! Tokens are turned into sparse features by a group of templates, scored by a linear model,
//! and labeled by Viterbi decoding. The model is learned online with the Passive-Aggressive
//! (PA-I) update.
#![cfg_attr(
    feature = "train",
    doc = r#"
## Examples

```rust
use rutag::{Sentence, Tagger, TemplateGroup, Token, Trainer};

// One template: the surface of the current token.
let templates = TemplateGroup::parse("%x[0,0]\n").unwrap();

let train = vec![
    Sentence::with_labels(
        vec![Token::new(["a"]), Token::new(["b"])],
        vec!["X".to_string(), "Y".to_string()],
    )
    .unwrap(),
];

let trainer = Trainer::new().epochs(1).c(0.8).unwrap();
let (tagger, _) = Tagger::train(templates, train, None, &trainer, |_, _| Ok(())).unwrap();

let labels = tagger.tag(&Sentence::from_words(&["a", "b"])).unwrap();
assert_eq!(vec!["X", "Y"], labels);

// Models are stored as compressed blobs.
let mut buf = vec![];
tagger.write(&mut buf, 3).unwrap();
let loaded = Tagger::read(buf.as_slice()).unwrap();
assert_eq!(labels, loaded.tag(&Sentence::from_words(&["a", "b"])).unwrap());
```
"#
)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod alphabet;
mod corpus;
mod decoder;
pub mod errors;
mod feature;
mod lattice;
mod loss;
mod model;
mod store;
mod tagger;
mod template;

#[cfg(feature = "train")]
mod trainer;
#[cfg(feature = "train")]
mod vector;

#[cfg(all(test, feature = "train"))]
mod test_utils;

pub use alphabet::{Alphabet, Reopened, UNKNOWN_ID};
pub use corpus::{read_corpus, write_corpus, CharacterType, Sentence, Token};
pub use decoder::{Decoder, DecoderOrder};
pub use feature::{FeatureExtractor, FeatureSet, Instance, InstanceSet};
pub use loss::{hamming_loss, normalized_hamming_loss, Evaluation};
pub use model::{Cell, LinearModel};
pub use store::{ModelRef, DEFAULT_COMPRESSION_LEVEL, FORMAT_VERSION, MAGIC};
pub use tagger::{Tagger, TestOutput, UNKNOWN_LABEL};
pub use template::{Template, TemplateGroup, BOUNDARY, MAX_ORDER};

#[cfg(feature = "train")]
pub use trainer::{evaluate, EpochReport, Trainer};
