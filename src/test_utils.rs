use crate::corpus::{Sentence, Token};
use crate::tagger::Tagger;
use crate::template::TemplateGroup;
use crate::trainer::Trainer;

/// Builds a labeled sentence from `word/LABEL` strings.
pub fn labeled(pairs: &[&str]) -> Sentence {
    let (tokens, labels) = pairs
        .iter()
        .map(|pair| {
            let (word, label) = pair.rsplit_once('/').unwrap();
            (Token::new([word]), label.to_string())
        })
        .unzip();
    Sentence::with_labels(tokens, labels).unwrap()
}

/// Trains a tagger on `a/X b/Y` with the current token as the only template.
pub fn toy_tagger() -> Tagger {
    let templates = TemplateGroup::parse("%x[0,0]\n").unwrap();
    let trainer = Trainer::new().epochs(1).c(0.8).unwrap();
    let (tagger, _) = Tagger::train(
        templates,
        vec![labeled(&["a/X", "b/Y"])],
        None,
        &trainer,
        |_, _| Ok(()),
    )
    .unwrap();
    tagger
}
