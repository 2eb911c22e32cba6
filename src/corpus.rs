//! Tokens, sentences, and the corpus reader.

use std::io::{BufRead, Write};

use crate::errors::{Result, RutagError};

/// Character type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum CharacterType {
    /// Digit character. (e.g. 0, 1, 2, ...)
    Digit = b'D',

    /// Roman character. (e.g. A, B, C, ...)
    Roman = b'R',

    /// Japanese Hiragana character. (e.g. あ, い, う, ...)
    Hiragana = b'H',

    /// Japanese Katakana character. (e.g. ア, イ, ウ, ...)
    Katakana = b'T',

    /// Kanji (a.k.a. Hanzi or Hanja) character. (e.g. 漢, 字, ...)
    Kanji = b'K',

    /// Other character.
    Other = b'O',
}

impl CharacterType {
    /// Gets a character type of a given character.
    pub const fn get_type(c: char) -> Self {
        match c as u32 {
            0x30..=0x39 | 0xFF10..=0xFF19 => Self::Digit,
            0x41..=0x5A | 0x61..=0x7A | 0xFF21..=0xFF3A | 0xFF41..=0xFF5A => Self::Roman,
            0x3040..=0x3096 => Self::Hiragana,
            0x30A0..=0x30FA | 0x30FC..=0x30FF | 0xFF66..=0xFF9F => Self::Katakana,
            0x3400..=0x4DBF
                | 0x4E00..=0x9FFF
                | 0xF900..=0xFAFF
                | 0x20000..=0x2A6DF
                | 0x2A700..=0x2B73F
                | 0x2B740..=0x2B81F
                | 0x2B820..=0x2CEAF
                | 0x2F800..=0x2FA1F
                => Self::Kanji,
            _ => Self::Other,
        }
    }
}

/// One position of a sentence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    columns: Vec<String>,
}

impl Token {
    /// Creates a new token from its attribute columns.
    ///
    /// Column 0 is the surface text.
    #[inline(always)]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Gets the surface text.
    #[inline(always)]
    pub fn text(&self) -> &str {
        self.columns.first().map_or("", String::as_str)
    }

    /// Gets the attribute at the given column.
    #[inline(always)]
    pub fn column(&self, i: usize) -> Option<&str> {
        self.columns.get(i).map(String::as_str)
    }

    /// Gets all attribute columns.
    #[inline(always)]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the character type string of the surface text, e.g. `"KKH"`.
    pub fn char_types(&self) -> String {
        self.text()
            .chars()
            .map(|c| char::from(CharacterType::get_type(c) as u8))
            .collect()
    }
}

/// A token sequence with optional gold labels.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sentence {
    tokens: Vec<Token>,
    labels: Option<Vec<String>>,
}

impl Sentence {
    /// Creates an unlabeled sentence.
    #[inline(always)]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            labels: None,
        }
    }

    /// Creates a labeled sentence.
    ///
    /// # Errors
    ///
    /// The number of labels must be equal to the number of tokens.
    pub fn with_labels(tokens: Vec<Token>, labels: Vec<String>) -> Result<Self> {
        if tokens.len() != labels.len() {
            return Err(RutagError::invalid_argument(
                "labels",
                format!(
                    "{} labels were given for {} tokens",
                    labels.len(),
                    tokens.len()
                ),
            ));
        }
        Ok(Self {
            tokens,
            labels: Some(labels),
        })
    }

    /// Creates an unlabeled sentence from surface strings.
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Self {
        Self::new(words.iter().map(|w| Token::new([w.as_ref()])).collect())
    }

    /// Gets the tokens.
    #[inline(always)]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Gets the gold labels if present.
    #[inline(always)]
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Returns the number of tokens.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if the sentence has no token.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Reads a corpus in the one-token-per-line format.
///
/// Fields are separated by whitespace and sentences by blank lines. If `has_label` is true,
/// the last field of each line is the gold label.
///
/// # Errors
///
/// Returns an error if reading fails or a labeled line has no attribute column.
pub fn read_corpus<R: BufRead>(rdr: R, has_label: bool) -> Result<Vec<Sentence>> {
    let mut sentences = vec![];
    let mut tokens = vec![];
    let mut labels = vec![];
    for (i, line) in rdr.lines().enumerate() {
        let line = line?;
        let mut fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            flush_sentence(&mut sentences, &mut tokens, &mut labels, has_label);
            continue;
        }
        if has_label {
            if fields.len() < 2 {
                return Err(RutagError::invalid_format(
                    i + 1,
                    "a labeled token needs at least one attribute and a label",
                ));
            }
            if let Some(label) = fields.pop() {
                labels.push(label.to_string());
            }
        }
        tokens.push(Token::new(fields));
    }
    flush_sentence(&mut sentences, &mut tokens, &mut labels, has_label);
    Ok(sentences)
}

fn flush_sentence(
    sentences: &mut Vec<Sentence>,
    tokens: &mut Vec<Token>,
    labels: &mut Vec<String>,
    has_label: bool,
) {
    if tokens.is_empty() {
        return;
    }
    let tokens = std::mem::take(tokens);
    let labels = std::mem::take(labels);
    sentences.push(Sentence {
        tokens,
        labels: has_label.then_some(labels),
    });
}

/// Writes tagged sentences, one token per line.
///
/// Each line holds the token columns, the predicted label, and the gold label if present,
/// separated by tabs. Sentences are separated by blank lines.
///
/// # Errors
///
/// Returns [`RutagError::InvalidArgument`] if a prediction does not match its sentence, or an
/// I/O error.
pub fn write_corpus<W, S>(mut wtr: W, sentences: &[Sentence], predictions: &[Vec<S>]) -> Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    if sentences.len() != predictions.len() {
        return Err(RutagError::invalid_argument(
            "predictions",
            "must have one entry per sentence",
        ));
    }
    for (sentence, predicted) in sentences.iter().zip(predictions) {
        if sentence.len() != predicted.len() {
            return Err(RutagError::invalid_argument(
                "predictions",
                "must have one label per token",
            ));
        }
        for (i, (token, label)) in sentence.tokens().iter().zip(predicted).enumerate() {
            for column in token.columns() {
                write!(wtr, "{column}\t")?;
            }
            write!(wtr, "{}", label.as_ref())?;
            if let Some(gold) = sentence.labels() {
                write!(wtr, "\t{}", gold[i])?;
            }
            writeln!(wtr)?;
        }
        writeln!(wtr)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_labeled_corpus() {
        let data = "a x X\nb y Y\n\n\nc z X\n";
        let corpus = read_corpus(data.as_bytes(), true).unwrap();

        assert_eq!(2, corpus.len());
        assert_eq!(2, corpus[0].len());
        assert_eq!(Some("y"), corpus[0].tokens()[1].column(1));
        assert_eq!(
            Some(&["X".to_string(), "Y".to_string()][..]),
            corpus[0].labels()
        );
        assert_eq!("c", corpus[1].tokens()[0].text());
    }

    #[test]
    fn test_read_unlabeled_corpus() {
        let data = "a\tX\n  \nb\n";
        let corpus = read_corpus(data.as_bytes(), false).unwrap();

        assert_eq!(2, corpus.len());
        assert_eq!(None, corpus[0].labels());
        assert_eq!(Some("X"), corpus[0].tokens()[0].column(1));
    }

    #[test]
    fn test_read_missing_label() {
        let data = "a X\nb\n";
        let err = read_corpus(data.as_bytes(), true).unwrap_err();

        assert!(matches!(err, RutagError::InvalidFormat(e) if e.line == 2));
    }

    #[test]
    fn test_write_corpus() {
        let data = "a x X\nb y Y\n\nc z X\n";
        let corpus = read_corpus(data.as_bytes(), true).unwrap();
        let mut buf = vec![];
        write_corpus(&mut buf, &corpus, &[vec!["X", "X"], vec!["X"]]).unwrap();

        assert_eq!(
            "a\tx\tX\tX\nb\ty\tX\tY\n\nc\tz\tX\tX\n\n",
            String::from_utf8(buf).unwrap()
        );
    }

    #[test]
    fn test_write_unlabeled_corpus() {
        let corpus = vec![Sentence::from_words(&["a", "b"])];
        let mut buf = vec![];
        write_corpus(&mut buf, &corpus, &[vec!["X", "Y"]]).unwrap();

        assert_eq!("a\tX\nb\tY\n\n", String::from_utf8(buf).unwrap());
        assert!(write_corpus(Vec::<u8>::new(), &corpus, &[vec!["X"]]).is_err());
    }

    #[test]
    fn test_char_types() {
        let token = Token::new(["ab1京あア!"]);

        assert_eq!("RRDKHTO", token.char_types());
    }

    #[test]
    fn test_with_labels_length_mismatch() {
        let tokens = vec![Token::new(["a"])];

        assert!(Sentence::with_labels(tokens, vec![]).is_err());
    }
}
