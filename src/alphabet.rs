use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use hashbrown::HashMap;

use crate::errors::{Result, RutagError};

/// ID returned for symbols that are not registered in a frozen [`Alphabet`].
pub const UNKNOWN_ID: u32 = u32::MAX;

/// Bidirectional mapping between symbols and dense IDs.
///
/// IDs are assigned from zero in insertion order. While the alphabet is open, interning an
/// unseen symbol allocates the next ID. Once frozen, unseen symbols resolve to
/// [`UNKNOWN_ID`] and the alphabet never grows.
#[derive(Debug, Default, Clone)]
pub struct Alphabet {
    ids: HashMap<String, u32>,
    symbols: Vec<String>,
    frozen: bool,
}

impl Alphabet {
    /// Creates a new open alphabet.
    #[inline(always)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ID of the given symbol, registering it if the alphabet is open.
    ///
    /// # Errors
    ///
    /// The number of symbols must be less than 2^32 - 1.
    pub fn intern(&mut self, symbol: &str) -> Result<u32> {
        if let Some(&id) = self.ids.get(symbol) {
            return Ok(id);
        }
        if self.frozen {
            return Ok(UNKNOWN_ID);
        }
        let id = u32::try_from(self.symbols.len())?;
        if id == UNKNOWN_ID {
            return Err(RutagError::invalid_argument(
                "symbol",
                "the number of symbols reached the upper limit",
            ));
        }
        self.ids.insert(symbol.to_string(), id);
        self.symbols.push(symbol.to_string());
        Ok(id)
    }

    /// Returns the ID of the given symbol without registering it.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<u32> {
        self.ids.get(symbol).copied()
    }

    /// Returns the symbol of the given ID.
    #[inline(always)]
    #[must_use]
    pub fn lookup(&self, id: u32) -> Option<&str> {
        self.symbols
            .get(usize::try_from(id).ok()?)
            .map(String::as_str)
    }

    /// Stops growth. Existing IDs are kept as they are.
    #[inline(always)]
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Reopens the alphabet until the returned guard is dropped.
    ///
    /// The alphabet is frozen again when the guard goes out of scope.
    #[inline(always)]
    pub fn reopen(&mut self) -> Reopened<'_> {
        self.frozen = false;
        Reopened { alphabet: self }
    }

    /// Returns `true` if the alphabet no longer grows.
    #[inline(always)]
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Returns the number of symbols.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if the alphabet has no symbol.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterates over `(symbol, id)` pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.symbols
            .iter()
            .zip(0..)
            .map(|(s, id)| (s.as_str(), id))
    }
}

/// An [`Alphabet`] temporarily reopened for growth. Freezes it again on drop.
#[derive(Debug)]
pub struct Reopened<'a> {
    alphabet: &'a mut Alphabet,
}

impl core::ops::Deref for Reopened<'_> {
    type Target = Alphabet;

    fn deref(&self) -> &Self::Target {
        self.alphabet
    }
}

impl core::ops::DerefMut for Reopened<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.alphabet
    }
}

impl Drop for Reopened<'_> {
    fn drop(&mut self) {
        self.alphabet.freeze();
    }
}

impl<Context> Decode<Context> for Alphabet {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let symbols: Vec<String> = Decode::decode(decoder)?;
        let mut ids = HashMap::with_capacity(symbols.len());
        for (symbol, id) in symbols.iter().zip(0..) {
            if ids.insert(symbol.clone(), id).is_some() {
                return Err(DecodeError::OtherString(format!(
                    "duplicate symbol in alphabet: {symbol}"
                )));
            }
        }
        Ok(Self {
            ids,
            symbols,
            frozen: true,
        })
    }
}

impl Encode for Alphabet {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.symbols, encoder)?;
        Ok(())
    }
}
