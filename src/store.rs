//! Model file I/O.
//!
//! A model file is a zstd stream of bincode-encoded fields in this order: magic bytes, format
//! version, decoder order, template group, feature alphabet, label alphabet, and linear model.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bincode::Decode;

use crate::alphabet::Alphabet;
use crate::decoder::DecoderOrder;
use crate::errors::{Result, RutagError};
use crate::model::LinearModel;
use crate::tagger::Tagger;
use crate::template::TemplateGroup;

/// Magic bytes at the head of a model.
pub const MAGIC: [u8; 4] = *b"RTAG";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 19;

/// Borrowed parts of a tagger, written as one unit.
#[derive(Clone, Copy, Debug)]
pub struct ModelRef<'a> {
    /// Decoder order.
    pub order: DecoderOrder,
    /// Template group.
    pub templates: &'a TemplateGroup,
    /// Feature alphabet.
    pub features: &'a Alphabet,
    /// Label alphabet.
    pub labels: &'a Alphabet,
    /// Weights.
    pub model: &'a LinearModel,
}

impl ModelRef<'_> {
    /// Writes the model to the given sink.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or writing fails.
    pub fn write<W: Write>(&self, wtr: W, level: i32) -> Result<()> {
        let config = bincode::config::standard();
        let mut f = zstd::Encoder::new(wtr, level)?;
        f.include_checksum(true)?;
        bincode::encode_into_std_write(MAGIC, &mut f, config)?;
        bincode::encode_into_std_write(FORMAT_VERSION, &mut f, config)?;
        bincode::encode_into_std_write(self.order, &mut f, config)?;
        bincode::encode_into_std_write(self.templates, &mut f, config)?;
        bincode::encode_into_std_write(self.features, &mut f, config)?;
        bincode::encode_into_std_write(self.labels, &mut f, config)?;
        bincode::encode_into_std_write(self.model, &mut f, config)?;
        f.finish()?;
        Ok(())
    }

    /// Saves the model to a file.
    ///
    /// The data is written to a temporary file next to `path` and then renamed, so an existing
    /// file is replaced only by a complete model.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P, level: i32) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = temporary_path(path);
        let result = File::create(&tmp_path)
            .map_err(RutagError::from)
            .and_then(|f| {
                let mut f = BufWriter::new(f);
                self.write(&mut f, level)?;
                f.flush()?;
                Ok(())
            })
            .and_then(|()| Ok(fs::rename(&tmp_path, path)?));
        if result.is_err() {
            // the temporary file may not exist
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(".tmp");
    PathBuf::from(s)
}

/// Upper bound of the bytes claimed by one decoded field.
const FIELD_SIZE_LIMIT: usize = 1 << 31;

fn read_field<T, R>(rdr: &mut R, name: &str) -> Result<T>
where
    T: Decode<()>,
    R: Read,
{
    let config = bincode::config::standard().with_limit::<FIELD_SIZE_LIMIT>();
    bincode::decode_from_std_read(rdr, config)
        .map_err(|e| RutagError::invalid_model(format!("failed to read the {name}: {e}")))
}

impl Tagger {
    /// Borrows the parts written to a model file.
    #[inline(always)]
    pub fn as_model_ref(&self) -> ModelRef<'_> {
        ModelRef {
            order: self.order,
            templates: &self.templates,
            features: &self.features,
            labels: &self.labels,
            model: &self.model,
        }
    }

    /// Writes the model to the given sink.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or writing fails.
    pub fn write<W: Write>(&self, wtr: W, level: i32) -> Result<()> {
        self.as_model_ref().write(wtr, level)
    }

    /// Saves the model to a file. See [`ModelRef::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P, level: i32) -> Result<()> {
        self.as_model_ref().save(path, level)
    }

    /// Reads a model.
    ///
    /// # Errors
    ///
    /// Returns [`RutagError::InvalidModel`] if the data is truncated or corrupted, has an
    /// unknown version, or has inconsistent dimensions.
    pub fn read<R: Read>(rdr: R) -> Result<Self> {
        let mut rdr = zstd::Decoder::new(rdr)
            .map_err(|e| RutagError::invalid_model(format!("not a compressed model: {e}")))?;
        let magic: [u8; 4] = read_field(&mut rdr, "header")?;
        if magic != MAGIC {
            return Err(RutagError::invalid_model("magic mismatch"));
        }
        let version: u32 = read_field(&mut rdr, "header")?;
        if version != FORMAT_VERSION {
            return Err(RutagError::invalid_model(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        let order: DecoderOrder = read_field(&mut rdr, "decoder order")?;
        let templates: TemplateGroup = read_field(&mut rdr, "template group")?;
        let features: Alphabet = read_field(&mut rdr, "feature alphabet")?;
        let labels: Alphabet = read_field(&mut rdr, "label alphabet")?;
        let model: LinearModel = read_field(&mut rdr, "linear model")?;
        let mut rest = vec![];
        rdr.read_to_end(&mut rest)
            .map_err(|e| RutagError::invalid_model(format!("truncated model: {e}")))?;
        if !rest.is_empty() {
            return Err(RutagError::invalid_model("trailing data after the model"));
        }

        if model.num_features() != features.len() {
            return Err(RutagError::invalid_model(format!(
                "the model has {} features but the feature alphabet has {}",
                model.num_features(),
                features.len()
            )));
        }
        if model.num_labels() != labels.len() {
            return Err(RutagError::invalid_model(format!(
                "the model has {} labels but the label alphabet has {}",
                model.num_labels(),
                labels.len()
            )));
        }
        if templates.max_order() > 0 && !order.with_bigram() {
            return Err(RutagError::invalid_model(
                "bi-gram templates are stored with linear decoding",
            ));
        }
        model.validate()?;

        Ok(Self {
            order,
            templates,
            features,
            labels,
            model,
        })
    }

    /// Loads a model from a file.
    ///
    /// # Errors
    ///
    /// See [`Tagger::read`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        Self::read(BufReader::new(f))
    }
}
