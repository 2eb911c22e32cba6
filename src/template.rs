//! Feature templates.
//!
//! A template line is a concatenation of literal text and macros:
//!
//! * `%x[o,c]` - column `c` of the token at relative offset `o`
//! * `%t[o]` - character types of the surface text of the token at relative offset `o`
//! * `%y[-1]` - conjoins the template with the previous label
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fmt::Write as _;
use std::io::BufRead;

use bincode::{Decode, Encode};

use crate::corpus::Token;
use crate::errors::{Result, RutagError};

/// Value rendered for offsets outside the sentence.
pub const BOUNDARY: &str = "_B";

/// Maximum supported label order of a template.
pub const MAX_ORDER: u8 = 1;

/// A part of a template.
#[derive(Clone, Debug, Eq, PartialEq, Decode, Encode)]
pub enum TemplateItem {
    /// Literal text copied as is.
    Literal(String),

    /// Attribute column of a neighboring token.
    Column {
        /// Relative position.
        offset: i32,
        /// Column index.
        column: u32,
    },

    /// Character types of the surface text of a neighboring token.
    CharType {
        /// Relative position.
        offset: i32,
    },
}

/// A rule that renders one feature string at each position.
#[derive(Clone, Debug, Eq, PartialEq, Decode, Encode)]
pub struct Template {
    id: u32,
    items: Vec<TemplateItem>,
    order: u8,
    source: String,
}

impl Template {
    /// Parses a template line.
    ///
    /// # Arguments
    ///
    /// * `id` - Group ID of the template, i.e., its declaration index.
    /// * `line` - Template definition.
    ///
    /// # Errors
    ///
    /// Returns an error message if the line contains a malformed macro or the label order
    /// exceeds [`MAX_ORDER`].
    pub fn parse(id: u32, line: &str) -> std::result::Result<Self, String> {
        let mut items = vec![];
        let mut literal = String::new();
        let mut order = 0;
        let mut rest = line;
        while let Some(pos) = rest.find('%') {
            literal.push_str(&rest[..pos]);
            rest = &rest[pos..];
            let kind = rest[1..].chars().next();
            if !matches!(kind, Some('x' | 't' | 'y')) || !rest[2..].starts_with('[') {
                literal.push('%');
                rest = &rest[1..];
                continue;
            }
            let end = rest
                .find(']')
                .ok_or_else(|| format!("unclosed macro: {rest}"))?;
            let args: Vec<&str> = rest[3..end].split(',').map(str::trim).collect();
            let offset = args[0]
                .parse::<i32>()
                .map_err(|_| format!("invalid offset: {}", args[0]))?;
            match (kind, args.len()) {
                (Some('x'), 2) => {
                    let column = args[1]
                        .parse::<u32>()
                        .map_err(|_| format!("invalid column: {}", args[1]))?;
                    flush_literal(&mut items, &mut literal);
                    items.push(TemplateItem::Column { offset, column });
                }
                (Some('t'), 1) => {
                    flush_literal(&mut items, &mut literal);
                    items.push(TemplateItem::CharType { offset });
                }
                (Some('y'), 1) => {
                    if offset > 0 {
                        return Err(format!("label offset must not be positive: {offset}"));
                    }
                    let label_order = u8::try_from(offset.unsigned_abs())
                        .ok()
                        .filter(|&o| o <= MAX_ORDER)
                        .ok_or_else(|| {
                            format!("label order {} is not supported", offset.unsigned_abs())
                        })?;
                    order = order.max(label_order);
                }
                _ => return Err(format!("wrong number of arguments: {}", &rest[..=end])),
            }
            rest = &rest[end + 1..];
        }
        literal.push_str(rest);
        flush_literal(&mut items, &mut literal);
        Ok(Self {
            id,
            items,
            order,
            source: line.to_string(),
        })
    }

    /// Gets the group ID.
    #[inline(always)]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Gets the label order: 0 for label unigrams, 1 for features conjoined with the previous
    /// label.
    #[inline(always)]
    pub const fn order(&self) -> u8 {
        self.order
    }

    /// Gets the template definition as written.
    #[inline(always)]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the feature string of this template at the given position.
    ///
    /// # Errors
    ///
    /// Returns [`RutagError::Inconsistent`] if a token within the sentence lacks a referenced
    /// column.
    pub fn render(&self, tokens: &[Token], position: usize) -> Result<String> {
        let mut buf = String::new();
        // writing into a String never fails
        let _ = write!(buf, "{}:", self.id);
        for item in &self.items {
            match item {
                TemplateItem::Literal(s) => buf.push_str(s),
                &TemplateItem::Column { offset, column } => {
                    buf.push('\t');
                    match neighbor(tokens, position, offset) {
                        Some(token) => {
                            let value = token.column(column as usize).ok_or_else(|| {
                                RutagError::inconsistent(format!(
                                    "template `{}` refers to column {} but a token has only {} columns",
                                    self.source,
                                    column,
                                    token.columns().len(),
                                ))
                            })?;
                            buf.push_str(value);
                        }
                        None => buf.push_str(BOUNDARY),
                    }
                }
                &TemplateItem::CharType { offset } => {
                    buf.push('\t');
                    match neighbor(tokens, position, offset) {
                        Some(token) => buf.push_str(&token.char_types()),
                        None => buf.push_str(BOUNDARY),
                    }
                }
            }
        }
        Ok(buf)
    }
}

fn flush_literal(items: &mut Vec<TemplateItem>, literal: &mut String) {
    if !literal.is_empty() {
        items.push(TemplateItem::Literal(std::mem::take(literal)));
    }
}

#[inline(always)]
fn neighbor(tokens: &[Token], position: usize, offset: i32) -> Option<&Token> {
    let i = isize::try_from(position).ok()?.checked_add(offset as isize)?;
    tokens.get(usize::try_from(i).ok()?)
}

/// An ordered set of templates defining the feature schema.
#[derive(Clone, Debug, Default, Eq, PartialEq, Decode, Encode)]
pub struct TemplateGroup {
    templates: Vec<Template>,
}

impl TemplateGroup {
    /// Parses a template specification.
    ///
    /// # Errors
    ///
    /// Returns [`RutagError::InvalidFormat`] for malformed lines.
    pub fn parse(text: &str) -> Result<Self> {
        Self::read(text.as_bytes())
    }

    /// Reads a template specification.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or a line is malformed.
    pub fn read<R: BufRead>(rdr: R) -> Result<Self> {
        let mut templates = vec![];
        for (i, line) in rdr.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let id = u32::try_from(templates.len())?;
            let template =
                Template::parse(id, line).map_err(|msg| RutagError::invalid_format(i + 1, msg))?;
            templates.push(template);
        }
        Ok(Self { templates })
    }

    /// Gets the templates in declaration order.
    #[inline(always)]
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Returns the number of templates.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if the group has no template.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Returns the highest label order among the templates.
    pub fn max_order(&self) -> u8 {
        self.templates.iter().map(Template::order).max().unwrap_or(0)
    }

    /// Renders the feature strings of all templates at the given position, in declaration
    /// order.
    ///
    /// # Errors
    ///
    /// See [`Template::render`].
    pub fn apply(&self, tokens: &[Token], position: usize) -> Result<Vec<String>> {
        self.templates
            .iter()
            .map(|t| t.render(tokens, position))
            .collect()
    }
}
