//! Resource URI templates
//!
//! Templates look like `notes://{id}` or `gantry://health`: a scheme, literal
//! segments, and `{name}` placeholders that each match one path segment.

use std::fmt;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("empty template")]
    Empty,
    #[error("missing scheme (expected `scheme://...`)")]
    MissingScheme,
    #[error("unclosed `{{` at byte {0}")]
    Unclosed(usize),
    #[error("unexpected `}}` at byte {0}")]
    UnexpectedClose(usize),
    #[error("empty placeholder")]
    EmptyPlaceholder,
    #[error("invalid placeholder name `{0}`")]
    InvalidPlaceholder(String),
    #[error("duplicate placeholder `{0}`")]
    DuplicatePlaceholder(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A parsed resource URI template.
#[derive(Clone)]
pub struct UriTemplate {
    raw: String,
    params: Vec<String>,
    pattern: Regex,
}

fn valid_placeholder(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl UriTemplate {
    /// Parse and validate a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if raw.is_empty() {
            return Err(TemplateError::Empty);
        }
        let scheme_end = raw.find("://").ok_or(TemplateError::MissingScheme)?;
        if scheme_end == 0 {
            return Err(TemplateError::MissingScheme);
        }
        if let Some(brace) = raw.find('{') {
            if brace < scheme_end {
                return Err(TemplateError::MissingScheme);
            }
        }

        let mut params = Vec::new();
        let mut pattern = String::from("^");
        let mut literal = String::new();
        let mut chars = raw.char_indices();

        while let Some((i, c)) = chars.next() {
            match c {
                '{' => {
                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();

                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed(i));
                    }
                    if name.is_empty() {
                        return Err(TemplateError::EmptyPlaceholder);
                    }
                    if !valid_placeholder(&name) {
                        return Err(TemplateError::InvalidPlaceholder(name));
                    }
                    if params.contains(&name) {
                        return Err(TemplateError::DuplicatePlaceholder(name));
                    }
                    params.push(name);
                    pattern.push_str("([^/]+)");
                }
                '}' => return Err(TemplateError::UnexpectedClose(i)),
                c => literal.push(c),
            }
        }
        pattern.push_str(&regex::escape(&literal));
        pattern.push('$');

        let pattern = Regex::new(&pattern)?;
        Ok(Self {
            raw: raw.to_string(),
            params,
            pattern,
        })
    }

    /// The template exactly as written.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in template order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// True when the template has no placeholders.
    pub fn is_concrete(&self) -> bool {
        self.params.is_empty()
    }

    /// Match a URI against this template.
    ///
    /// Returns placeholder name/value pairs in template order, or `None` if
    /// the URI does not fit. Each placeholder matches a single segment.
    pub fn matches(&self, uri: &str) -> Option<Vec<(String, String)>> {
        let captures = self.pattern.captures(uri)?;
        Some(
            self.params
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, m)| m.map(|m| (name.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UriTemplate").field(&self.raw).finish()
    }
}

impl PartialEq for UriTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for UriTemplate {}
