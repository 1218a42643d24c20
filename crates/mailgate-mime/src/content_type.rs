//! MIME content type and content disposition handling.

use crate::encoding::{decode_charset, decode_percent, decode_rfc2047};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters with lowercase names (e.g., charset=utf-8, boundary=xxx).
    pub parameters: BTreeMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "us-ascii")
    }

    /// Creates a text/html content type in UTF-8.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "UTF-8")
    }

    /// Creates a multipart/mixed content type with boundary.
    #[must_use]
    pub fn multipart_mixed(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "mixed").with_parameter("boundary", boundary)
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Returns the `type/subtype` essence in lowercase.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// Returns the `name` parameter, decoded.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name").map(String::as_str)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Checks whether the essence equals `main/sub`, ignoring case.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type) && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="quoted; value"`
    ///
    /// # Errors
    ///
    /// Returns an error if the `type/subtype` part is missing or malformed.
    pub fn parse(s: &str) -> Result<Self> {
        let segments = split_parameters(s);
        let type_str = segments
            .first()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidContentType("Empty content type".to_string()))?;

        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype in {type_str:?}")))?;
        let main_type = main_type.trim();
        let sub_type = sub_type.trim();
        if main_type.is_empty() || sub_type.is_empty() || sub_type.contains('/') {
            return Err(Error::InvalidContentType(type_str.to_string()));
        }

        Ok(Self {
            main_type: main_type.to_lowercase(),
            sub_type: sub_type.to_lowercase(),
            parameters: parse_parameters(&segments[1..]),
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        write_parameters(f, &self.parameters)
    }
}

/// MIME content disposition (RFC 2183).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type in lowercase ("inline", "attachment", ...).
    pub disposition: String,
    /// Parameters with lowercase names.
    pub parameters: BTreeMap<String, String>,
}

impl ContentDisposition {
    /// Creates an attachment disposition with the given file name.
    #[must_use]
    pub fn attachment(filename: impl Into<String>) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("filename".to_string(), filename.into());
        Self {
            disposition: "attachment".to_string(),
            parameters,
        }
    }

    /// Returns true for `attachment` dispositions.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition == "attachment"
    }

    /// Returns the decoded `filename` parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }

    /// Parses a content disposition header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the disposition type is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let segments = split_parameters(s);
        let disposition = segments
            .first()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::InvalidContentType("Empty content disposition".to_string()))?;

        Ok(Self {
            disposition,
            parameters: parse_parameters(&segments[1..]),
        })
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.disposition)?;
        write_parameters(f, &self.parameters)
    }
}

/// Splits a header value on `;` outside of quoted strings.
fn split_parameters(s: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                segments.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&s[start..]);
    segments
}

/// Removes surrounding quotes and backslash escapes.
fn unquote(value: &str) -> String {
    let value = value.trim();
    let Some(inner) = value
        .strip_prefix('"')
        .map(|v| v.strip_suffix('"').unwrap_or(v))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits an RFC 2231 extended value (`charset'language'percent-encoded`)
/// into its charset and encoded text.
fn split_charset(value: &str) -> (&str, &str) {
    let mut pieces = value.splitn(3, '\'');
    match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(charset), Some(_language), Some(encoded)) if !charset.is_empty() => {
            (charset, encoded)
        }
        (Some(_), Some(_), Some(encoded)) => ("us-ascii", encoded),
        _ => ("utf-8", value),
    }
}

/// Parses `key=value` segments, resolving RFC 2231 continuations and
/// extended values as well as RFC 2047 encoded words inside quoted values.
fn parse_parameters(segments: &[&str]) -> BTreeMap<String, String> {
    let mut plain = BTreeMap::new();
    // name -> (index, extended, raw value)
    let mut continued: BTreeMap<String, Vec<(u32, bool, String)>> = BTreeMap::new();

    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = unquote(value);

        let (base, extended) = key
            .strip_suffix('*')
            .map_or((key.as_str(), false), |k| (k, true));

        if let Some((name, index)) = base.split_once('*') {
            if let Ok(index) = index.parse::<u32>() {
                continued
                    .entry(name.to_string())
                    .or_default()
                    .push((index, extended, value));
                continue;
            }
        }

        if extended {
            continued
                .entry(base.to_string())
                .or_default()
                .push((0, true, value));
        } else {
            plain.insert(key, decode_rfc2047(&value));
        }
    }

    for (name, mut pieces) in continued {
        pieces.sort_by_key(|(index, _, _)| *index);
        let charset_encoded = pieces.first().is_some_and(|(_, extended, _)| *extended);
        let joined = if charset_encoded {
            // Only the first segment carries the charset prefix.
            let (charset, first) = split_charset(&pieces[0].2);
            let mut bytes = decode_percent(first);
            for (_, extended, value) in &pieces[1..] {
                if *extended {
                    bytes.extend(decode_percent(value));
                } else {
                    bytes.extend_from_slice(value.as_bytes());
                }
            }
            decode_charset(&bytes, charset)
        } else {
            let raw: String = pieces.iter().map(|(_, _, v)| v.as_str()).collect();
            decode_rfc2047(&raw)
        };
        plain.insert(name, joined);
    }

    plain
}

fn write_parameters(f: &mut fmt::Formatter<'_>, parameters: &BTreeMap<String, String>) -> fmt::Result {
    for (key, value) in parameters {
        if value.is_empty()
            || value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c))
        {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            write!(f, "; {key}=\"{escaped}\"")?;
        } else {
            write!(f, "; {key}={value}")?;
        }
    }
    Ok(())
}
