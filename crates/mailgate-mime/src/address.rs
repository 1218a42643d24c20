//! RFC 5322 mailbox and address list handling.

use crate::encoding::{decode_rfc2047, encode_rfc2047};
use crate::error::{Error, Result};
use std::fmt;

/// A single mailbox: an optional display name and an email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name, decoded from any RFC 2047 encoded words.
    pub name: Option<String>,
    /// Address in `local@domain` form.
    pub email: String,
}

impl Address {
    /// Creates an address without a display name.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Creates an address with a display name.
    #[must_use]
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parses a single mailbox such as `"Alice" <alice@example.com>`.
    ///
    /// # Errors
    ///
    /// Returns an error unless the input holds exactly one valid mailbox.
    pub fn parse(s: &str) -> Result<Self> {
        let mut list = parse_address_list(s)?;
        match (list.pop(), list.is_empty()) {
            (Some(address), true) => Ok(address),
            _ => Err(Error::InvalidAddress(format!("expected one mailbox in {s:?}"))),
        }
    }

    /// Returns true when both addresses name the same mailbox, ignoring case.
    #[must_use]
    pub fn same_mailbox(&self, other: &Self) -> bool {
        self.email.eq_ignore_ascii_case(&other.email)
    }

    /// Formats the address for use in a header, encoding the name if needed.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => {
                let encoded = encode_rfc2047(name);
                if encoded != name {
                    format!("{encoded} <{}>", self.email)
                } else if name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c)) {
                    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                    format!("\"{escaped}\" <{}>", self.email)
                } else {
                    format!("{name} <{}>", self.email)
                }
            }
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Formats a list of addresses as a comma-separated header value.
#[must_use]
pub fn format_address_list(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(Address::to_header_value)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses an address list header value.
///
/// Handles quoted display names, angle-bracket addresses, parenthesized
/// comments and named groups (`Team: a@example.com, b@example.com;`).
/// Empty groups such as `undisclosed-recipients:;` yield no addresses.
///
/// # Errors
///
/// Returns an error if any entry is not a valid mailbox.
pub fn parse_address_list(s: &str) -> Result<Vec<Address>> {
    let mut addresses = Vec::new();
    for entry in split_entries(s) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        addresses.push(parse_mailbox(entry)?);
    }
    Ok(addresses)
}

/// Splits an address list into mailbox entries, dropping group names.
fn split_entries(s: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut comment_depth = 0_u32;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes || comment_depth > 0 => {
                current.push(c);
                escaped = true;
            }
            '"' if comment_depth == 0 => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '(' if !in_quotes => {
                comment_depth += 1;
                current.push(c);
            }
            ')' if !in_quotes && comment_depth > 0 => {
                comment_depth -= 1;
                current.push(c);
            }
            '<' if !in_quotes && comment_depth == 0 => {
                in_angle = true;
                current.push(c);
            }
            '>' if !in_quotes && comment_depth == 0 => {
                in_angle = false;
                current.push(c);
            }
            ':' if !in_quotes && !in_angle && comment_depth == 0 => {
                // Group display name; its members follow.
                current.clear();
            }
            ',' | ';' if !in_quotes && !in_angle && comment_depth == 0 => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    entries.push(current);
    entries
}

/// Parses one mailbox entry.
fn parse_mailbox(entry: &str) -> Result<Address> {
    let (text, comments) = strip_comments(entry);

    let (name, email) = match (text.find('<'), text.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = unquote(text[..open].trim());
            (name, text[open + 1..close].trim().to_string())
        }
        (None, None) => {
            // Bare addr-spec; a trailing comment is the customary display name.
            let name = comments.into_iter().find(|c| !c.trim().is_empty());
            (name.unwrap_or_default(), text.trim().to_string())
        }
        _ => return Err(Error::InvalidAddress(entry.to_string())),
    };

    validate_addr_spec(&email).map_err(|()| Error::InvalidAddress(entry.to_string()))?;

    let name = decode_rfc2047(name.trim());
    Ok(Address {
        name: (!name.is_empty()).then_some(name),
        email,
    })
}

fn validate_addr_spec(email: &str) -> std::result::Result<(), ()> {
    let (local, domain) = email.rsplit_once('@').ok_or(())?;
    let bad = |c: char| c.is_whitespace() || "<>(),;".contains(c);
    if local.is_empty() || domain.is_empty() || domain.contains(bad) {
        return Err(());
    }
    if !local.starts_with('"') && local.contains(bad) {
        return Err(());
    }
    Ok(())
}

/// Removes parenthesized comments outside quoted strings, returning the
/// remaining text and the comment bodies.
fn strip_comments(s: &str) -> (String, Vec<String>) {
    let mut text = String::with_capacity(s.len());
    let mut comments = Vec::new();
    let mut comment = String::new();
    let mut depth = 0_u32;
    let mut in_quotes = false;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            if depth > 0 {
                comment.push(c);
            } else {
                text.push(c);
            }
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes || depth > 0 => {
                if depth == 0 {
                    text.push(c);
                }
                escaped = true;
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                text.push(c);
            }
            '(' if !in_quotes => {
                if depth > 0 {
                    comment.push(c);
                }
                depth += 1;
            }
            ')' if !in_quotes && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    comments.push(std::mem::take(&mut comment));
                } else {
                    comment.push(c);
                }
            }
            _ if depth > 0 => comment.push(c),
            _ => text.push(c),
        }
    }

    (text, comments)
}

/// Removes surrounding quotes and backslash escapes from a display name.
fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return s.to_string();
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
