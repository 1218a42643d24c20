//! Parsed MIME message structure.

use crate::address::{Address, parse_address_list};
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Content transfer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Base64.
    Base64,
    /// Quoted-Printable.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value. Unknown values are 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        })
    }
}

/// A single body part: its headers and still-encoded body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Raw body, before transfer decoding.
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Returns the `Content-Type` header exactly as it appeared.
    #[must_use]
    pub fn content_type_raw(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    /// Parses the content type, defaulting to `text/plain` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is present but malformed.
    pub fn content_type(&self) -> Result<ContentType> {
        self.content_type_raw()
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Parses the `Content-Disposition` header, if present and well formed.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("Content-Disposition")
            .and_then(|value| ContentDisposition::parse(value).ok())
    }

    /// Returns the file name from the disposition or the content type `name`.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.disposition()
            .and_then(|d| d.filename().map(str::to_string))
            .or_else(|| {
                self.content_type()
                    .ok()
                    .and_then(|ct| ct.name().map(str::to_string))
            })
            .filter(|name| !name.is_empty())
    }

    /// Returns the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("Content-Transfer-Encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Decodes the body according to its transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a Base64 body is malformed.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(&self.body)),
            TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
                Ok(self.body.clone())
            }
        }
    }

    /// Decodes the body to text using the declared charset.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding fails.
    pub fn text(&self) -> Result<String> {
        let bytes = self.decode_body()?;
        let charset = self
            .content_type()
            .ok()
            .and_then(|ct| ct.charset().map(str::to_string))
            .unwrap_or_else(|| "utf-8".to_string());
        Ok(decode_charset(&bytes, &charset))
    }
}

/// A parsed RFC 5322 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Top-level headers.
    pub headers: Headers,
    /// Raw body after the header block.
    pub body: Vec<u8>,
}

impl Message {
    /// Parses a raw message.
    ///
    /// A message with no blank line is treated as all headers. Header bytes
    /// that are not valid UTF-8 are replaced rather than rejected.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (header_bytes, body) = split_header_body(raw);
        Self {
            headers: Headers::parse(&String::from_utf8_lossy(header_bytes)),
            body: body.to_vec(),
        }
    }

    /// Returns the decoded subject, or an empty string.
    #[must_use]
    pub fn subject(&self) -> String {
        self.headers
            .get("Subject")
            .map(decode_rfc2047)
            .unwrap_or_default()
    }

    /// Returns the `Message-ID` header value, trimmed.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers
            .get("Message-ID")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Returns the first `In-Reply-To` id.
    #[must_use]
    pub fn in_reply_to(&self) -> Option<String> {
        self.headers
            .get("In-Reply-To")
            .and_then(|value| msg_ids(value).into_iter().next())
    }

    /// Returns the ids listed in `References`.
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        self.headers
            .get_all("References")
            .into_iter()
            .flat_map(msg_ids)
            .collect()
    }

    /// Parses every instance of an address header.
    ///
    /// # Errors
    ///
    /// Returns an error if any instance holds an invalid mailbox.
    pub fn addresses(&self, name: &str) -> Result<Vec<Address>> {
        let mut all = Vec::new();
        for value in self.headers.get_all(name) {
            all.extend(parse_address_list(value)?);
        }
        Ok(all)
    }

    /// Returns the `From` addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed.
    pub fn from_addresses(&self) -> Result<Vec<Address>> {
        self.addresses("From")
    }

    /// Returns the `To` addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed.
    pub fn to_addresses(&self) -> Result<Vec<Address>> {
        self.addresses("To")
    }

    /// Returns the `Cc` addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed.
    pub fn cc_addresses(&self) -> Result<Vec<Address>> {
        self.addresses("Cc")
    }

    /// Returns the `Reply-To` addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed.
    pub fn reply_to_addresses(&self) -> Result<Vec<Address>> {
        self.addresses("Reply-To")
    }

    /// Parses the `Date` header.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        let value = self.headers.get("Date")?;
        // Drop a trailing zone comment such as "(UTC)"
        let value = match value.find('(') {
            Some(idx) => value[..idx].trim(),
            None => value.trim(),
        };
        DateTime::parse_from_rfc2822(value).ok()
    }

    /// Returns true if the top-level content type is multipart.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.top_part()
            .content_type()
            .is_ok_and(|ct| ct.is_multipart())
    }

    /// Returns the message body parts.
    ///
    /// A multipart message yields its direct children, each keeping its own
    /// headers; nested multiparts are returned as single opaque parts. A
    /// non-multipart message yields one part carrying the top-level
    /// content headers.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart content type has no boundary.
    pub fn parts(&self) -> Result<Vec<Part>> {
        let top = self.top_part();
        let Ok(content_type) = top.content_type() else {
            return Ok(vec![top]);
        };
        if !content_type.is_multipart() {
            return Ok(vec![top]);
        }

        let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
        Ok(split_multipart(&self.body, boundary)
            .into_iter()
            .map(|raw| {
                let (header_bytes, body) = split_header_body(raw);
                Part::new(
                    Headers::parse(&String::from_utf8_lossy(header_bytes)),
                    body.to_vec(),
                )
            })
            .collect())
    }

    /// The whole body as a single part with the top-level content headers.
    fn top_part(&self) -> Part {
        let mut headers = Headers::new();
        for name in [
            "Content-Type",
            "Content-Transfer-Encoding",
            "Content-Disposition",
        ] {
            if let Some(value) = self.headers.get(name) {
                headers.add(name, value);
            }
        }
        Part::new(headers, self.body.clone())
    }
}

/// Extracts `<id>` tokens from a header value.
fn msg_ids(value: &str) -> Vec<String> {
    let ids: Vec<String> = value
        .split('<')
        .skip(1)
        .filter_map(|chunk| chunk.split_once('>'))
        .map(|(id, _)| format!("<{}>", id.trim()))
        .collect();
    if ids.is_empty() {
        value.split_whitespace().map(str::to_string).collect()
    } else {
        ids
    }
}

/// Splits raw bytes at the first empty line.
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if raw.starts_with(b"\r\n") {
        return (&[], &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (&[], &raw[1..]);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(raw, b"\n\n").map(|i| (i, i + 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((end, start)) => (&raw[..end], &raw[start..]),
        None => (raw, &[]),
    }
}

/// Splits a multipart body into raw part bytes.
///
/// Each part ends before the line break preceding the next delimiter line.
/// A missing closing delimiter ends the last part at the end of the body.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut line_start = 0;

    while line_start <= body.len() {
        let line_end = find(&body[line_start..], b"\n").map_or(body.len(), |i| line_start + i);
        let next_line = (line_end + 1).min(body.len() + 1);
        let line = trim_line_end(&body[line_start..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter) {
            let rest = trim_trailing_space(rest);
            let closing = rest == b"--";
            if rest.is_empty() || closing {
                if let Some(start) = part_start.take() {
                    let end = line_break_before(body, line_start).max(start);
                    parts.push(&body[start..end]);
                }
                if closing {
                    return parts;
                }
                part_start = Some(next_line.min(body.len()));
            }
        }

        if line_end >= body.len() {
            break;
        }
        line_start = next_line;
    }

    if let Some(start) = part_start {
        parts.push(&body[start..]);
    }
    parts
}

/// Index where the line break ending the previous line begins.
fn line_break_before(body: &[u8], line_start: usize) -> usize {
    let mut end = line_start;
    if end > 0 && body[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn trim_trailing_space(mut bytes: &[u8]) -> &[u8] {
    while let [rest @ .., b' ' | b'\t'] = bytes {
        bytes = rest;
    }
    bytes
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MULTIPART: &str = concat!(
        "From: \"Alice\" <alice@example.com>\r\n",
        "To: bob@example.com, carol@example.com\r\n",
        "Cc: dave@example.com\r\n",
        "Subject: =?UTF-8?B?UXVhcnRlcmx5IHLDqXN1bcOp?=\r\n",
        "Date: Tue, 15 Apr 2025 10:30:00 +0200 (CEST)\r\n",
        "Message-ID: <abc123@example.com>\r\n",
        "References: <root@example.com>\r\n",
        "  <mid@example.com>\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"b1\"\r\n",
        "\r\n",
        "This is a multi-part message in MIME format.\r\n",
        "--b1\r\n",
        "Content-Type: text/html; charset=UTF-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "<p>Hello=20there</p>\r\n",
        "--b1\r\n",
        "Content-Type: application/pdf; name=\"report.pdf\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
        "\r\n",
        "JVBERi0xLjQK\r\n",
        "--b1--\r\n",
        "epilogue\r\n"
    );

    #[test]
    fn test_parse_headers() {
        let message = Message::parse(MULTIPART.as_bytes());
        assert_eq!(message.subject(), "Quarterly résumé");
        assert_eq!(message.message_id(), Some("<abc123@example.com>"));
        assert_eq!(
            message.references(),
            vec!["<root@example.com>", "<mid@example.com>"]
        );
        assert_eq!(message.from_addresses().unwrap()[0].email, "alice@example.com");
        assert_eq!(message.to_addresses().unwrap().len(), 2);
        assert_eq!(message.cc_addresses().unwrap()[0].email, "dave@example.com");

        let date = message.date().unwrap();
        assert_eq!(date.to_rfc3339(), "2025-04-15T10:30:00+02:00");
    }

    #[test]
    fn test_parse_multipart_parts() {
        let message = Message::parse(MULTIPART.as_bytes());
        assert!(message.is_multipart());

        let parts = message.parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text().unwrap(), "<p>Hello there</p>");
        assert_eq!(
            parts[1].content_type_raw(),
            Some("application/pdf; name=\"report.pdf\"")
        );
        assert_eq!(parts[1].filename().as_deref(), Some("report.pdf"));
        assert_eq!(parts[1].decode_body().unwrap(), b"%PDF-1.4\n");
    }

    #[test]
    fn test_parse_simple_message() {
        let raw = b"Subject: Hi\nContent-Type: text/plain\n\nJust text\n";
        let message = Message::parse(raw);
        assert!(!message.is_multipart());

        let parts = message.parts().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text().unwrap(), "Just text\n");
    }

    #[test]
    fn test_text_uses_declared_charset() {
        let raw = b"Content-Type: text/plain; charset=windows-1252\r\n\r\n\x93Quoted\x94 \x80 5";
        let parts = Message::parse(raw).parts().unwrap();
        assert_eq!(parts[0].text().unwrap(), "\u{201c}Quoted\u{201d} \u{20ac} 5");
    }

    #[test]
    fn test_parse_headers_only() {
        let message = Message::parse(b"Subject: Headers only\r\nMessage-ID: <h@x>\r\n");
        assert_eq!(message.subject(), "Headers only");
        assert!(message.body.is_empty());
    }

    #[test]
    fn test_multipart_missing_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nbody\r\n--x--\r\n";
        let message = Message::parse(raw);
        assert!(matches!(message.parts(), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_multipart_without_closing_delimiter() {
        let raw = b"Content-Type: multipart/mixed; boundary=z\r\n\r\n--z\r\nContent-Type: text/plain\r\n\r\nfirst\r\n--z\r\n\r\nsecond";
        let parts = Message::parse(raw).parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body, b"first");
        assert_eq!(parts[1].body, b"second");
    }

    #[test]
    fn test_boundary_prefix_inside_body_is_not_a_delimiter() {
        let raw = b"Content-Type: multipart/mixed; boundary=q\r\n\r\n--q\r\n\r\n--qq is text\r\n--q--\r\n";
        let parts = Message::parse(raw).parts().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"--qq is text");
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" quoted-printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-unknown"), TransferEncoding::SevenBit);
    }
}
