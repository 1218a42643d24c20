//! # mailgate-mime
//!
//! MIME parsing and composition for the mailgate gateway.
//!
//! ## Features
//!
//! - **Message parsing**: headers, address lists, dates and single-level
//!   multipart bodies, tolerant of real-world mail
//! - **Message composition**: `multipart/mixed` messages with an HTML body
//!   and Base64 attachments, including reply-all derivation
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words
//!   and RFC 2231 parameter values
//!
//! ## Parsing
//!
//! ```
//! use mailgate_mime::Message;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: Test\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw);
//! assert_eq!(message.subject(), "Test");
//! assert_eq!(message.parts().unwrap()[0].text().unwrap(), "Hello, World!");
//! ```
//!
//! ## Building
//!
//! ```
//! use mailgate_mime::{Address, AttachmentPart, MessageBuilder};
//!
//! let built = MessageBuilder::new()
//!     .from(Address::new("sender@example.com"))
//!     .to([Address::new("recipient@example.com")])
//!     .subject("Document")
//!     .html_body("<p>Please find the attached document.</p>")
//!     .attach(AttachmentPart {
//!         file_name: "notes.txt".to_string(),
//!         content_type: "text/plain".to_string(),
//!         content: b"notes".to_vec(),
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(built.recipients.len(), 1);
//! ```

#![forbid(unsafe_code)]

mod address;
mod builder;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::{Address, format_address_list, parse_address_list};
pub use builder::{AttachmentPart, BuiltMessage, MessageBuilder};
pub use content_type::{ContentDisposition, ContentType};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
