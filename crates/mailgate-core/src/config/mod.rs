//! Gateway configuration.
//!
//! Provides server settings, provider presets, and validation.

mod model;
mod validation;

pub use model::{AttachmentMatch, FolderConfig, GatewayConfig, ImapConfig, Security, SmtpConfig};
pub use validation::{Endpoint, ValidationError, ValidationResult, validate_config};
