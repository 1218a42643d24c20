//! Gateway services.
//!
//! [`MailGateway`] is the entry point. The components it is built from are
//! public so they can be driven directly against any [`crate::backend`]
//! session.

mod composer;
mod connection;
mod folder;
mod gateway;
mod locator;
mod mapper;

pub use composer::OutboundComposer;
pub use connection::{ConnectionManager, ConnectionState, Lease};
pub use folder::{FolderResolver, OpenFolder};
pub use gateway::MailGateway;
pub use locator::MessageLocator;
pub use mapper::{MessageMapper, PartKind, classify};
