//! Logical mailbox to provider folder resolution.

use tracing::{debug, warn};

use crate::backend::StoreSession;
use crate::config::FolderConfig;
use crate::model::Mailbox;
use crate::{Error, Result};

/// A folder opened read-only for the duration of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFolder {
    /// Provider folder name.
    pub name: String,
    /// The logical mailbox it was resolved from.
    pub mailbox: Mailbox,
    /// Message count reported when the folder was opened.
    pub exists: u32,
}

/// Maps [`Mailbox`] values onto the folder names of one provider.
#[derive(Debug, Clone)]
pub struct FolderResolver {
    inbox: String,
    sent_candidates: Vec<String>,
}

impl FolderResolver {
    /// Creates a resolver from folder settings.
    #[must_use]
    pub fn new(folders: &FolderConfig) -> Self {
        Self {
            inbox: folders.inbox.clone(),
            sent_candidates: folders.sent_candidates.clone(),
        }
    }

    /// Resolves a mailbox to a folder name.
    ///
    /// The inbox name is used as configured. Sent mail resolves to the first
    /// candidate the server actually has.
    ///
    /// # Errors
    ///
    /// Returns `Error::FolderNotFound` if no sent candidate exists, or the
    /// store's error if probing fails.
    pub async fn resolve<S: StoreSession>(&self, store: &mut S, mailbox: Mailbox) -> Result<String> {
        match mailbox {
            Mailbox::Inbox => Ok(self.inbox.clone()),
            Mailbox::Sent => {
                for candidate in &self.sent_candidates {
                    if store.folder_exists(candidate).await? {
                        debug!(folder = %candidate, "resolved sent folder");
                        return Ok(candidate.clone());
                    }
                }
                Err(Error::FolderNotFound(format!(
                    "no sent folder among [{}]",
                    self.sent_candidates.join(", ")
                )))
            }
        }
    }

    /// Resolves and opens a mailbox read-only.
    ///
    /// # Errors
    ///
    /// Returns resolution errors, or the store's error if `EXAMINE` fails.
    pub async fn open<S: StoreSession>(&self, store: &mut S, mailbox: Mailbox) -> Result<OpenFolder> {
        let name = self.resolve(store, mailbox).await?;
        let exists = store.examine(&name).await?;
        debug!(folder = %name, exists, "folder opened");
        Ok(OpenFolder {
            name,
            mailbox,
            exists,
        })
    }

    /// Closes an open folder. Failures are logged and ignored.
    pub async fn close<S: StoreSession>(&self, store: &mut S, folder: &OpenFolder) {
        match store.close_folder().await {
            Ok(()) => debug!(folder = %folder.name, "folder closed"),
            Err(error) => warn!(folder = %folder.name, %error, "failed to close folder"),
        }
    }

    /// Opens a mailbox, runs `body` against it and closes it again.
    ///
    /// The folder is closed whether or not `body` succeeds; its outcome is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error from opening the folder or from `body`.
    pub async fn with_folder<S, T, F>(&self, store: &mut S, mailbox: Mailbox, body: F) -> Result<T>
    where
        S: StoreSession,
        F: AsyncFnOnce(&mut S, &OpenFolder) -> Result<T>,
    {
        let folder = self.open(store, mailbox).await?;
        let outcome = body(&mut *store, &folder).await;
        self.close(store, &folder).await;
        outcome
    }
}
