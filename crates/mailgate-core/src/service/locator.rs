//! Message lookup inside an open folder.

use mailgate_mime::Message;
use tracing::debug;

use super::folder::OpenFolder;
use crate::{Error, Result};
use crate::backend::{FetchProfile, FetchedMessage, SearchQuery, StoreSession};

/// Finds messages by `Message-ID`, by subject, or lists a whole folder.
///
/// Every lookup is one server search followed by one bulk fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageLocator;

impl MessageLocator {
    /// Creates a locator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Finds the message whose `Message-ID` equals `id`.
    ///
    /// Server-side header search matches substrings, so candidates are
    /// checked against the exact id. Angle brackets and surrounding
    /// whitespace are ignored on both sides. An id outside 7-bit ASCII is
    /// matched against the folder's headers locally.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `id` contains a line break or NUL,
    /// otherwise the store's error if the search or fetch fails.
    pub async fn find_by_message_id<S: StoreSession>(
        &self,
        store: &mut S,
        folder: &OpenFolder,
        id: &str,
        profile: FetchProfile,
    ) -> Result<Option<FetchedMessage>> {
        check_search_text(id)?;
        let wanted = normalize_id(id);
        if wanted.is_empty() || folder.exists == 0 {
            return Ok(None);
        }
        let is_wanted = |fetched: &FetchedMessage| {
            Message::parse(&fetched.raw)
                .message_id()
                .is_some_and(|candidate| normalize_id(candidate) == wanted)
        };

        if !wanted.is_ascii() {
            let Some(seq) = self
                .all(store, folder)
                .await?
                .into_iter()
                .find(is_wanted)
                .map(|fetched| fetched.seq)
            else {
                return Ok(None);
            };
            debug!(folder = %folder.name, id = wanted, seq, "message id matched locally");
            return Ok(store.fetch(&[seq], profile).await?.into_iter().next());
        }

        let seqs = store
            .search(&SearchQuery::MessageId(wanted.to_string()))
            .await?;
        debug!(folder = %folder.name, id = wanted, candidates = seqs.len(), "message id search");
        if seqs.is_empty() {
            return Ok(None);
        }

        Ok(store
            .fetch(&seqs, profile)
            .await?
            .into_iter()
            .find(is_wanted))
    }

    /// Finds messages whose subject contains `text`, with header sections only.
    ///
    /// Matching is case-insensitive. Text outside 7-bit ASCII cannot go into
    /// an IMAP quoted string, so it is matched against the decoded subjects
    /// of the folder's headers instead.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `text` contains a line break or NUL,
    /// otherwise the store's error if the search or fetch fails.
    pub async fn find_by_subject<S: StoreSession>(
        &self,
        store: &mut S,
        folder: &OpenFolder,
        text: &str,
    ) -> Result<Vec<FetchedMessage>> {
        check_search_text(text)?;
        if folder.exists == 0 {
            return Ok(Vec::new());
        }

        if !text.is_ascii() {
            let needle = text.to_lowercase();
            let found: Vec<_> = self
                .all(store, folder)
                .await?
                .into_iter()
                .filter(|fetched| {
                    Message::parse(&fetched.raw)
                        .subject()
                        .to_lowercase()
                        .contains(&needle)
                })
                .collect();
            debug!(folder = %folder.name, matches = found.len(), "subject matched locally");
            return Ok(found);
        }

        let seqs = store.search(&SearchQuery::Subject(text.to_string())).await?;
        debug!(folder = %folder.name, matches = seqs.len(), "subject search");
        if seqs.is_empty() {
            return Ok(Vec::new());
        }
        store.fetch(&seqs, FetchProfile::Envelope).await
    }

    /// Fetches the header sections of every message in the folder.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the fetch fails.
    pub async fn all<S: StoreSession>(
        &self,
        store: &mut S,
        folder: &OpenFolder,
    ) -> Result<Vec<FetchedMessage>> {
        if folder.exists == 0 {
            return Ok(Vec::new());
        }
        let seqs: Vec<u32> = (1..=folder.exists).collect();
        store.fetch(&seqs, FetchProfile::Envelope).await
    }
}

/// Refuses text that would end an IMAP command line.
fn check_search_text(text: &str) -> Result<()> {
    if text.contains(['\r', '\n', '\0']) {
        return Err(Error::InvalidInput(format!(
            "{text:?} contains a line break or NUL"
        )));
    }
    Ok(())
}

/// Strips whitespace and one pair of angle brackets.
fn normalize_id(id: &str) -> &str {
    let id = id.trim();
    id.strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(id)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_brackets_and_space() {
        assert_eq!(normalize_id(" <abc@example.com> "), "abc@example.com");
        assert_eq!(normalize_id("abc@example.com"), "abc@example.com");
        assert_eq!(normalize_id("<abc@example.com"), "<abc@example.com");
        assert_eq!(normalize_id("< >"), "");
    }

    #[test]
    fn line_breaks_are_refused() {
        assert!(check_search_text("invoice 42").is_ok());
        assert!(check_search_text("Résumé").is_ok());
        for text in ["a\r\nA9 DELETE Important", "a\nb", "a\rb", "a\0b"] {
            assert!(matches!(
                check_search_text(text),
                Err(Error::InvalidInput(_))
            ));
        }
    }
}
