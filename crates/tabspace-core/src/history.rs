//! Session history ledger.
//!
//! Each session keeps a bounded, ordered log of tabs that have left it:
//! most recently removed at index 0, at most one entry per normalized URL,
//! truncated to the configured cap. Entries are removed again when a tab
//! with the same normalized URL comes back into the live set.

use tabspace_types::Session;
use tracing::debug;

use crate::fingerprint::UrlNormalizer;

/// Record a tab removal in the session's history.
///
/// Requires exactly one tab in `session.tabs` to match the normalized URL;
/// zero matches means the URL carries no identity, two or more means
/// another tab with the same URL is still open and recording would
/// double-count. Callers must invoke this *before* overwriting
/// `session.tabs` with live state, while the removed tab is still present.
///
/// Returns `true` when the history was modified.
pub fn record_removal(
    session: &mut Session,
    url: &str,
    normalizer: &UrlNormalizer,
    cap: usize,
) -> bool {
    let clean = normalizer.normalize(url);
    if clean.is_empty() {
        return false;
    }

    let mut matches = session
        .tabs
        .iter()
        .filter(|tab| normalizer.normalize(&tab.url) == clean);
    let removed_tab = match (matches.next(), matches.next()) {
        (Some(tab), None) => tab.clone(),
        _ => return false,
    };

    // Dedup: an earlier entry for the same URL moves to the front.
    if let Some(pos) = session
        .history
        .iter()
        .position(|tab| normalizer.normalize(&tab.url) == clean)
    {
        session.history.remove(pos);
    }

    debug!(url = %clean, "recording closed tab in session history");
    session.history.insert(0, removed_tab);
    session.history.truncate(cap);
    true
}

/// Drop the first history entry matching the normalized URL.
///
/// Invoked when a tab with this URL is open again: it is no longer
/// "history".
pub fn record_return(session: &mut Session, url: &str, normalizer: &UrlNormalizer) {
    let clean = normalizer.normalize(url);
    if clean.is_empty() {
        return;
    }

    if let Some(pos) = session
        .history
        .iter()
        .position(|tab| normalizer.normalize(&tab.url) == clean)
    {
        debug!(url = %clean, "dropping returned tab from session history");
        session.history.remove(pos);
    }
}
