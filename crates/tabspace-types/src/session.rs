//! Session and tab records.
//!
//! A [`Session`] binds an ordered set of tabs to an optional live browser
//! window. Saved sessions carry a store-assigned [`SessionId`] and survive
//! the window closing; transient sessions exist only while their window is
//! open. The `session_hash` fingerprint is always recomputed by the engine
//! whenever `tabs` changes -- the two must never diverge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identity of a saved session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a live browser window.
///
/// Browsers use small positive integers; non-positive values are sentinels
/// ("no window") and are ignored by all engine entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

impl WindowId {
    /// Whether this id can refer to a real window.
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single tab descriptor.
///
/// `id` is the browser-assigned tab identity and is only meaningful while
/// the tab is open; persisted history entries keep whatever id the tab had
/// when it left the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    /// Browser tab id, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Full tab URL as reported by the browser.
    pub url: String,

    /// Whether the tab is pinned.
    #[serde(default)]
    pub pinned: bool,
}

impl Tab {
    /// Create an unpinned tab with no browser id.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            pinned: false,
        }
    }

    /// Create a tab with a browser id.
    pub fn with_id(id: i64, url: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            url: url.into(),
            pinned: false,
        }
    }
}

/// A persisted or transient group of tabs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Store-assigned id; `None` means the session is transient (unsaved).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SessionId>,

    /// Live window currently bound to this session, or `None` when the
    /// session is saved but not open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,

    /// User-assigned label; transient sessions have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Ordered snapshot of window contents as of the last reconciliation.
    #[serde(default)]
    pub tabs: Vec<Tab>,

    /// Recently-closed tabs, most recent first. Bounded and deduplicated
    /// by normalized URL (see `tabspace-core::history`).
    #[serde(default)]
    pub history: Vec<Tab>,

    /// Fingerprint of `tabs` as of the last reconciliation.
    #[serde(default)]
    pub session_hash: u32,

    /// Updated on window focus events.
    #[serde(default = "Utc::now")]
    pub last_access: DateTime<Utc>,
}

impl Session {
    /// Create a transient session bound to a live window.
    pub fn transient(window_id: WindowId, tabs: Vec<Tab>, session_hash: u32) -> Self {
        Self {
            id: None,
            window_id: Some(window_id),
            name: None,
            tabs,
            history: Vec::new(),
            session_hash,
            last_access: Utc::now(),
        }
    }

    /// Whether this session has been persisted to the store.
    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    /// Whether this session is currently bound to a live window.
    pub fn is_bound(&self) -> bool {
        self.window_id.is_some()
    }

    /// Refresh `last_access` to now.
    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }
}
