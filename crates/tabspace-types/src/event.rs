//! Raw browser events consumed by the reconciliation engine.
//!
//! A host (WebExtension background page, CDP bridge, test harness) observes
//! the browser and translates its native notifications into
//! [`BrowserEvent`] values. The engine treats these purely as inputs; it
//! never issues UI of its own.

use serde::{Deserialize, Serialize};

use crate::session::{Tab, WindowId};

/// A low-level window or tab notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// A tab was opened. The engine ignores this directly: every new tab
    /// also produces a `TabUpdated` once it finishes loading, which is the
    /// signal actually acted on.
    TabCreated {
        /// Window that received the tab.
        window_id: WindowId,
        /// The new tab.
        tab: Tab,
    },

    /// A tab was closed.
    TabRemoved {
        /// Browser id of the removed tab.
        tab_id: i64,
        /// Window the tab belonged to.
        window_id: WindowId,
        /// True when the removal is caused by the window itself closing.
        /// Such removals must never be recorded as session history.
        window_closing: bool,
    },

    /// A tab changed position within its window.
    TabMoved {
        /// Window whose tab order changed.
        window_id: WindowId,
    },

    /// A tab's state changed (navigation, load progress).
    TabUpdated {
        /// Window the tab belongs to.
        window_id: WindowId,
        /// Current tab descriptor.
        tab: Tab,
        /// The new URL, when this update carries a URL change.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        changed_url: Option<String>,
        /// True once the tab has finished loading.
        load_complete: bool,
    },

    /// A window was closed (authoritative signal).
    WindowRemoved {
        /// The closed window.
        window_id: WindowId,
    },

    /// Window focus moved. A non-positive id is the browser's "no window
    /// focused" sentinel.
    WindowFocusChanged {
        /// The newly focused window.
        window_id: WindowId,
    },
}

impl BrowserEvent {
    /// The window this event pertains to.
    pub fn window_id(&self) -> WindowId {
        match self {
            Self::TabCreated { window_id, .. }
            | Self::TabRemoved { window_id, .. }
            | Self::TabMoved { window_id }
            | Self::TabUpdated { window_id, .. }
            | Self::WindowRemoved { window_id }
            | Self::WindowFocusChanged { window_id } => *window_id,
        }
    }
}
