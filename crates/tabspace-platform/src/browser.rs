//! Browser abstraction and an in-memory simulator.
//!
//! The engine only ever *reads* live state through this trait, and always
//! re-reads at reconciliation time rather than trusting queued event data.
//! A missing window is reported as `Ok(None)`, which the engine treats as
//! an implicit removal signal, not an error.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use tabspace_types::{Result, Tab, WindowId};

/// Classification of a live window.
///
/// Popup and panel windows are internal chrome (pickers, devtools panels)
/// and are never matched to sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// A regular tabbed browser window.
    Normal,
    /// A popup window.
    Popup,
    /// A panel window.
    Panel,
}

/// A live window with its populated tab list.
#[derive(Debug, Clone)]
pub struct BrowserWindow {
    /// Browser-assigned window id.
    pub id: WindowId,
    /// Window classification.
    pub kind: WindowKind,
    /// Tabs in display order.
    pub tabs: Vec<Tab>,
}

/// Read-only view of live browser window/tab state.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Fetch one window with its tabs. `Ok(None)` when the window no
    /// longer exists.
    async fn get_window(&self, id: WindowId) -> Result<Option<BrowserWindow>>;

    /// Enumerate all windows with populated tabs.
    async fn all_windows(&self) -> Result<Vec<BrowserWindow>>;

    /// Enumerate all tabs across all windows.
    async fn all_tabs(&self) -> Result<Vec<Tab>>;
}

/// In-memory scriptable browser used by tests and embedders.
///
/// Mutators are synchronous so test code can drive window state without
/// awaiting; the trait methods snapshot under the same lock.
#[derive(Default)]
pub struct SimBrowser {
    windows: Mutex<BTreeMap<WindowId, BrowserWindow>>,
}

impl SimBrowser {
    /// Create an empty simulated browser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or replace) a normal window with the given tabs.
    pub fn open_window(&self, id: WindowId, tabs: Vec<Tab>) {
        self.open_window_of_kind(id, WindowKind::Normal, tabs);
    }

    /// Open (or replace) a window of a specific kind.
    pub fn open_window_of_kind(&self, id: WindowId, kind: WindowKind, tabs: Vec<Tab>) {
        let mut windows = self.windows.lock().unwrap();
        windows.insert(id, BrowserWindow { id, kind, tabs });
    }

    /// Close a window. Returns `true` if it existed.
    pub fn close_window(&self, id: WindowId) -> bool {
        let mut windows = self.windows.lock().unwrap();
        windows.remove(&id).is_some()
    }

    /// Replace the tab list of an open window. No-op for unknown windows.
    pub fn set_tabs(&self, id: WindowId, tabs: Vec<Tab>) {
        let mut windows = self.windows.lock().unwrap();
        if let Some(window) = windows.get_mut(&id) {
            window.tabs = tabs;
        }
    }
}

#[async_trait]
impl Browser for SimBrowser {
    async fn get_window(&self, id: WindowId) -> Result<Option<BrowserWindow>> {
        let windows = self.windows.lock().unwrap();
        Ok(windows.get(&id).cloned())
    }

    async fn all_windows(&self) -> Result<Vec<BrowserWindow>> {
        let windows = self.windows.lock().unwrap();
        Ok(windows.values().cloned().collect())
    }

    async fn all_tabs(&self) -> Result<Vec<Tab>> {
        let windows = self.windows.lock().unwrap();
        Ok(windows
            .values()
            .flat_map(|w| w.tabs.iter().cloned())
            .collect())
    }
}
