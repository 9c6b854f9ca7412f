//! The reconciliation engine.
//!
//! [`SessionEngine`] is the single writer of the session cache. Raw browser
//! events flow in through [`handle_event`](SessionEngine::handle_event) (or
//! the individual handlers), get translated into queued history intents,
//! and are coalesced per window by the debounce queue. Each pass re-reads
//! live window state at fire time, drains that window's history intents,
//! refreshes the bound session's tabs and fingerprint, and persists saved
//! sessions through the store.
//!
//! A window moves conceptually through `Unseen -> {MatchedSaved,
//! MatchedTemporary} -> Closed`; the closed state is terminal. Once a
//! window id enters the closed set (authoritative window-removed signal),
//! no event can ever rebind or recreate a session for it within this
//! process lifetime.
//!
//! Failure posture: a failed pass for one window never prevents future
//! passes for any window. Store failures propagate to the caller of the
//! mutating operation; the in-memory mutation is not rolled back.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tabspace_platform::browser::{Browser, BrowserWindow, WindowKind};
use tabspace_platform::store::SessionStore;
use tabspace_types::config::EngineConfig;
use tabspace_types::event::BrowserEvent;
use tabspace_types::{Result, Session, SessionId, Tab, TabspaceError, WindowId};

use crate::cache::SessionCache;
use crate::debounce::DebounceQueue;
use crate::fingerprint::{self, UrlNormalizer};
use crate::history;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryAction {
    /// The URL left the live set and should enter history.
    Add,
    /// The URL is live again and should leave history.
    Remove,
}

/// A pending history mutation awaiting the owning window's next pass.
#[derive(Debug, Clone)]
struct HistoryIntent {
    url: String,
    window_id: WindowId,
    action: HistoryAction,
}

/// The window/session reconciliation engine.
pub struct SessionEngine {
    browser: Arc<dyn Browser>,
    store: Arc<dyn SessionStore>,
    config: EngineConfig,
    normalizer: UrlNormalizer,

    /// Authoritative in-memory truth; held across store writes so passes
    /// serialize per process.
    cache: Mutex<SessionCache>,

    /// Window ids that have been definitively closed. Append-only for the
    /// process lifetime.
    closed_windows: StdMutex<HashSet<WindowId>>,

    /// Last-known URL per tab id. Needed because a removal event arrives
    /// after the tab (and its URL) is already gone.
    tab_urls: StdMutex<HashMap<i64, String>>,

    /// Pending history intents, drained per window on each pass.
    history_queue: StdMutex<Vec<HistoryIntent>>,

    debounce: DebounceQueue,

    /// Self-handle so debounce timers can call back into the engine.
    this: Weak<SessionEngine>,
}

impl SessionEngine {
    /// Create an engine over the given collaborators.
    ///
    /// Call [`init`](Self::init) before feeding events.
    pub fn new(
        browser: Arc<dyn Browser>,
        store: Arc<dyn SessionStore>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let normalizer = UrlNormalizer::from_config(&config);
        let debounce = DebounceQueue::new(Duration::from_millis(config.debounce_ms));
        Arc::new_cyclic(|this| Self {
            browser,
            store,
            config,
            normalizer,
            cache: Mutex::new(SessionCache::new()),
            closed_windows: StdMutex::new(HashSet::new()),
            tab_urls: StdMutex::new(HashMap::new()),
            history_queue: StdMutex::new(Vec::new()),
            debounce,
            this: this.clone(),
        })
    }

    /// Load saved sessions from the store and match them against the
    /// currently open windows.
    ///
    /// Stored window bindings are stale by definition (window ids do not
    /// survive a browser restart), so every binding is cleared and then
    /// re-derived by content fingerprint. Also seeds the tab-URL map from
    /// all live tabs.
    pub async fn init(&self) -> Result<()> {
        let sessions = self.store.fetch_all().await?;
        info!(count = sessions.len(), "loaded saved sessions");

        let windows = self.browser.all_windows().await?;
        let tabs = self.browser.all_tabs().await?;

        let mut cache = self.cache.lock().await;
        *cache = SessionCache::from_sessions(sessions);
        cache.clear_bindings();

        for window in &windows {
            if !self.is_internal_window(window) {
                self.check_for_session_match(&mut cache, window);
            }
        }
        drop(cache);

        let mut tab_urls = self.tab_urls.lock().unwrap();
        tab_urls.clear();
        for tab in tabs {
            if let Some(id) = tab.id {
                tab_urls.insert(id, tab.url);
            }
        }
        Ok(())
    }

    // ── Event intake ─────────────────────────────────────────────────

    /// Dispatch one raw browser event to the appropriate handler.
    pub async fn handle_event(&self, event: BrowserEvent) {
        match event {
            // Every new tab also fires TabUpdated once it finishes
            // loading; that is the signal acted on.
            BrowserEvent::TabCreated { .. } => {}
            BrowserEvent::TabRemoved {
                tab_id,
                window_id,
                window_closing,
            } => {
                self.handle_tab_removed(tab_id, window_id, window_closing)
                    .await;
            }
            BrowserEvent::TabMoved { window_id } => self.handle_tab_moved(window_id),
            BrowserEvent::TabUpdated {
                window_id,
                tab,
                changed_url,
                load_complete,
            } => self.handle_tab_updated(window_id, &tab, changed_url, load_complete),
            BrowserEvent::WindowRemoved { window_id } => {
                self.handle_window_removed(window_id, true).await;
            }
            BrowserEvent::WindowFocusChanged { window_id } => {
                self.handle_window_focused(window_id).await;
            }
        }
    }

    /// A tab was closed.
    ///
    /// When the whole window is closing this must never become history;
    /// it routes to [`handle_window_removed`](Self::handle_window_removed)
    /// instead.
    pub async fn handle_tab_removed(
        &self,
        tab_id: i64,
        window_id: WindowId,
        window_closing: bool,
    ) {
        if window_closing {
            self.handle_window_removed(window_id, true).await;
            return;
        }

        let url = self.tab_urls.lock().unwrap().remove(&tab_id);
        if let Some(url) = url {
            debug!(tab = tab_id, window = %window_id, "queueing history add");
            self.history_queue.lock().unwrap().push(HistoryIntent {
                url,
                window_id,
                action: HistoryAction::Add,
            });
        }
        self.enqueue_window(window_id);
    }

    /// A tab changed position within its window.
    pub fn handle_tab_moved(&self, window_id: WindowId) {
        self.enqueue_window(window_id);
    }

    /// A tab's state changed.
    ///
    /// Only completed loads trigger a pass (and refresh the tab-URL map).
    /// A URL change additionally queues a history-return intent: the URL
    /// is live again and should not linger in history.
    pub fn handle_tab_updated(
        &self,
        window_id: WindowId,
        tab: &Tab,
        changed_url: Option<String>,
        load_complete: bool,
    ) {
        if load_complete {
            if let Some(id) = tab.id {
                self.tab_urls.lock().unwrap().insert(id, tab.url.clone());
            }
            self.enqueue_window(window_id);
        }

        if let Some(url) = changed_url {
            self.history_queue.lock().unwrap().push(HistoryIntent {
                url,
                window_id,
                action: HistoryAction::Remove,
            });
        }
    }

    /// A window was removed, or a live-state lookup found it gone.
    ///
    /// `mark_closed` is true only for the authoritative window-removed
    /// signal: the id enters the closed set and can never be rematched.
    /// Transient lookup misses pass `false` so the window can resync if it
    /// turns out to still exist.
    pub async fn handle_window_removed(&self, window_id: WindowId, mark_closed: bool) {
        if mark_closed {
            let newly = self.closed_windows.lock().unwrap().insert(window_id);
            if newly {
                debug!(window = %window_id, "marking window closed");
            }
            self.debounce.cancel(window_id);
        }

        let mut cache = self.cache.lock().await;
        cache.release_window(window_id);
    }

    /// Window focus moved; refresh the bound session's `last_access`.
    pub async fn handle_window_focused(&self, window_id: WindowId) {
        if !window_id.is_valid() {
            return;
        }
        let mut cache = self.cache.lock().await;
        if let Some(session) = cache.find_by_window_mut(window_id) {
            session.touch();
        }
    }

    /// Schedule a reconciliation pass for this window after the quiet
    /// period, superseding any pass already pending for it.
    pub fn enqueue_window(&self, window_id: WindowId) {
        let Some(engine) = self.this.upgrade() else {
            return;
        };
        self.debounce.enqueue(window_id, move |window_id, generation| async move {
            if let Err(error) = engine.reconcile(window_id, generation).await {
                warn!(window = %window_id, generation, %error, "reconciliation pass failed");
            }
        });
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// One reconciliation pass for one window.
    ///
    /// Re-reads live state, drains the window's queued history intents,
    /// refreshes the bound session, and persists it when saved; unbound
    /// (or temporarily bound) windows go through content matching.
    pub async fn reconcile(&self, window_id: WindowId, generation: u64) -> Result<()> {
        if !window_id.is_valid() {
            return Ok(());
        }

        let window = match self.browser.get_window(window_id).await? {
            Some(window) => window,
            None => {
                // Gone by fire time. Implicit removal, but not marked
                // closed: the window may still resync later.
                debug!(window = %window_id, generation, "window vanished before pass");
                self.handle_window_removed(window_id, false).await;
                return Ok(());
            }
        };

        if self.is_internal_window(&window) {
            return Ok(());
        }
        if self.closed_windows.lock().unwrap().contains(&window_id) {
            debug!(window = %window_id, generation, "ignoring event for closed window");
            return Ok(());
        }

        let mut cache = self.cache.lock().await;
        let mut needs_match = true;

        if let Some(session) = cache.find_by_window_mut(window_id) {
            let drained = self.drain_history_intents(window_id);
            for intent in drained.into_iter().rev() {
                match intent.action {
                    HistoryAction::Add => {
                        history::record_removal(
                            session,
                            &intent.url,
                            &self.normalizer,
                            self.config.history_limit,
                        );
                    }
                    HistoryAction::Remove => {
                        history::record_return(session, &intent.url, &self.normalizer);
                    }
                }
            }

            session.tabs = window.tabs.clone();
            session.session_hash = fingerprint::fingerprint(&session.tabs, &self.normalizer);
            needs_match = !session.is_saved();

            if session.is_saved() {
                let snapshot = session.clone();
                debug!(
                    window = %window_id,
                    session = ?snapshot.id,
                    generation,
                    "persisting reconciled session"
                );
                self.store.update(&snapshot).await?;
            }
        }

        // No bound session, or only a temporary one: try to content-match
        // a saved session.
        if needs_match {
            self.check_for_session_match(&mut cache, &window);
        }
        Ok(())
    }

    /// Match a live window against saved-but-unbound sessions by
    /// fingerprint, or give it a transient session.
    fn check_for_session_match(&self, cache: &mut SessionCache, window: &BrowserWindow) {
        if window.tabs.is_empty() {
            return;
        }

        let hash = fingerprint::fingerprint(&window.tabs, &self.normalizer);
        let matched = cache.find_by_hash(hash, true).and_then(|s| s.id);

        if let Some(id) = matched {
            info!(session = %id, window = %window.id, hash, "matched saved session to window");
            // Whatever held this window before loses it: temporaries are
            // discarded, saved sessions merely unbound.
            cache.release_window(window.id);
            cache.bind(id, window.id);
            return;
        }

        if cache.find_by_window(window.id).is_none() {
            debug!(window = %window.id, hash, "no match; creating transient session");
            cache.push(Session::transient(window.id, window.tabs.clone(), hash));
        }
    }

    /// Popup/panel windows and this tracker's own single-tab windows are
    /// never reconciled.
    fn is_internal_window(&self, window: &BrowserWindow) -> bool {
        if window.kind != WindowKind::Normal {
            return true;
        }
        window.tabs.len() == 1 && self.normalizer.is_own_url(&window.tabs[0].url)
    }

    /// Pull this window's pending intents out of the shared queue, in
    /// insertion order. The drain is atomic relative to a pass: no other
    /// code path removes queue entries.
    fn drain_history_intents(&self, window_id: WindowId) -> Vec<HistoryIntent> {
        let mut queue = self.history_queue.lock().unwrap();
        let mut drained = Vec::new();
        let mut i = 0;
        while i < queue.len() {
            if queue[i].window_id == window_id {
                drained.push(queue.remove(i));
            } else {
                i += 1;
            }
        }
        drained
    }

    // ── Queries for external collaborators ───────────────────────────

    /// Snapshot of every cached session.
    pub async fn all_sessions(&self) -> Vec<Session> {
        self.cache.lock().await.all().to_vec()
    }

    /// Look up a session by store id.
    pub async fn session_by_id(&self, id: SessionId) -> Option<Session> {
        self.cache.lock().await.find_by_id(id).cloned()
    }

    /// Look up the session bound to a window.
    pub async fn session_by_window(&self, window_id: WindowId) -> Option<Session> {
        self.cache.lock().await.find_by_window(window_id).cloned()
    }

    /// Case-insensitive name lookup.
    pub async fn session_by_name(&self, name: &str) -> Option<Session> {
        self.cache.lock().await.find_by_name(name).cloned()
    }

    // ── Mutations (write-through to the store) ───────────────────────

    /// Name and persist a session.
    ///
    /// Adopts the window's existing temporary session when one is bound;
    /// otherwise creates a fresh record. Returns the saved session.
    pub async fn save_new_session(
        &self,
        name: &str,
        tabs: Vec<Tab>,
        window_id: Option<WindowId>,
    ) -> Result<Session> {
        let hash = fingerprint::fingerprint(&tabs, &self.normalizer);
        let mut cache = self.cache.lock().await;

        let mut session = window_id
            .and_then(|w| cache.take_by_window(w))
            .unwrap_or_else(|| Session {
                id: None,
                window_id,
                name: None,
                tabs: Vec::new(),
                history: Vec::new(),
                session_hash: 0,
                last_access: chrono::Utc::now(),
            });

        session.name = Some(name.to_string());
        session.session_hash = hash;
        session.tabs = tabs;
        session.touch();

        match self.store.create(&session).await {
            Ok(id) => {
                session.id = Some(id);
                info!(session = %id, name, "saved new session");
                cache.push(session.clone());
                Ok(session)
            }
            Err(e) => {
                // Put the adopted temporary back; the window is still open.
                cache.push(session);
                Err(e)
            }
        }
    }

    /// Persist the current cached state of a saved session.
    pub async fn save_existing_session(&self, id: SessionId) -> Result<()> {
        let cache = self.cache.lock().await;
        let snapshot = cache
            .find_by_id(id)
            .cloned()
            .ok_or(TabspaceError::SessionNotFound(id))?;
        self.store.update(&snapshot).await
    }

    /// Rename a saved session and persist it.
    pub async fn update_session_name(&self, id: SessionId, name: &str) -> Result<Session> {
        let mut cache = self.cache.lock().await;
        let session = cache
            .find_by_id_mut(id)
            .ok_or(TabspaceError::SessionNotFound(id))?;
        session.name = Some(name.to_string());
        let snapshot = session.clone();
        self.store.update(&snapshot).await?;
        Ok(snapshot)
    }

    /// Replace a saved session's tabs, recompute its fingerprint, and
    /// persist it.
    pub async fn update_session_tabs(&self, id: SessionId, tabs: Vec<Tab>) -> Result<Session> {
        let mut cache = self.cache.lock().await;
        let session = cache
            .find_by_id_mut(id)
            .ok_or(TabspaceError::SessionNotFound(id))?;
        session.tabs = tabs;
        session.session_hash = fingerprint::fingerprint(&session.tabs, &self.normalizer);
        let snapshot = session.clone();
        self.store.update(&snapshot).await?;
        Ok(snapshot)
    }

    /// Delete a saved session from the store and the cache.
    pub async fn delete_session(&self, id: SessionId) -> Result<()> {
        let mut cache = self.cache.lock().await;
        if cache.find_by_id(id).is_none() {
            return Err(TabspaceError::SessionNotFound(id));
        }
        self.store.delete(id).await?;
        cache.remove_by_id(id);
        info!(session = %id, "deleted session");
        Ok(())
    }

    /// Recompute every cached session's fingerprint and persist the saved
    /// ones. Required after a change to the URL normalization rules, which
    /// invalidates all stored hashes.
    pub async fn rehash_all_sessions(&self) -> Result<()> {
        let mut cache = self.cache.lock().await;
        for session in cache.iter_mut() {
            session.session_hash = fingerprint::fingerprint(&session.tabs, &self.normalizer);
        }
        let saved: Vec<Session> = cache.all().iter().filter(|s| s.is_saved()).cloned().collect();
        for snapshot in saved {
            self.store.update(&snapshot).await?;
        }
        info!("rehashed all sessions");
        Ok(())
    }
}
