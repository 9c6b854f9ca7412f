//! The in-memory session collection.
//!
//! [`SessionCache`] owns every session record in memory; the engine is its
//! single writer, and the durable store is a write-through mirror.
//! Collections are small (tens of sessions), so every lookup is a linear
//! scan.
//!
//! Invariant maintained by the engine: at most one session holds any given
//! `window_id`.

use tabspace_types::{Session, SessionId, WindowId};
use tracing::debug;

/// Authoritative in-memory mapping of session records.
#[derive(Debug, Default)]
pub struct SessionCache {
    sessions: Vec<Session>,
}

impl SessionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from records loaded out of the store.
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }

    /// All cached sessions in insertion order.
    pub fn all(&self) -> &[Session] {
        &self.sessions
    }

    /// Number of cached sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Look up a session by store id. Returns a hit only when exactly one
    /// record matches.
    pub fn find_by_id(&self, id: SessionId) -> Option<&Session> {
        exactly_one(self.sessions.iter().filter(|s| s.id == Some(id)))
    }

    /// Mutable variant of [`find_by_id`](Self::find_by_id).
    pub fn find_by_id_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        exactly_one(self.sessions.iter_mut().filter(|s| s.id == Some(id)))
    }

    /// Look up the session bound to a window. Returns a hit only when
    /// exactly one record matches (the uniqueness invariant).
    pub fn find_by_window(&self, window_id: WindowId) -> Option<&Session> {
        exactly_one(
            self.sessions
                .iter()
                .filter(|s| s.window_id == Some(window_id)),
        )
    }

    /// Mutable variant of [`find_by_window`](Self::find_by_window).
    pub fn find_by_window_mut(&mut self, window_id: WindowId) -> Option<&mut Session> {
        exactly_one(
            self.sessions
                .iter_mut()
                .filter(|s| s.window_id == Some(window_id)),
        )
    }

    /// Look up a session by fingerprint, optionally restricted to sessions
    /// not currently bound to a window.
    ///
    /// Fingerprint collisions are possible; the first match in insertion
    /// order wins, deterministically. Known limitation inherited from the
    /// matching design.
    pub fn find_by_hash(&self, hash: u32, unbound_only: bool) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|s| s.session_hash == hash && (!unbound_only || !s.is_bound()))
    }

    /// Case-insensitive name lookup; first match wins.
    pub fn find_by_name(&self, name: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| {
            s.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    }

    /// Mutable iteration over every record (engine-internal maintenance,
    /// e.g. rehashing after a normalization-rule change).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.iter_mut()
    }

    /// Add a session record.
    pub fn push(&mut self, session: Session) {
        self.sessions.push(session);
    }

    /// Remove and return the session bound to a window, if exactly one is.
    pub fn take_by_window(&mut self, window_id: WindowId) -> Option<Session> {
        let mut positions = self
            .sessions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.window_id == Some(window_id))
            .map(|(i, _)| i);
        match (positions.next(), positions.next()) {
            (Some(pos), None) => Some(self.sessions.remove(pos)),
            _ => None,
        }
    }

    /// Remove the session with this store id. Returns `true` if removed.
    pub fn remove_by_id(&mut self, id: SessionId) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != Some(id));
        self.sessions.len() != before
    }

    /// Release every session bound to `window_id`: saved sessions are
    /// unbound, transient ones are discarded entirely.
    ///
    /// Used both when a window closes and when a saved session is about to
    /// be rebound to the window.
    pub fn release_window(&mut self, window_id: WindowId) {
        self.sessions.retain_mut(|s| {
            if s.window_id != Some(window_id) {
                return true;
            }
            if s.is_saved() {
                debug!(window = %window_id, session = ?s.id, "unbinding saved session");
                s.window_id = None;
                true
            } else {
                debug!(window = %window_id, "discarding transient session");
                false
            }
        });
    }

    /// Clear every window binding (startup: stored bindings are stale).
    pub fn clear_bindings(&mut self) {
        for session in &mut self.sessions {
            session.window_id = None;
        }
    }

    /// Bind the session with `id` to a window. Returns `false` when the id
    /// is unknown.
    pub fn bind(&mut self, id: SessionId, window_id: WindowId) -> bool {
        match self.find_by_id_mut(id) {
            Some(session) => {
                session.window_id = Some(window_id);
                true
            }
            None => false,
        }
    }
}

fn exactly_one<T>(mut iter: impl Iterator<Item = T>) -> Option<T> {
    match (iter.next(), iter.next()) {
        (Some(item), None) => Some(item),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabspace_types::Tab;

    fn saved(id: i64, name: &str, hash: u32) -> Session {
        let mut s = Session::transient(WindowId(id), vec![Tab::new("https://a.com")], hash);
        s.id = Some(SessionId(id));
        s.name = Some(name.into());
        s.window_id = None;
        s
    }

    #[test]
    fn find_by_id_requires_exactly_one() {
        let mut cache = SessionCache::new();
        cache.push(saved(1, "a", 10));
        assert!(cache.find_by_id(SessionId(1)).is_some());
        assert!(cache.find_by_id(SessionId(2)).is_none());

        // A duplicated id (corrupt state) yields no match rather than an
        // arbitrary one.
        cache.push(saved(1, "dup", 11));
        assert!(cache.find_by_id(SessionId(1)).is_none());
    }

    #[test]
    fn find_by_window_exactly_one() {
        let mut cache = SessionCache::new();
        let mut s = saved(1, "a", 10);
        s.window_id = Some(WindowId(5));
        cache.push(s);

        assert!(cache.find_by_window(WindowId(5)).is_some());
        assert!(cache.find_by_window(WindowId(6)).is_none());
    }

    #[test]
    fn find_by_hash_first_match_and_unbound_filter() {
        let mut cache = SessionCache::new();
        let mut bound = saved(1, "bound", 77);
        bound.window_id = Some(WindowId(9));
        cache.push(bound);
        cache.push(saved(2, "free", 77));

        let any = cache.find_by_hash(77, false).unwrap();
        assert_eq!(any.id, Some(SessionId(1)));

        let unbound = cache.find_by_hash(77, true).unwrap();
        assert_eq!(unbound.id, Some(SessionId(2)));
    }

    #[test]
    fn find_by_name_is_case_insensitive() {
        let mut cache = SessionCache::new();
        cache.push(saved(1, "Work Stuff", 1));

        assert!(cache.find_by_name("work stuff").is_some());
        assert!(cache.find_by_name("WORK STUFF").is_some());
        assert!(cache.find_by_name("play").is_none());
    }

    #[test]
    fn release_window_unbinds_saved_and_discards_transient() {
        let mut cache = SessionCache::new();
        let mut s = saved(1, "a", 10);
        s.window_id = Some(WindowId(4));
        cache.push(s);
        cache.push(Session::transient(WindowId(4), vec![], 0));

        cache.release_window(WindowId(4));

        assert_eq!(cache.len(), 1);
        let survivor = cache.find_by_id(SessionId(1)).unwrap();
        assert!(!survivor.is_bound());
    }

    #[test]
    fn clear_bindings_unbinds_everything() {
        let mut cache = SessionCache::new();
        let mut a = saved(1, "a", 1);
        a.window_id = Some(WindowId(2));
        cache.push(a);
        let mut b = saved(2, "b", 2);
        b.window_id = Some(WindowId(3));
        cache.push(b);

        cache.clear_bindings();
        assert!(cache.all().iter().all(|s| !s.is_bound()));
    }

    #[test]
    fn bind_and_remove() {
        let mut cache = SessionCache::new();
        cache.push(saved(3, "c", 5));

        assert!(cache.bind(SessionId(3), WindowId(8)));
        assert_eq!(
            cache.find_by_window(WindowId(8)).unwrap().id,
            Some(SessionId(3))
        );

        assert!(cache.remove_by_id(SessionId(3)));
        assert!(!cache.remove_by_id(SessionId(3)));
        assert!(cache.is_empty());
    }
}
