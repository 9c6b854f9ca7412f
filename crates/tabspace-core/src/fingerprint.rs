//! Content fingerprints for tab sets.
//!
//! A session's fingerprint is a rolling 32-bit hash over the normalized
//! URLs of its tabs, in tab order. Normalization strips the parts of a URL
//! that churn without changing identity (fragment, query), unwraps
//! suspended-tab wrapper pages, and blanks URLs that carry no identity at
//! all (new-tab pages, this tracker's own pages).
//!
//! The normalization rules are part of the fingerprint's contract: changing
//! them invalidates every stored hash, which is why
//! [`SessionEngine::rehash_all_sessions`](crate::engine::SessionEngine::rehash_all_sessions)
//! exists.

use tabspace_types::Tab;
use tabspace_types::config::EngineConfig;

/// Marker identifying suspended-tab wrapper pages.
const SUSPENDED_PAGE_MARKER: &str = "suspended.html";

/// Parameter prefix carrying the real target inside a wrapper URL.
const SUSPENDED_URI_PARAM: &str = "uri=";

/// Normalizes tab URLs for fingerprinting and history bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct UrlNormalizer {
    ignored_markers: Vec<String>,
    own_marker: Option<String>,
}

impl UrlNormalizer {
    /// Build a normalizer from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            ignored_markers: config.ignored_url_markers.clone(),
            own_marker: config.own_url_marker.clone(),
        }
    }

    /// Whether this URL belongs to the tracker's own pages.
    pub fn is_own_url(&self, url: &str) -> bool {
        self.own_marker
            .as_deref()
            .is_some_and(|marker| url.contains(marker))
    }

    /// Reduce a URL to its identity-bearing form. Returns an empty string
    /// for URLs that should not participate in fingerprints or history.
    pub fn normalize(&self, url: &str) -> String {
        if url.is_empty() {
            return String::new();
        }

        if self.is_own_url(url) {
            return String::new();
        }

        if self.ignored_markers.iter().any(|m| url.contains(m.as_str())) {
            return String::new();
        }

        let mut clean = url;

        // Unwrap suspended-tab pages to their real target.
        if clean.find(SUSPENDED_PAGE_MARKER).is_some_and(|i| i > 0) {
            if let Some(pos) = clean.find(SUSPENDED_URI_PARAM) {
                clean = &clean[pos + SUSPENDED_URI_PARAM.len()..];
            }
        }

        // Fragment first, then query. A marker at byte 0 is left alone.
        if let Some(pos) = clean.find('#').filter(|&i| i > 0) {
            clean = &clean[..pos];
        }
        if let Some(pos) = clean.find('?').filter(|&i| i > 0) {
            clean = &clean[..pos];
        }

        clean.to_string()
    }
}

/// Fingerprint an ordered tab set.
///
/// Concatenates the normalized URLs in tab order and runs a `h = h*31 + c`
/// rolling hash over the UTF-16 code units with 32-bit wrapping, returning
/// the absolute value. An empty tab set (or one whose URLs all normalize to
/// empty) fingerprints to 0.
pub fn fingerprint(tabs: &[Tab], normalizer: &UrlNormalizer) -> u32 {
    let text: String = tabs
        .iter()
        .map(|tab| normalizer.normalize(&tab.url))
        .collect();

    if text.is_empty() {
        return 0;
    }

    let mut hash: i32 = 0;
    for unit in text.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> UrlNormalizer {
        UrlNormalizer::from_config(&EngineConfig::default())
    }

    #[test]
    fn normalize_strips_fragment_and_query() {
        let n = normalizer();
        assert_eq!(
            n.normalize("https://a.com/page#section"),
            "https://a.com/page"
        );
        assert_eq!(n.normalize("https://a.com/page?q=1"), "https://a.com/page");
        assert_eq!(
            n.normalize("https://a.com/page?q=1#frag"),
            "https://a.com/page"
        );
    }

    #[test]
    fn normalize_blanks_new_tab_page() {
        let n = normalizer();
        assert_eq!(n.normalize("chrome://newtab/"), "");
    }

    #[test]
    fn normalize_blanks_own_pages() {
        let n = UrlNormalizer::from_config(&EngineConfig {
            own_url_marker: Some("abcdefgh".into()),
            ..EngineConfig::default()
        });
        assert_eq!(n.normalize("chrome-extension://abcdefgh/tab.html"), "");
        assert_eq!(n.normalize("https://a.com"), "https://a.com");
    }

    #[test]
    fn normalize_unwraps_suspended_pages() {
        let n = normalizer();
        assert_eq!(
            n.normalize("chrome-extension://x/suspended.html#uri=https://a.com/page"),
            "https://a.com/page"
        );
    }

    #[test]
    fn normalize_empty_is_empty() {
        assert_eq!(normalizer().normalize(""), "");
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let n = normalizer();
        let tabs = vec![Tab::new("https://a.com"), Tab::new("https://b.com")];
        assert_eq!(fingerprint(&tabs, &n), fingerprint(&tabs, &n));
    }

    #[test]
    fn fingerprint_ignores_fragment_and_query() {
        let n = normalizer();
        let plain = vec![Tab::new("https://a.com/page")];
        let noisy = vec![Tab::new("https://a.com/page?utm=1#top")];
        assert_eq!(fingerprint(&plain, &n), fingerprint(&noisy, &n));
    }

    #[test]
    fn fingerprint_depends_on_tab_order() {
        let n = normalizer();
        let ab = vec![Tab::new("https://a.com"), Tab::new("https://b.com")];
        let ba = vec![Tab::new("https://b.com"), Tab::new("https://a.com")];
        assert_ne!(fingerprint(&ab, &n), fingerprint(&ba, &n));
    }

    #[test]
    fn fingerprint_empty_is_zero() {
        let n = normalizer();
        assert_eq!(fingerprint(&[], &n), 0);
        assert_eq!(fingerprint(&[Tab::new("chrome://newtab/")], &n), 0);
    }

    #[test]
    fn remove_and_re_add_restores_fingerprint() {
        let n = normalizer();
        let both = vec![Tab::new("https://a.com"), Tab::new("https://b.com")];
        let original = fingerprint(&both, &n);

        let only_a = vec![Tab::new("https://a.com")];
        assert_ne!(fingerprint(&only_a, &n), original);

        // Re-added with a different tab id but the same normalized URL.
        let restored = vec![Tab::new("https://a.com"), Tab::with_id(99, "https://b.com")];
        assert_eq!(fingerprint(&restored, &n), original);
    }

    #[test]
    fn fingerprint_is_nonnegative_32bit() {
        let n = normalizer();
        // A long input that exercises wrapping.
        let tabs: Vec<Tab> = (0..50)
            .map(|i| Tab::new(format!("https://site-{i}.example.com/some/long/path")))
            .collect();
        // unsigned_abs output always fits by construction; ensure stability.
        let h = fingerprint(&tabs, &n);
        assert_eq!(h, fingerprint(&tabs, &n));
    }
}
