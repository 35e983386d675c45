//! Ordered URL-prefix to path-prefix mappings.
//!
//! The first matching entry wins. A per-scheme index narrows the candidate
//! list so the common case (one `webpack://` entry among many `https://`
//! ones) resolves without scanning the whole table.

use std::collections::HashMap;

use iris_core::config::PathMappingEntry;

pub struct PathMappings {
    entries: Vec<PathMappingEntry>,
    /// Scheme -> indices into `entries`, in original order.
    by_scheme: HashMap<String, Vec<usize>>,
}

/// The scheme of a URL-ish string, without the trailing `:`.
fn scheme_of(url: &str) -> Option<&str> {
    let colon = url.find(':')?;
    let scheme = &url[..colon];
    (!scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'))
        .then_some(scheme)
}

/// Strip a query string or fragment.
pub fn strip_query(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(index) => &url[..index],
        None => url,
    }
}

impl PathMappings {
    pub fn new(entries: Vec<PathMappingEntry>) -> Self {
        let mut by_scheme: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if let Some(scheme) = scheme_of(&entry.url) {
                by_scheme.entry(scheme.to_string()).or_default().push(index);
            }
        }
        PathMappings { entries, by_scheme }
    }

    fn candidates(&self, url: &str) -> &[usize] {
        scheme_of(url)
            .and_then(|scheme| self.by_scheme.get(scheme))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Map a URL to a local path. Query strings never participate.
    pub fn url_to_path(&self, url: &str) -> Option<String> {
        let url = strip_query(url);
        for &index in self.candidates(url) {
            let entry = &self.entries[index];
            if let Some(rest) = url.strip_prefix(&entry.url) {
                return Some(format!("{}{}", entry.path, rest));
            }
        }
        None
    }

    /// Map a local path back to the URL space. The longest matching path
    /// prefix wins, so the inverse of `url_to_path` holds even when entries
    /// nest (up to the stripped query string).
    pub fn path_to_url(&self, path: &str) -> Option<String> {
        self.entries
            .iter()
            .filter_map(|entry| {
                path.strip_prefix(&entry.path)
                    .map(|rest| (entry.path.len(), format!("{}{}", entry.url, rest)))
            })
            .max_by_key(|(prefix_len, _)| *prefix_len)
            .map(|(_, url)| url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings() -> PathMappings {
        PathMappings::new(vec![
            PathMappingEntry {
                url: "webpack:///".to_string(),
                path: "/work/app/".to_string(),
            },
            PathMappingEntry {
                url: "https://example.com/static/".to_string(),
                path: "/work/app/static/".to_string(),
            },
            // Broader entry after the specific one: must never shadow it.
            PathMappingEntry {
                url: "https://example.com/".to_string(),
                path: "/work/app/public/".to_string(),
            },
        ])
    }

    #[test]
    fn first_match_wins() {
        let m = mappings();
        assert_eq!(
            m.url_to_path("https://example.com/static/app.js").as_deref(),
            Some("/work/app/static/app.js")
        );
        assert_eq!(
            m.url_to_path("https://example.com/index.js").as_deref(),
            Some("/work/app/public/index.js")
        );
        assert_eq!(
            m.url_to_path("webpack:///src/main.ts").as_deref(),
            Some("/work/app/src/main.ts")
        );
    }

    #[test]
    fn unmatched_urls_miss() {
        let m = mappings();
        assert_eq!(m.url_to_path("moz-extension://abc/bg.js"), None);
    }

    #[test]
    fn query_strings_are_ignored() {
        let m = mappings();
        assert_eq!(
            m.url_to_path("https://example.com/index.js?v=42").as_deref(),
            Some("/work/app/public/index.js")
        );
    }

    #[test]
    fn round_trips_modulo_query() {
        let m = mappings();
        for url in [
            "webpack:///src/main.ts",
            "https://example.com/static/app.js?cache=1",
        ] {
            let path = m.url_to_path(url).unwrap();
            let back = m.path_to_url(&path).unwrap();
            assert_eq!(back, strip_query(url));
        }
    }
}
