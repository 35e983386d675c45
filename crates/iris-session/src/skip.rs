//! Skip-file (blackbox) rules.
//!
//! Sources matching a skip rule never surface stops: the engine enforces the
//! blackbox flag, and the bridge auto-resumes the races the engine loses.

use globset::{Glob, GlobMatcher};

use crate::error::SessionError;
use crate::pathmap::strip_query;
use crate::source::SourceAdapter;

struct SkipRule {
    matcher: GlobMatcher,
    skip: bool,
}

pub struct SkipFileManager {
    rules: Vec<SkipRule>,
}

impl SkipFileManager {
    /// Compile an ordered rule list. A leading `!` negates a pattern,
    /// un-skipping files a broader earlier pattern caught.
    pub fn new(patterns: &[String]) -> Result<Self, SessionError> {
        let mut rules = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let (skip, raw) = match pattern.strip_prefix('!') {
                Some(negated) => (false, negated),
                None => (true, pattern.as_str()),
            };
            let matcher = Glob::new(raw)
                .map_err(|e| {
                    SessionError::InvalidRequest(format!("bad skipFiles pattern {raw:?}: {e}"))
                })?
                .compile_matcher();
            rules.push(SkipRule { matcher, skip });
        }
        Ok(SkipFileManager { rules })
    }

    /// Whether a path should be skipped. The last matching rule wins;
    /// `None` means no rule has an opinion.
    pub fn should_skip(&self, path: &str) -> Option<bool> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matcher.is_match(path))
            .map(|rule| rule.skip)
    }

    /// Decide for a source adapter: its path, else its generated URL, else
    /// its URL, query strings stripped.
    pub fn decide(&self, source: &SourceAdapter) -> Option<bool> {
        if let Some(path) = &source.path {
            if let Some(verdict) = self.should_skip(path) {
                return Some(verdict);
            }
        }
        if let Some(generated) = &source.generated_url {
            if let Some(verdict) = self.should_skip(strip_query(generated)) {
                return Some(verdict);
            }
        }
        if let Some(url) = &source.url {
            if let Some(verdict) = self.should_skip(strip_query(url)) {
                return Some(verdict);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(patterns: &[&str]) -> SkipFileManager {
        let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        SkipFileManager::new(&owned).unwrap()
    }

    #[test]
    fn no_rules_no_opinion() {
        let m = manager(&[]);
        assert_eq!(m.should_skip("/work/lib/a.js"), None);
    }

    #[test]
    fn glob_rules_match_paths() {
        let m = manager(&["**/lib/**"]);
        assert_eq!(m.should_skip("/work/lib/a.js"), Some(true));
        assert_eq!(m.should_skip("/work/src/a.js"), None);
    }

    #[test]
    fn last_matching_rule_wins() {
        let m = manager(&["**/node_modules/**", "!**/node_modules/my-lib/**"]);
        assert_eq!(m.should_skip("/w/node_modules/lodash/x.js"), Some(true));
        assert_eq!(m.should_skip("/w/node_modules/my-lib/x.js"), Some(false));
    }

    #[test]
    fn bad_patterns_are_rejected() {
        let owned = vec!["a{".to_string()];
        assert!(SkipFileManager::new(&owned).is_err());
    }
}
