//! Lazy source-map loading and position lookup.
//!
//! Maps are fetched through the `SourceMapLoader` seam (the only
//! filesystem-aware part of source handling), parsed once per generated URL
//! and cached, failures included, so a broken map is not retried on every
//! frame.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use sourcemap::SourceMap;

use crate::error::SessionError;

#[async_trait]
pub trait SourceMapLoader: Send + Sync {
    async fn load(&self, map_url: &str) -> Result<String, SessionError>;
}

/// Loads maps from `data:` URLs, `file:` URLs and plain paths.
pub struct FileSourceMapLoader;

#[async_trait]
impl SourceMapLoader for FileSourceMapLoader {
    async fn load(&self, map_url: &str) -> Result<String, SessionError> {
        if let Some(rest) = map_url.strip_prefix("data:") {
            let comma = rest.find(',').ok_or_else(|| {
                SessionError::InvalidRequest("data: URL without payload".to_string())
            })?;
            let (meta, payload) = rest.split_at(comma);
            let payload = &payload[1..];
            return if meta.ends_with(";base64") {
                let bytes = BASE64.decode(payload).map_err(|e| {
                    SessionError::InvalidRequest(format!("bad base64 source map: {e}"))
                })?;
                String::from_utf8(bytes).map_err(|e| {
                    SessionError::InvalidRequest(format!("source map is not UTF-8: {e}"))
                })
            } else {
                Ok(payload.to_string())
            };
        }

        let path = match url::Url::parse(map_url) {
            Ok(parsed) if parsed.scheme() == "file" => parsed
                .to_file_path()
                .map_err(|_| SessionError::InvalidRequest(format!("bad file URL {map_url}")))?,
            Ok(parsed) => {
                // Remote maps are out of reach here; the source stays
                // unmapped and is still exposed by URL.
                return Err(SessionError::InvalidRequest(format!(
                    "unsupported source map scheme {}",
                    parsed.scheme()
                )));
            },
            Err(_) => std::path::PathBuf::from(map_url),
        };
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SessionError::InvalidRequest(format!("reading {}: {e}", path.display())))
    }
}

/// An original position found through a source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalLocation {
    pub url: String,
    /// 1-based, like everything the editor sees.
    pub line: u32,
    pub column: u32,
}

pub struct SourceMapCache {
    loader: Arc<dyn SourceMapLoader>,
    /// generated URL -> parsed map, or None when loading/parsing failed.
    maps: Mutex<HashMap<String, Option<Arc<SourceMap>>>>,
}

impl SourceMapCache {
    pub fn new(loader: Arc<dyn SourceMapLoader>) -> Self {
        SourceMapCache {
            loader,
            maps: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a possibly-relative `sourceMappingURL` against the generated
    /// file's URL.
    fn resolve_map_url(generated_url: &str, source_map_url: &str) -> String {
        if source_map_url.starts_with("data:") {
            return source_map_url.to_string();
        }
        match url::Url::parse(generated_url).and_then(|base| base.join(source_map_url)) {
            Ok(joined) => joined.to_string(),
            Err(_) => source_map_url.to_string(),
        }
    }

    async fn map_for(
        &self,
        generated_url: &str,
        source_map_url: &str,
    ) -> Option<Arc<SourceMap>> {
        if let Some(cached) = self.maps.lock().unwrap().get(generated_url) {
            return cached.clone();
        }

        let resolved = Self::resolve_map_url(generated_url, source_map_url);
        let parsed = match self.loader.load(&resolved).await {
            Ok(text) => match SourceMap::from_slice(text.as_bytes()) {
                Ok(map) => Some(Arc::new(map)),
                Err(e) => {
                    debug!("Unparsable source map {resolved}: {e}");
                    None
                },
            },
            Err(e) => {
                debug!("Failed to load source map {resolved}: {e}");
                None
            },
        };

        self.maps
            .lock()
            .unwrap()
            .insert(generated_url.to_string(), parsed.clone());
        parsed
    }

    /// Translate a generated position (1-based line) to its original
    /// position, if a map covers it.
    pub async fn find_original_location(
        &self,
        generated_url: &str,
        source_map_url: &str,
        line: u32,
        column: u32,
    ) -> Option<OriginalLocation> {
        let map = self.map_for(generated_url, source_map_url).await?;
        let token = map.lookup_token(line.saturating_sub(1), column)?;
        let url = token.get_source()?.to_string();
        Some(OriginalLocation {
            url,
            line: token.get_src_line() + 1,
            column: token.get_src_col(),
        })
    }

    /// The original source URLs a generated file maps to.
    pub async fn original_urls(
        &self,
        generated_url: &str,
        source_map_url: &str,
    ) -> Vec<String> {
        match self.map_for(generated_url, source_map_url).await {
            Some(map) => map.sources().map(str::to_string).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // {"version":3,"sources":["src/a.ts"],"names":[],"mappings":"AAAA;AACA"}
    // maps generated lines 1 and 2 onto original lines 1 and 2 of src/a.ts.
    const MAP: &str =
        r#"{"version":3,"sources":["src/a.ts"],"names":[],"mappings":"AAAA;AACA"}"#;

    struct StaticLoader;

    #[async_trait]
    impl SourceMapLoader for StaticLoader {
        async fn load(&self, _map_url: &str) -> Result<String, SessionError> {
            Ok(MAP.to_string())
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl SourceMapLoader for FailingLoader {
        async fn load(&self, map_url: &str) -> Result<String, SessionError> {
            Err(SessionError::InvalidRequest(map_url.to_string()))
        }
    }

    #[tokio::test]
    async fn finds_original_positions() {
        let cache = SourceMapCache::new(Arc::new(StaticLoader));
        let location = cache
            .find_original_location("https://example.com/bundle.js", "bundle.js.map", 2, 0)
            .await
            .unwrap();
        assert_eq!(location.url, "src/a.ts");
        assert_eq!(location.line, 2);
    }

    #[tokio::test]
    async fn failed_loads_are_cached_and_non_fatal() {
        let cache = SourceMapCache::new(Arc::new(FailingLoader));
        for _ in 0..2 {
            let location = cache
                .find_original_location("https://example.com/bundle.js", "bundle.js.map", 1, 0)
                .await;
            assert!(location.is_none());
        }
    }

    #[tokio::test]
    async fn data_urls_are_decoded() {
        let encoded = BASE64.encode(MAP.as_bytes());
        let loader = FileSourceMapLoader;
        let text = loader
            .load(&format!("data:application/json;base64,{encoded}"))
            .await
            .unwrap();
        assert_eq!(text, MAP);
    }
}
