//! Source bookkeeping: one adapter per source actor, with URL and path
//! indexes and the derivation rules that turn a URL into a local path.

use std::collections::HashMap;

use iris_core::Registry;
use iris_rdp::actors::{SourceForm, SourceProxy};
use log::trace;

use crate::pathmap::{PathMappings, strip_query};

/// Bridge-side state for one source actor.
pub struct SourceAdapter {
    pub id: u32,
    pub actor: String,
    pub url: Option<String>,
    pub generated_url: Option<String>,
    pub source_map_url: Option<String>,
    pub introduction_type: Option<String>,
    /// Derived local path; `None` when no mapping applied (the source is
    /// still exposed by URL).
    pub path: Option<String>,
    /// Engine-side blackbox flag as last observed or set.
    pub blackboxed: bool,
    pub proxy: SourceProxy,
}

impl SourceAdapter {
    /// Sources created by evaluating code in the debug console never surface
    /// exception stops.
    pub fn is_debugger_eval(&self) -> bool {
        self.introduction_type.as_deref() == Some("debugger eval")
    }
}

pub struct SourceManager {
    mappings: PathMappings,
    sources: Registry<SourceAdapter>,
    by_actor: HashMap<String, u32>,
    by_url: HashMap<String, u32>,
    by_path: HashMap<String, Vec<u32>>,
}

impl SourceManager {
    pub fn new(mappings: PathMappings) -> Self {
        SourceManager {
            mappings,
            sources: Registry::new(),
            by_actor: HashMap::new(),
            by_url: HashMap::new(),
            by_path: HashMap::new(),
        }
    }

    pub fn mappings(&self) -> &PathMappings {
        &self.mappings
    }

    /// Derive a local path for a URL: configured mappings first, then
    /// `file:` URLs directly. Query strings never participate.
    pub fn resolve_path(&self, raw_url: &str) -> Option<String> {
        let clean = strip_query(raw_url);
        if let Some(path) = self.mappings.url_to_path(clean) {
            return Some(path);
        }
        if let Ok(parsed) = url::Url::parse(clean) {
            if parsed.scheme() == "file" {
                if let Ok(path) = parsed.to_file_path() {
                    return Some(path.to_string_lossy().into_owned());
                }
            }
        }
        None
    }

    /// Register a source actor, or return the existing adapter id when the
    /// engine re-announces a known actor.
    pub fn add_source(&mut self, form: &SourceForm, proxy: SourceProxy) -> u32 {
        if let Some(&existing) = self.by_actor.get(&form.actor) {
            return existing;
        }

        let path = form.url.as_deref().and_then(|u| self.resolve_path(u));
        let adapter = SourceAdapter {
            id: 0, // assigned below
            actor: form.actor.clone(),
            url: form.url.clone(),
            generated_url: form.generated_url.clone(),
            source_map_url: form.source_map_url.clone(),
            introduction_type: form.introduction_type.clone(),
            path: path.clone(),
            blackboxed: form.is_black_boxed,
            proxy,
        };
        let id = self.sources.add(adapter);
        if let Some(adapter) = self.sources.get_mut(id) {
            adapter.id = id;
        }

        self.by_actor.insert(form.actor.clone(), id);
        if let Some(url) = &form.url {
            self.by_url.insert(strip_query(url).to_string(), id);
        }
        if let Some(path) = path {
            self.by_path.entry(path).or_default().push(id);
        }
        trace!("registered source actor {} as id {id}", form.actor);
        id
    }

    /// After a source map resolves, re-key the source under its original URL
    /// and path.
    pub fn apply_original(&mut self, id: u32, original_url: &str, path: Option<String>) {
        if let Some(adapter) = self.sources.get_mut(id) {
            adapter.generated_url = adapter.generated_url.take().or_else(|| adapter.url.clone());
            adapter.url = Some(original_url.to_string());
            if let Some(path) = &path {
                adapter.path = Some(path.clone());
            }
        }
        self.by_url.insert(strip_query(original_url).to_string(), id);
        if let Some(path) = path {
            let ids = self.by_path.entry(path).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&SourceAdapter> {
        self.sources.get(id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut SourceAdapter> {
        self.sources.get_mut(id)
    }

    pub fn get_by_actor(&self, actor: &str) -> Option<&SourceAdapter> {
        self.by_actor.get(actor).and_then(|id| self.sources.get(*id))
    }

    pub fn id_by_actor(&self, actor: &str) -> Option<u32> {
        self.by_actor.get(actor).copied()
    }

    pub fn get_by_url(&self, url: &str) -> Option<&SourceAdapter> {
        self.by_url
            .get(strip_query(url))
            .and_then(|id| self.sources.get(*id))
    }

    /// Every source currently mapped to a local path.
    pub fn ids_for_path(&self, path: &str) -> Vec<u32> {
        self.by_path.get(path).cloned().unwrap_or_default()
    }

    /// Drop sources owned by a destroyed thread.
    pub fn remove_sources(&mut self, ids: &[u32]) {
        for &id in ids {
            if let Some(adapter) = self.sources.remove(id) {
                self.by_actor.remove(&adapter.actor);
                if let Some(url) = &adapter.url {
                    self.by_url.remove(strip_query(url));
                }
                if let Some(path) = &adapter.path {
                    if let Some(list) = self.by_path.get_mut(path) {
                        list.retain(|&other| other != id);
                        if list.is_empty() {
                            self.by_path.remove(path);
                        }
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.by_actor.clear();
        self.by_url.clear();
        self.by_path.clear();
    }
}

#[cfg(test)]
mod tests {
    use actix::prelude::*;
    use iris_core::config::PathMappingEntry;
    use iris_rdp::{DispatchActor, RdpEvent};
    use iris_transport::WritePacket;

    use super::*;

    struct NullConnection;

    impl Actor for NullConnection {
        type Context = Context<Self>;
    }

    impl Handler<WritePacket> for NullConnection {
        type Result = ();

        fn handle(&mut self, _msg: WritePacket, _ctx: &mut Context<Self>) {}
    }

    struct NullEvents;

    impl Actor for NullEvents {
        type Context = Context<Self>;
    }

    impl Handler<RdpEvent> for NullEvents {
        type Result = ();

        fn handle(&mut self, _msg: RdpEvent, _ctx: &mut Context<Self>) {}
    }

    fn manager() -> SourceManager {
        SourceManager::new(PathMappings::new(vec![PathMappingEntry {
            url: "https://app.test/".to_string(),
            path: "/work/".to_string(),
        }]))
    }

    fn form(actor: &str, url: &str) -> SourceForm {
        serde_json::from_value(serde_json::json!({ "actor": actor, "url": url })).unwrap()
    }

    #[actix_rt::test]
    async fn sources_are_keyed_by_actor_url_and_path() {
        let dispatch = DispatchActor::new(
            NullConnection.start().recipient(),
            NullEvents.start().recipient(),
        )
        .start();
        let mut manager = manager();

        let source_form = form("source1", "https://app.test/app.js?v=1");
        let proxy = SourceProxy::new(source_form.actor.clone(), dispatch.clone());
        let id = manager.add_source(&source_form, proxy.clone());

        // Re-announcing the same actor must not mint a second adapter.
        assert_eq!(manager.add_source(&source_form, proxy), id);

        let adapter = manager.get_by_actor("source1").unwrap();
        assert_eq!(adapter.path.as_deref(), Some("/work/app.js"));
        assert_eq!(
            manager.get_by_url("https://app.test/app.js?v=2").map(|s| s.id),
            Some(id),
            "url lookups ignore the query string"
        );
        assert_eq!(manager.ids_for_path("/work/app.js"), vec![id]);

        manager.remove_sources(&[id]);
        assert!(manager.get_by_actor("source1").is_none());
        assert!(manager.ids_for_path("/work/app.js").is_empty());
    }

    #[actix_rt::test]
    async fn source_map_resolution_rekeys_the_adapter() {
        let dispatch = DispatchActor::new(
            NullConnection.start().recipient(),
            NullEvents.start().recipient(),
        )
        .start();
        let mut manager = manager();

        let source_form = form("source2", "https://app.test/bundle.js");
        let proxy = SourceProxy::new(source_form.actor.clone(), dispatch);
        let id = manager.add_source(&source_form, proxy);

        manager.apply_original(
            id,
            "https://app.test/src/main.ts",
            Some("/work/src/main.ts".to_string()),
        );

        let adapter = manager.get(id).unwrap();
        assert_eq!(adapter.url.as_deref(), Some("https://app.test/src/main.ts"));
        assert_eq!(
            adapter.generated_url.as_deref(),
            Some("https://app.test/bundle.js")
        );
        assert_eq!(manager.ids_for_path("/work/src/main.ts"), vec![id]);
    }

    #[test]
    fn unmapped_urls_have_no_path_but_file_urls_do() {
        let manager = manager();
        assert_eq!(manager.resolve_path("moz-extension://abc/bg.js"), None);
        assert_eq!(
            manager.resolve_path("file:///work/local.js").as_deref(),
            Some("/work/local.js")
        );
    }
}
