//! In-memory host built from a TOML site description.
//!
//! [`SiteSnapshot`] implements every host capability trait, so the finder can
//! run without a live CMS (CLI `resolve`, tests).
//!
//! ```toml
//! [[sections]]
//! domain_name = "example.com"
//! root_content_id = 10
//!
//! [[nodes]]
//! id = 10
//! name = "Home"
//!
//! [[nodes]]
//! id = 99
//! name = "Not Found"
//! parent = 10
//!
//! [[not_found]]
//! node = 10
//! target = 99
//! ```
//!
//! Routes follow the host convention: nodes below a section root `R` are
//! `R/seg/...` (the root itself is `R`); nodes outside any section are
//! `/seg/...` with the top-level node hidden (the top-level node is `/`).

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use pagenotfound_shared::{
    ContentNode, NodeKey, NotFoundPageEntry, PageNotFoundError, Result, Section,
};
use serde::Deserialize;
use tracing::debug;

use crate::host::{ContentCache, ContentCacheFactory, NavigationQuery, RouteResolver, SectionRegistry};

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    not_found: Vec<NotFoundSpec>,
}

#[derive(Debug, Deserialize)]
struct NodeSpec {
    id: i32,
    #[serde(default)]
    key: Option<NodeKey>,
    name: String,
    #[serde(default)]
    parent: Option<i32>,
    /// URL segment. Defaults to the lower-cased name with spaces as `-`.
    #[serde(default)]
    segment: Option<String>,
    #[serde(default = "default_true")]
    published: bool,
    /// Cultures the node is routable in. Empty means all.
    #[serde(default)]
    cultures: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct NotFoundSpec {
    node: i32,
    target: i32,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StoredNode {
    content: ContentNode,
    published: bool,
    cultures: Vec<String>,
}

impl StoredNode {
    fn routable_in(&self, culture: Option<&str>) -> bool {
        match culture {
            Some(c) if !self.cultures.is_empty() => {
                self.cultures.iter().any(|nc| nc.eq_ignore_ascii_case(c))
            }
            _ => true,
        }
    }
}

#[derive(Debug)]
struct SnapshotData {
    sections: Vec<Section>,
    nodes: HashMap<NodeKey, StoredNode>,
    ids: HashMap<i32, NodeKey>,
    /// Normalized route → candidate nodes in declaration order.
    routes: HashMap<String, Vec<NodeKey>>,
    not_found: Vec<(NodeKey, NodeKey)>,
}

/// Read-only site description implementing the host capability traits.
#[derive(Debug, Clone)]
pub struct SiteSnapshot {
    data: Arc<SnapshotData>,
    open_contexts: Arc<AtomicUsize>,
}

impl SiteSnapshot {
    /// Load and validate a snapshot from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PageNotFoundError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a snapshot from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SnapshotFile = toml::from_str(content)
            .map_err(|e| PageNotFoundError::parse(format!("invalid site snapshot: {e}")))?;
        Self::build(file)
    }

    fn build(file: SnapshotFile) -> Result<Self> {
        let mut ids = HashMap::new();
        let mut nodes = HashMap::new();
        let mut order = Vec::with_capacity(file.nodes.len());
        let mut segments = HashMap::new();

        for spec in &file.nodes {
            let key = spec.key.unwrap_or_else(|| NodeKey::from_id(spec.id));
            if ids.insert(spec.id, key).is_some() {
                return Err(PageNotFoundError::validation(format!(
                    "duplicate node id {}",
                    spec.id
                )));
            }
            if nodes.contains_key(&key) {
                return Err(PageNotFoundError::validation(format!(
                    "duplicate node key {key}"
                )));
            }
            let segment = spec
                .segment
                .clone()
                .unwrap_or_else(|| default_segment(&spec.name));
            segments.insert(key, segment);
            order.push(key);
            nodes.insert(
                key,
                StoredNode {
                    content: ContentNode {
                        key,
                        id: spec.id,
                        name: spec.name.clone(),
                        parent: None,
                    },
                    published: spec.published,
                    cultures: spec.cultures.clone(),
                },
            );
        }

        for spec in &file.nodes {
            if let Some(parent_id) = spec.parent {
                let parent = *ids.get(&parent_id).ok_or_else(|| {
                    PageNotFoundError::validation(format!(
                        "node {} lists unknown parent {parent_id}",
                        spec.id
                    ))
                })?;
                if let Some(node) = nodes.get_mut(&ids[&spec.id]) {
                    node.content.parent = Some(parent);
                }
            }
        }

        let roots: HashMap<NodeKey, i32> = file
            .sections
            .iter()
            .filter_map(|s| s.root_content_id)
            .filter_map(|id| ids.get(&id).map(|key| (*key, id)))
            .collect();

        let mut routes: HashMap<String, Vec<NodeKey>> = HashMap::new();
        for key in &order {
            let route = route_for(*key, &nodes, &segments, &roots)?;
            routes.entry(normalize_route(&route)).or_default().push(*key);
        }

        let mut not_found = Vec::with_capacity(file.not_found.len());
        for spec in &file.not_found {
            let lookup = |id: i32| {
                ids.get(&id).copied().ok_or_else(|| {
                    PageNotFoundError::validation(format!("404 mapping references unknown node {id}"))
                })
            };
            not_found.push((lookup(spec.node)?, lookup(spec.target)?));
        }

        debug!(
            sections = file.sections.len(),
            nodes = nodes.len(),
            routes = routes.len(),
            "site snapshot loaded"
        );

        Ok(Self {
            data: Arc::new(SnapshotData {
                sections: file.sections,
                nodes,
                ids,
                routes,
                not_found,
            }),
            open_contexts: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Key of the node declared with `id`.
    pub fn key_for_id(&self, id: i32) -> Option<NodeKey> {
        self.data.ids.get(&id).copied()
    }

    /// The `[[not_found]]` mappings, ready for `PageNotFoundService::refresh`.
    pub fn not_found_entries(&self) -> Vec<NotFoundPageEntry> {
        let now = Utc::now();
        self.data
            .not_found
            .iter()
            .map(|(node_key, not_found_key)| NotFoundPageEntry {
                node_key: *node_key,
                not_found_key: *not_found_key,
                updated_at: now,
            })
            .collect()
    }

    /// Number of content cache contexts currently held.
    pub fn open_contexts(&self) -> usize {
        self.open_contexts.load(Ordering::SeqCst)
    }

    fn section_is_published(&self, section: &Section) -> bool {
        match section.root_content_id.and_then(|id| self.data.ids.get(&id)) {
            Some(key) => self.data.nodes.get(key).is_some_and(|n| n.published),
            None => true,
        }
    }
}

/// Route of `key` under the section/hide-top-level conventions.
fn route_for(
    key: NodeKey,
    nodes: &HashMap<NodeKey, StoredNode>,
    segments: &HashMap<NodeKey, String>,
    roots: &HashMap<NodeKey, i32>,
) -> Result<String> {
    let mut parts = Vec::new();
    let mut seen = HashSet::new();
    let mut current = key;

    loop {
        if !seen.insert(current) {
            return Err(PageNotFoundError::validation(format!(
                "parent cycle through node {current}"
            )));
        }
        if let Some(root_id) = roots.get(&current) {
            parts.reverse();
            return Ok(if parts.is_empty() {
                root_id.to_string()
            } else {
                format!("{root_id}/{}", parts.join("/"))
            });
        }
        match nodes.get(&current).and_then(|n| n.content.parent) {
            Some(parent) => {
                parts.push(segments[&current].as_str());
                current = parent;
            }
            // Top-level node: hidden from the path.
            None => {
                parts.reverse();
                return Ok(format!("/{}", parts.join("/")));
            }
        }
    }
}

fn default_segment(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}

fn normalize_route(route: &str) -> String {
    let lowered = route.to_lowercase();
    match lowered.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => lowered,
    }
}

// ---------------------------------------------------------------------------
// Host capabilities
// ---------------------------------------------------------------------------

impl SectionRegistry for SiteSnapshot {
    async fn all_sections(&self, include_unpublished: bool) -> Result<Vec<Section>> {
        Ok(self
            .data
            .sections
            .iter()
            .filter(|s| include_unpublished || self.section_is_published(s))
            .cloned()
            .collect())
    }
}

impl RouteResolver for SiteSnapshot {
    fn document_key_by_route(
        &self,
        route: &str,
        culture: Option<&str>,
        _segment: Option<&str>,
        preview: bool,
    ) -> Option<NodeKey> {
        self.data
            .routes
            .get(&normalize_route(route))?
            .iter()
            .filter_map(|key| self.data.nodes.get(key))
            .find(|n| (preview || n.published) && n.routable_in(culture))
            .map(|n| n.content.key)
    }
}

impl NavigationQuery for SiteSnapshot {
    fn parent_key(&self, key: NodeKey) -> Option<NodeKey> {
        self.data.nodes.get(&key)?.content.parent
    }
}

/// Request-scoped read handle; releases its slot on drop.
#[derive(Debug)]
pub struct SnapshotContext {
    data: Arc<SnapshotData>,
    open_contexts: Arc<AtomicUsize>,
}

impl ContentCache for SnapshotContext {
    fn get_by_key(&self, key: NodeKey) -> Option<ContentNode> {
        self.data
            .nodes
            .get(&key)
            .filter(|n| n.published)
            .map(|n| n.content.clone())
    }
}

impl Drop for SnapshotContext {
    fn drop(&mut self) {
        self.open_contexts.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ContentCacheFactory for SiteSnapshot {
    type Context = SnapshotContext;

    fn ensure_context(&self) -> SnapshotContext {
        self.open_contexts.fetch_add(1, Ordering::SeqCst);
        SnapshotContext {
            data: Arc::clone(&self.data),
            open_contexts: Arc::clone(&self.open_contexts),
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::finder::{PageNotFoundFinder, Resolution};
    use crate::not_found::PageNotFoundService;

    const SITE: &str = r#"
[[sections]]
domain_name = "example.com"
root_content_id = 10

[[sections]]
domain_name = "https://example.de"
root_content_id = 20

[[nodes]]
id = 1
name = "Intranet"

[[nodes]]
id = 2
name = "Team Pages"
parent = 1

[[nodes]]
id = 10
name = "Home"

[[nodes]]
id = 11
name = "Products"
parent = 10

[[nodes]]
id = 12
name = "Widgets"
parent = 11
cultures = ["en-US"]

[[nodes]]
id = 13
name = "Drafts"
parent = 10
published = false

[[nodes]]
id = 99
name = "Not Found"
parent = 10

[[nodes]]
id = 20
name = "Startseite"

[[nodes]]
id = 21
name = "Nicht gefunden"
segment = "404"
parent = 20

[[not_found]]
node = 10
target = 99

[[not_found]]
node = 20
target = 21
"#;

    fn site() -> SiteSnapshot {
        SiteSnapshot::from_toml_str(SITE).expect("parse site")
    }

    fn resolve_route(snapshot: &SiteSnapshot, route: &str) -> Option<i32> {
        snapshot
            .document_key_by_route(route, None, None, false)
            .and_then(|k| snapshot.data.nodes.get(&k))
            .map(|n| n.content.id)
    }

    #[test]
    fn section_routes() {
        let s = site();
        assert_eq!(resolve_route(&s, "10"), Some(10));
        assert_eq!(resolve_route(&s, "10/"), Some(10));
        assert_eq!(resolve_route(&s, "10/products"), Some(11));
        assert_eq!(resolve_route(&s, "10/Products/Widgets/"), Some(12));
        assert_eq!(resolve_route(&s, "20/404"), Some(21));
        assert_eq!(resolve_route(&s, "10/products/widget"), None);
    }

    #[test]
    fn routes_outside_sections_hide_top_level() {
        let s = site();
        assert_eq!(resolve_route(&s, "/"), Some(1));
        assert_eq!(resolve_route(&s, "/team-pages"), Some(2));
        assert_eq!(resolve_route(&s, "/intranet"), None);
        assert_eq!(resolve_route(&s, ""), None);
    }

    #[test]
    fn unpublished_nodes_are_not_routable_or_cached() {
        let s = site();
        assert_eq!(resolve_route(&s, "10/drafts"), None);
        assert!(s.document_key_by_route("10/drafts", None, None, true).is_some());

        let ctx = s.ensure_context();
        assert!(ctx.get_by_key(NodeKey::from_id(13)).is_none());
        assert!(ctx.get_by_key(NodeKey::from_id(11)).is_some());
    }

    #[test]
    fn culture_restricts_routing() {
        let s = site();
        assert!(s.document_key_by_route("10/products/widgets", Some("en-us"), None, false).is_some());
        assert!(s.document_key_by_route("10/products/widgets", Some("da-DK"), None, false).is_none());
        assert!(s.document_key_by_route("10/products", Some("da-DK"), None, false).is_some());
    }

    #[test]
    fn contexts_are_counted() {
        let s = site();
        let a = s.ensure_context();
        let b = s.clone().ensure_context();
        assert_eq!(s.open_contexts(), 2);
        drop(a);
        drop(b);
        assert_eq!(s.open_contexts(), 0);
    }

    #[test]
    fn navigation_follows_parents() {
        let s = site();
        assert_eq!(s.parent_key(NodeKey::from_id(12)), Some(NodeKey::from_id(11)));
        assert_eq!(s.parent_key(NodeKey::from_id(10)), None);
    }

    #[test]
    fn explicit_keys_override_derived_ones() {
        let s = SiteSnapshot::from_toml_str(
            r#"
[[nodes]]
id = 1
key = "0192f0c4-6a1e-7c3a-9b1d-5f2e8a7c4d10"
name = "Root"

[[nodes]]
id = 2
name = "Child"
parent = 1
"#,
        )
        .expect("parse");
        let root: NodeKey = "0192f0c4-6a1e-7c3a-9b1d-5f2e8a7c4d10".parse().unwrap();
        assert_eq!(s.key_for_id(1), Some(root));
        assert_eq!(s.key_for_id(2), Some(NodeKey::from_id(2)));
        assert_eq!(s.parent_key(NodeKey::from_id(2)), Some(root));
        assert_eq!(s.key_for_id(3), None);
    }

    #[tokio::test]
    async fn unpublished_sections_are_filtered_on_request() {
        let s = SiteSnapshot::from_toml_str(
            r#"
[[sections]]
domain_name = "draft.example.com"
root_content_id = 5

[[nodes]]
id = 5
name = "Draft Home"
published = false
"#,
        )
        .expect("parse");
        assert_eq!(s.all_sections(true).await.unwrap().len(), 1);
        assert!(s.all_sections(false).await.unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_snapshots() {
        let dup = "[[nodes]]\nid = 1\nname = \"a\"\n[[nodes]]\nid = 1\nname = \"b\"\n";
        assert!(SiteSnapshot::from_toml_str(dup).is_err());

        let dangling = "[[nodes]]\nid = 1\nname = \"a\"\nparent = 7\n";
        let err = SiteSnapshot::from_toml_str(dangling).unwrap_err();
        assert!(err.to_string().contains("unknown parent 7"));

        let cycle =
            "[[nodes]]\nid = 1\nname = \"a\"\nparent = 2\n[[nodes]]\nid = 2\nname = \"b\"\nparent = 1\n";
        let err = SiteSnapshot::from_toml_str(cycle).unwrap_err();
        assert!(err.to_string().contains("cycle"));

        let bad_mapping = "[[nodes]]\nid = 1\nname = \"a\"\n[[not_found]]\nnode = 1\ntarget = 3\n";
        assert!(SiteSnapshot::from_toml_str(bad_mapping).is_err());

        assert!(SiteSnapshot::from_toml_str("nodes = 3").is_err());
    }

    fn finder(
        s: &SiteSnapshot,
    ) -> PageNotFoundFinder<
        SiteSnapshot,
        SiteSnapshot,
        SiteSnapshot,
        SiteSnapshot,
        PageNotFoundService<SiteSnapshot>,
    > {
        let service = PageNotFoundService::new(s.clone());
        service.refresh(s.not_found_entries());
        PageNotFoundFinder::new(s.clone(), s.clone(), s.clone(), s.clone(), service)
    }

    #[tokio::test]
    async fn missing_page_under_section_resolves_to_section_404() {
        let s = site();
        let result = finder(&s)
            .resolve(&Url::parse("https://example.com/missing").unwrap(), None)
            .await;

        assert_eq!(
            result,
            Resolution::Resolved {
                status: 404,
                content: Some(ContentNode {
                    key: NodeKey::from_id(99),
                    id: 99,
                    name: "Not Found".into(),
                    parent: Some(NodeKey::from_id(10)),
                }),
            }
        );
        assert_eq!(s.open_contexts(), 0);
    }

    #[tokio::test]
    async fn deep_missing_page_inherits_from_section_root() {
        let s = site();
        let result = finder(&s)
            .resolve(
                &Url::parse("https://example.com/products/widgets/blue").unwrap(),
                Some("en-US"),
            )
            .await;
        assert_eq!(result.content().map(|c| c.id), Some(99));
    }

    #[tokio::test]
    async fn absolute_section_resolves_its_own_404() {
        let s = site();
        let result = finder(&s)
            .resolve(&Url::parse("https://example.de/gibt-es-nicht").unwrap(), None)
            .await;
        assert_eq!(result.content().map(|c| c.id), Some(21));
    }

    #[tokio::test]
    async fn unmapped_host_without_config_is_plain_404() {
        let s = site();
        let result = finder(&s)
            .resolve(&Url::parse("https://intranet.local/team-pages/x").unwrap(), None)
            .await;
        assert!(result.is_handled());
        assert!(result.content().is_none());
    }

    #[tokio::test]
    async fn fixture_site_resolves_nearest_configured_page() {
        let s = SiteSnapshot::load(Path::new("../../../fixtures/site.toml")).expect("load fixture");
        let finder = finder(&s);

        let blog = finder
            .resolve(&Url::parse("https://example.com/blog/release-notes/v2").unwrap(), None)
            .await;
        assert_eq!(blog.content().map(|c| c.id), Some(98));

        let home = finder
            .resolve(&Url::parse("https://example.com/shop").unwrap(), None)
            .await;
        assert_eq!(home.content().map(|c| c.id), Some(99));

        let danish = finder
            .resolve(&Url::parse("https://example.com/da/mangler").unwrap(), Some("da-DK"))
            .await;
        assert_eq!(danish.content().map(|c| c.id), Some(31));
    }
}
