//! Capability traits for the host CMS services the finder consumes.
//!
//! The host owns routing, domains, the content cache and navigation. The
//! finder only sees these narrow seams, so tests and the CLI can plug in the
//! in-memory [`SiteSnapshot`](crate::snapshot::SiteSnapshot) instead.

use std::future::Future;

use pagenotfound_shared::{ContentNode, NodeKey, NotFoundConfig, Result, Section};

/// Domain bindings configured in the host.
pub trait SectionRegistry: Send + Sync {
    /// All bindings in host order. `include_unpublished` also returns bindings
    /// whose root has not been published yet.
    fn all_sections(
        &self,
        include_unpublished: bool,
    ) -> impl Future<Output = Result<Vec<Section>>> + Send;
}

/// Exact route → document lookup.
///
/// Routes are `"/a/b"` outside any section and `"<root id>/a/b"` inside one.
pub trait RouteResolver: Send + Sync {
    fn document_key_by_route(
        &self,
        route: &str,
        culture: Option<&str>,
        segment: Option<&str>,
        preview: bool,
    ) -> Option<NodeKey>;
}

/// Read access to published content.
pub trait ContentCache {
    fn get_by_key(&self, key: NodeKey) -> Option<ContentNode>;
}

/// Hands out request-scoped content cache contexts.
///
/// The returned context is released when dropped.
pub trait ContentCacheFactory: Send + Sync {
    type Context: ContentCache;

    fn ensure_context(&self) -> Self::Context;
}

/// Tree navigation over node keys.
pub trait NavigationQuery: Send + Sync {
    /// Parent of `key`, or `None` for top-level and unknown nodes.
    fn parent_key(&self, key: NodeKey) -> Option<NodeKey>;
}

/// Editorial 404 configuration lookup.
pub trait NotFoundConfigService: Send + Sync {
    fn not_found_page(&self, key: NodeKey) -> Option<NotFoundConfig>;
}
