//! Last-chance 404 content finder.
//!
//! Runs after ordinary routing failed. It:
//! 1. Declines administrative paths (bypass prefixes)
//! 2. Detects the section the request belongs to and derives a route prefix
//! 3. Finds the nearest existing document by shortening the path one
//!    character at a time
//! 4. Walks from that document through its cached ancestors until a node
//!    has an explicit or inherited 404 page that exists in the content cache
//!
//! Handled requests always get status 404, with or without custom content.

use std::collections::HashSet;
use std::future::Future;

use pagenotfound_shared::{ContentNode, NOT_FOUND_STATUS, NodeKey, ResolverConfig};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::host::{
    ContentCache, ContentCacheFactory, NavigationQuery, NotFoundConfigService, RouteResolver,
    SectionRegistry,
};
use crate::request::{PublishedRequestBuilder, decoded_path};
use crate::section;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Outcome of a last-chance lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path is reserved; other finders should handle it.
    Declined,
    /// The request is answered with `status` and optional custom content.
    Resolved {
        status: u16,
        content: Option<ContentNode>,
    },
}

impl Resolution {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    pub fn content(&self) -> Option<&ContentNode> {
        match self {
            Self::Resolved { content, .. } => content.as_ref(),
            Self::Declined => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Finder seam
// ---------------------------------------------------------------------------

/// A content finder invoked when nothing else matched the request.
pub trait ContentLastChanceFinder: Send + Sync {
    /// Try to complete `request`. Returns `true` if it was handled.
    fn try_find_content(
        &self,
        request: &mut PublishedRequestBuilder,
    ) -> impl Future<Output = bool> + Send;
}

// ---------------------------------------------------------------------------
// PageNotFoundFinder
// ---------------------------------------------------------------------------

/// Resolves the custom 404 page for a request, over injected host services.
pub struct PageNotFoundFinder<S, R, C, N, P> {
    sections: S,
    routes: R,
    cache: C,
    navigation: N,
    not_found: P,
    config: ResolverConfig,
}

impl<S, R, C, N, P> PageNotFoundFinder<S, R, C, N, P>
where
    S: SectionRegistry,
    R: RouteResolver,
    C: ContentCacheFactory,
    N: NavigationQuery,
    P: NotFoundConfigService,
{
    /// Create a finder with the default [`ResolverConfig`].
    pub fn new(sections: S, routes: R, cache: C, navigation: N, not_found: P) -> Self {
        Self {
            sections,
            routes,
            cache,
            navigation,
            not_found,
            config: ResolverConfig::default(),
        }
    }

    /// Replace the runtime configuration.
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve the 404 outcome for `uri`. Never fails.
    #[instrument(skip_all, fields(uri = %uri, culture = culture.unwrap_or_default()))]
    pub async fn resolve(&self, uri: &Url, culture: Option<&str>) -> Resolution {
        let path = decoded_path(uri);

        if self.is_bypassed(&path) {
            debug!(%path, "reserved path, declining");
            return Resolution::Declined;
        }

        let prefix = self.section_prefix(uri).await;

        let context = self.cache.ensure_context();
        let document = self.find_nearest_document(&prefix, &path, culture);
        let content = self.find_not_found_content(&context, document);
        drop(context);

        info!(
            prefix = %prefix,
            document = ?document,
            content = ?content.as_ref().map(|c| c.key),
            "resolved not-found request"
        );

        Resolution::Resolved {
            status: NOT_FOUND_STATUS,
            content,
        }
    }

    fn is_bypassed(&self, path: &str) -> bool {
        self.config
            .bypass_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Route prefix for the section `uri` belongs to. Registry failures
    /// degrade to "no section".
    async fn section_prefix(&self, uri: &Url) -> String {
        match self
            .sections
            .all_sections(self.config.include_unpublished_sections)
            .await
        {
            Ok(sections) => section::route_prefix(section::match_section(&sections, uri)),
            Err(e) => {
                warn!(error = %e, "section registry unavailable, using default section");
                String::new()
            }
        }
    }

    /// Longest prefix of `path` that the route service knows, tried as
    /// `prefix + candidate`. The empty candidate is the last attempt.
    fn find_nearest_document(
        &self,
        prefix: &str,
        path: &str,
        culture: Option<&str>,
    ) -> Option<NodeKey> {
        let mut candidate = path.to_string();
        loop {
            let route = format!("{prefix}{candidate}");
            if let Some(key) = self
                .routes
                .document_key_by_route(&route, culture, None, false)
            {
                debug!(%route, %key, "nearest route resolved");
                return Some(key);
            }
            if candidate.pop().is_none() {
                debug!(%prefix, "no prefix of the path resolved to a document");
                return None;
            }
        }
    }

    /// Look up the 404 page for `document`, then walk its cached ancestors
    /// until one yields content. The walk ends at the first parent missing
    /// from the content cache.
    fn find_not_found_content(
        &self,
        cache: &C::Context,
        document: Option<NodeKey>,
    ) -> Option<ContentNode> {
        let document = document?;
        if let Some(content) = self.not_found_content_for(cache, document) {
            debug!(node = %document, target = %content.key, "404 page found");
            return Some(content);
        }

        let mut current = cache.get_by_key(document);
        let mut visited = HashSet::from([document]);

        while let Some(node) = current {
            let Some(parent_key) = self.navigation.parent_key(node.key) else {
                debug!("reached the root without a 404 page");
                return None;
            };
            let Some(parent) = cache.get_by_key(parent_key) else {
                debug!(node = %node.key, parent = %parent_key, "parent is not in the content cache");
                return None;
            };
            if !visited.insert(parent.key) {
                warn!(key = %parent.key, "navigation cycle detected, stopping walk");
                return None;
            }
            if visited.len() > self.config.max_walk_depth {
                warn!(
                    max_walk_depth = self.config.max_walk_depth,
                    "ancestor walk exceeded depth bound"
                );
                return None;
            }
            if let Some(content) = self.not_found_content_for(cache, parent.key) {
                debug!(node = %parent.key, target = %content.key, "404 page found");
                return Some(content);
            }
            current = Some(parent);
        }

        debug!(%document, "resolved document is not in the content cache");
        None
    }

    fn not_found_content_for(&self, cache: &C::Context, key: NodeKey) -> Option<ContentNode> {
        let target = self.not_found.not_found_page(key)?.effective_target()?;
        let content = cache.get_by_key(target);
        if content.is_none() {
            debug!(node = %key, %target, "configured 404 page is not in the content cache");
        }
        content
    }
}

impl<S, R, C, N, P> ContentLastChanceFinder for PageNotFoundFinder<S, R, C, N, P>
where
    S: SectionRegistry,
    R: RouteResolver,
    C: ContentCacheFactory,
    N: NavigationQuery,
    P: NotFoundConfigService,
{
    async fn try_find_content(&self, request: &mut PublishedRequestBuilder) -> bool {
        let uri = request.uri().clone();
        let culture = request.culture().map(str::to_owned);

        match self.resolve(&uri, culture.as_deref()).await {
            Resolution::Declined => false,
            Resolution::Resolved { status, content } => {
                request.set_response_status(status);
                request.set_published_content(content);
                true
            }
        }
    }
}
