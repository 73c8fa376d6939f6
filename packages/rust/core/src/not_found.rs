//! Editorial 404 configuration served from an in-memory cache.
//!
//! Editors map a node to the page shown for missing URLs below it. The
//! persisted mapping (see `pagenotfound-storage`) is loaded with
//! [`PageNotFoundService::refresh`]; lookups then compute inheritance from the
//! nearest configured ancestor on the fly.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use pagenotfound_shared::{NodeKey, NotFoundConfig, NotFoundPageEntry, ResolverConfig};
use tracing::{debug, warn};

use crate::host::{NavigationQuery, NotFoundConfigService};

/// Cached node → 404 page mapping with inheritance.
pub struct PageNotFoundService<N> {
    navigation: N,
    entries: RwLock<HashMap<NodeKey, NodeKey>>,
    max_walk_depth: usize,
}

impl<N: NavigationQuery> PageNotFoundService<N> {
    pub fn new(navigation: N) -> Self {
        Self {
            navigation,
            entries: RwLock::new(HashMap::new()),
            max_walk_depth: ResolverConfig::default().max_walk_depth,
        }
    }

    pub fn with_max_walk_depth(mut self, max_walk_depth: usize) -> Self {
        self.max_walk_depth = max_walk_depth;
        self
    }

    /// Replace the whole cache with `entries`.
    pub fn refresh(&self, entries: impl IntoIterator<Item = NotFoundPageEntry>) {
        let fresh: HashMap<NodeKey, NodeKey> = entries
            .into_iter()
            .map(|e| (e.node_key, e.not_found_key))
            .collect();
        debug!(entries = fresh.len(), "404 mapping cache refreshed");
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// Set (or replace) the 404 page for `node`.
    pub fn set_not_found_page(&self, node: NodeKey, target: NodeKey) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node, target);
    }

    /// Remove the 404 page for `node`, returning the previous target.
    pub fn remove_not_found_page(&self, node: NodeKey) -> Option<NodeKey> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&node)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nearest strict ancestor of `key` with an explicit entry.
    fn nearest_configured_ancestor(
        &self,
        entries: &HashMap<NodeKey, NodeKey>,
        key: NodeKey,
    ) -> Option<NotFoundConfig> {
        let mut visited = HashSet::from([key]);
        let mut current = self.navigation.parent_key(key);

        while let Some(ancestor) = current {
            if let Some(target) = entries.get(&ancestor) {
                return Some(NotFoundConfig::explicit(ancestor, *target));
            }
            if !visited.insert(ancestor) || visited.len() > self.max_walk_depth {
                warn!(node = %key, "ancestor chain too deep or cyclic, ignoring inheritance");
                return None;
            }
            current = self.navigation.parent_key(ancestor);
        }
        None
    }
}

impl<N: NavigationQuery> NotFoundConfigService for PageNotFoundService<N> {
    fn not_found_page(&self, key: NodeKey) -> Option<NotFoundConfig> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let explicit_404 = entries.get(&key).copied();
        let inherited_404 = self.nearest_configured_ancestor(&entries, key).map(Box::new);

        if explicit_404.is_none() && inherited_404.is_none() {
            return None;
        }

        Some(NotFoundConfig {
            node_key: key,
            explicit_404,
            inherited_404,
        })
    }
}
