//! Core domain types shared by the finder, the config service, and storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// HTTP status written by the finder whenever it handles a request.
pub const NOT_FOUND_STATUS: u16 = 404;

// ---------------------------------------------------------------------------
// NodeKey
// ---------------------------------------------------------------------------

/// Unique key of a content node in the host's content tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub Uuid);

impl NodeKey {
    /// Deterministic key for a node that only carries an integer id.
    pub fn from_id(id: i32) -> Self {
        // Sign-extension would make negative ids collide with large positives.
        Self(Uuid::from_u128(u128::from(id as u32)))
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for NodeKey {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// A domain binding: a domain name pointing at the root of a content subtree.
///
/// `domain_name` is either absolute (`https://example.com/en`) or bare
/// (`example.com/en`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub domain_name: String,
    /// Integer id of the subtree root. Wildcard bindings have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_content_id: Option<i32>,
}

impl Section {
    pub fn new(domain_name: impl Into<String>, root_content_id: Option<i32>) -> Self {
        Self {
            domain_name: domain_name.into(),
            root_content_id,
        }
    }

    /// Whether the domain name carries a scheme.
    pub fn is_absolute(&self) -> bool {
        self.domain_name
            .get(..4)
            .is_some_and(|p| p.eq_ignore_ascii_case("http"))
    }
}

// ---------------------------------------------------------------------------
// ContentNode
// ---------------------------------------------------------------------------

/// A published content item as served by the content cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode {
    pub key: NodeKey,
    pub id: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeKey>,
}

// ---------------------------------------------------------------------------
// NotFoundConfig
// ---------------------------------------------------------------------------

/// Editorial 404 configuration as seen from one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundConfig {
    /// The node this configuration describes.
    pub node_key: NodeKey,
    /// Target set directly on this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_404: Option<NodeKey>,
    /// Nearest ancestor configuration that carries an explicit target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_404: Option<Box<NotFoundConfig>>,
}

impl NotFoundConfig {
    /// Configuration with only an explicit target.
    pub fn explicit(node_key: NodeKey, target: NodeKey) -> Self {
        Self {
            node_key,
            explicit_404: Some(target),
            inherited_404: None,
        }
    }

    /// Explicit target if set, else the inherited entry's explicit target.
    pub fn effective_target(&self) -> Option<NodeKey> {
        self.explicit_404.or_else(|| {
            self.inherited_404
                .as_ref()
                .and_then(|inherited| inherited.explicit_404)
        })
    }
}

// ---------------------------------------------------------------------------
// NotFoundPageEntry
// ---------------------------------------------------------------------------

/// One persisted editorial mapping: "below `node_key`, show `not_found_key`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundPageEntry {
    pub node_key: NodeKey,
    pub not_found_key: NodeKey,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_key_roundtrip() {
        let key = NodeKey(Uuid::now_v7());
        let parsed: NodeKey = key.to_string().parse().expect("parse NodeKey");
        assert_eq!(key, parsed);
    }

    #[test]
    fn node_key_from_id_is_stable() {
        assert_eq!(NodeKey::from_id(10), NodeKey::from_id(10));
        assert_ne!(NodeKey::from_id(10), NodeKey::from_id(11));
        assert_ne!(NodeKey::from_id(-1), NodeKey::from_id(1));
    }

    #[test]
    fn section_absolute_detection() {
        assert!(Section::new("https://example.com", Some(1)).is_absolute());
        assert!(Section::new("HTTP://example.com", Some(1)).is_absolute());
        assert!(!Section::new("example.com", Some(1)).is_absolute());
        assert!(!Section::new("ht", None).is_absolute());
    }

    #[test]
    fn effective_target_prefers_explicit() {
        let node = NodeKey::from_id(1);
        let ancestor = NodeKey::from_id(2);
        let config = NotFoundConfig {
            node_key: node,
            explicit_404: Some(NodeKey::from_id(50)),
            inherited_404: Some(Box::new(NotFoundConfig::explicit(
                ancestor,
                NodeKey::from_id(60),
            ))),
        };
        assert_eq!(config.effective_target(), Some(NodeKey::from_id(50)));
    }

    #[test]
    fn effective_target_falls_back_to_inherited() {
        let config = NotFoundConfig {
            node_key: NodeKey::from_id(1),
            explicit_404: None,
            inherited_404: Some(Box::new(NotFoundConfig::explicit(
                NodeKey::from_id(2),
                NodeKey::from_id(60),
            ))),
        };
        assert_eq!(config.effective_target(), Some(NodeKey::from_id(60)));

        let empty = NotFoundConfig {
            node_key: NodeKey::from_id(1),
            explicit_404: None,
            inherited_404: None,
        };
        assert_eq!(empty.effective_target(), None);
    }

    #[test]
    fn not_found_config_serialization() {
        let config = NotFoundConfig {
            node_key: NodeKey::from_id(3),
            explicit_404: None,
            inherited_404: Some(Box::new(NotFoundConfig::explicit(
                NodeKey::from_id(1),
                NodeKey::from_id(99),
            ))),
        };
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(!json.contains("explicit_404\":null"));
        let parsed: NotFoundConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, config);
    }
}
