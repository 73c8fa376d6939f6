//! Last-chance 404 resolution for a content-managed site.
//!
//! This crate provides:
//! - [`host`] — capability traits for the host CMS services
//! - [`PageNotFoundFinder`] — the finder that picks the custom 404 page
//! - [`PageNotFoundService`] — cached editorial 404 mapping with inheritance
//! - [`SiteSnapshot`] — an in-memory host loaded from TOML

pub mod finder;
pub mod host;
pub mod not_found;
pub mod request;
pub mod section;
pub mod snapshot;

pub use finder::{ContentLastChanceFinder, PageNotFoundFinder, Resolution};
pub use host::{
    ContentCache, ContentCacheFactory, NavigationQuery, NotFoundConfigService, RouteResolver,
    SectionRegistry,
};
pub use not_found::PageNotFoundService;
pub use request::PublishedRequestBuilder;
pub use section::{match_section, route_prefix};
pub use snapshot::{SiteSnapshot, SnapshotContext};
