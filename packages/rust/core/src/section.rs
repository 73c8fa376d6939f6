//! Section (domain binding) detection for an incoming request.
//!
//! A binding is either absolute (`https://example.com/en`) and compared
//! against the full request URL, or bare (`example.com/en`) and compared
//! against `authority + path`. Both comparisons are case-insensitive prefix
//! matches and the first matching binding in host order wins.

use pagenotfound_shared::Section;
use tracing::debug;
use url::Url;

/// Find the first section whose domain name matches `uri`.
pub fn match_section<'a>(sections: &'a [Section], uri: &Url) -> Option<&'a Section> {
    let absolute = uri.as_str();
    let authority_path = format!("{}{}", authority(uri), uri.path());

    sections.iter().find(|section| {
        let matched = (section.is_absolute() && starts_with_ignore_case(absolute, &section.domain_name))
            || starts_with_ignore_case(&authority_path, &section.domain_name);
        if matched {
            debug!(domain = %section.domain_name, root = ?section.root_content_id, "section matched");
        }
        matched
    })
}

/// Route prefix for a matched section: the root id as decimal text, or empty.
pub fn route_prefix(section: Option<&Section>) -> String {
    section
        .and_then(|s| s.root_content_id)
        .map(|id| id.to_string())
        .unwrap_or_default()
}

/// Host plus explicit non-default port, without user info.
fn authority(uri: &Url) -> String {
    let host = uri.host_str().unwrap_or_default();
    match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    let mut hay = haystack.chars().flat_map(char::to_lowercase);
    prefix
        .chars()
        .flat_map(char::to_lowercase)
        .all(|p| hay.next() == Some(p))
}
