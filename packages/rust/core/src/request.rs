//! The in-progress request a content finder may inspect and complete.

use std::borrow::Cow;

use pagenotfound_shared::ContentNode;
use percent_encoding::percent_decode_str;
use url::Url;

/// Mutable request state handed to content finders by the routing pipeline.
#[derive(Debug, Clone)]
pub struct PublishedRequestBuilder {
    uri: Url,
    culture: Option<String>,
    response_status: Option<u16>,
    published_content: Option<ContentNode>,
}

impl PublishedRequestBuilder {
    pub fn new(uri: Url) -> Self {
        Self {
            uri,
            culture: None,
            response_status: None,
            published_content: None,
        }
    }

    /// Attach the culture the router assigned to this request.
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn culture(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    pub fn absolute_path_decoded(&self) -> Cow<'_, str> {
        decoded_path(&self.uri)
    }

    pub fn set_response_status(&mut self, status: u16) {
        self.response_status = Some(status);
    }

    pub fn set_published_content(&mut self, content: Option<ContentNode>) {
        self.published_content = content;
    }

    pub fn response_status(&self) -> Option<u16> {
        self.response_status
    }

    pub fn published_content(&self) -> Option<&ContentNode> {
        self.published_content.as_ref()
    }
}

/// Percent-decoded absolute path of `uri`. Invalid UTF-8 is replaced lossily.
pub fn decoded_path(uri: &Url) -> Cow<'_, str> {
    percent_decode_str(uri.path()).decode_utf8_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_path() {
        let req = PublishedRequestBuilder::new(
            Url::parse("https://example.com/caf%C3%A9/a%20b?q=1").unwrap(),
        );
        assert_eq!(req.absolute_path_decoded(), "/café/a b");
    }

    #[test]
    fn starts_untouched() {
        let req = PublishedRequestBuilder::new(Url::parse("https://example.com/").unwrap())
            .with_culture("en-US");
        assert_eq!(req.culture(), Some("en-US"));
        assert!(req.response_status().is_none());
        assert!(req.published_content().is_none());
    }
}
