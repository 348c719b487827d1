use axum::http::{HeaderMap, Method, Uri, header, request::Parts};

use super::{encoding::accepts_gzip, keys::RequestIdentity};

/// The parts of an inbound request the cache reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: Method,
    pub host: String,
    pub path_and_query: String,
    pub accept_encoding: Option<String>,
}

impl RequestContext {
    /// A `GET` for `host` + `path_and_query` with no `Accept-Encoding`.
    pub fn get(host: impl Into<String>, path_and_query: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            host: host.into(),
            path_and_query: path_and_query.into(),
            accept_encoding: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_accept_encoding(mut self, value: impl Into<String>) -> Self {
        self.accept_encoding = Some(value.into());
        self
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::from_components(&parts.method, &parts.uri, &parts.headers)
    }

    fn from_components(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|authority| authority.to_string()))
            .unwrap_or_default();

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let accept_encoding = headers
            .get(header::ACCEPT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self {
            method: method.clone(),
            host,
            path_and_query,
            accept_encoding,
        }
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(self.host.clone(), self.path_and_query.clone())
    }

    pub fn accepts_gzip(&self) -> bool {
        accepts_gzip(self.accept_encoding.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};

    use super::*;

    #[test]
    fn host_header_wins_over_authority() {
        let request = Request::builder()
            .uri("http://internal:8080/page?x=1")
            .header(header::HOST, "example.com")
            .body(Body::empty())
            .unwrap();

        let (parts, _) = request.into_parts();
        let context = RequestContext::from_parts(&parts);
        assert_eq!(context.host, "example.com");
        assert_eq!(context.path_and_query, "/page?x=1");
        assert_eq!(context.identity().as_key_input(), "example.com/page?x=1");
    }

    #[test]
    fn falls_back_to_uri_authority() {
        let request = Request::builder()
            .uri("http://example.com/page")
            .body(Body::empty())
            .unwrap();

        let (parts, _) = request.into_parts();
        let context = RequestContext::from_parts(&parts);
        assert_eq!(context.host, "example.com");
        assert_eq!(context.path_and_query, "/page");
    }

    #[test]
    fn missing_host_is_empty() {
        let request = Request::builder().uri("/page").body(Body::empty()).unwrap();

        let (parts, _) = request.into_parts();
        let context = RequestContext::from_parts(&parts);
        assert_eq!(context.host, "");
        assert_eq!(context.method, Method::GET);
        assert!(context.accept_encoding.is_none());
    }

    #[test]
    fn reads_accept_encoding_and_method() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/form")
            .header(header::ACCEPT_ENCODING, "gzip, deflate")
            .body(Body::empty())
            .unwrap();

        let (parts, _) = request.into_parts();
        let context = RequestContext::from_parts(&parts);
        assert_eq!(context.method, Method::POST);
        assert_eq!(context.accept_encoding.as_deref(), Some("gzip, deflate"));
        assert!(context.accepts_gzip());
    }

    #[test]
    fn builder_helpers() {
        let context = RequestContext::get("example.com", "/")
            .with_method(Method::HEAD)
            .with_accept_encoding("br");
        assert_eq!(context.method, Method::HEAD);
        assert!(!context.accepts_gzip());
    }
}
