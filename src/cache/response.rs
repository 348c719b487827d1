use axum::{
    body::Body,
    http::{HeaderValue, header},
    response::Response,
};
use bytes::Bytes;
use tracing::warn;

use super::encoding::gzip;

/// Body of a cache hit, already transformed and encoded for the client.
#[derive(Debug, Clone)]
pub struct HitResponse {
    body: Bytes,
    gzip: bool,
}

impl HitResponse {
    /// Gzip `content` when the client accepts it. A failed encode falls back to identity.
    pub(crate) fn negotiate(content: Bytes, accepts_gzip: bool) -> Self {
        if accepts_gzip {
            match gzip(&content) {
                Ok(encoded) => {
                    return Self {
                        body: Bytes::from(encoded),
                        gzip: true,
                    };
                }
                Err(error) => {
                    warn!(error = %error, "gzip encoding failed, sending identity body");
                }
            }
        }

        Self {
            body: content,
            gzip: false,
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_gzip(&self) -> bool {
        self.gzip
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Build the complete client response. The body is sent in full with a
    /// `Connection: close` so the client is done before any refresh work starts.
    pub fn into_response(self, content_type: &str) -> Response {
        let length = self.content_length();
        let mut response = Response::new(Body::from(self.body));
        let headers = response.headers_mut();

        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        if self.gzip {
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn identity_response_headers() {
        let hit = HitResponse::negotiate(Bytes::from_static(b"hello"), false);
        assert!(!hit.is_gzip());
        assert_eq!(hit.body(), &Bytes::from_static(b"hello"));

        let response = hit.into_response("text/html; charset=utf-8");
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_LENGTH], "5");
        assert_eq!(headers[header::CONNECTION], "close");
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert!(!headers.contains_key(header::CONTENT_ENCODING));
    }

    #[test]
    fn gzip_response_reports_encoded_length() {
        let hit = HitResponse::negotiate(Bytes::from_static(b"hello hello hello"), true);
        assert!(hit.is_gzip());
        let encoded_len = hit.content_length();
        assert_ne!(encoded_len, 17);

        let response = hit.into_response("text/plain");
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_ENCODING], "gzip");
        assert_eq!(headers[header::VARY], "accept-encoding");
        assert_eq!(headers[header::CONTENT_LENGTH], encoded_len.to_string().as_str());
    }

    #[test]
    fn invalid_content_type_is_skipped() {
        let response = HitResponse::negotiate(Bytes::new(), false).into_response("bad\nvalue");
        assert!(!response.headers().contains_key(header::CONTENT_TYPE));
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
    }
}
