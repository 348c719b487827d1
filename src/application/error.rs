use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{cache::CacheError, config::LoadError, infra::error::InfraError};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<InfraError> for HttpError {
    fn from(error: InfraError) -> Self {
        match error {
            InfraError::Upstream { .. } => HttpError::from_error(
                "infra::http::upstream",
                StatusCode::BAD_GATEWAY,
                "Upstream unavailable",
                &error,
            ),
            other => HttpError::from_error(
                "infra::http::upstream",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &other,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn report_collects_error_chain() {
        let error = InfraError::upstream("http://origin/page", io::Error::other("refused"));
        let report = ErrorReport::from_error("test", StatusCode::BAD_GATEWAY, &error);
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[1], "refused");
    }

    #[test]
    fn http_error_attaches_report() {
        let response =
            HttpError::new("test", StatusCode::NOT_FOUND, "Missing", "no such page").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.source, "test");
        assert_eq!(report.messages, vec!["no such page".to_string()]);
    }

    #[test]
    fn upstream_failure_maps_to_bad_gateway() {
        let error = InfraError::upstream("http://origin/", io::Error::other("timeout"));
        assert_eq!(HttpError::from(error).status(), StatusCode::BAD_GATEWAY);
    }
}
