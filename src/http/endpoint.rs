//! Endpoint and request codec.
//!
//! An [`Endpoint`] is a decode → handle → encode pipeline with its own
//! request and response types, so the server is not tied to one payload
//! schema. The default encoder writes the response as JSON.

use std::future::Future;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Content type written by [`encode_json`].
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Errors raised while serving an endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("decode: {0}")]
    Decode(String),

    #[error("{0}")]
    Handler(String),

    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EndpointError {
    pub fn status(&self) -> StatusCode {
        match self {
            EndpointError::Decode(_) => StatusCode::BAD_REQUEST,
            EndpointError::Handler(_) | EndpointError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// A request/response pair of codecs around a handler.
pub trait Endpoint: Send + Sync + 'static {
    /// Decoded request value.
    type Request: Send;
    /// Value produced by the handler.
    type Response: Serialize + Send;

    /// Turn the raw HTTP request into a request value.
    fn decode(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Self::Request, EndpointError>> + Send;

    /// Business logic.
    fn handle(
        &self,
        request: Self::Request,
    ) -> impl Future<Output = Result<Self::Response, EndpointError>> + Send;

    /// Turn the response value into an HTTP response. JSON by default.
    fn encode(&self, response: Self::Response) -> Result<Response, EndpointError> {
        encode_json(&response)
    }
}

/// Encode `value` as a JSON body followed by a newline.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Response, EndpointError> {
    let mut body = serde_json::to_vec(value)?;
    body.push(b'\n');

    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    Ok(response)
}

/// Placeholder endpoint: ignores the request and answers `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseEndpoint;

impl Endpoint for BaseEndpoint {
    type Request = ();
    type Response = ();

    async fn decode(&self, _request: Request<Body>) -> Result<(), EndpointError> {
        Ok(())
    }

    async fn handle(&self, _request: ()) -> Result<(), EndpointError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn unit_encodes_as_null() {
        let response = encode_json(&()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static(JSON_CONTENT_TYPE)
        );
        assert_eq!(body_text(response).await, "null\n");
    }

    #[tokio::test]
    async fn errors_map_to_status_and_text() {
        let response = EndpointError::Decode("missing field".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "decode: missing field");

        let response = EndpointError::Handler("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "boom");
    }

    #[tokio::test]
    async fn base_endpoint_answers_null() {
        let endpoint = BaseEndpoint;
        let request = endpoint
            .decode(Request::new(Body::from("ignored")))
            .await
            .unwrap();
        let response = endpoint.handle(request).await.unwrap();
        let encoded = endpoint.encode(response).unwrap();
        assert_eq!(body_text(encoded).await, "null\n");
    }
}
