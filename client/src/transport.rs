//! HTTP transport for GraphQL list queries.
//!
//! Posts `{"query", "variables"}` to the endpoint and streams the response
//! body into the decoder chunk by chunk.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use trellis_engine::{GraphQLRequest, ResponseDecoder, Transport, TransportError};

/// Header carrying the per-request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Sends requests to a single GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport for `endpoint` with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(config.endpoint.clone(), config.timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: &GraphQLRequest,
        response: &mut ResponseDecoder,
    ) -> Result<(), TransportError> {
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::debug!(
            request_id = %request_id,
            decode_path = %request.decode_path,
            response_type = request.response_type,
            "Sending GraphQL request"
        );

        let mut http_response = self
            .client
            .post(&self.endpoint)
            .header(REQUEST_ID_HEADER, &request_id)
            .json(&request.to_body())
            .send()
            .await
            .map_err(|e| classify(&request_id, e))?;

        let status = http_response.status();
        // A 400 still carries a GraphQL error body
        if !status.is_success() && status != reqwest::StatusCode::BAD_REQUEST {
            tracing::warn!(request_id = %request_id, status = %status, "GraphQL request rejected");
            let message = format!("endpoint returned HTTP {}", status);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                TransportError::new(message)
            } else {
                TransportError::permanent(message)
            });
        }

        let mut chunks = 0usize;
        while let Some(chunk) = http_response
            .chunk()
            .await
            .map_err(|e| classify(&request_id, e))?
        {
            response.append_response(&chunk);
            chunks += 1;
        }

        tracing::debug!(
            request_id = %request_id,
            status = %status,
            chunks,
            bytes = response.buffered_len(),
            "Received GraphQL response"
        );

        Ok(())
    }
}

fn classify(request_id: &str, error: reqwest::Error) -> TransportError {
    tracing::warn!(request_id = %request_id, error = %error, "GraphQL transport failure");
    if error.is_timeout() || error.is_connect() || error.is_request() {
        TransportError::new(error.to_string())
    } else {
        TransportError::permanent(error.to_string())
    }
}
