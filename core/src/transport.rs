//! Default network transport backed by `ureq`.

use std::time::Duration;

use tracing::trace;

use crate::error::ApiError;
use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};

/// Blocking transport installed by `Client::new` unless replaced.
///
/// A fresh agent is configured per exchange so the effective timeout can
/// differ between calls. ureq's status-code-as-error behavior is disabled:
/// 4xx/5xx responses come back as data for `Request` to interpret.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport {
    /// Applied when the request itself carries no timeout.
    pub timeout: Option<Duration>,
}

impl UreqTransport {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    fn agent(&self, timeout: Option<Duration>) -> ureq::Agent {
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout.or(self.timeout))
            .build()
            .new_agent()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn map_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Timeout(_) => ApiError::Timeout,
        other => ApiError::Transport(other.to_string()),
    }
}

impl HttpClient for UreqTransport {
    fn execute(
        &self,
        req: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, ApiError> {
        let agent = self.agent(timeout);
        let url = req.url.as_str();
        let headers = req.headers.as_slice();
        trace!(method = %req.method, url, "sending request");

        let result = match (req.method, req.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(agent.get(url), headers).call(),
            (HttpMethod::Head, _) => with_headers(agent.head(url), headers).call(),
            (HttpMethod::Delete, _) => with_headers(agent.delete(url), headers).call(),
            (HttpMethod::Post, Some(body)) => {
                with_headers(agent.post(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                with_headers(agent.put(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => with_headers(agent.put(url), headers).send_empty(),
            (HttpMethod::Patch, Some(body)) => {
                with_headers(agent.patch(url), headers).send(body.as_bytes())
            }
            (HttpMethod::Patch, None) => with_headers(agent.patch(url), headers).send_empty(),
        };
        let mut response = result.map_err(map_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string().map_err(map_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_refused_is_transport_error() {
        // Port 9 (discard) on loopback is not expected to be listening.
        let transport = UreqTransport::with_timeout(Duration::from_secs(2));
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://127.0.0.1:9/".to_string(),
            headers: Vec::new(),
            body: None,
        };
        let err = transport.execute(&req, None).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_) | ApiError::Timeout));
    }
}
