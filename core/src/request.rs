//! Per-call request builder and the completion-polling loop.
//!
//! # Design
//! A `Request` is created by one of the `Client` verb methods, configured by
//! chained calls, and consumed exactly once by `execute`. Configuration
//! errors (an invalid verb, an unserializable body) are recorded on the
//! builder and surfaced by `execute`, so chains never need intermediate `?`.
//!
//! When the server answers with a `Working` status, `execute` hands the
//! operation name to the configured poller. The poller either returns the
//! next request to issue, which replaces the current one, or `None`, which
//! ends the chain with the last status seen. Only one request of a chain is
//! ever in flight.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::codec::Codec;
use crate::error::ApiError;
use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use crate::types::{Status, StatusPhase};

/// Decides, given an operation name, which request checks on it next.
/// `None` stops polling.
pub type PollFn = Arc<dyn Fn(&str) -> Option<Request> + Send + Sync>;

/// Terminal state of an executed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The server returned a final object.
    Complete(Value),
    /// The server still reports the action as running and polling did not
    /// continue (sync mode, no poller, or the poller stopped).
    InProgress(Status),
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    /// The in-progress status, if the action has not finished.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Outcome::InProgress(status) => Some(status),
            Outcome::Complete(_) => None,
        }
    }

    /// Deserialize the completed object.
    pub fn into_object<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Outcome::Complete(object) => serde_json::from_value(object)
                .map_err(|e| ApiError::DeserializationError(e.to_string())),
            Outcome::InProgress(status) => Err(ApiError::NotComplete(
                status.operation_name().unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Builder for a single logical call against the resource hierarchy.
pub struct Request {
    transport: Arc<dyn HttpClient>,
    codec: Arc<dyn Codec>,
    verb: HttpMethod,
    base_url: Url,
    namespace_in_query: bool,
    preserve_resource_case: bool,

    prefix: Vec<String>,
    namespace: Option<String>,
    resource: Option<String>,
    name: Option<String>,
    suffix: Vec<String>,
    params: Vec<(String, String)>,
    body: Option<Value>,

    poller: Option<PollFn>,
    sync: bool,
    timeout: Option<Duration>,

    err: Option<ApiError>,
}

impl Request {
    /// `base_url` must be able to carry path segments; `Client` guarantees
    /// this for every request it creates.
    pub fn new(
        transport: Arc<dyn HttpClient>,
        verb: &str,
        base_url: &Url,
        codec: Arc<dyn Codec>,
        namespace_in_query: bool,
        preserve_resource_case: bool,
    ) -> Self {
        let (verb, err) = match verb.parse::<HttpMethod>() {
            Ok(method) => (method, None),
            Err(e) => (HttpMethod::Get, Some(e)),
        };
        Self {
            transport,
            codec,
            verb,
            base_url: base_url.clone(),
            namespace_in_query,
            preserve_resource_case,
            prefix: Vec::new(),
            namespace: None,
            resource: None,
            name: None,
            suffix: Vec::new(),
            params: Vec::new(),
            body: None,
            poller: None,
            sync: false,
            timeout: None,
            err,
        }
    }

    /// Path segments placed between the base address and the resource.
    pub fn prefix(mut self, segments: &str) -> Self {
        self.prefix.extend(split_segments(segments));
        self
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string()).filter(|ns| !ns.is_empty());
        self
    }

    /// The resource collection, e.g. `pods` or `operations`.
    pub fn resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Path segments placed after the resource name.
    pub fn suffix(mut self, segments: &str) -> Self {
        self.suffix.extend(split_segments(segments));
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Label selector in `key=value,key2=value2` form. Blank selectors are
    /// dropped rather than sent as an empty parameter.
    pub fn selector_param(self, key: &str, selector: &str) -> Self {
        let selector = selector.trim();
        if selector.is_empty() {
            return self;
        }
        self.param(key, selector)
    }

    pub fn body<T: Serialize + ?Sized>(mut self, object: &T) -> Self {
        match serde_json::to_value(object) {
            Ok(value) => self.body = Some(value),
            Err(e) => self.err = Some(ApiError::SerializationError(e.to_string())),
        }
        self
    }

    pub fn poller(mut self, poller: PollFn) -> Self {
        self.poller = Some(poller);
        self
    }

    /// Return the first in-progress status instead of polling.
    pub fn no_poll(mut self) -> Self {
        self.poller = None;
        self
    }

    /// Ask the server to finish the action before answering. An in-progress
    /// answer is returned as-is.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verb(&self) -> HttpMethod {
        self.verb
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    pub fn has_poller(&self) -> bool {
        self.poller.is_some()
    }

    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn resource_name(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn target_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn path_segments(&self) -> Vec<String> {
        let mut segments = self.prefix.clone();
        if let Some(ns) = &self.namespace {
            if !self.namespace_in_query {
                segments.push("namespaces".to_string());
                segments.push(ns.clone());
            }
        }
        if let Some(resource) = &self.resource {
            if self.preserve_resource_case {
                segments.push(resource.clone());
            } else {
                segments.push(resource.to_lowercase());
            }
        }
        if let Some(name) = &self.name {
            segments.push(name.clone());
        }
        segments.extend(self.suffix.iter().cloned());
        segments
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.params.clone();
        if let Some(ns) = &self.namespace {
            if self.namespace_in_query {
                pairs.push(("namespace".to_string(), ns.clone()));
            }
        }
        if self.sync {
            pairs.push(("sync".to_string(), "true".to_string()));
            if let Some(timeout) = self.timeout {
                pairs.push(("timeout".to_string(), format_timeout(timeout)));
            }
        }
        pairs
    }

    /// The fully resolved target address.
    pub fn url(&self) -> String {
        let mut url = self.base_url.clone();
        let segments = self.path_segments();
        if !segments.is_empty() {
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty().extend(&segments);
            }
        }
        let pairs = self.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        url.into()
    }

    /// The plain-data request `execute` would send.
    pub fn to_http_request(&self) -> Result<HttpRequest, ApiError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let mut headers = vec![("accept".to_string(), self.codec.content_type().to_string())];
        let body = match &self.body {
            Some(object) => {
                headers.push((
                    "content-type".to_string(),
                    self.codec.content_type().to_string(),
                ));
                Some(self.codec.encode(object)?)
            }
            None => None,
        };
        Ok(HttpRequest {
            method: self.verb,
            url: self.url(),
            headers,
            body,
        })
    }

    /// Perform the exchange, following the poll chain while the server
    /// reports the action as running.
    pub fn execute(self) -> Result<Outcome, ApiError> {
        let mut request = self;
        loop {
            let http = request.to_http_request()?;
            let response = request.transport.execute(&http, request.timeout)?;
            debug!(method = %http.method, url = %http.url, status = response.status, "request completed");

            let status = match request.transform_response(response)? {
                Outcome::InProgress(status) => status,
                complete => return Ok(complete),
            };
            match request.next_poll(&status) {
                Some(next) => request = next,
                None => return Ok(Outcome::InProgress(status)),
            }
        }
    }

    fn next_poll(&self, status: &Status) -> Option<Request> {
        if self.sync {
            return None;
        }
        let poller = self.poller.as_ref()?;
        let Some(name) = status.operation_name() else {
            debug!("in-progress status carries no operation name; not polling");
            return None;
        };
        let next = poller(name);
        if next.is_none() {
            debug!(operation = name, "poller declined to continue");
        }
        next
    }

    fn transform_response(&self, response: HttpResponse) -> Result<Outcome, ApiError> {
        if response.status == 404 {
            return Err(ApiError::NotFound);
        }
        if !response.is_success() {
            let status = self
                .codec
                .decode(&response.body)
                .ok()
                .and_then(|object| Status::from_object(&object));
            return Err(match status {
                Some(status) => ApiError::Status {
                    code: response.status,
                    status,
                },
                None => ApiError::HttpError {
                    status: response.status,
                    body: response.body,
                },
            });
        }

        let object = self.codec.decode(&response.body)?;
        if let Some(status) = Status::from_object(&object) {
            match status.status {
                StatusPhase::Working => return Ok(Outcome::InProgress(status)),
                StatusPhase::Failure => {
                    return Err(ApiError::Status {
                        code: status.code.unwrap_or(response.status),
                        status,
                    })
                }
                StatusPhase::Success | StatusPhase::Unknown => {}
            }
        }
        Ok(Outcome::Complete(object))
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("verb", &self.verb)
            .field("url", &self.url())
            .field("sync", &self.sync)
            .field("timeout", &self.timeout)
            .field("has_poller", &self.poller.is_some())
            .field("err", &self.err)
            .finish_non_exhaustive()
    }
}

fn split_segments(segments: &str) -> impl Iterator<Item = String> + '_ {
    segments
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}
