//! Connection-level configuration and verb dispatch.
//!
//! # Design
//! `Client` owns a normalized base address and an API version, both fixed at
//! construction, plus a handful of public fields callers may tune before
//! issuing calls. Every verb method returns a fresh `Request` seeded from
//! those fields; nothing a request does is written back to the client.
//!
//! The built-in poller is a closure over a clone of the client. Each poll
//! request it builds carries the same closure, so a chain keeps polling with
//! the configuration that was in effect when the original call was made.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::info;
use url::Url;

use crate::codec::Codec;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::HttpClient;
use crate::request::{PollFn, Request};
use crate::transport::UreqTransport;

/// Delay between polls of an in-progress operation.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(2);

/// Collection under which the server exposes in-progress operations.
pub const OPERATIONS_RESOURCE: &str = "operations";

/// Issues verb-based requests against resources under one base address.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    api_version: String,

    /// Encode the namespace as a query parameter and preserve resource case,
    /// as older API versions expect.
    pub legacy_behavior: bool,
    pub codec: Arc<dyn Codec>,
    pub transport: Arc<dyn HttpClient>,
    /// Replaces the built-in poller for every request this client creates.
    pub poller: Option<PollFn>,
    pub sync: bool,
    /// Zero disables the built-in poller.
    pub poll_period: Duration,
    pub timeout: Option<Duration>,
}

impl Client {
    /// Parse `base_url` and build a client around it.
    pub fn new(
        base_url: &str,
        api_version: &str,
        codec: Arc<dyn Codec>,
        legacy_behavior: bool,
    ) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(&parsed, api_version, codec, legacy_behavior)
    }

    /// Build a client from an already parsed address. The address is copied,
    /// given a trailing `/`, and stripped of query and fragment.
    pub fn from_url(
        base_url: &Url,
        api_version: &str,
        codec: Arc<dyn Codec>,
        legacy_behavior: bool,
    ) -> Result<Self, ApiError> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "address cannot carry a resource path".to_string(),
            });
        }
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            base_url: base,
            api_version: api_version.to_string(),
            legacy_behavior,
            codec,
            transport: Arc::new(UreqTransport::default()),
            poller: None,
            sync: false,
            poll_period: DEFAULT_POLL_PERIOD,
            timeout: None,
        })
    }

    pub fn from_config(config: &ClientConfig, codec: Arc<dyn Codec>) -> Result<Self, ApiError> {
        let mut client = Self::new(
            &config.base_url,
            &config.api_version,
            codec,
            config.legacy_behavior,
        )?;
        client.sync = config.sync;
        client.poll_period = config.poll_period();
        client.timeout = config.timeout();
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The API version this client was constructed for.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Begin a request with an HTTP method token.
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use restclient_core::{Client, JsonCodec};
    /// let client = Client::new("http://localhost:3000/api/v1", "v1", Arc::new(JsonCodec), false)?;
    /// let pods = client
    ///     .verb("GET")
    ///     .resource("pods")
    ///     .selector_param("labels", "area=staging")
    ///     .timeout(Duration::from_secs(10))
    ///     .execute()?;
    /// # Ok::<(), restclient_core::ApiError>(())
    /// ```
    pub fn verb(&self, verb: &str) -> Request {
        let poller = self.poller.clone().unwrap_or_else(|| self.default_poller());
        let request = Request::new(
            self.transport.clone(),
            verb,
            &self.base_url,
            self.codec.clone(),
            self.legacy_behavior,
            self.legacy_behavior,
        )
        .poller(poller)
        .sync(self.sync);
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    pub fn post(&self) -> Request {
        self.verb("POST")
    }

    pub fn put(&self) -> Request {
        self.verb("PUT")
    }

    pub fn get(&self) -> Request {
        self.verb("GET")
    }

    pub fn delete(&self) -> Request {
        self.verb("DELETE")
    }

    /// A single, non-polling status check of the named operation.
    pub fn operation(&self, name: &str) -> Request {
        self.get()
            .resource(OPERATIONS_RESOURCE)
            .name(name)
            .sync(false)
            .no_poll()
    }

    /// Wait one poll period, then check the operation again with this same
    /// poller installed. A zero period stops the chain immediately.
    pub fn default_poll(&self, name: &str) -> Option<Request> {
        if self.poll_period.is_zero() {
            return None;
        }
        info!(operation = name, "waiting for completion of operation");
        thread::sleep(self.poll_period);
        Some(self.operation(name).poller(self.default_poller()))
    }

    fn default_poller(&self) -> PollFn {
        let client = self.clone();
        Arc::new(move |name: &str| client.default_poll(name))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .field("legacy_behavior", &self.legacy_behavior)
            .field("custom_poller", &self.poller.is_some())
            .field("sync", &self.sync)
            .field("poll_period", &self.poll_period)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
