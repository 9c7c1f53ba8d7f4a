//! Blocking transport over `ureq`.
//!
//! ureq is configured to return every status as data and to never follow
//! redirects itself; wrap in `RedirectTransport` to follow them.

use std::time::Duration;

use tracing::debug;
use ureq::{Agent, RequestBuilder};

use crate::error::{ApiError, Result};
use crate::http::{Headers, Method, Request, Response};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    body_limit: u64,
}

impl UreqTransport {
    /// Largest response body read by default, in bytes.
    pub const DEFAULT_BODY_LIMIT: u64 = 256 * 1024 * 1024;

    pub fn new() -> Self {
        Self::build(None)
    }

    /// Abort any request that takes longer than `timeout` overall.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    /// Fail with a transport error on bodies larger than `limit` bytes.
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    fn build(timeout: Option<Duration>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self {
            agent,
            body_limit: Self::DEFAULT_BODY_LIMIT,
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &Headers) -> RequestBuilder<B> {
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    builder
}

impl Transport for UreqTransport {
    fn dispatch(&self, request: Request) -> Result<Response> {
        let method = request.method();
        let url = request.url();
        let headers = request.headers();
        let body = request.body().map(str::as_bytes);

        debug!(%method, url, "executing HTTP request");
        let result = if method.has_body() {
            let builder = match method {
                Method::Post => self.agent.post(url),
                Method::Put => self.agent.put(url),
                _ => self.agent.patch(url),
            };
            let builder = with_headers(builder, headers);
            match body {
                Some(body) => builder.send(body),
                None => builder.send_empty(),
            }
        } else {
            let builder = match method {
                Method::Get => self.agent.get(url),
                Method::Head => self.agent.head(url),
                _ => self.agent.delete(url),
            };
            let builder = with_headers(builder, headers);
            match body {
                Some(body) => builder.force_send_body().send(body),
                None => builder.call(),
            }
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let code = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value.to_string())))
            .collect();
        let body = if method == Method::Head {
            None
        } else {
            let bytes = response
                .body_mut()
                .with_config()
                .limit(self.body_limit)
                .read_to_vec()
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            Some(bytes)
        };

        debug!(status = code, url, "received HTTP response");
        Ok(Response::new(code, headers, body))
    }
}
