//! Conditional caching with `ETag` / `Last-Modified` revalidation.
//!
//! # Design
//! The cache key is method, URL and the `Accept`, `Accept-Encoding` and
//! `Authorization` request headers joined with `.`. It ignores `Vary`, so
//! two responses that differ only by some other request header share one
//! entry.
//!
//! A 200 response is stored when it carries a validator and is not marked
//! `max-age=0` or `must-revalidate`. On a later call the stored validators
//! are sent as `If-None-Match` / `If-Modified-Since`; a 304 answer is
//! replaced by the stored response, linked to the live 304 as predecessor.

use tracing::debug;

use crate::error::Result;
use crate::http::{Request, Response};
use crate::storage::Cache;
use crate::transport::Transport;

/// Caching wrapper around another transport.
#[derive(Debug)]
pub struct CachedTransport<C, T> {
    cache: C,
    inner: T,
    forbid_recheck: bool,
}

impl<C: Cache, T: Transport> CachedTransport<C, T> {
    pub fn new(cache: C, inner: T) -> Self {
        Self {
            cache,
            inner,
            forbid_recheck: false,
        }
    }

    /// Serve cached entries without asking the server whether they are
    /// still current. Meant for development against a rate-limited API.
    pub fn forbid_recheck(mut self, forbid: bool) -> Self {
        self.forbid_recheck = forbid;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<C: Cache, T: Transport> Transport for CachedTransport<C, T> {
    fn dispatch(&self, request: Request) -> Result<Response> {
        let key = cache_key(&request);
        let cached = self.cache.load(&key);

        let mut request = request;
        if let Some(cached) = &cached {
            if self.forbid_recheck {
                debug!(url = request.url(), "serving cached response without recheck");
                return Ok(cached.clone());
            }
            if let Some(last_modified) = cached.header("Last-Modified") {
                request = request.with_header("If-Modified-Since", last_modified);
            }
            if let Some(etag) = cached.header("ETag") {
                request = request.with_header("If-None-Match", etag);
            }
            debug!(url = request.url(), "revalidating cached response");
        }

        let response = self.inner.dispatch(request)?;

        if is_cacheable(&response) {
            debug!(status = response.code(), "storing response in cache");
            self.cache.save(&key, response.snapshot());
        }

        match cached {
            Some(cached) if response.is_code(Response::S304_NOT_MODIFIED) => {
                debug!("not modified, using cached response");
                cached.snapshot().with_previous(Some(response))
            }
            _ => Ok(response),
        }
    }
}

/// Identity of a request for caching purposes.
pub fn cache_key(request: &Request) -> String {
    [
        request.method().as_str(),
        request.url(),
        request.header("Accept").unwrap_or_default(),
        request.header("Accept-Encoding").unwrap_or_default(),
        request.header("Authorization").unwrap_or_default(),
    ]
    .join(".")
}

fn is_cacheable(response: &Response) -> bool {
    if !response.is_code(Response::S200_OK) {
        return false;
    }
    let cache_control = response.header("Cache-Control").unwrap_or_default().to_ascii_lowercase();
    if cache_control.contains("max-age=0") || cache_control.contains("must-revalidate") {
        return false;
    }
    response.has_header("ETag") || response.has_header("Last-Modified")
}
