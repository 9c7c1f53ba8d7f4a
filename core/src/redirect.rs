//! Redirect following.

use tracing::debug;

use crate::error::Result;
use crate::http::{Request, Response};
use crate::transport::Transport;

/// Follows `Location` on redirect statuses, keeping every hop linked.
///
/// The returned response carries its predecessors, so
/// `response.history()` lists each redirect that led to it. When the hop
/// budget runs out the last response is returned as-is; a decoder will then
/// classify it by its status.
#[derive(Debug, Clone)]
pub struct RedirectTransport<T> {
    inner: T,
    redirect_codes: Vec<u16>,
    max_redirects: usize,
}

impl<T> RedirectTransport<T> {
    pub const DEFAULT_MAX_REDIRECTS: usize = 5;

    pub fn new(inner: T) -> Self {
        Self {
            inner,
            redirect_codes: vec![
                Response::S301_MOVED_PERMANENTLY,
                Response::S302_FOUND,
                Response::S307_TEMPORARY_REDIRECT,
            ],
            max_redirects: Self::DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_redirect_codes(mut self, codes: &[u16]) -> Self {
        self.redirect_codes = codes.to_vec();
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for RedirectTransport<T> {
    fn dispatch(&self, request: Request) -> Result<Response> {
        let mut request = request;
        let mut remaining = self.max_redirects;
        let mut previous = None;

        loop {
            debug!(method = %request.method(), url = request.url(), "dispatching request");
            let response = self.inner.dispatch(request.clone())?.with_previous(previous.take())?;
            debug!(status = response.code(), "received response");

            let location = if remaining > 0 && self.redirect_codes.contains(&response.code()) {
                response.header("Location").map(str::to_string)
            } else {
                None
            };

            let Some(location) = location else {
                return Ok(response);
            };

            remaining -= 1;
            debug!(status = response.code(), %location, remaining, "following redirect");
            request = request.with_url(location);
            previous = Some(response);
        }
    }
}
