//! Iteration over paginated GET results.
//!
//! The next page is found in the `Link: <url>; rel="next"` response header.
//! Pages are fetched lazily and each one at most once per position.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::client::Api;
use crate::error::{ApiError, Result};
use crate::http::{Request, Response};
use crate::transport::Transport;

static NEXT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>;\s*rel="next""#).expect("valid regex"));

pub struct Paginator<'a, T> {
    api: &'a Api<T>,
    first: Request,
    request: Option<Request>,
    response: Option<Response>,
    limit: Option<usize>,
    counter: usize,
}

impl<'a, T: Transport> Paginator<'a, T> {
    pub fn new(api: &'a Api<T>, request: Request) -> Self {
        Self {
            api,
            request: Some(request.clone()),
            first: request,
            response: None,
            limit: None,
            counter: 0,
        }
    }

    /// Stop after `limit` pages; `None` follows every `next` link.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Go back to the first page. Nothing is fetched until `current`.
    pub fn rewind(&mut self) {
        self.request = Some(self.first.clone());
        self.response = None;
        self.counter = 0;
    }

    pub fn valid(&self) -> bool {
        self.request.is_some() && self.limit.map_or(true, |limit| self.counter < limit)
    }

    /// The response for the current page, fetched on first access.
    pub fn current(&mut self) -> Result<&Response> {
        if self.response.is_none() {
            let request = self
                .request
                .clone()
                .ok_or_else(|| ApiError::Logic("Paginator has no more pages.".to_string()))?;
            debug!(url = request.url(), page = self.counter + 1, "fetching page");
            self.response = Some(self.api.request(request)?);
        }
        match &self.response {
            Some(response) => Ok(response),
            None => Err(ApiError::Logic("Paginator has no more pages.".to_string())),
        }
    }

    /// Move to the page referenced by the current response's `next` link.
    pub fn advance(&mut self) -> Result<()> {
        self.step().map(|_| ())
    }

    /// The `page` query parameter of the current request URL.
    pub fn page(&self) -> Option<u64> {
        self.request.as_ref().map(|request| Self::parse_page(request.url()))
    }

    fn step(&mut self) -> Result<Response> {
        self.current()?;
        let response = self
            .response
            .take()
            .ok_or_else(|| ApiError::Logic("Paginator has no more pages.".to_string()))?;

        let next = response.header("Link").and_then(|link| Self::parse_link(link, "next"));
        self.request = match (self.request.take(), next) {
            (Some(request), Some(url)) => Some(request.with_url(url)),
            _ => None,
        };
        self.counter += 1;
        Ok(response)
    }

    /// Value of the `page` query parameter, at least 1.
    pub fn parse_page(url: &str) -> u64 {
        let Some((_, query)) = url.split_once('?') else {
            return 1;
        };
        let query = query.split('#').next().unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse::<i64>().ok())
            .map_or(1, |page| page.max(1) as u64)
    }

    /// URL of the `rel` entry in a `Link` header.
    pub fn parse_link(link: &str, rel: &str) -> Option<String> {
        if rel == "next" {
            return NEXT_LINK.captures(link).map(|caps| caps[1].to_string());
        }
        let pattern = format!(r#"<([^>]+)>;\s*rel="{}""#, regex::escape(rel));
        let re = Regex::new(&pattern).ok()?;
        re.captures(link).map(|caps| caps[1].to_string())
    }
}

impl<T: Transport> Iterator for Paginator<'_, T> {
    type Item = Result<Response>;

    /// Yields each page in order. A failure is yielded once and ends the
    /// iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.valid() {
            return None;
        }
        match self.step() {
            Ok(response) => Some(Ok(response)),
            Err(e) => {
                self.request = None;
                self.response = None;
                Some(Err(e))
            }
        }
    }
}
