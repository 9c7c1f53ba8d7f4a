//! The transport seam.
//!
//! A `Transport` turns a `Request` into a `Response` and nothing more: it
//! must not interpret API semantics. Redirect following and conditional
//! caching are themselves transports wrapping an inner one, so a pipeline
//! is assembled by nesting:
//!
//! ```rust,ignore
//! let transport = CachedTransport::new(
//!     MemoryCache::new(),
//!     RedirectTransport::new(UreqTransport::new()),
//! );
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::http::{Request, Response};

/// Executes a request and returns the raw response.
///
/// Fails with `ApiError::Transport` when no status line or headers could be
/// obtained. Non-2xx statuses are *not* errors at this layer.
pub trait Transport {
    fn dispatch(&self, request: Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn dispatch(&self, request: Request) -> Result<Response> {
        (**self).dispatch(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn dispatch(&self, request: Request) -> Result<Response> {
        (**self).dispatch(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn dispatch(&self, request: Request) -> Result<Response> {
        (**self).dispatch(request)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::error::ApiError;
    use crate::http::Headers;

    /// Replays canned responses in order and records every request it sees.
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: RefCell<VecDeque<Response>>,
        pub requests: RefCell<Vec<Request>>,
    }

    impl ScriptedTransport {
        pub fn new(responses: impl IntoIterator<Item = Response>) -> Self {
            Self {
                responses: RefCell::new(responses.into_iter().collect()),
                requests: RefCell::new(Vec::new()),
            }
        }

        pub fn request(&self, index: usize) -> Request {
            self.requests.borrow()[index].clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn dispatch(&self, request: Request) -> Result<Response> {
            self.requests.borrow_mut().push(request);
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| ApiError::Transport("no scripted response left".to_string()))
        }
    }

    pub fn response(code: u16, headers: &[(&str, &str)], body: Option<&str>) -> Response {
        let headers: Headers = headers.iter().copied().collect();
        Response::new(code, headers, body.map(|body| body.as_bytes().to_vec()))
    }
}
