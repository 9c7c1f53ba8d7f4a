//! Synchronous client core for a versioned JSON REST API.
//!
//! # Overview
//! Builds `Request` values from path templates and interprets `Response`
//! values without owning the network. A `Transport` executes the round-trip;
//! `UreqTransport` (feature `ureq`) is the stock one, and hosts can plug in
//! their own.
//!
//! # Design
//! - `Api::create_request` and `decode` are pure, so the I/O boundary stays
//!   explicit and testable.
//! - Redirect following and conditional caching are `Transport` decorators
//!   (`RedirectTransport`, `CachedTransport`) stacked around the real one.
//! - Every response links to the responses that preceded it (redirect hops,
//!   revalidation 304s) through `Response::previous`.

pub mod cache;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod oauth;
pub mod paginator;
pub mod params;
pub mod redirect;
pub mod storage;
pub mod template;
pub mod transport;
#[cfg(feature = "ureq")]
pub mod ureq_transport;

pub use cache::CachedTransport;
pub use client::Api;
pub use config::ApiConfig;
pub use decode::Content;
pub use error::{ApiError, Result};
pub use http::{Body, Headers, Method, Request, Response};
pub use oauth::{Configuration, Login, Token};
pub use paginator::Paginator;
pub use params::{Param, Parameters};
pub use redirect::RedirectTransport;
pub use storage::{Cache, FileCache, MemoryCache, MemorySessionStorage, SessionStorage};
pub use transport::Transport;
#[cfg(feature = "ureq")]
pub use ureq_transport::UreqTransport;
