//! Top-level API client.
//!
//! # Design
//! `Api` owns a `Transport` chosen by the caller; there is no process-wide
//! default. Request construction (`create_request`) and response
//! interpretation (`decode`) are pure and usable on their own, so the host
//! can execute requests itself and still reuse templating and error
//! classification. `request` glues them together by injecting the headers
//! every call needs and handing the request to the transport.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ApiConfig;
use crate::decode::{self, Content};
use crate::error::{ApiError, Result};
use crate::http::{Body, Headers, Method, Request, Response};
use crate::oauth::Token;
use crate::paginator::Paginator;
use crate::params::Parameters;
use crate::template;
use crate::transport::Transport;

static ABSOLUTE_HTTPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https://[^/]+)(/.*)?$").expect("valid regex"));

/// Client for a versioned JSON REST API.
#[derive(Debug, Clone)]
pub struct Api<T> {
    transport: T,
    config: ApiConfig,
    token: Option<Token>,
}

impl<T: Transport> Api<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ApiConfig::default())
    }

    pub fn with_config(transport: T, config: ApiConfig) -> Self {
        Self {
            transport,
            config,
            token: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn set_token(&mut self, token: Option<Token>) -> &mut Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn set_default_parameters(&mut self, parameters: Parameters) -> &mut Self {
        self.config.default_parameters = parameters;
        self
    }

    pub fn default_parameters(&self) -> &Parameters {
        &self.config.default_parameters
    }

    pub fn set_default_accept(&mut self, accept: impl Into<String>) -> &mut Self {
        self.config.default_accept = accept.into();
        self
    }

    pub fn default_accept(&self) -> &str {
        &self.config.default_accept
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.config.url = url.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// A copy of this client talking to another base URL.
    pub fn with_url(&self, url: impl Into<String>) -> Self
    where
        T: Clone,
    {
        let mut api = self.clone();
        api.set_url(url);
        api
    }

    pub fn get(&self, path: &str, parameters: &Parameters, headers: Headers) -> Result<Response> {
        self.request(self.create_request(Method::Get, path, parameters, headers, None)?)
    }

    pub fn head(&self, path: &str, parameters: &Parameters, headers: Headers) -> Result<Response> {
        self.request(self.create_request(Method::Head, path, parameters, headers, None)?)
    }

    pub fn delete(&self, path: &str, parameters: &Parameters, headers: Headers) -> Result<Response> {
        self.request(self.create_request(Method::Delete, path, parameters, headers, None)?)
    }

    pub fn post(
        &self,
        path: &str,
        body: Option<Body>,
        parameters: &Parameters,
        headers: Headers,
    ) -> Result<Response> {
        self.request(self.create_request(Method::Post, path, parameters, headers, body)?)
    }

    pub fn patch(
        &self,
        path: &str,
        body: Option<Body>,
        parameters: &Parameters,
        headers: Headers,
    ) -> Result<Response> {
        self.request(self.create_request(Method::Patch, path, parameters, headers, body)?)
    }

    pub fn put(
        &self,
        path: &str,
        body: Option<Body>,
        parameters: &Parameters,
        headers: Headers,
    ) -> Result<Response> {
        self.request(self.create_request(Method::Put, path, parameters, headers, body)?)
    }

    /// Send `request` with the client's default headers.
    ///
    /// `Accept`, `Time-Zone`, `User-Agent` and, with a token set,
    /// `Authorization` are only added when the request lacks them.
    pub fn request(&self, request: Request) -> Result<Response> {
        let mut request = request
            .with_header("Accept", self.config.default_accept.as_str())
            .with_header("Time-Zone", self.config.time_zone.as_str())
            .with_header("User-Agent", self.config.user_agent.as_str());
        if let Some(token) = &self.token {
            request = request.with_header("Authorization", format!("token {}", token.value()));
        }

        debug!(method = %request.method(), url = request.url(), "sending API request");
        self.transport.dispatch(request)
    }

    /// Build a request from a path template.
    ///
    /// `path` is either relative to the base URL, prefixed with the base URL,
    /// or an absolute `https://` URL of another host. Paths without `{` use
    /// `:name` placeholders and get left-over parameters as a query string;
    /// paths with `{` are RFC 6570 templates and drop left-overs. A JSON body
    /// sets `Content-Type: application/json; charset=utf-8`.
    pub fn create_request(
        &self,
        method: Method,
        path: &str,
        parameters: &Parameters,
        headers: Headers,
        body: Option<Body>,
    ) -> Result<Request> {
        let (base, path) = self.resolve_base(path);

        let parameters = parameters.merged_with_defaults(&self.config.default_parameters);
        let path = if path.contains('{') {
            template::expand_uri_template(path, &parameters)
        } else {
            template::expand_colon_parameters(path, &parameters)?
        };

        let url = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));

        let mut headers = headers;
        let body = match body {
            None => None,
            Some(Body::Text(text)) => Some(text),
            Some(Body::Json(value)) => {
                headers.set("Content-Type", "application/json; charset=utf-8");
                Some(serde_json::to_string(&value)?)
            }
        };

        Ok(Request::new(method, url, headers, body))
    }

    /// Split `path` into the base URL to use and the remaining path.
    fn resolve_base<'p>(&'p self, path: &'p str) -> (&'p str, &'p str) {
        let base = self.config.url.as_str();
        if let Some(prefix) = path.get(..base.len()) {
            if prefix.eq_ignore_ascii_case(base) {
                return (base, &path[base.len()..]);
            }
        }
        if let Some(caps) = ABSOLUTE_HTTPS.captures(path) {
            if let Some(host) = caps.get(1) {
                return (host.as_str(), caps.get(2).map_or("", |m| m.as_str()));
            }
        }
        (base, path)
    }

    /// See [`decode::decode`].
    pub fn decode(&self, response: &Response, ok_codes: Option<&[u16]>) -> Result<Content> {
        decode::decode(response, ok_codes)
    }

    /// Decode and deserialize a JSON response into `D`.
    pub fn decode_into<D: DeserializeOwned>(&self, response: &Response, ok_codes: Option<&[u16]>) -> Result<D> {
        let invalid = |message: String| ApiError::InvalidResponse {
            message,
            response: Box::new(response.clone()),
        };
        match decode::decode(response, ok_codes)? {
            Content::Json(value) => serde_json::from_value(value)
                .map_err(|e| invalid(format!("JSON does not match the expected shape: {e}"))),
            Content::Raw(_) => Err(invalid("Response is not JSON.".to_string())),
        }
    }

    /// Iterate over GET results following `Link: <...>; rel="next"`.
    pub fn paginator(&self, path: &str, parameters: &Parameters, headers: Headers) -> Result<Paginator<'_, T>> {
        let request = self.create_request(Method::Get, path, parameters, headers, None)?;
        Ok(Paginator::new(self, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Param;
    use crate::transport::testing::{response, ScriptedTransport};
    use serde::Deserialize;
    use serde_json::json;

    fn api() -> Api<ScriptedTransport> {
        Api::new(ScriptedTransport::default())
    }

    fn build(api: &Api<ScriptedTransport>, path: &str, params: &Parameters) -> Result<Request> {
        api.create_request(Method::Get, path, params, Headers::new(), None)
    }

    #[test]
    fn relative_path_uses_base_url() {
        let params = Parameters::new().with("user", "milo");
        let req = build(&api(), "/users/:user/repos", &params).unwrap();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.url(), "https://api.github.com/users/milo/repos");
        assert!(req.body().is_none());
    }

    #[test]
    fn path_without_leading_slash() {
        let req = build(&api(), "user", &Parameters::new()).unwrap();
        assert_eq!(req.url(), "https://api.github.com/user");
    }

    #[test]
    fn base_url_prefix_is_stripped_case_insensitively() {
        let params = Parameters::new().with("page", 2);
        let req = build(&api(), "HTTPS://API.GITHUB.COM/user/repos", &params).unwrap();
        assert_eq!(req.url(), "https://api.github.com/user/repos?page=2");
    }

    #[test]
    fn non_https_base_prefix_is_allowed() {
        let mut api = api();
        api.set_url("http://localhost:3000");
        let req = build(&api, "http://localhost:3000/users/:u", &Parameters::new().with("u", "x")).unwrap();
        assert_eq!(req.url(), "http://localhost:3000/users/x");
    }

    #[test]
    fn foreign_https_host_becomes_base() {
        let params = Parameters::new().with("id", 7);
        let req = build(&api(), "https://uploads.github.com/repos/:id/assets", &params).unwrap();
        assert_eq!(req.url(), "https://uploads.github.com/repos/7/assets");

        let req = build(&api(), "https://uploads.github.com", &Parameters::new()).unwrap();
        assert_eq!(req.url(), "https://uploads.github.com/");
    }

    #[test]
    fn uri_template_mode_drops_leftovers() {
        let params = Parameters::new().with("q", "rust lang").with("unused", "x");
        let req = build(&api(), "/search/repositories{?q,sort,order}", &params).unwrap();
        assert_eq!(req.url(), "https://api.github.com/search/repositories?q=rust%20lang");
    }

    #[test]
    fn default_parameters_fill_in_and_lose_to_explicit() {
        let mut api = api();
        api.set_default_parameters(Parameters::new().with("owner", "nette").with("per_page", 100));

        let req = build(&api, "/repos/:owner/:repo", &Parameters::new().with("repo", "tester")).unwrap();
        assert_eq!(req.url(), "https://api.github.com/repos/nette/tester?per_page=100");

        let explicit = Parameters::new().with("repo", "utils").with("owner", "milo");
        let req = build(&api, "/repos/:owner/:repo", &explicit).unwrap();
        assert_eq!(req.url(), "https://api.github.com/repos/milo/utils?per_page=100");

        let req = build(&api, "/repos{/owner,repo}", &Parameters::new().with("repo", "x")).unwrap();
        assert_eq!(req.url(), "https://api.github.com/repos/nette/x");
    }

    #[test]
    fn missing_colon_parameter_fails() {
        let err = build(&api(), "/users/:user", &Parameters::new().with("user", Param::Null)).unwrap_err();
        assert_eq!(err.to_string(), "Missing parameter 'user' for URL path '/users/:user'.");
    }

    #[test]
    fn json_body_is_encoded_and_typed() {
        let req = api()
            .create_request(
                Method::Post,
                "/repos/milo/test/issues",
                &Parameters::new(),
                Headers::new(),
                Some(Body::Json(json!({"title": "Příliš žluťoučký"}))),
            )
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json; charset=utf-8"));
        let body: serde_json::Value = serde_json::from_str(req.body().unwrap()).unwrap();
        assert_eq!(body["title"], "Příliš žluťoučký");
        assert!(req.body().unwrap().contains("žluťoučký"));
    }

    #[test]
    fn text_body_is_sent_verbatim() {
        let headers: Headers = [("Content-Type", "text/plain")].into_iter().collect();
        let req = api()
            .create_request(Method::Put, "/x", &Parameters::new(), headers, Some(Body::from("raw")))
            .unwrap();
        assert_eq!(req.body(), Some("raw"));
        assert_eq!(req.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn request_injects_default_headers_without_overriding() {
        let api = Api::new(ScriptedTransport::new([response(200, &[], None)]));
        let headers: Headers = [("Accept", "application/vnd.github.raw")].into_iter().collect();
        api.get("/user", &Parameters::new(), headers).unwrap();

        let sent = api.transport().request(0);
        assert_eq!(sent.header("accept"), Some("application/vnd.github.raw"));
        assert_eq!(sent.header("time-zone"), Some("UTC"));
        assert!(sent.header("user-agent").unwrap().starts_with("ghapi-core/"));
        assert!(sent.header("authorization").is_none());
    }

    #[test]
    fn token_is_sent_as_authorization() {
        let mut api = Api::new(ScriptedTransport::new([response(200, &[], None)]));
        api.set_token(Some(Token::new("secret", "bearer", vec![])));
        api.head("/user", &Parameters::new(), Headers::new()).unwrap();
        let sent = api.transport().request(0);
        assert_eq!(sent.method(), Method::Head);
        assert_eq!(sent.header("Authorization"), Some("token secret"));
    }

    #[test]
    fn verbs_map_to_methods() {
        let api = Api::new(ScriptedTransport::new((0..3).map(|_| response(204, &[], None))));
        api.delete("/a", &Parameters::new(), Headers::new()).unwrap();
        api.patch("/a", Some(Body::Json(json!({}))), &Parameters::new(), Headers::new()).unwrap();
        api.put("/a", None, &Parameters::new(), Headers::new()).unwrap();

        let methods: Vec<Method> = (0..3).map(|i| api.transport().request(i).method()).collect();
        assert_eq!(methods, vec![Method::Delete, Method::Patch, Method::Put]);
    }

    #[test]
    fn with_url_leaves_original_untouched() {
        #[derive(Clone)]
        struct Noop;
        impl Transport for Noop {
            fn dispatch(&self, _request: Request) -> Result<Response> {
                Ok(Response::new(200, Headers::new(), None))
            }
        }

        let api = Api::new(Noop);
        let other = api.with_url("https://ghe.example.com/api/v3");
        assert_eq!(api.url(), "https://api.github.com");
        assert_eq!(other.url(), "https://ghe.example.com/api/v3");
        let req = other
            .create_request(Method::Get, "/user", &Parameters::new(), Headers::new(), None)
            .unwrap();
        assert_eq!(req.url(), "https://ghe.example.com/api/v3/user");
    }

    #[test]
    fn decode_into_typed_value() {
        #[derive(Debug, Deserialize)]
        struct User {
            login: String,
        }
        let r = response(200, &[("Content-Type", "application/json")], Some(r#"{"login":"milo"}"#));
        let user: User = api().decode_into(&r, None).unwrap();
        assert_eq!(user.login, "milo");

        let raw = response(200, &[], Some("plain"));
        assert!(matches!(
            api().decode_into::<User>(&raw, None).unwrap_err(),
            ApiError::InvalidResponse { .. }
        ));
    }
}
