//! OAuth tokens and the authorization-code login flow.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::http::{Headers, Method, Request, Response};
use crate::storage::SessionStorage;
use crate::transport::Transport;

/// Scopes implied by a broader one: `(narrower, broader)`.
const SCOPE_SUPERIORS: &[(&str, &str)] = &[
    ("user:email", "user"),
    ("user:follow", "user"),
    ("notifications", "repo"),
];

/// An access token with the scopes it was granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    value: String,
    #[serde(rename = "type", default)]
    token_type: String,
    #[serde(default)]
    scopes: Vec<String>,
}

impl Token {
    pub fn new(value: impl Into<String>, token_type: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            value: value.into(),
            token_type: token_type.into(),
            scopes,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Whether the token grants `scope`, directly or through a broader scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        if self.scopes.iter().any(|s| s == scope) {
            return true;
        }
        SCOPE_SUPERIORS
            .iter()
            .find(|(narrower, _)| *narrower == scope)
            .is_some_and(|(_, broader)| self.scopes.iter().any(|s| s == broader))
    }
}

/// OAuth application credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Configuration {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
        }
    }
}

const STATE_KEY: &str = "auth.state";
const TOKEN_KEY: &str = "auth.token";

#[derive(Serialize)]
struct AuthorizeQuery<'a> {
    client_id: &'a str,
    redirect_uri: &'a str,
    scope: String,
    state: &'a str,
}

#[derive(Serialize)]
struct TokenExchange<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    scope: String,
}

#[derive(Deserialize)]
struct TokenFailure {
    error: String,
}

/// Obtains a token through the authorization-code flow.
///
/// The host redirects the user to `authorization_url`, then hands the `code`
/// and `state` query parameters of the callback to `obtain_token`.
pub struct Login<S, T> {
    conf: Configuration,
    storage: S,
    transport: T,
    auth_url: String,
    token_url: String,
}

impl<S: SessionStorage, T: Transport> Login<S, T> {
    pub fn new(conf: Configuration, storage: S, transport: T) -> Self {
        Self {
            conf,
            storage,
            transport,
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
        }
    }

    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// URL asking the user to grant the configured scopes.
    ///
    /// A fresh anti-forgery state is remembered in the session storage.
    pub fn authorization_url(&self, back_url: &str) -> Result<String> {
        let state = Uuid::new_v4().simple().to_string();
        let query = serde_urlencoded::to_string(AuthorizeQuery {
            client_id: &self.conf.client_id,
            redirect_uri: back_url,
            scope: self.conf.scopes.join(","),
            state: &state,
        })
        .map_err(|e| ApiError::Login(e.to_string()))?;

        self.storage.set(STATE_KEY, serde_json::Value::String(state));
        Ok(format!("{}?{query}", self.auth_url))
    }

    /// Exchange the callback `code` for a token and remember it.
    pub fn obtain_token(&self, code: &str, state: &str) -> Result<Token> {
        let expected = self.storage.get(STATE_KEY);
        if expected.as_ref().and_then(|v| v.as_str()) != Some(state) {
            return Err(ApiError::Login("OAuth security state does not match.".to_string()));
        }

        let body = serde_urlencoded::to_string(TokenExchange {
            client_id: &self.conf.client_id,
            client_secret: &self.conf.client_secret,
            code,
        })
        .map_err(|e| ApiError::Login(e.to_string()))?;

        let headers: Headers = [
            ("Accept", "application/json"),
            ("Content-Type", "application/x-www-form-urlencoded"),
        ]
        .into_iter()
        .collect();
        let request = Request::new(Method::Post, self.token_url.as_str(), headers, Some(body));

        debug!(url = request.url(), "exchanging OAuth code for token");
        let response = match self.transport.dispatch(request) {
            Ok(response) => response,
            Err(ApiError::Transport(e)) => {
                return Err(ApiError::Login(format!("HTTP request failed. {e}")));
            }
            Err(e) => return Err(e),
        };

        let grant: TokenGrant = match response.code() {
            Response::S200_OK => parse_json(&response)?,
            Response::S404_NOT_FOUND => {
                let failure: TokenFailure = parse_json(&response)?;
                return Err(ApiError::Login(failure.error));
            }
            _ => return Err(ApiError::Login("Unexpected response.".to_string())),
        };

        let scopes = if grant.scope.is_empty() {
            Vec::new()
        } else {
            grant.scope.split(',').map(str::to_string).collect()
        };
        let token = Token::new(grant.access_token, grant.token_type, scopes);

        self.storage.set(TOKEN_KEY, serde_json::to_value(&token)?);
        self.storage.remove(STATE_KEY);
        Ok(token)
    }

    pub fn has_token(&self) -> bool {
        self.storage.get(TOKEN_KEY).is_some()
    }

    pub fn token(&self) -> Result<Token> {
        let stored = self
            .storage
            .get(TOKEN_KEY)
            .ok_or_else(|| ApiError::Logic("Token has not been obtained yet.".to_string()))?;
        Ok(serde_json::from_value(stored)?)
    }

    pub fn drop_token(&self) {
        self.storage.remove(TOKEN_KEY);
    }
}

fn parse_json<D: serde::de::DeserializeOwned>(response: &Response) -> Result<D> {
    serde_json::from_slice(response.body().unwrap_or_default())
        .map_err(|_| ApiError::Login("Bad JSON in response.".to_string()))
}
