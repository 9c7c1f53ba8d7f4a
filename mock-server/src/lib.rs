//! In-memory imitation of the GitHub REST API used by the integration tests.
//!
//! Serves paginated issues with `Link` headers, users with `ETag`
//! revalidation, file deletion with a JSON body, a binary tarball,
//! redirecting endpoints, a rate-limited endpoint and a header echo.
//! Absolute URLs in `Link` and `Location` are built from the request's
//! `Host` header.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

const DEFAULT_PER_PAGE: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateIssue {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteFile {
    pub message: Option<String>,
    pub sha: Option<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Default)]
pub struct Store {
    /// Issues keyed by `owner/repo`.
    pub issues: HashMap<String, Vec<Issue>>,
    pub users: HashMap<String, User>,
}

impl Store {
    pub fn seeded() -> Self {
        let issues = (1..=5)
            .map(|number| Issue {
                number,
                title: format!("Issue #{number}"),
                body: None,
            })
            .collect();
        let users = [("milo", 1, "Miloslav"), ("octocat", 2, "The Octocat")]
            .into_iter()
            .map(|(login, id, name)| {
                let user = User {
                    login: login.to_string(),
                    id,
                    name: name.to_string(),
                };
                (login.to_string(), user)
            })
            .collect();
        Self {
            issues: HashMap::from([("nette/tester".to_string(), issues)]),
            users,
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    Router::new()
        .route("/repos/{owner}/{repo}/issues", get(list_issues).post(create_issue))
        .route("/repos/{owner}/{repo}/contents/{*path}", delete(delete_file))
        .route("/repos/{owner}/{repo}/tarball", get(tarball))
        .route("/users/{user}", get(get_user))
        .route("/old/users/{user}", get(moved_user))
        .route("/loop/{n}", get(redirect_loop))
        .route("/rate-limited", get(rate_limited))
        .route("/echo", get(echo))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn origin(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "Not Found", "documentation_url": "https://docs.github.com/rest"})),
    )
        .into_response()
}

async fn list_issues(
    State(db): State<Db>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    let store = db.read().await;
    let Some(issues) = store.issues.get(&format!("{owner}/{repo}")) else {
        return not_found();
    };

    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
    let page = query.page.unwrap_or(1).max(1);
    let last = issues.len().div_ceil(per_page).max(1);
    let items: Vec<Issue> = issues.iter().skip((page - 1) * per_page).take(per_page).cloned().collect();
    debug!(%owner, %repo, page, per_page, count = items.len(), "listing issues");

    let base = format!("{}/repos/{owner}/{repo}/issues", origin(&headers));
    let mut links = Vec::new();
    if page < last {
        links.push(format!("<{base}?page={}&per_page={per_page}>; rel=\"next\"", page + 1));
    }
    links.push(format!("<{base}?page={last}&per_page={per_page}>; rel=\"last\""));

    ([(header::LINK, links.join(", "))], Json(items)).into_response()
}

async fn create_issue(
    State(db): State<Db>,
    Path((owner, repo)): Path<(String, String)>,
    Json(input): Json<CreateIssue>,
) -> Response {
    let title = input.title.unwrap_or_default();
    if title.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Validation Failed",
                "errors": [{"resource": "Issue", "field": "title", "code": "missing_field"}],
            })),
        )
            .into_response();
    }

    let mut store = db.write().await;
    let issues = store.issues.entry(format!("{owner}/{repo}")).or_default();
    let issue = Issue {
        number: issues.len() as u64 + 1,
        title,
        body: input.body,
    };
    issues.push(issue.clone());
    debug!(%owner, %repo, number = issue.number, "created issue");
    (StatusCode::CREATED, Json(issue)).into_response()
}

/// Deleting a file requires `message` and `sha` in the JSON body.
async fn delete_file(Path((owner, repo, path)): Path<(String, String, String)>, body: String) -> Response {
    let input: DeleteFile = serde_json::from_str(&body).unwrap_or(DeleteFile {
        message: None,
        sha: None,
    });
    let (Some(message), Some(sha)) = (input.message, input.sha) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Invalid request.",
                "errors": [{"resource": "Content", "field": "sha", "code": "missing_field"}],
            })),
        )
            .into_response();
    };
    debug!(%owner, %repo, %path, %sha, "deleted file");
    Json(json!({"content": null, "commit": {"message": message, "parents": [{"sha": sha}]}})).into_response()
}

/// Bytes of a gzip stream header followed by non-UTF-8 payload.
pub const TARBALL: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0xff, 0xfe, 0x00, 0x80];

async fn tarball(Path((owner, repo)): Path<(String, String)>) -> Response {
    debug!(%owner, %repo, "serving tarball");
    ([(header::CONTENT_TYPE, "application/x-gzip")], TARBALL).into_response()
}

async fn get_user(State(db): State<Db>, Path(login): Path<String>, headers: HeaderMap) -> Response {
    let store = db.read().await;
    let Some(user) = store.users.get(&login) else {
        return not_found();
    };

    let etag = format!("\"{}-{}\"", user.login, user.id);
    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if matches {
        debug!(%login, "user not modified");
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }

    ([(header::ETAG, etag)], Json(user.clone())).into_response()
}

async fn moved_user(Path(login): Path<String>, headers: HeaderMap) -> Response {
    let location = format!("{}/users/{login}", origin(&headers));
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

async fn redirect_loop(Path(n): Path<u32>, headers: HeaderMap) -> Response {
    let location = format!("{}/loop/{}", origin(&headers), n + 1);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn rate_limited() -> Response {
    (
        StatusCode::FORBIDDEN,
        [("x-ratelimit-limit", "60"), ("x-ratelimit-remaining", "0")],
        Json(json!({"message": "API rate limit exceeded for 127.0.0.1."})),
    )
        .into_response()
}

/// Reflects the request headers back as a JSON object.
async fn echo(headers: HeaderMap) -> Json<HashMap<String, String>> {
    Json(
        headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect(),
    )
}
