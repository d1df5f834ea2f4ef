// API client module: a small blocking HTTP client that talks to the
// annotation service. Resource accessors (see `resource`) borrow it for
// every call so the auth header is built in exactly one place.

use crate::config::Config;
use crate::error::ApiError;
use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// The service reads the token from `Authorizations` (with a trailing
/// "s"), not the standard `Authorization`.
pub const AUTH_HEADER: &str = "authorizations";

/// Holds a reqwest blocking client, the site URL and the bearer token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    site_url: String,
    headers: HeaderMap,
}

/// Body of a successful `/api/login` call.
#[derive(Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

/// Status and body of a raw call, printed as-is by `get-url` and `post`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Progress of a task as returned by `/api/task_report`.
#[derive(Deserialize, Debug, Default)]
pub struct TaskProgress {
    #[serde(default)]
    pub assignment_count: Vec<AssignmentCount>,
}

#[derive(Deserialize, Debug)]
pub struct AssignmentCount {
    pub task_id: Value,
    pub count: u64,
}

impl ApiClient {
    /// Build a client for `site_url`. An empty token sends an empty bearer,
    /// which the server treats as anonymous.
    pub fn new(site_url: &str, token: &str) -> Result<Self, ApiError> {
        let client = Client::builder().build()?;
        let mut headers = HeaderMap::new();
        let val = HeaderValue::from_str(&format!("Bearer {}", token))?;
        headers.insert(HeaderName::from_static(AUTH_HEADER), val);
        Ok(ApiClient {
            client,
            site_url: site_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    pub fn from_config(conf: &Config) -> Result<Self, ApiError> {
        Self::new(&conf.site_url, &conf.token)
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url).headers(self.headers.clone())
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url).headers(self.headers.clone())
    }

    /// Exchange user/password for a token. Credentials go in the query
    /// string, which is what the login endpoint reads.
    pub fn login(&self, user: &str, password: &str) -> Result<String> {
        let url = format!("{}/api/login", self.site_url);
        let res = self
            .client
            .post(&url)
            .query(&[("username", user), ("password", password)])
            .send()
            .context("Failed to send login request")?;
        let status = res.status();
        let txt = res.text().unwrap_or_default();
        debug!(status = status.as_u16(), body = %txt, "login response");
        if !status.is_success() {
            bail!("Login failed: {} - {}", status, txt);
        }
        let resp: LoginResponse =
            serde_json::from_str(&txt).context("Parsing login response json")?;
        Ok(resp.token)
    }

    /// Authenticated GET to an arbitrary URL.
    pub fn raw_get(&self, url: &str) -> Result<RawResponse, ApiError> {
        let res = self.get(url).send()?;
        raw(res)
    }

    /// Authenticated POST to an arbitrary URL, with an optional body.
    pub fn raw_post(&self, url: &str, body: Option<String>) -> Result<RawResponse, ApiError> {
        let mut req = self.post(url);
        if let Some(body) = body {
            req = req.body(body);
        }
        raw(req.send()?)
    }

    /// Fetch how many assignments each task of `task` has collected.
    pub fn task_progress(&self, user: &str, task: &str) -> Result<TaskProgress, ApiError> {
        let url = format!("{}/api/task_report/{}/{}", self.site_url, user, task);
        match read_json(self.get(&url).send()?)? {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => Ok(TaskProgress::default()),
        }
    }
}

fn raw(res: Response) -> Result<RawResponse, ApiError> {
    let status = res.status().as_u16();
    let body = res.text()?;
    Ok(RawResponse { status, body })
}

/// Three-way outcome shared by every accessor call: 200 gives the decoded
/// body, 404 gives `None`, anything else is an error carrying the body.
pub(crate) fn read_json(res: Response) -> Result<Option<Value>, ApiError> {
    let status = res.status();
    let body = res.text()?;
    match status {
        StatusCode::OK => Ok(Some(serde_json::from_str(&body)?)),
        StatusCode::NOT_FOUND => Ok(None),
        other => Err(ApiError::Status {
            status: other.as_u16(),
            body,
        }),
    }
}

/// Render a JSON scalar as plain text; strings lose their quotes.
pub fn json_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Worker URLs for every task still short of `target` assignments; a task
/// missing N assignments appears N times.
pub fn unfinished_task_urls(
    site_url: &str,
    user: &str,
    task: &str,
    progress: &TaskProgress,
    target: u64,
) -> Vec<String> {
    let mut urls = Vec::new();
    for p in &progress.assignment_count {
        let url = format!("{}/w/task/{}/{}/{}", site_url, user, task, json_text(&p.task_id));
        for _ in p.count..target {
            urls.push(url.clone());
        }
    }
    urls
}
