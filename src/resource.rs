// Resource paths and the accessors that read and write them.
//
// A resource path looks like `/exam/alice/midterm`: a kind, the owning
// user, then one or two identifiers. [`parse_named`] and [`parse_category`]
// turn such a path into a [`ResourceId`] by trying a fixed, ordered table of
// patterns; [`resolve_with_name`] and [`resolve`] additionally bind the id
// to an [`ApiClient`] so it can be fetched.

use crate::api::{read_json, ApiClient};
use crate::error::{ApiError, ResolveError};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Characters allowed in users and resource identifiers.
pub const NAME_PATTERN: &str = "[a-zA-Z0-9_][a-zA-Z0-9_-]*";

/// Separator used to batch several response ids into one URL segment.
pub const RESPONSE_ID_SEPARATOR: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Instruction,
    Tutorial,
    QuestionSet,
    Question,
    Exam,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Instruction => "instruction",
            ResourceType::Tutorial => "tutorial",
            ResourceType::QuestionSet => "question_set",
            ResourceType::Question => "question",
            ResourceType::Exam => "exam",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub kind: ResourceType,
    pub user: String,
    /// Parent question set, only for questions.
    pub question_set: Option<String>,
    /// `None` for category paths.
    pub name: Option<String>,
}

struct Route {
    kind: ResourceType,
    pattern: Regex,
}

fn route(kind: ResourceType, template: &str) -> Route {
    let mut source = format!("^{}$", template);
    for group in ["user", "qs", "id"] {
        source = source.replace(
            &format!("(?P<{}>)", group),
            &format!("(?P<{}>{})", group, NAME_PATTERN),
        );
    }
    Route {
        kind,
        pattern: Regex::new(&source).expect("route patterns are valid regexes"),
    }
}

// Order matters only for readability: the layouts never overlap.
static NAMED_ROUTES: LazyLock<Vec<Route>> = LazyLock::new(|| {
    vec![
        route(ResourceType::Instruction, "/instruction/(?P<user>)/(?P<id>)"),
        route(ResourceType::Tutorial, "/tutorial/(?P<user>)/(?P<id>)"),
        route(ResourceType::QuestionSet, "/question_set/(?P<user>)/(?P<id>)"),
        route(
            ResourceType::Question,
            "/question_set/(?P<user>)/(?P<qs>)/(?P<id>)",
        ),
        route(ResourceType::Exam, "/exam/(?P<user>)/(?P<id>)"),
    ]
});

static CATEGORY_ROUTES: LazyLock<Vec<Route>> = LazyLock::new(|| {
    vec![
        route(ResourceType::Instruction, "/instruction/(?P<user>)"),
        route(ResourceType::Tutorial, "/tutorial/(?P<user>)"),
        route(ResourceType::QuestionSet, "/question_set/(?P<user>)"),
        route(ResourceType::Question, "/question_set/(?P<user>)/questions"),
        route(
            ResourceType::Question,
            "/question_set/(?P<user>)/(?P<qs>)/questions",
        ),
        route(ResourceType::Exam, "/exam/(?P<user>)"),
    ]
});

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn match_routes(routes: &[Route], path: &str) -> Result<ResourceId, ResolveError> {
    let path = normalize(path);
    for r in routes {
        if let Some(caps) = r.pattern.captures(&path) {
            let group = |n: &str| caps.name(n).map(|m| m.as_str().to_string());
            return Ok(ResourceId {
                kind: r.kind,
                user: group("user").unwrap_or_default(),
                question_set: group("qs"),
                name: group("id"),
            });
        }
    }
    Err(ResolveError::Unrecognized(path))
}

/// Parse a path naming a single resource, e.g. `/tutorial/bob/intro`.
pub fn parse_named(path: &str) -> Result<ResourceId, ResolveError> {
    match_routes(&NAMED_ROUTES, path)
}

/// Parse a path naming a category, e.g. `/tutorial/bob`.
pub fn parse_category(path: &str) -> Result<ResourceId, ResolveError> {
    match_routes(&CATEGORY_ROUTES, path)
}

/// A named resource bound to a client.
pub struct Resolved<'a> {
    pub resources: Resources<'a>,
    pub name: String,
}

impl Resolved<'_> {
    pub fn kind(&self) -> ResourceType {
        self.resources.kind()
    }
}

/// Resolve a named resource path into an accessor plus the resource name.
pub fn resolve_with_name<'a>(
    path: &str,
    client: &'a ApiClient,
) -> Result<Resolved<'a>, ResolveError> {
    let id = parse_named(path)?;
    let name = id.name.clone().unwrap_or_default();
    Ok(Resolved {
        resources: Resources::new(client, id),
        name,
    })
}

/// Resolve a category path into an accessor, for listing.
pub fn resolve<'a>(path: &str, client: &'a ApiClient) -> Result<Resources<'a>, ResolveError> {
    parse_category(path).map(|id| Resources::new(client, id))
}

#[derive(Debug, PartialEq)]
pub enum CreateOutcome {
    /// Server reply to the write (`None` on 404).
    Stored(Option<Value>),
    AlreadyExists,
}

/// Accessor for all resources of one kind owned by one user.
pub struct Resources<'a> {
    client: &'a ApiClient,
    kind: ResourceType,
    user: String,
    question_set: Option<String>,
}

impl<'a> Resources<'a> {
    pub fn new(client: &'a ApiClient, id: ResourceId) -> Self {
        Resources {
            client,
            kind: id.kind,
            user: id.user,
            question_set: id.question_set,
        }
    }

    pub fn kind(&self) -> ResourceType {
        self.kind
    }

    /// URL of the whole category, e.g. `{site}/api/exam/alice`.
    pub fn category_url(&self) -> String {
        let site = self.client.site_url();
        match (self.kind, &self.question_set) {
            (ResourceType::Question, Some(qs)) => {
                format!("{}/api/question_set/{}/{}/questions", site, self.user, qs)
            }
            (ResourceType::Question, None) => {
                format!("{}/api/question_set/{}/questions", site, self.user)
            }
            (kind, _) => format!("{}/api/{}/{}", site, kind, self.user),
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!("{}/{}", self.category_url(), name)
    }

    pub fn get(&self, name: &str) -> Result<Option<Value>, ApiError> {
        let url = self.url(name);
        debug!("Fetching {}", url);
        let found = read_json(self.client.get(&url).send()?)?;
        match found {
            Some(_) => info!("Found {}", url),
            None => warn!("{} return 404", url),
        }
        Ok(found)
    }

    /// Store `definition` (a JSON document, sent verbatim) under `name`.
    pub fn update(&self, name: &str, definition: &str) -> Result<Option<Value>, ApiError> {
        let url = self.url(name);
        debug!("Updating {}", url);
        let res = self
            .client
            .post(&url)
            .body(definition.to_string())
            .send()?;
        let updated = read_json(res)?;
        match updated {
            Some(_) => info!("Updated {}", url),
            None => warn!("Cannot find {}", url),
        }
        Ok(updated)
    }

    /// Store `definition` unless something already lives under `name`.
    pub fn create(
        &self,
        name: &str,
        definition: &str,
        overwrite: bool,
    ) -> Result<CreateOutcome, ApiError> {
        if !overwrite && self.get(name)?.is_some() {
            return Ok(CreateOutcome::AlreadyExists);
        }
        self.update(name, definition).map(CreateOutcome::Stored)
    }

    pub fn list(&self) -> Result<Option<Value>, ApiError> {
        let url = self.category_url();
        debug!("Listing {}", url);
        read_json(self.client.get(&url).send()?)
    }

    /// Exam-only operations, or `None` for any other kind.
    pub fn exam(&self) -> Option<ExamResources<'_, 'a>> {
        (self.kind == ResourceType::Exam).then_some(ExamResources { inner: self })
    }
}

/// Responses and reports of exams.
pub struct ExamResources<'r, 'a> {
    inner: &'r Resources<'a>,
}

impl ExamResources<'_, '_> {
    fn fetch(&self, url: &str) -> Result<Option<Value>, ApiError> {
        debug!("Fetching {}", url);
        read_json(self.inner.client.get(url).send()?)
    }

    /// Ids of every submitted response, under the `results` key.
    pub fn list_responses(&self, name: &str) -> Result<Option<Value>, ApiError> {
        self.fetch(&format!("{}/response", self.inner.url(name)))
    }

    /// Batch fetch of the given responses in a single request.
    pub fn get_responses<I, S>(&self, name: &str, ids: I) -> Result<Option<Value>, ApiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = ids
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(RESPONSE_ID_SEPARATOR);
        self.fetch(&format!("{}/response/{}", self.inner.url(name), joined))
    }

    pub fn get_report(&self, name: &str) -> Result<Option<Value>, ApiError> {
        self.fetch(&format!("{}/report", self.inner.url(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(kind: ResourceType, user: &str, qs: Option<&str>, name: Option<&str>) -> ResourceId {
        ResourceId {
            kind,
            user: user.into(),
            question_set: qs.map(Into::into),
            name: name.map(Into::into),
        }
    }

    #[test]
    fn named_paths_resolve_to_their_kind() {
        let cases = [
            ("/instruction/alice/guide", id(ResourceType::Instruction, "alice", None, Some("guide"))),
            ("/tutorial/bob/intro-1", id(ResourceType::Tutorial, "bob", None, Some("intro-1"))),
            ("/question_set/c_d/qs1", id(ResourceType::QuestionSet, "c_d", None, Some("qs1"))),
            ("/question_set/eve/qs1/q9", id(ResourceType::Question, "eve", Some("qs1"), Some("q9"))),
            ("/exam/alice/midterm", id(ResourceType::Exam, "alice", None, Some("midterm"))),
        ];
        for (path, expected) in cases {
            assert_eq!(parse_named(path).unwrap(), expected, "{}", path);
        }
    }

    #[test]
    fn leading_slash_is_optional() {
        assert_eq!(
            parse_named("exam/alice/midterm").unwrap(),
            parse_named("/exam/alice/midterm").unwrap()
        );
    }

    #[test]
    fn category_paths_resolve() {
        assert_eq!(parse_category("/exam/alice").unwrap(), id(ResourceType::Exam, "alice", None, None));
        assert_eq!(
            parse_category("/question_set/alice/questions").unwrap(),
            id(ResourceType::Question, "alice", None, None)
        );
        assert_eq!(
            parse_category("/question_set/alice/qs1/questions").unwrap(),
            id(ResourceType::Question, "alice", Some("qs1"), None)
        );
    }

    #[test]
    fn unknown_paths_fail() {
        for path in [
            "/exam/alice",
            "/quiz/alice/x",
            "/exam/-alice/x",
            "/exam/alice/mid term",
            "/instruction/alice/a/b/c",
            "",
        ] {
            assert!(
                matches!(parse_named(path), Err(ResolveError::Unrecognized(_))),
                "{}",
                path
            );
        }
        assert!(parse_category("/exam/alice/midterm").is_err());
    }

    #[test]
    fn urls_follow_the_kind() {
        let client = ApiClient::new("https://site", "tok").unwrap();
        let exam = resolve_with_name("/exam/alice/midterm", &client).unwrap();
        assert_eq!(exam.kind(), ResourceType::Exam);
        assert_eq!(exam.resources.url(&exam.name), "https://site/api/exam/alice/midterm");
        assert!(exam.resources.exam().is_some());

        let q = resolve_with_name("/question_set/alice/qs1/q2", &client).unwrap();
        assert_eq!(q.kind(), ResourceType::Question);
        assert_eq!(
            q.resources.url(&q.name),
            "https://site/api/question_set/alice/qs1/questions/q2"
        );
        assert!(q.resources.exam().is_none());

        let tutorials = resolve("tutorial/bob", &client).unwrap();
        assert_eq!(tutorials.category_url(), "https://site/api/tutorial/bob");
    }
}
