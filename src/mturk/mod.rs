// Mechanical Turk side of the tooling.
//
// Everything here talks to the marketplace through the [`Marketplace`]
// trait. The production implementation is [`sdk::MturkClient`]; tests use
// an in-memory fake. Operations that touch many HITs or workers never stop
// at the first failure: each item's outcome is collected in a
// [`BatchSummary`].

pub mod expire;
pub mod launch;
pub mod qualify;
pub mod sdk;

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::warn;

pub const MTURK_SANDBOX: &str = "https://mturk-requester-sandbox.us-east-1.amazonaws.com";
pub const MTURK_PROD: &str = "https://mturk-requester.us-east-1.amazonaws.com";
pub const MTURK_REGION: &str = "us-east-1";

/// Page size used by every listing call.
pub const PAGE_SIZE: i32 = 100;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("{operation} failed: {message}")]
    Call {
        operation: &'static str,
        message: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("response is missing {0}")]
    MissingField(&'static str),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitSummary {
    pub hit_id: String,
    pub group_id: String,
    /// Expiration as seconds since the Unix epoch.
    pub expiration: Option<i64>,
}

/// One page of a listing plus the cursor for the next one.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    EqualTo,
    Exists,
    DoesNotExist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedAction {
    Accept,
    DiscoverPreviewAndAccept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualificationRequirement {
    pub type_id: String,
    pub comparator: Comparator,
    /// Country code compared against the worker locale.
    pub country: Option<String>,
    pub actions_guarded: Option<GuardedAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitRequest {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub reward: String,
    pub max_assignments: i32,
    pub lifetime_secs: i64,
    pub assignment_duration_secs: i64,
    pub auto_approval_delay_secs: i64,
    pub question: String,
    pub qualification_requirements: Vec<QualificationRequirement>,
}

/// Blocking view of the marketplace API used by the commands.
pub trait Marketplace {
    fn account_balance(&self) -> Result<String, MarketplaceError>;

    fn create_hit(&self, req: &HitRequest) -> Result<HitSummary, MarketplaceError>;

    fn get_hit(&self, hit_id: &str) -> Result<HitSummary, MarketplaceError>;

    /// `qualification` restricts the listing to HITs using that type.
    fn list_hits(
        &self,
        qualification: Option<&str>,
        next_token: Option<&str>,
    ) -> Result<Page<HitSummary>, MarketplaceError>;

    /// Expire the HIT immediately.
    fn expire_hit(&self, hit_id: &str) -> Result<(), MarketplaceError>;

    fn associate_qualification(
        &self,
        qualification: &str,
        worker_id: &str,
        value: i32,
        notify: bool,
    ) -> Result<(), MarketplaceError>;

    fn disassociate_qualification(
        &self,
        qualification: &str,
        worker_id: &str,
    ) -> Result<(), MarketplaceError>;

    fn list_workers_with_qualification(
        &self,
        qualification: &str,
        next_token: Option<&str>,
    ) -> Result<Page<String>, MarketplaceError>;

    /// Create an active qualification type and return its id.
    fn create_qualification_type(
        &self,
        name: &str,
        description: &str,
    ) -> Result<String, MarketplaceError>;
}

/// Request pages until the service stops handing out a continuation token.
pub fn collect_pages<T, F>(mut fetch: F) -> Result<Vec<T>, MarketplaceError>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, MarketplaceError>,
{
    let mut all = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = fetch(token.as_deref())?;
        let empty = page.items.is_empty();
        all.extend(page.items);
        match page.next_token {
            // An empty page with a token still means the listing is exhausted.
            Some(next) if !empty => token = Some(next),
            _ => break,
        }
    }
    Ok(all)
}

pub fn all_hits<M: Marketplace + ?Sized>(
    market: &M,
    qualification: Option<&str>,
) -> Result<Vec<HitSummary>, MarketplaceError> {
    collect_pages(|token| market.list_hits(qualification, token))
}

pub fn hits_in_group<M: Marketplace + ?Sized>(
    market: &M,
    group_id: &str,
    qualification: Option<&str>,
) -> Result<Vec<HitSummary>, MarketplaceError> {
    let wanted: Vec<HitSummary> = all_hits(market, qualification)?
        .into_iter()
        .filter(|hit| hit.group_id == group_id)
        .collect();
    if wanted.is_empty() {
        warn!("No HITs found in group: {}", group_id);
    }
    Ok(wanted)
}

/// Distinct ids of the workers holding `qualification`, sorted.
pub fn workers_with_qualification<M: Marketplace + ?Sized>(
    market: &M,
    qualification: &str,
) -> Result<Vec<String>, MarketplaceError> {
    let workers = collect_pages(|token| market.list_workers_with_qualification(qualification, token))?;
    Ok(workers
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

/// Per-item outcome of a batch of marketplace calls.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl BatchSummary {
    pub fn record(&mut self, id: &str, result: Result<(), MarketplaceError>) {
        match result {
            Ok(()) => self.succeeded.push(id.to_string()),
            Err(e) => {
                warn!("{} failed: {}", id, e);
                self.failed.push(ItemFailure {
                    id: id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
