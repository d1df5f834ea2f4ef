// Marketplace workflows against an in-memory fake.

use crowdaq_cli::mturk::expire::expire_hit_group;
use crowdaq_cli::mturk::launch::{launch_exam, LaunchFile};
use crowdaq_cli::mturk::qualify::{
    grant_new_qualification, qualify_by_grade, revoke_all, GradeEntry, GrantOptions,
};
use crowdaq_cli::mturk::{
    workers_with_qualification, HitRequest, HitSummary, Marketplace, MarketplaceError, Page,
};
use std::cell::RefCell;
use std::collections::HashSet;

#[derive(Default)]
struct FakeMarket {
    hits: Vec<HitSummary>,
    workers: Vec<String>,
    failing: HashSet<String>,
    created: RefCell<Vec<HitRequest>>,
    associations: RefCell<Vec<(String, String, i32)>>,
    removals: RefCell<Vec<String>>,
    expired: RefCell<Vec<String>>,
}

impl FakeMarket {
    fn check(&self, id: &str) -> Result<(), MarketplaceError> {
        if self.failing.contains(id) {
            return Err(MarketplaceError::Call {
                operation: "fake",
                message: format!("{} rejected", id),
            });
        }
        Ok(())
    }
}

fn page<T: Clone>(items: &[T], token: Option<&str>) -> Page<T> {
    // Two items per page, the token is the offset.
    let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
    let end = (start + 2).min(items.len());
    Page {
        items: items[start..end].to_vec(),
        next_token: (end < items.len()).then(|| end.to_string()),
    }
}

impl Marketplace for FakeMarket {
    fn account_balance(&self) -> Result<String, MarketplaceError> {
        Ok("10000.00".to_string())
    }

    fn create_hit(&self, req: &HitRequest) -> Result<HitSummary, MarketplaceError> {
        let mut created = self.created.borrow_mut();
        created.push(req.clone());
        Ok(HitSummary {
            hit_id: format!("H{}", created.len()),
            group_id: "G1".to_string(),
            expiration: None,
        })
    }

    fn get_hit(&self, hit_id: &str) -> Result<HitSummary, MarketplaceError> {
        self.check(hit_id)?;
        Ok(HitSummary {
            hit_id: hit_id.to_string(),
            group_id: "G1".to_string(),
            expiration: Some(0),
        })
    }

    fn list_hits(
        &self,
        _qualification: Option<&str>,
        next_token: Option<&str>,
    ) -> Result<Page<HitSummary>, MarketplaceError> {
        Ok(page(&self.hits, next_token))
    }

    fn expire_hit(&self, hit_id: &str) -> Result<(), MarketplaceError> {
        self.check(hit_id)?;
        self.expired.borrow_mut().push(hit_id.to_string());
        Ok(())
    }

    fn associate_qualification(
        &self,
        qualification: &str,
        worker_id: &str,
        value: i32,
        _notify: bool,
    ) -> Result<(), MarketplaceError> {
        self.check(worker_id)?;
        self.associations.borrow_mut().push((
            qualification.to_string(),
            worker_id.to_string(),
            value,
        ));
        Ok(())
    }

    fn disassociate_qualification(
        &self,
        _qualification: &str,
        worker_id: &str,
    ) -> Result<(), MarketplaceError> {
        self.check(worker_id)?;
        self.removals.borrow_mut().push(worker_id.to_string());
        Ok(())
    }

    fn list_workers_with_qualification(
        &self,
        _qualification: &str,
        next_token: Option<&str>,
    ) -> Result<Page<String>, MarketplaceError> {
        Ok(page(&self.workers, next_token))
    }

    fn create_qualification_type(
        &self,
        _name: &str,
        _description: &str,
    ) -> Result<String, MarketplaceError> {
        Ok("NEWQUAL".to_string())
    }
}

fn hit(id: &str, group: &str) -> HitSummary {
    HitSummary {
        hit_id: id.to_string(),
        group_id: group.to_string(),
        expiration: None,
    }
}

#[test]
fn only_passing_workers_get_qualified() {
    let market = FakeMarket::default();
    let entries = vec![
        GradeEntry { worker_id: "W1".into(), grade: 0.9 },
        GradeEntry { worker_id: "W2".into(), grade: 0.4 },
    ];

    let summary = qualify_by_grade(&market, "QUAL", &entries, 0.8, GrantOptions::default());

    assert_eq!(
        *market.associations.borrow(),
        vec![("QUAL".to_string(), "W1".to_string(), 90)]
    );
    assert_eq!(summary.succeeded, vec!["W1".to_string()]);
    assert!(summary.is_clean());
}

#[test]
fn dry_run_makes_no_calls() {
    let market = FakeMarket::default();
    let entries = vec![GradeEntry { worker_id: "W1".into(), grade: 1.0 }];
    let opts = GrantOptions { dry_run: true, notify: false };

    let summary = qualify_by_grade(&market, "QUAL", &entries, 0.5, opts);

    assert!(market.associations.borrow().is_empty());
    assert_eq!(summary.succeeded, vec!["W1".to_string()]);
}

#[test]
fn grant_failures_do_not_stop_the_batch() {
    let market = FakeMarket {
        failing: HashSet::from(["W2".to_string()]),
        ..Default::default()
    };
    let workers = vec!["W1".to_string(), "W2".to_string(), "W3".to_string()];

    let (qualification, summary) =
        grant_new_qualification(&market, &workers, GrantOptions::default()).unwrap();

    assert_eq!(qualification.as_deref(), Some("NEWQUAL"));
    assert_eq!(summary.succeeded, vec!["W1".to_string(), "W3".to_string()]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].id, "W2");
    assert!(market
        .associations
        .borrow()
        .iter()
        .all(|(q, _, value)| q == "NEWQUAL" && *value == 1));
}

#[test]
fn dry_run_new_qualification_creates_nothing() {
    let market = FakeMarket::default();
    let workers = vec!["W1".to_string(), "W2".to_string()];
    let opts = GrantOptions { dry_run: true, notify: false };

    let (qualification, summary) = grant_new_qualification(&market, &workers, opts).unwrap();

    assert!(qualification.is_none());
    assert!(market.associations.borrow().is_empty());
    assert_eq!(summary.succeeded, workers);
}

#[test]
fn expire_only_touches_the_group() {
    let market = FakeMarket {
        hits: vec![hit("H1", "G1"), hit("H2", "G2"), hit("H3", "G1"), hit("H4", "G1")],
        failing: HashSet::from(["H3".to_string()]),
        ..Default::default()
    };

    let outcome = expire_hit_group(&market, "G1").unwrap();

    assert_eq!(
        *market.expired.borrow(),
        vec!["H1".to_string(), "H4".to_string()]
    );
    assert_eq!(outcome.summary.failed[0].id, "H3");
    assert_eq!(outcome.expirations.len(), 2);
}

#[test]
fn revoke_all_pages_through_workers() {
    let market = FakeMarket {
        workers: vec!["W3".into(), "W1".into(), "W2".into(), "W1".into(), "W5".into()],
        ..Default::default()
    };

    assert_eq!(
        workers_with_qualification(&market, "QUAL").unwrap(),
        vec!["W1", "W2", "W3", "W5"]
    );
    let summary = revoke_all(&market, "QUAL", false).unwrap();
    assert_eq!(summary.succeeded.len(), 4);
    assert_eq!(market.removals.borrow().len(), 4);
}

#[test]
fn launch_creates_requested_hits() {
    let file: LaunchFile = serde_json::from_value(serde_json::json!({
        "mturk_config": {
            "sandbox": true,
            "require_US": false,
            "require_master": false,
            "include_qualifications": [],
            "exclude_qualifications": ["OLD"],
            "num_of_hits": 3,
            "title": "Exam",
            "description": "Take the exam",
            "keywords": "exam",
            "reward_per_hit": "1.00",
            "lifetime_min": "60*24",
            "session_duration_min": 60,
            "auto_approval_min": 10
        }
    }))
    .unwrap();
    let market = FakeMarket::default();

    let outcome = launch_exam(&market, &file.mturk_config, "https://site/w/exam/alice/midterm").unwrap();

    assert_eq!(outcome.hits.len(), 3);
    assert_eq!(
        outcome.preview_urls.into_iter().collect::<Vec<_>>(),
        vec!["https://workersandbox.mturk.com/mturk/preview?groupId=G1".to_string()]
    );
    let created = market.created.borrow();
    assert_eq!(created[0].reward, "1.00");
    assert_eq!(created[0].qualification_requirements.len(), 1);
    assert_eq!(created[0].qualification_requirements[0].type_id, "OLD");
}
